//! The prover seam: what the tournament needs from an untrusted L2 endpoint.

use alloy_consensus::Header;
use async_trait::async_trait;
use litmus_inbox::L2TrackingRecord;

/// An untrusted prover endpoint, as seen by the tournament.
///
/// Handles are created once at startup and never mutated; the engine only reads through them.
/// Every method may lie or fail; both are treated as evidence against the prover, never as a
/// process failure.
#[async_trait]
pub trait ProverNode {
    /// The error type for prover RPC failures.
    type Error: std::fmt::Display + Send;

    /// The endpoint this prover is reached at, for reporting.
    fn endpoint(&self) -> &str;

    /// The prover's claimed chain tip.
    async fn latest_state(&self) -> Result<L2TrackingRecord, Self::Error>;

    /// The prover's header at the given L2 height.
    async fn header_by_number(&self, number: u64) -> Result<Header, Self::Error>;
}
