//! Contains the [NodeFetcher] trait for resolving blinded trie node commitments.

use alloy_primitives::{Bytes, B256};

/// The [NodeFetcher] trait defines the synchronous interface for fetching the
/// preimage of a blinded trie node commitment.
pub trait NodeFetcher {
    /// The error type returned when a preimage cannot be fetched.
    type Error: core::fmt::Display;

    /// Fetches the RLP preimage of the node blinded by `commitment`.
    fn node_preimage(&self, commitment: B256) -> Result<Bytes, Self::Error>;
}
