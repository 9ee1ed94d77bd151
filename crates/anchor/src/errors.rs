//! Anchor error types. Every variant is fatal to the run.

use alloy_primitives::B256;
use thiserror::Error;

/// An error type for anchor extraction and validation.
#[derive(Error, Debug)]
pub enum AnchorError {
    /// An L1 RPC call failed.
    #[error("anchor rpc failed: {0}")]
    Transport(String),
    /// An assertion lifecycle log could not be located within the scan window.
    #[error("no {0} log found for assertion {1}")]
    LogMissing(&'static str, B256),
    /// The locally recomputed assertion hash disagrees with the event.
    #[error("assertion hash mismatch: event {expected}, recomputed {computed}")]
    HashMismatch {
        /// The hash the event carries.
        expected: B256,
        /// The hash recomputed from the event's fields.
        computed: B256,
    },
    /// The contract rejected a validation call.
    #[error("contract validation rejected: {0}")]
    ContractRejected(String),
}
