//! Error types for state reconstruction.

use alloy_primitives::{Address, B256};
use litmus_mpt::ProofError;
use thiserror::Error;

/// An error type for [StateReconstructor] operations.
///
/// [StateReconstructor]: crate::StateReconstructor
#[derive(Error, Debug)]
pub enum ReconstructionError {
    /// The execution-trace service failed or returned nothing usable.
    #[error("prestate trace failed: {0}")]
    Trace(String),
    /// The trace result carried no transactions.
    #[error("prestate trace result is empty")]
    EmptyTrace,
    /// A proof or code fetch failed at the transport level.
    #[error("proof fetch failed: {0}")]
    ProofFetch(String),
    /// A proof failed verification against the previous state root.
    #[error(transparent)]
    Proof(#[from] ProofError),
    /// An account's proof response disagrees with what its proof actually proves.
    #[error("proof response for {0} disagrees with its own proof")]
    ResponseMismatch(Address),
    /// Fetched bytecode does not hash to the proven code hash.
    #[error("code for {0} does not hash to the proven code hash")]
    CodeHashMismatch(Address),
    /// The defining correctness gate: the reconstructed database does not hash back to the
    /// previous header's state root.
    #[error("reconstructed state root mismatch: computed {computed}, expected {expected}")]
    StateRootMismatch {
        /// The root of the reconstructed partial database.
        computed: B256,
        /// The previous header's state root.
        expected: B256,
    },
}
