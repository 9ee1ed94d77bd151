//! Oracle error types.

use litmus_inbox::{DecoderError, InboxReaderError, MaterializeError};
use thiserror::Error;

/// The only errors that escape an oracle instead of collapsing into a `false` verdict.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OracleError {
    /// The run was cancelled; partial results are discarded.
    #[error("cancelled")]
    Cancelled,
    /// The L1 inbox contract authenticated a batch encoding this client cannot decode. Nothing
    /// this process verifies can be trusted past this point.
    #[error("node out of date: authenticated header byte 0x{0:02x} unknown")]
    NodeOutOfDate(u8),
}

/// The internal failure modes of one consensus check. All of them collapse into a `false`
/// verdict at the oracle boundary; the type exists so the collapse happens in one place, with
/// the reason logged.
#[derive(Error, Debug)]
pub enum ConsensusCheckError {
    /// The inbox reader could not assemble the batch.
    #[error(transparent)]
    Reader(#[from] InboxReaderError),
    /// The batch payload failed to decode.
    #[error(transparent)]
    Decoder(#[from] DecoderError),
    /// The batch's messages failed to materialize.
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    /// The batch materialized no messages to compare against.
    #[error("batch {0} materialized no messages")]
    EmptyBatch(u64),
    /// The claimed records do not appear as adjacent messages.
    #[error("claimed messages are not consecutive")]
    NotConsecutive,
    /// The claimed records point at batches that are not adjacent.
    #[error("target batches are not consecutive: {prev} then {curr}")]
    NonConsecutiveBatches {
        /// The batch the earlier record resolves to.
        prev: u64,
        /// The batch the later record resolves to.
        curr: u64,
    },
}
