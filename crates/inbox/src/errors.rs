//! Error types for batch decoding and inbox reading.

use alloy_primitives::B256;
use thiserror::Error;

/// An error returned by a data-availability reader.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DaReaderError {
    /// The payload's keyset failed validation. Whether this is fatal depends on the configured
    /// [KeysetValidationMode].
    ///
    /// [KeysetValidationMode]: crate::KeysetValidationMode
    #[error("keyset validation failed: {0}")]
    KeysetValidation(String),
    /// The DA layer could not produce the payload.
    #[error("data availability recovery failed: {0}")]
    Recovery(String),
}

/// An error type for sequencer message decoding.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecoderError {
    /// The batch payload is shorter than the fixed L1 header.
    #[error("sequencer message missing L1 header")]
    MissingHeader,
    /// The L1 inbox contract authenticated a header byte this client does not understand. The
    /// contract is ahead of us; nothing downstream can be validated.
    #[error("batch has unsupported authenticated header byte 0x{0:02x}; node out of date")]
    NodeOutOfDate(u8),
    /// The payload is a blob-hashes batch but no blob reader is configured.
    #[error("no blob reader configured for blob batch")]
    NoBlobReader,
    /// A data-availability reader failed.
    #[error(transparent)]
    DaReader(#[from] DaReaderError),
}

/// An error type for message materialization.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MaterializeError {
    /// A compressed L2 message segment failed to decompress.
    #[error("dropping undecompressable L2 message segment: {0}")]
    SegmentDecompression(String),
}

/// An error type for the [InboxReader].
///
/// Transport-level failures surface as [InboxReaderError::BridgeFetch] and may be retried by the
/// caller; every other variant is a logical gap in authoritative L1 data and is fatal for the
/// batch in question.
///
/// [InboxReader]: crate::InboxReader
#[derive(Error, Debug)]
pub enum InboxReaderError {
    /// The submission transaction carries no batch-delivery log.
    #[error("no batch delivery log found in transaction {0}")]
    SubmissionLogMissing(B256),
    /// The delivered batch was not found when enumerating its L1 block.
    #[error("batch {0} not covered by its delivery block range")]
    RangeNotCovered(u64),
    /// The delivery log for a predecessor batch could not be located.
    #[error("no delivery log found for batch {0}")]
    BatchLogMissing(u64),
    /// A delayed message outside the requested window was returned.
    #[error("delayed message {0} outside requested window")]
    DelayedGap(u64),
    /// The bridge or inbox contract state could not be fetched.
    #[error("bridge fetch failed: {0}")]
    BridgeFetch(String),
    /// The batch payload failed to decode.
    #[error(transparent)]
    Decoder(#[from] DecoderError),
}
