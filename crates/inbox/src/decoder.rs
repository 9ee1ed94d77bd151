//! Decoding of raw sequencer batch payloads into typed segments.
//!
//! A serialized batch is a fixed 40-byte L1 header followed by an optional payload. The payload
//! is unwrapped in stages: data-availability headers first (blobs, DAS certificates), then the
//! zero-heavy calldata encoding, then brotli, and finally an RLP stream of segments.

use crate::{
    compress::decompress_brotli,
    errors::{DaReaderError, DecoderError},
    is_blob_hashes_header_byte, is_brotli_header_byte, is_das_header_byte,
    is_known_header_byte, is_l1_authenticated_header_byte, is_zeroheavy_header_byte,
    zeroheavy::zeroheavy_decode,
    MAX_DECOMPRESSED_LEN, MAX_SEGMENTS_PER_MESSAGE, MAX_ZEROHEAVY_DECOMPRESSED_LEN,
};
use alloy_primitives::{Bytes, B256};
use alloy_rlp::Decodable;
use async_trait::async_trait;
use tracing::{error, warn};

/// The length of the fixed L1 header at the front of every serialized batch.
const BATCH_HEADER_LEN: usize = 40;

/// The kind discriminant of a batch segment, the first byte of each RLP segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchSegmentKind {
    /// An L2 message in the clear.
    L2Message = 0,
    /// A brotli-compressed L2 message.
    L2MessageBrotli = 1,
    /// A pointer consuming the next delayed-inbox message.
    Delayed = 2,
    /// Advances the timestamp applied to subsequent messages.
    AdvanceTimestamp = 3,
    /// Advances the L1 block number applied to subsequent messages.
    AdvanceL1Block = 4,
}

impl BatchSegmentKind {
    /// Maps a raw discriminant to a segment kind, if known.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::L2Message),
            1 => Some(Self::L2MessageBrotli),
            2 => Some(Self::Delayed),
            3 => Some(Self::AdvanceTimestamp),
            4 => Some(Self::AdvanceL1Block),
            _ => None,
        }
    }
}

/// How to react when a DA reader reports an invalid keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeysetValidationMode {
    /// An invalid keyset aborts decoding.
    #[default]
    Panic,
    /// An invalid keyset is logged at error level; decoding continues without the payload.
    Validate,
    /// Keysets are not validated; a reported failure is logged at warn level only.
    DontValidate,
}

/// A data-availability reader, selected by the payload's header byte.
///
/// Implementations recover the true batch payload from wherever the sequencer parked it
/// (EIP-4844 blobs, a DAS committee). The `batch_block_hash` authenticates the DA lookup
/// against the L1 block that delivered the batch.
#[async_trait]
pub trait DaReader {
    /// Whether this reader handles the given DA header byte.
    fn is_valid_header_byte(&self, byte: u8) -> bool;

    /// Recovers the wrapped payload from the DA layer. `data` is the full serialized batch,
    /// fixed header included.
    async fn recover_payload(
        &self,
        batch_num: u64,
        batch_block_hash: B256,
        data: &[u8],
    ) -> Result<Bytes, DaReaderError>;
}

/// A sequencer message parsed out of one batch: the time/block bounds the header commits to and
/// the ordered, still-encoded segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSequencerMessage {
    /// Minimum timestamp for messages in this batch.
    pub min_timestamp: u64,
    /// Maximum timestamp for messages in this batch.
    pub max_timestamp: u64,
    /// Minimum L1 block number for messages in this batch.
    pub min_l1_block: u64,
    /// Maximum L1 block number for messages in this batch.
    pub max_l1_block: u64,
    /// The number of delayed messages read after this batch.
    pub after_delayed_messages: u64,
    /// The raw segments, each `kind byte ‖ payload`.
    pub segments: Vec<Bytes>,
}

/// Parses a serialized sequencer batch into a [ParsedSequencerMessage].
///
/// Only the fixed header and the DA layer are authenticated by L1; everything recovered beyond
/// that point is untrusted input, so malformed inner payloads degrade to an empty segment list
/// with a warning instead of failing the batch.
pub async fn parse_sequencer_message(
    batch_num: u64,
    batch_block_hash: B256,
    data: &[u8],
    da_readers: &[Box<dyn DaReader + Send + Sync>],
    keyset_mode: KeysetValidationMode,
) -> Result<ParsedSequencerMessage, DecoderError> {
    if data.len() < BATCH_HEADER_LEN {
        return Err(DecoderError::MissingHeader);
    }
    let mut parsed = ParsedSequencerMessage {
        min_timestamp: be_u64(&data[0..8]),
        max_timestamp: be_u64(&data[8..16]),
        min_l1_block: be_u64(&data[16..24]),
        max_l1_block: be_u64(&data[24..32]),
        after_delayed_messages: be_u64(&data[32..40]),
        segments: Vec::new(),
    };
    let mut payload = Bytes::copy_from_slice(&data[BATCH_HEADER_LEN..]);

    // Stage 0: an authenticated header byte we do not understand means the inbox contract has
    // accepted an encoding this client cannot validate.
    if let Some(&first) = payload.first() {
        if is_l1_authenticated_header_byte(first) && !is_known_header_byte(first) {
            return Err(DecoderError::NodeOutOfDate(first));
        }
    }

    // Stage 1: peel the data-availability wrapper, if any. Only one DA strategy can apply per
    // batch; the first reader claiming the header byte wins.
    if let Some(&first) = payload.first() {
        let mut found_da = false;
        for reader in da_readers {
            if !reader.is_valid_header_byte(first) {
                continue;
            }
            match reader.recover_payload(batch_num, batch_block_hash, data).await {
                Ok(recovered) => payload = recovered,
                Err(DaReaderError::KeysetValidation(msg)) if is_das_header_byte(first) => {
                    match keyset_mode {
                        KeysetValidationMode::Panic => {
                            return Err(DaReaderError::KeysetValidation(msg).into())
                        }
                        KeysetValidationMode::Validate => {
                            error!(target: "batch_decoder", %msg, "keyset validation failed");
                            return Ok(parsed);
                        }
                        KeysetValidationMode::DontValidate => {
                            warn!(target: "batch_decoder", %msg, "skipping keyset validation");
                            return Ok(parsed);
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            }
            found_da = true;
            break;
        }

        if !found_da {
            if is_das_header_byte(first) {
                error!(target: "batch_decoder", "no DAS reader configured, but sequencer message has a DAS header");
            } else if is_blob_hashes_header_byte(first) {
                return Err(DecoderError::NoBlobReader);
            }
        }
    }

    // From here on, nothing in `payload` has been validated by the inbox contract.

    // Stage 2: undo the zero-heavy calldata encoding.
    if payload.first().is_some_and(|b| is_zeroheavy_header_byte(*b)) {
        payload = zeroheavy_decode(&payload[1..], MAX_ZEROHEAVY_DECOMPRESSED_LEN).into();
    }

    // Stage 3: decompress the brotli payload and split it into RLP segments.
    if payload.first().is_some_and(|b| is_brotli_header_byte(*b)) {
        match decompress_brotli(&payload[1..], MAX_DECOMPRESSED_LEN) {
            Ok(decompressed) => {
                let mut buf = decompressed.as_slice();
                while !buf.is_empty() {
                    let segment = match Bytes::decode(&mut buf) {
                        Ok(segment) => segment,
                        Err(err) => {
                            warn!(target: "batch_decoder", %err, "dropping malformed trailing segments");
                            break;
                        }
                    };
                    if parsed.segments.len() >= MAX_SEGMENTS_PER_MESSAGE {
                        warn!(target: "batch_decoder", "too many segments in sequencer message; truncating");
                        break;
                    }
                    parsed.segments.push(segment);
                }
            }
            Err(err) => {
                warn!(target: "batch_decoder", %err, "sequencer message decompression failed");
            }
        }
    } else if payload.is_empty() {
        warn!(target: "batch_decoder", "empty sequencer message");
    } else {
        warn!(target: "batch_decoder", first_byte = payload[0], length = payload.len(), "unknown sequencer message format");
    }

    Ok(parsed)
}

fn be_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().expect("slice is eight bytes"))
}
