//! Materialization of parsed batch segments into the ordered [L1IncomingMessage] sequence.

use crate::{
    compress::decompress_brotli,
    decoder::{BatchSegmentKind, ParsedSequencerMessage},
    errors::MaterializeError,
    types::{L1IncomingMessage, L1MessageHeader, L1MessageKind, BATCH_POSTER_ADDRESS},
    MAX_L2_MESSAGE_SIZE,
};
use alloy_primitives::U256;
use alloy_rlp::Decodable;
use std::collections::BTreeMap;
use tracing::warn;

/// Materializes the ordered list of [L1IncomingMessage]s a batch produces.
///
/// `delayed_start` is the delayed-inbox cursor at the start of the batch: the
/// `after_delayed_count` of the preceding batch. Each delayed-pointer segment emits the message
/// at the cursor and advances it; a null slot is tolerated with a cursor advance. Advance
/// segments shift the timestamp and L1 block number applied to subsequent messages, clamped to
/// the maxima the batch header commits to; they produce no messages themselves.
pub fn materialize_messages(
    parsed: &ParsedSequencerMessage,
    delayed_start: u64,
    delayed: &BTreeMap<u64, L1IncomingMessage>,
) -> Result<Vec<L1IncomingMessage>, MaterializeError> {
    let mut messages = Vec::new();
    let mut delayed_cursor = delayed_start;
    let mut timestamp = parsed.min_timestamp;
    let mut l1_block = parsed.min_l1_block;

    for (index, segment) in parsed.segments.iter().enumerate() {
        let Some(&kind_byte) = segment.first() else {
            warn!(target: "inbox", index, "skipping empty batch segment");
            continue;
        };
        let body = &segment[1..];

        match BatchSegmentKind::from_u8(kind_byte) {
            Some(BatchSegmentKind::L2Message | BatchSegmentKind::L2MessageBrotli) => {
                let payload = if kind_byte == BatchSegmentKind::L2MessageBrotli as u8 {
                    decompress_brotli(body, MAX_L2_MESSAGE_SIZE)
                        .map_err(|e| MaterializeError::SegmentDecompression(e.to_string()))?
                } else {
                    body.to_vec()
                };
                messages.push(L1IncomingMessage {
                    header: L1MessageHeader {
                        kind: L1MessageKind::L2Message,
                        poster: BATCH_POSTER_ADDRESS,
                        block_number: l1_block,
                        timestamp,
                        // Not set for sequenced L2 messages.
                        request_id: None,
                        l1_base_fee: U256::ZERO,
                    },
                    l2_msg: payload.into(),
                    batch_gas_cost: None,
                });
            }
            Some(BatchSegmentKind::Delayed) => {
                match delayed.get(&delayed_cursor) {
                    Some(message) => messages.push(message.clone()),
                    None => {
                        warn!(target: "inbox", index = delayed_cursor, "null delayed slot; advancing cursor");
                    }
                }
                delayed_cursor += 1;
            }
            Some(BatchSegmentKind::AdvanceTimestamp) => match u64::decode(&mut &body[..]) {
                Ok(delta) => {
                    timestamp = timestamp.saturating_add(delta).min(parsed.max_timestamp)
                }
                Err(err) => {
                    warn!(target: "inbox", index, %err, "skipping malformed advance-timestamp segment")
                }
            },
            Some(BatchSegmentKind::AdvanceL1Block) => match u64::decode(&mut &body[..]) {
                Ok(delta) => l1_block = l1_block.saturating_add(delta).min(parsed.max_l1_block),
                Err(err) => {
                    warn!(target: "inbox", index, %err, "skipping malformed advance-block segment")
                }
            },
            None => {
                warn!(target: "inbox", index, kind = kind_byte, "skipping segment of unknown kind");
            }
        }
    }

    Ok(messages)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        compress::compress_brotli,
        test_utils::{delayed_message, parsed_with_segments, segment},
    };
    use alloy_rlp::Encodable;

    #[test]
    fn test_materializes_plain_l2_messages() {
        let parsed = parsed_with_segments(
            100,
            200,
            10,
            20,
            vec![
                segment(BatchSegmentKind::L2Message, b"one"),
                segment(BatchSegmentKind::L2Message, b"two"),
            ],
        );
        let messages = materialize_messages(&parsed, 0, &BTreeMap::new()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].l2_msg.as_ref(), b"one");
        assert_eq!(messages[0].header.kind, L1MessageKind::L2Message);
        assert_eq!(messages[0].header.poster, BATCH_POSTER_ADDRESS);
        assert_eq!(messages[0].header.timestamp, 100);
        assert_eq!(messages[0].header.block_number, 10);
        assert_eq!(messages[0].header.l1_base_fee, U256::ZERO);
    }

    #[test]
    fn test_decompresses_brotli_segments() {
        let body = b"a compressed message".to_vec();
        let compressed = compress_brotli(&body);
        let parsed = parsed_with_segments(
            0,
            0,
            0,
            0,
            vec![segment(BatchSegmentKind::L2MessageBrotli, &compressed)],
        );
        let messages = materialize_messages(&parsed, 0, &BTreeMap::new()).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].l2_msg.as_ref(), body.as_slice());
    }

    #[test]
    fn test_undecompressable_segment_is_an_error() {
        let parsed = parsed_with_segments(
            0,
            0,
            0,
            0,
            vec![segment(BatchSegmentKind::L2MessageBrotli, &[0xde, 0xad])],
        );
        assert!(matches!(
            materialize_messages(&parsed, 0, &BTreeMap::new()).unwrap_err(),
            MaterializeError::SegmentDecompression(_)
        ));
    }

    #[test]
    fn test_delayed_cursor_advances_and_tolerates_gaps() {
        let mut delayed = BTreeMap::new();
        delayed.insert(5, delayed_message(5, b"delayed five"));
        delayed.insert(7, delayed_message(7, b"delayed seven"));

        let parsed = parsed_with_segments(
            0,
            0,
            0,
            0,
            vec![
                segment(BatchSegmentKind::Delayed, &[]),
                segment(BatchSegmentKind::Delayed, &[]),
                segment(BatchSegmentKind::Delayed, &[]),
            ],
        );
        let messages = materialize_messages(&parsed, 5, &delayed).unwrap();
        // Slot 6 is null and skipped; slots 5 and 7 are emitted.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].l2_msg.as_ref(), b"delayed five");
        assert_eq!(messages[1].l2_msg.as_ref(), b"delayed seven");
    }

    #[test]
    fn test_advance_segments_shift_subsequent_messages() {
        let mut ts_delta = Vec::new();
        50u64.encode(&mut ts_delta);
        let mut block_delta = Vec::new();
        1000u64.encode(&mut block_delta);

        let parsed = parsed_with_segments(
            100,
            180,
            10,
            13,
            vec![
                segment(BatchSegmentKind::L2Message, b"before"),
                segment(BatchSegmentKind::AdvanceTimestamp, &ts_delta),
                segment(BatchSegmentKind::AdvanceL1Block, &block_delta),
                segment(BatchSegmentKind::L2Message, b"after"),
            ],
        );
        let messages = materialize_messages(&parsed, 0, &BTreeMap::new()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].header.timestamp, 100);
        assert_eq!(messages[0].header.block_number, 10);
        assert_eq!(messages[1].header.timestamp, 150);
        // The advance is clamped to the batch's committed maximum.
        assert_eq!(messages[1].header.block_number, 13);
    }

    #[test]
    fn test_unknown_segment_kinds_skipped() {
        let parsed = parsed_with_segments(
            0,
            0,
            0,
            0,
            vec![vec![0x09, 0x01], segment(BatchSegmentKind::L2Message, b"kept")],
        );
        let messages = materialize_messages(&parsed, 0, &BTreeMap::new()).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].l2_msg.as_ref(), b"kept");
    }
}
