//! Core inbox data types: L1 incoming messages, tracking records, and sequencer batch metadata.

use alloy_primitives::{address, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// The address the sequencer posts batches from; L2 messages materialized out of a batch carry
/// it as their poster.
pub const BATCH_POSTER_ADDRESS: Address = address!("a4b000000000000000000073657175656e636572");

/// The kind discriminant of an [L1IncomingMessage].
///
/// Unknown discriminants are carried through untouched rather than rejected; the inbox may
/// deliver kinds this client has no special handling for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum L1MessageKind {
    /// An L2 message posted by the sequencer.
    L2Message,
    /// Marks the end of an L2 block.
    EndOfBlock,
    /// An L2 message funded by L1.
    L2FundedByL1,
    /// A rollup protocol event.
    RollupEvent,
    /// A retryable ticket submission.
    SubmitRetryable,
    /// The chain-initialization message; appears exactly once, at genesis.
    Initialize,
    /// A plain ether deposit.
    EthDeposit,
    /// A batch-posting gas report routed through the delayed inbox.
    BatchPostingReport,
    /// An explicitly invalid message.
    Invalid,
    /// Any kind this client does not interpret; passed through.
    Other(u8),
}

impl From<u8> for L1MessageKind {
    fn from(value: u8) -> Self {
        match value {
            3 => Self::L2Message,
            6 => Self::EndOfBlock,
            7 => Self::L2FundedByL1,
            8 => Self::RollupEvent,
            9 => Self::SubmitRetryable,
            11 => Self::Initialize,
            12 => Self::EthDeposit,
            13 => Self::BatchPostingReport,
            0xFF => Self::Invalid,
            other => Self::Other(other),
        }
    }
}

impl From<L1MessageKind> for u8 {
    fn from(value: L1MessageKind) -> Self {
        match value {
            L1MessageKind::L2Message => 3,
            L1MessageKind::EndOfBlock => 6,
            L1MessageKind::L2FundedByL1 => 7,
            L1MessageKind::RollupEvent => 8,
            L1MessageKind::SubmitRetryable => 9,
            L1MessageKind::Initialize => 11,
            L1MessageKind::EthDeposit => 12,
            L1MessageKind::BatchPostingReport => 13,
            L1MessageKind::Invalid => 0xFF,
            L1MessageKind::Other(other) => other,
        }
    }
}

/// The envelope of an [L1IncomingMessage].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1MessageHeader {
    /// The message kind.
    pub kind: L1MessageKind,
    /// The L1 address the message was posted from.
    #[serde(rename = "sender")]
    pub poster: Address,
    /// The L1 block the message was delivered in.
    pub block_number: u64,
    /// The L1 timestamp the message was delivered at.
    pub timestamp: u64,
    /// The delayed-inbox sequence number, for messages routed through the bridge.
    #[serde(default)]
    pub request_id: Option<B256>,
    /// The L1 base fee at delivery.
    #[serde(rename = "baseFeeL1")]
    pub l1_base_fee: U256,
}

/// A single message produced by the inbox for the L2 chain, one per L2 block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1IncomingMessage {
    /// The message envelope.
    pub header: L1MessageHeader,
    /// The opaque message payload handed to the L2 VM.
    #[serde(rename = "l2Msg")]
    pub l2_msg: Bytes,
    /// The gas cost of posting the batch this message reports on; only set on
    /// [L1MessageKind::BatchPostingReport] messages, and only after fill-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_gas_cost: Option<u64>,
}

/// What a prover returns for an L2 height: the inbox message it claims produced that block,
/// plus where on L1 the message's batch data lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1TrackingRecord {
    /// The claimed inbox message.
    pub message: L1IncomingMessage,
    /// The L1 transaction that delivered the message's batch.
    pub l1_tx_hash: B256,
    /// Where the batch data lives on L1.
    pub data_location: BatchDataLocation,
}

/// A prover's claim about an L2 height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2TrackingRecord {
    /// The claimed L2 block number.
    pub l2_block_number: u64,
    /// The claimed L2 block hash.
    pub l2_block_hash: B256,
}

/// Where a batch's data was placed by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum BatchDataLocation {
    /// The data is the calldata of the submission transaction.
    TxInput,
    /// The data was emitted in a separate batch-data event.
    SeparateEvent,
    /// The batch carries no data beyond its header.
    NoData,
    /// The data lives in EIP-4844 blobs referenced by the submission transaction.
    Blobs,
}

impl From<u8> for BatchDataLocation {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::SeparateEvent,
            2 => Self::NoData,
            3 => Self::Blobs,
            _ => Self::TxInput,
        }
    }
}

impl From<BatchDataLocation> for u8 {
    fn from(value: BatchDataLocation) -> Self {
        match value {
            BatchDataLocation::TxInput => 0,
            BatchDataLocation::SeparateEvent => 1,
            BatchDataLocation::NoData => 2,
            BatchDataLocation::Blobs => 3,
        }
    }
}

/// The time bounds the sequencer committed to for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    /// Minimum L1 timestamp of the batch's messages.
    pub min_timestamp: u64,
    /// Maximum L1 timestamp of the batch's messages.
    pub max_timestamp: u64,
    /// Minimum L1 block number of the batch's messages.
    pub min_block_number: u64,
    /// Maximum L1 block number of the batch's messages.
    pub max_block_number: u64,
}

/// Metadata of one sequencer inbox batch, as authenticated by the batch-delivery log on L1.
///
/// Batches are totally ordered by `sequence_number`; the `before_inbox_acc` of batch `n + 1`
/// equals the `after_inbox_acc` of batch `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerBatch {
    /// The batch's position in the inbox.
    pub sequence_number: u64,
    /// The L1 transaction that delivered the batch.
    pub submission_tx: B256,
    /// The L1 block the batch was delivered in.
    pub l1_block_number: u64,
    /// The hash of the L1 block the batch was delivered in; authenticates blob data.
    pub l1_block_hash: B256,
    /// The inbox accumulator before this batch.
    pub before_inbox_acc: B256,
    /// The inbox accumulator after this batch.
    pub after_inbox_acc: B256,
    /// The delayed-inbox accumulator after this batch.
    pub after_delayed_acc: B256,
    /// The number of delayed messages read after this batch.
    pub after_delayed_count: u64,
    /// The sequencer's committed time bounds.
    pub time_bounds: TimeBounds,
    /// Where the batch data lives.
    pub data_location: BatchDataLocation,
}

/// The parsed payload of a [L1MessageKind::BatchPostingReport] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPostingReport {
    /// The L1 timestamp of the reported batch.
    pub batch_timestamp: U256,
    /// The address that posted the reported batch.
    pub batch_poster: Address,
    /// The keccak hash of the reported batch's data.
    pub data_hash: B256,
    /// The sequence number of the reported batch.
    pub batch_number: u64,
    /// The L1 base fee when the batch was posted.
    pub l1_base_fee: U256,
    /// Extra gas charged on top of the computed batch cost.
    pub extra_gas: u64,
}

impl BatchPostingReport {
    /// Parses a posting-report payload: `timestamp (32) ‖ poster (20) ‖ data_hash (32) ‖
    /// batch_number (8, big-endian) ‖ l1_base_fee (32) ‖ [extra_gas (8, big-endian)]`.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 32 + 20 + 32 + 8 + 32 {
            return None;
        }
        let (ts, rest) = payload.split_at(32);
        let (poster, rest) = rest.split_at(20);
        let (data_hash, rest) = rest.split_at(32);
        let (batch_number, rest) = rest.split_at(8);
        let (l1_base_fee, rest) = rest.split_at(32);
        let extra_gas = if rest.len() >= 8 {
            u64::from_be_bytes(rest[..8].try_into().ok()?)
        } else {
            0
        };
        Some(Self {
            batch_timestamp: U256::from_be_slice(ts),
            batch_poster: Address::from_slice(poster),
            data_hash: B256::from_slice(data_hash),
            batch_number: u64::from_be_bytes(batch_number.try_into().ok()?),
            l1_base_fee: U256::from_be_slice(l1_base_fee),
            extra_gas,
        })
    }
}

/// Estimates the L1 gas cost of posting `data` as a batch: intrinsic transaction gas, calldata
/// gas per byte, and the keccak charge for hashing the batch.
pub fn compute_batch_gas_cost(data: &[u8]) -> u64 {
    const TX_GAS: u64 = 21_000;
    const ZERO_BYTE_GAS: u64 = 4;
    const NONZERO_BYTE_GAS: u64 = 16;
    const KECCAK_BASE_GAS: u64 = 30;
    const KECCAK_WORD_GAS: u64 = 6;

    let calldata: u64 = data
        .iter()
        .map(|b| if *b == 0 { ZERO_BYTE_GAS } else { NONZERO_BYTE_GAS })
        .sum();
    let keccak_words = (data.len() as u64).div_ceil(32);
    TX_GAS + calldata + KECCAK_BASE_GAS + KECCAK_WORD_GAS * keccak_words
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::keccak256;

    #[test]
    fn test_message_kind_round_trip() {
        for raw in [3u8, 6, 7, 8, 9, 11, 12, 13, 0xFF, 0x42] {
            assert_eq!(u8::from(L1MessageKind::from(raw)), raw);
        }
    }

    #[test]
    fn test_tracking_record_json_round_trip() {
        let record = L1TrackingRecord {
            message: L1IncomingMessage {
                header: L1MessageHeader {
                    kind: L1MessageKind::L2Message,
                    poster: BATCH_POSTER_ADDRESS,
                    block_number: 100,
                    timestamp: 1_700_000_000,
                    request_id: None,
                    l1_base_fee: U256::from(7u64),
                },
                l2_msg: vec![1, 2, 3].into(),
                batch_gas_cost: None,
            },
            l1_tx_hash: keccak256(b"tx"),
            data_location: BatchDataLocation::Blobs,
        };
        let json = serde_json::to_string(&record).unwrap();
        let parsed: L1TrackingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_posting_report_parse() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&U256::from(1_700_000_000u64).to_be_bytes::<32>());
        payload.extend_from_slice(BATCH_POSTER_ADDRESS.as_slice());
        payload.extend_from_slice(keccak256(b"batch data").as_slice());
        payload.extend_from_slice(&77u64.to_be_bytes());
        payload.extend_from_slice(&U256::from(30_000_000_000u64).to_be_bytes::<32>());

        let report = BatchPostingReport::parse(&payload).unwrap();
        assert_eq!(report.batch_number, 77);
        assert_eq!(report.batch_poster, BATCH_POSTER_ADDRESS);
        assert_eq!(report.extra_gas, 0);

        payload.extend_from_slice(&5u64.to_be_bytes());
        let report = BatchPostingReport::parse(&payload).unwrap();
        assert_eq!(report.extra_gas, 5);

        assert!(BatchPostingReport::parse(&payload[..50]).is_none());
    }

    #[test]
    fn test_batch_gas_cost_charges_zero_bytes_less() {
        let zeroes = compute_batch_gas_cost(&[0u8; 64]);
        let ones = compute_batch_gas_cost(&[1u8; 64]);
        assert!(zeroes < ones);
        assert_eq!(ones - zeroes, 64 * 12);
    }
}
