//! Shared test fixtures: canned batches, delayed messages, and an in-memory
//! [InboxProvider].

use crate::{
    compress::compress_brotli,
    decoder::{BatchSegmentKind, ParsedSequencerMessage},
    types::{
        BatchDataLocation, L1IncomingMessage, L1MessageHeader, L1MessageKind, SequencerBatch,
        TimeBounds, BATCH_POSTER_ADDRESS,
    },
    InboxProvider,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Encodable;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

/// Builds the fixed 40-byte batch header.
pub fn batch_header(
    min_ts: u64,
    max_ts: u64,
    min_block: u64,
    max_block: u64,
    after_delayed: u64,
) -> Vec<u8> {
    let mut header = Vec::with_capacity(40);
    header.extend_from_slice(&min_ts.to_be_bytes());
    header.extend_from_slice(&max_ts.to_be_bytes());
    header.extend_from_slice(&min_block.to_be_bytes());
    header.extend_from_slice(&max_block.to_be_bytes());
    header.extend_from_slice(&after_delayed.to_be_bytes());
    header
}

/// Builds a raw segment: kind byte followed by the body.
pub fn segment(kind: BatchSegmentKind, body: &[u8]) -> Vec<u8> {
    let mut seg = vec![kind as u8];
    seg.extend_from_slice(body);
    seg
}

/// RLP-encodes segments and wraps them in a brotli payload with its marker byte.
pub fn brotli_payload(segments: &[Vec<u8>]) -> Vec<u8> {
    let mut stream = Vec::new();
    for segment in segments {
        Bytes::copy_from_slice(segment).encode(&mut stream);
    }
    let mut payload = vec![0x00];
    payload.extend_from_slice(&compress_brotli(&stream));
    payload
}

/// Builds a [ParsedSequencerMessage] directly from raw segments.
pub fn parsed_with_segments(
    min_timestamp: u64,
    max_timestamp: u64,
    min_l1_block: u64,
    max_l1_block: u64,
    segments: Vec<Vec<u8>>,
) -> ParsedSequencerMessage {
    ParsedSequencerMessage {
        min_timestamp,
        max_timestamp,
        min_l1_block,
        max_l1_block,
        after_delayed_messages: 0,
        segments: segments.into_iter().map(Into::into).collect(),
    }
}

/// A delayed message with the given delayed-inbox index and payload.
pub fn delayed_message(index: u64, payload: &[u8]) -> L1IncomingMessage {
    L1IncomingMessage {
        header: L1MessageHeader {
            kind: L1MessageKind::EthDeposit,
            poster: Address::with_last_byte(0x42),
            block_number: 1,
            timestamp: 1_700_000_000,
            request_id: Some(B256::from(U256::from(index))),
            l1_base_fee: U256::from(1_000_000_000u64),
        },
        l2_msg: Bytes::copy_from_slice(payload),
        batch_gas_cost: None,
    }
}

/// A batch-posting-report message naming `batch_number`, delivered at `l1_block`.
pub fn posting_report_message(
    index: u64,
    l1_block: u64,
    batch_number: u64,
    extra_gas: u64,
) -> L1IncomingMessage {
    let mut payload = Vec::new();
    payload.extend_from_slice(&U256::from(1_700_000_000u64).to_be_bytes::<32>());
    payload.extend_from_slice(BATCH_POSTER_ADDRESS.as_slice());
    payload.extend_from_slice(keccak256(b"reported batch data").as_slice());
    payload.extend_from_slice(&batch_number.to_be_bytes());
    payload.extend_from_slice(&U256::from(30_000_000_000u64).to_be_bytes::<32>());
    payload.extend_from_slice(&extra_gas.to_be_bytes());

    L1IncomingMessage {
        header: L1MessageHeader {
            kind: L1MessageKind::BatchPostingReport,
            poster: BATCH_POSTER_ADDRESS,
            block_number: l1_block,
            timestamp: 1_700_000_000,
            request_id: Some(B256::from(U256::from(index))),
            l1_base_fee: U256::from(1_000_000_000u64),
        },
        l2_msg: payload.into(),
        batch_gas_cost: None,
    }
}

/// A [SequencerBatch] with plausible accumulators derived from its sequence number.
pub fn batch(sequence_number: u64, l1_block_number: u64, after_delayed_count: u64) -> SequencerBatch {
    SequencerBatch {
        sequence_number,
        submission_tx: keccak256([b"submission".as_slice(), &sequence_number.to_be_bytes()].concat()),
        l1_block_number,
        l1_block_hash: keccak256(l1_block_number.to_be_bytes()),
        before_inbox_acc: keccak256(sequence_number.to_be_bytes()),
        after_inbox_acc: keccak256((sequence_number + 1).to_be_bytes()),
        after_delayed_acc: keccak256(after_delayed_count.to_be_bytes()),
        after_delayed_count,
        time_bounds: TimeBounds::default(),
        data_location: BatchDataLocation::TxInput,
    }
}

/// An in-memory [InboxProvider] backed by plain maps.
#[derive(Debug, Default)]
pub struct MockInboxProvider {
    batches: BTreeMap<u64, SequencerBatch>,
    by_tx: HashMap<B256, u64>,
    payloads: BTreeMap<u64, Bytes>,
    delayed: BTreeMap<u64, L1IncomingMessage>,
    forced_delayed_response: Option<Vec<u64>>,
}

impl MockInboxProvider {
    /// Registers a batch, optionally recording the submission transaction that delivered it.
    pub fn add_batch(&mut self, batch: SequencerBatch, submission_tx: Option<B256>) {
        if let Some(tx) = submission_tx {
            self.by_tx.insert(tx, batch.sequence_number);
        }
        self.batches.insert(batch.sequence_number, batch);
    }

    /// Sets the serialized payload of a batch.
    pub fn set_payload(&mut self, sequence_number: u64, payload: Vec<u8>) {
        self.payloads.insert(sequence_number, payload.into());
    }

    /// Registers a delayed message under its index.
    pub fn add_delayed(&mut self, index: u64, message: L1IncomingMessage) {
        self.delayed.insert(index, message);
    }

    /// Forces `delayed_messages_in_range` to answer with exactly these indices, regardless of
    /// the requested window.
    pub fn force_delayed_response(&mut self, indices: Vec<u64>) {
        self.forced_delayed_response = Some(indices);
    }
}

#[async_trait]
impl InboxProvider for MockInboxProvider {
    type Error = Infallible;

    async fn batch_delivered_by_tx(
        &self,
        tx_hash: B256,
    ) -> Result<Option<SequencerBatch>, Self::Error> {
        Ok(self.by_tx.get(&tx_hash).and_then(|seq| self.batches.get(seq)).cloned())
    }

    async fn batches_in_block_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<SequencerBatch>, Self::Error> {
        Ok(self
            .batches
            .values()
            .filter(|b| (from_block..=to_block).contains(&b.l1_block_number))
            .cloned()
            .collect())
    }

    async fn batch_by_sequence_number(
        &self,
        sequence_number: u64,
    ) -> Result<Option<SequencerBatch>, Self::Error> {
        Ok(self.batches.get(&sequence_number).cloned())
    }

    async fn batch_payload(&self, batch: &SequencerBatch) -> Result<Bytes, Self::Error> {
        Ok(self.payloads.get(&batch.sequence_number).cloned().unwrap_or_default())
    }

    async fn delayed_messages_in_range(
        &self,
        from_index: u64,
        to_index: u64,
    ) -> Result<Vec<(u64, L1IncomingMessage)>, Self::Error> {
        if let Some(forced) = &self.forced_delayed_response {
            return Ok(forced
                .iter()
                .filter_map(|i| self.delayed.get(i).map(|m| (*i, m.clone())))
                .collect());
        }
        Ok(self
            .delayed
            .range(from_index..=to_index)
            .map(|(i, m)| (*i, m.clone()))
            .collect())
    }
}
