//! The inbox reader: locates the batch delivered by an L1 transaction and gathers everything
//! needed to materialize its messages.

use crate::{
    compute_batch_gas_cost,
    errors::InboxReaderError,
    types::{BatchPostingReport, L1IncomingMessage, L1MessageKind, SequencerBatch},
};
use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The L1 data source backing the [InboxReader].
///
/// Implementations answer out of the sequencer inbox contract's delivery logs and the bridge's
/// delayed-message logs. All methods are transport-level; logical consistency is enforced by the
/// reader.
#[async_trait]
pub trait InboxProvider {
    /// The error type for provider failures.
    type Error: std::fmt::Display + Send;

    /// Returns the batch delivered by `tx_hash`, if its receipt carries a delivery log.
    async fn batch_delivered_by_tx(
        &self,
        tx_hash: B256,
    ) -> Result<Option<SequencerBatch>, Self::Error>;

    /// Returns all batches delivered within the inclusive L1 block range.
    async fn batches_in_block_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<SequencerBatch>, Self::Error>;

    /// Returns the batch with the given sequence number, located via the delivery log's indexed
    /// topic.
    async fn batch_by_sequence_number(
        &self,
        sequence_number: u64,
    ) -> Result<Option<SequencerBatch>, Self::Error>;

    /// Returns the full serialized payload of a batch: the 40-byte header followed by the data
    /// from wherever `batch.data_location` points.
    async fn batch_payload(&self, batch: &SequencerBatch) -> Result<Bytes, Self::Error>;

    /// Returns the delayed messages with indices in the inclusive range, keyed by index.
    async fn delayed_messages_in_range(
        &self,
        from_index: u64,
        to_index: u64,
    ) -> Result<Vec<(u64, L1IncomingMessage)>, Self::Error>;
}

/// Everything the reader gathered for one submission transaction: the batch map covering the
/// delivery block (plus any batches referenced by posting reports), the delayed-message window
/// the target batch consumes, and the target's serialized payload.
#[derive(Debug, Clone)]
pub struct InboxContents {
    /// The sequence number of the batch delivered by the submission transaction.
    pub target_seq_num: u64,
    /// The hash of the L1 block that delivered the target batch.
    pub target_block_hash: B256,
    /// The serialized payload of the target batch.
    pub target_payload: Bytes,
    /// Batch metadata by sequence number.
    pub batches: BTreeMap<u64, SequencerBatch>,
    /// Delayed messages by delayed-inbox index.
    pub delayed: BTreeMap<u64, L1IncomingMessage>,
    /// The delayed-inbox cursor at the start of the target batch.
    pub delayed_start: u64,
}

/// Resolves a batch-submission transaction into [InboxContents].
#[derive(Debug)]
pub struct InboxReader<P> {
    provider: P,
}

impl<P: InboxProvider> InboxReader<P> {
    /// Creates a new [InboxReader] over the given provider.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Loads the batch delivered by `submission_tx` together with its delayed-message window.
    ///
    /// Transport failures surface as [InboxReaderError::BridgeFetch]; every logical
    /// inconsistency in what L1 returns is fatal for the batch.
    pub async fn load(&self, submission_tx: B256) -> Result<InboxContents, InboxReaderError> {
        let target = self
            .provider
            .batch_delivered_by_tx(submission_tx)
            .await
            .map_err(bridge_err)?
            .ok_or(InboxReaderError::SubmissionLogMissing(submission_tx))?;
        debug!(
            target: "inbox",
            seq_num = target.sequence_number,
            l1_block = target.l1_block_number,
            "resolved batch submission"
        );

        // Enumerate every batch delivered in the same L1 block; the posting-report fill-in and
        // same-block adjacency both need the neighbors.
        let mut batches = BTreeMap::new();
        for batch in self
            .provider
            .batches_in_block_range(target.l1_block_number, target.l1_block_number)
            .await
            .map_err(bridge_err)?
        {
            batches.insert(batch.sequence_number, batch);
        }
        if !batches.contains_key(&target.sequence_number) {
            return Err(InboxReaderError::RangeNotCovered(target.sequence_number));
        }

        // The delayed cursor at the start of the batch is the predecessor's after-count.
        let delayed_start = if target.sequence_number == 0 {
            0
        } else {
            self.provider
                .batch_by_sequence_number(target.sequence_number - 1)
                .await
                .map_err(bridge_err)?
                .ok_or(InboxReaderError::BatchLogMissing(target.sequence_number - 1))?
                .after_delayed_count
        };

        let mut delayed = BTreeMap::new();
        if delayed_start < target.after_delayed_count {
            let window = delayed_start..target.after_delayed_count;
            for (index, message) in self
                .provider
                .delayed_messages_in_range(delayed_start, target.after_delayed_count - 1)
                .await
                .map_err(bridge_err)?
            {
                if !window.contains(&index) {
                    return Err(InboxReaderError::DelayedGap(index));
                }
                delayed.insert(index, message);
            }
            for index in window {
                if !delayed.contains_key(&index) {
                    // Tolerated; the materializer skips null slots with a cursor advance.
                    warn!(target: "inbox", index, "delayed message missing from bridge window");
                }
            }
        } else {
            debug!(target: "inbox", "no new delayed messages in batch");
        }

        self.fill_posting_report_costs(&mut batches, &mut delayed).await?;

        let target_payload = self
            .provider
            .batch_payload(&batches[&target.sequence_number])
            .await
            .map_err(bridge_err)?;

        Ok(InboxContents {
            target_seq_num: target.sequence_number,
            target_block_hash: target.l1_block_hash,
            target_payload,
            batches,
            delayed,
            delayed_start,
        })
    }

    /// Fills in the `batch_gas_cost` of every posting-report message in `delayed`, extending
    /// `batches` with the reported batches' metadata where needed.
    async fn fill_posting_report_costs(
        &self,
        batches: &mut BTreeMap<u64, SequencerBatch>,
        delayed: &mut BTreeMap<u64, L1IncomingMessage>,
    ) -> Result<(), InboxReaderError> {
        // Posting reports name batches delivered in earlier L1 blocks; find the block span the
        // reports cover so one range query pulls in all of their metadata.
        let mut start_block = u64::MAX;
        let mut end_block = 0u64;
        for message in delayed.values() {
            if message.header.kind != L1MessageKind::BatchPostingReport {
                continue;
            }
            start_block = start_block.min(message.header.block_number);
            end_block = end_block.max(message.header.block_number);
        }
        if start_block == u64::MAX {
            return Ok(());
        }

        for batch in self
            .provider
            .batches_in_block_range(start_block, end_block)
            .await
            .map_err(bridge_err)?
        {
            batches.entry(batch.sequence_number).or_insert(batch);
        }

        for (index, message) in delayed.iter_mut() {
            if message.header.kind != L1MessageKind::BatchPostingReport {
                continue;
            }
            let Some(report) = BatchPostingReport::parse(&message.l2_msg) else {
                warn!(target: "inbox", index = *index, "skipping malformed posting report");
                continue;
            };
            let Some(batch) = batches.get(&report.batch_number) else {
                debug!(
                    target: "inbox",
                    batch = report.batch_number,
                    "reported batch not available; leaving gas cost unset"
                );
                continue;
            };
            let payload = self.provider.batch_payload(batch).await.map_err(bridge_err)?;
            message.batch_gas_cost =
                Some(compute_batch_gas_cost(&payload) + report.extra_gas);
        }
        Ok(())
    }
}

fn bridge_err<E: std::fmt::Display>(err: E) -> InboxReaderError {
    InboxReaderError::BridgeFetch(err.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{
        batch, batch_header, delayed_message, posting_report_message, MockInboxProvider,
    };
    use alloy_primitives::keccak256;

    #[tokio::test]
    async fn test_load_resolves_target_and_delayed_window() {
        let mut provider = MockInboxProvider::default();
        let tx = keccak256(b"submission");
        // Batch 9 read 3 delayed messages; batch 10 reads through 6.
        provider.add_batch(batch(9, 100, 3), None);
        provider.add_batch(batch(10, 105, 6), Some(tx));
        provider.set_payload(10, batch_header(0, 0, 0, 0, 6));
        for index in 3..6 {
            provider.add_delayed(index, delayed_message(index, b"delayed"));
        }

        let contents = InboxReader::new(provider).load(tx).await.unwrap();
        assert_eq!(contents.target_seq_num, 10);
        assert_eq!(contents.delayed_start, 3);
        assert_eq!(contents.delayed.len(), 3);
        assert!(contents.delayed.keys().all(|i| (3..6).contains(i)));
    }

    #[tokio::test]
    async fn test_load_rejects_missing_submission_log() {
        let provider = MockInboxProvider::default();
        let tx = keccak256(b"unknown");
        let err = InboxReader::new(provider).load(tx).await.unwrap_err();
        assert!(matches!(err, InboxReaderError::SubmissionLogMissing(hash) if hash == tx));
    }

    #[tokio::test]
    async fn test_load_rejects_out_of_window_delayed_message() {
        let mut provider = MockInboxProvider::default();
        let tx = keccak256(b"submission");
        provider.add_batch(batch(4, 50, 1), None);
        provider.add_batch(batch(5, 51, 2), Some(tx));
        provider.set_payload(5, batch_header(0, 0, 0, 0, 2));
        // Index 7 is far outside the window (1..2).
        provider.add_delayed(7, delayed_message(7, b"stray"));
        provider.force_delayed_response(vec![7]);

        let err = InboxReader::new(provider).load(tx).await.unwrap_err();
        assert!(matches!(err, InboxReaderError::DelayedGap(7)));
    }

    #[tokio::test]
    async fn test_posting_report_gas_fill_in() {
        let mut provider = MockInboxProvider::default();
        let tx = keccak256(b"submission");

        // The reported batch lives in an earlier L1 block.
        let reported_payload = batch_header(0, 0, 0, 0, 0);
        provider.add_batch(batch(41, 90, 1), None);
        provider.set_payload(41, reported_payload.clone());

        provider.add_batch(batch(42, 100, 1), None);
        provider.add_batch(batch(43, 101, 2), Some(tx));
        provider.set_payload(43, batch_header(0, 0, 0, 0, 2));
        provider.add_delayed(1, posting_report_message(1, 90, 41, 7));

        let contents = InboxReader::new(provider).load(tx).await.unwrap();
        let report = &contents.delayed[&1];
        assert_eq!(
            report.batch_gas_cost,
            Some(compute_batch_gas_cost(&reported_payload) + 7)
        );
        // The reported batch's metadata was pulled into the batch map.
        assert!(contents.batches.contains_key(&41));
    }

    #[tokio::test]
    async fn test_genesis_batch_has_zero_delayed_start() {
        let mut provider = MockInboxProvider::default();
        let tx = keccak256(b"genesis submission");
        provider.add_batch(batch(0, 10, 1), Some(tx));
        provider.set_payload(0, batch_header(0, 0, 0, 0, 1));
        provider.add_delayed(0, delayed_message(0, b"init"));

        let contents = InboxReader::new(provider).load(tx).await.unwrap();
        assert_eq!(contents.delayed_start, 0);
        assert_eq!(contents.delayed.len(), 1);
    }
}
