//! The consensus oracle: prove that two prover-supplied L1 records are adjacent messages under
//! the authoritative batch stream.

use crate::errors::{ConsensusCheckError, OracleError};
use litmus_inbox::{
    materialize_messages, parse_sequencer_message, DaReader, DecoderError, InboxProvider,
    InboxReader, InboxReaderError, KeysetValidationMode, L1IncomingMessage, L1MessageKind,
    L1TrackingRecord,
};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// SHA-256 fingerprint used for opaque payload comparison. Content addressing here is
/// deliberately independent of the keccak hashing used for trie commitments.
fn fingerprint(payload: &[u8]) -> [u8; 32] {
    Sha256::digest(payload).into()
}

/// The consensus oracle: decides whether two claimed L1 records correspond to consecutive
/// messages produced by the sequencer, by re-deriving the relevant batches from authoritative
/// L1 data and matching payload fingerprints.
pub struct ConsensusOracle<P> {
    reader: InboxReader<P>,
    da_readers: Vec<Box<dyn DaReader + Send + Sync>>,
    keyset_mode: KeysetValidationMode,
    cancel: CancellationToken,
}

impl<P> std::fmt::Debug for ConsensusOracle<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsensusOracle")
            .field("da_readers", &self.da_readers.len())
            .field("keyset_mode", &self.keyset_mode)
            .finish_non_exhaustive()
    }
}

impl<P: InboxProvider + Sync> ConsensusOracle<P> {
    /// Creates a new [ConsensusOracle].
    pub fn new(
        provider: P,
        da_readers: Vec<Box<dyn DaReader + Send + Sync>>,
        keyset_mode: KeysetValidationMode,
        cancel: CancellationToken,
    ) -> Self {
        Self { reader: InboxReader::new(provider), da_readers, keyset_mode, cancel }
    }

    /// Decides whether `prev` and `curr` are consecutive messages under the batch stream.
    ///
    /// The oracle never guesses: any failure to positively establish adjacency is a `false`
    /// verdict. Cancellation and an out-of-date decoder escape as errors.
    pub async fn consecutive(
        &self,
        prev: &L1TrackingRecord,
        curr: &L1TrackingRecord,
    ) -> Result<bool, OracleError> {
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(OracleError::Cancelled),
            outcome = self.check(prev, curr) => outcome,
        };
        match outcome {
            Ok(consecutive) => Ok(consecutive),
            Err(ConsensusCheckError::Reader(InboxReaderError::Decoder(
                DecoderError::NodeOutOfDate(byte),
            )))
            | Err(ConsensusCheckError::Decoder(DecoderError::NodeOutOfDate(byte))) => {
                Err(OracleError::NodeOutOfDate(byte))
            }
            Err(err) => {
                debug!(target: "consensus_oracle", %err, "consensus check failed");
                Ok(false)
            }
        }
    }

    async fn check(
        &self,
        prev: &L1TrackingRecord,
        curr: &L1TrackingRecord,
    ) -> Result<bool, ConsensusCheckError> {
        // The chain's first message is special: the genesis record is not itself batch
        // material, so the successor must be the first message the genesis batch produces.
        if prev.message.header.kind == L1MessageKind::Initialize {
            let (messages, seq_num) = self.materialize(prev).await?;
            let first = messages.first().ok_or(ConsensusCheckError::EmptyBatch(seq_num))?;
            return Ok(fingerprint(&first.l2_msg) == fingerprint(&curr.message.l2_msg));
        }

        if prev.l1_tx_hash == curr.l1_tx_hash {
            // Same batch: the two claims must appear back to back inside it.
            let (messages, _) = self.materialize(prev).await?;
            let prev_print = fingerprint(&prev.message.l2_msg);
            let curr_print = fingerprint(&curr.message.l2_msg);
            let adjacent = messages.windows(2).any(|pair| {
                fingerprint(&pair[0].l2_msg) == prev_print
                    && fingerprint(&pair[1].l2_msg) == curr_print
            });
            if !adjacent {
                return Err(ConsensusCheckError::NotConsecutive);
            }
            return Ok(true);
        }

        // Different submission transactions: the claims must straddle a batch boundary.
        let (prev_messages, prev_seq) = self.materialize(prev).await?;
        let (curr_messages, curr_seq) = self.materialize(curr).await?;

        if curr_seq != prev_seq + 1 {
            return Err(ConsensusCheckError::NonConsecutiveBatches {
                prev: prev_seq,
                curr: curr_seq,
            });
        }

        let last = prev_messages.last().ok_or(ConsensusCheckError::EmptyBatch(prev_seq))?;
        let first = curr_messages.first().ok_or(ConsensusCheckError::EmptyBatch(curr_seq))?;

        let adjacent = fingerprint(&last.l2_msg) == fingerprint(&prev.message.l2_msg)
            && fingerprint(&first.l2_msg) == fingerprint(&curr.message.l2_msg);
        if !adjacent {
            return Err(ConsensusCheckError::NotConsecutive);
        }
        Ok(true)
    }

    /// Re-derives the ordered message list of the batch delivered by a record's submission
    /// transaction.
    async fn materialize(
        &self,
        record: &L1TrackingRecord,
    ) -> Result<(Vec<L1IncomingMessage>, u64), ConsensusCheckError> {
        let contents = self.reader.load(record.l1_tx_hash).await?;
        let parsed = parse_sequencer_message(
            contents.target_seq_num,
            contents.target_block_hash,
            &contents.target_payload,
            &self.da_readers,
            self.keyset_mode,
        )
        .await?;
        let messages =
            materialize_messages(&parsed, contents.delayed_start, &contents.delayed)?;
        Ok((messages, contents.target_seq_num))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::{keccak256, B256, U256};
    use litmus_inbox::test_utils::{
        batch, batch_header, brotli_payload, delayed_message, segment, MockInboxProvider,
    };
    use litmus_inbox::{BatchDataLocation, BatchSegmentKind, L1MessageHeader};

    fn l2_record(payload: &[u8], tx_hash: B256) -> L1TrackingRecord {
        L1TrackingRecord {
            message: L1IncomingMessage {
                header: L1MessageHeader {
                    kind: L1MessageKind::L2Message,
                    poster: litmus_inbox::BATCH_POSTER_ADDRESS,
                    block_number: 10,
                    timestamp: 100,
                    request_id: None,
                    l1_base_fee: U256::ZERO,
                },
                l2_msg: payload.to_vec().into(),
                batch_gas_cost: None,
            },
            l1_tx_hash: tx_hash,
            data_location: BatchDataLocation::TxInput,
        }
    }

    /// A provider holding two adjacent batches: batch 5 (messages "alpha", "beta") delivered by
    /// `tx_a`, batch 6 (messages "gamma", "delta") delivered by `tx_b`.
    fn two_batch_provider() -> (MockInboxProvider, B256, B256) {
        let tx_a = keccak256(b"submission a");
        let tx_b = keccak256(b"submission b");
        let mut provider = MockInboxProvider::default();

        provider.add_batch(batch(4, 99, 0), None);
        provider.add_batch(batch(5, 100, 0), Some(tx_a));
        provider.add_batch(batch(6, 101, 0), Some(tx_b));

        let mut payload_a = batch_header(100, 200, 10, 20, 0);
        payload_a.extend_from_slice(&brotli_payload(&[
            segment(BatchSegmentKind::L2Message, b"alpha"),
            segment(BatchSegmentKind::L2Message, b"beta"),
        ]));
        provider.set_payload(5, payload_a);

        let mut payload_b = batch_header(200, 300, 20, 30, 0);
        payload_b.extend_from_slice(&brotli_payload(&[
            segment(BatchSegmentKind::L2Message, b"gamma"),
            segment(BatchSegmentKind::L2Message, b"delta"),
        ]));
        provider.set_payload(6, payload_b);

        (provider, tx_a, tx_b)
    }

    fn oracle(provider: MockInboxProvider) -> ConsensusOracle<MockInboxProvider> {
        ConsensusOracle::new(
            provider,
            Vec::new(),
            KeysetValidationMode::Panic,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_adjacent_within_one_batch() {
        let (provider, tx_a, _) = two_batch_provider();
        let oracle = oracle(provider);

        let prev = l2_record(b"alpha", tx_a);
        let curr = l2_record(b"beta", tx_a);
        assert!(oracle.consecutive(&prev, &curr).await.unwrap());

        // Order matters.
        assert!(!oracle.consecutive(&curr, &prev).await.unwrap());
    }

    #[tokio::test]
    async fn test_adjacent_across_batch_boundary() {
        let (provider, tx_a, tx_b) = two_batch_provider();
        let oracle = oracle(provider);

        let prev = l2_record(b"beta", tx_a);
        let curr = l2_record(b"gamma", tx_b);
        assert!(oracle.consecutive(&prev, &curr).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_non_boundary_pair_across_batches() {
        let (provider, tx_a, tx_b) = two_batch_provider();
        let oracle = oracle(provider);

        // "alpha" is not the last message of batch 5.
        let prev = l2_record(b"alpha", tx_a);
        let curr = l2_record(b"gamma", tx_b);
        assert!(!oracle.consecutive(&prev, &curr).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_flipped_payload_bytes() {
        let (provider, tx_a, _) = two_batch_provider();
        let oracle = oracle(provider);

        let prev = l2_record(b"alpha", tx_a);
        // The prover flipped bytes of the claimed payload; the fingerprint no longer matches
        // the batch-materialized message.
        let mut tampered = b"beta".to_vec();
        tampered[0] ^= 0xFF;
        let curr = l2_record(&tampered, tx_a);
        assert!(!oracle.consecutive(&prev, &curr).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_non_consecutive_batches() {
        let (mut provider, tx_a, _) = two_batch_provider();
        let tx_c = keccak256(b"submission c");
        provider.add_batch(batch(7, 102, 0), None);
        provider.add_batch(batch(8, 103, 0), Some(tx_c));
        let mut payload = batch_header(0, 0, 0, 0, 0);
        payload.extend_from_slice(&brotli_payload(&[segment(
            BatchSegmentKind::L2Message,
            b"omega",
        )]));
        provider.set_payload(8, payload);

        let oracle = oracle(provider);
        let prev = l2_record(b"beta", tx_a);
        let curr = l2_record(b"omega", tx_c);
        assert!(!oracle.consecutive(&prev, &curr).await.unwrap());
    }

    #[tokio::test]
    async fn test_initialize_record_matches_first_batch_message() {
        let tx = keccak256(b"genesis submission");
        let mut provider = MockInboxProvider::default();
        provider.add_batch(batch(0, 10, 1), Some(tx));

        let init = delayed_message(0, &U256::from(412_346u64).to_be_bytes::<32>());
        let mut init = init;
        init.header.kind = L1MessageKind::Initialize;
        provider.add_delayed(0, init.clone());

        let mut payload = batch_header(0, 0, 0, 0, 1);
        payload.extend_from_slice(&brotli_payload(&[
            segment(BatchSegmentKind::Delayed, &[]),
            segment(BatchSegmentKind::L2Message, b"first real message"),
        ]));
        provider.set_payload(0, payload);

        let oracle = oracle(provider);

        let mut prev = l2_record(&init.l2_msg, tx);
        prev.message.header.kind = L1MessageKind::Initialize;

        // The first materialized message of the genesis batch is the init message itself.
        let curr_good = l2_record(&init.l2_msg, tx);
        assert!(oracle.consecutive(&prev, &curr_good).await.unwrap());

        let curr_bad = l2_record(b"some other payload", tx);
        assert!(!oracle.consecutive(&prev, &curr_bad).await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_batch_is_false_not_fatal() {
        let provider = MockInboxProvider::default();
        let oracle = oracle(provider);
        let prev = l2_record(b"alpha", keccak256(b"missing tx"));
        let curr = l2_record(b"beta", keccak256(b"missing tx"));
        assert!(!oracle.consecutive(&prev, &curr).await.unwrap());
    }

    #[tokio::test]
    async fn test_node_out_of_date_escapes() {
        let tx = keccak256(b"submission");
        let mut provider = MockInboxProvider::default();
        provider.add_batch(batch(0, 10, 0), Some(tx));
        let mut payload = batch_header(0, 0, 0, 0, 0);
        payload.push(0x44);
        provider.set_payload(0, payload);

        let oracle = oracle(provider);
        let prev = l2_record(b"alpha", tx);
        let curr = l2_record(b"beta", tx);
        assert_eq!(
            oracle.consecutive(&prev, &curr).await.unwrap_err(),
            OracleError::NodeOutOfDate(0x44)
        );
    }

    #[tokio::test]
    async fn test_verdict_is_idempotent() {
        let (provider, tx_a, _) = two_batch_provider();
        let oracle = oracle(provider);
        let prev = l2_record(b"alpha", tx_a);
        let curr = l2_record(b"beta", tx_a);
        let first = oracle.consecutive(&prev, &curr).await.unwrap();
        let second = oracle.consecutive(&prev, &curr).await.unwrap();
        assert_eq!(first, second);
    }
}
