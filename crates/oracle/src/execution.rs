//! The execution oracle: replay one message locally and compare headers bit for bit.

use crate::{errors::OracleError, init::ParsedInitMessage, traits::BlockReplayer};
use alloy_consensus::Header;
use litmus_inbox::{L1IncomingMessage, L1MessageKind};
use litmus_state::{StateProofProvider, StateReconstructor, TraceProvider};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Compares a locally produced header against a prover's claim.
///
/// Six fields must match exactly: state root, receipts root, transactions root, mix digest,
/// extra data, and the final block hash. The nonce is copied from the claim before hashing; it
/// is not semantically authoritative here.
pub fn headers_match(produced: &Header, claimed: &Header) -> bool {
    if produced.state_root != claimed.state_root {
        debug!(target: "execution_oracle", produced = %produced.state_root, claimed = %claimed.state_root, "state root mismatch");
        return false;
    }
    if produced.receipts_root != claimed.receipts_root {
        debug!(target: "execution_oracle", produced = %produced.receipts_root, claimed = %claimed.receipts_root, "receipts root mismatch");
        return false;
    }
    if produced.transactions_root != claimed.transactions_root {
        debug!(target: "execution_oracle", produced = %produced.transactions_root, claimed = %claimed.transactions_root, "transactions root mismatch");
        return false;
    }
    if produced.mix_hash != claimed.mix_hash {
        debug!(target: "execution_oracle", produced = %produced.mix_hash, claimed = %claimed.mix_hash, "mix digest mismatch");
        return false;
    }
    if produced.extra_data != claimed.extra_data {
        debug!(target: "execution_oracle", "extra data mismatch");
        return false;
    }

    let mut normalized = produced.clone();
    normalized.nonce = claimed.nonce;
    let matches = normalized.hash_slow() == claimed.hash_slow();
    if !matches {
        debug!(target: "execution_oracle", "block hash mismatch after field equality");
    }
    matches
}

/// The execution oracle: verifies a claimed header by replaying its message against a partial
/// state reconstructed from proofs, through an external [BlockReplayer].
///
/// The oracle is deterministic: identical inputs produce identical verdicts. Every failure mode
/// short of cancellation collapses into `false`.
#[derive(Debug)]
pub struct ExecutionOracle<R, P, T> {
    replayer: R,
    reconstructor: StateReconstructor<P, T>,
    cancel: CancellationToken,
}

impl<R, P, T> ExecutionOracle<R, P, T>
where
    R: BlockReplayer,
    P: StateProofProvider + Sync,
    T: TraceProvider + Sync,
{
    /// Creates a new [ExecutionOracle].
    pub const fn new(
        replayer: R,
        reconstructor: StateReconstructor<P, T>,
        cancel: CancellationToken,
    ) -> Self {
        Self { replayer, reconstructor, cancel }
    }

    /// Verifies that replaying `message` on top of `prev_header` produces `claimed_header`.
    pub async fn execute(
        &self,
        prev_header: &Header,
        message: &L1IncomingMessage,
        claimed_header: &Header,
    ) -> Result<bool, OracleError> {
        if message.header.kind == L1MessageKind::Initialize {
            return Ok(self.verify_genesis(message, claimed_header));
        }

        let reconstruction = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(OracleError::Cancelled),
            result = self.reconstructor.reconstruct(prev_header, claimed_header) => result,
        };
        let mut reconstruction = match reconstruction {
            Ok(reconstruction) => reconstruction,
            Err(err) => {
                // The prover lied about the previous state or the trace.
                debug!(target: "execution_oracle", %err, "state reconstruction failed");
                return Ok(false);
            }
        };

        let produced =
            match self.replayer.replay_block(prev_header, message, &mut reconstruction.db) {
                Ok(produced) => produced,
                Err(err) => {
                    // The message is unprocessable under the prior state.
                    debug!(target: "execution_oracle", %err, "replay failed");
                    return Ok(false);
                }
            };

        Ok(headers_match(&produced, claimed_header))
    }

    /// The genesis path: build block zero from the init payload's chain config and compare.
    fn verify_genesis(&self, message: &L1IncomingMessage, claimed_header: &Header) -> bool {
        let Some(init) = ParsedInitMessage::parse(message) else {
            debug!(target: "execution_oracle", "malformed initialize message");
            return false;
        };
        match self.replayer.build_genesis(&init) {
            Ok(produced) => headers_match(&produced, claimed_header),
            Err(err) => {
                debug!(target: "execution_oracle", %err, "genesis construction failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::{keccak256, B256, B64, U256};
    use litmus_state::test_utils::TestWorld;
    use std::convert::Infallible;

    /// A deterministic stand-in for the external VM: the produced header is a pure function of
    /// the previous header and the message payload.
    #[derive(Debug)]
    struct EchoReplayer;

    impl EchoReplayer {
        fn derive(prev: &Header, payload: &[u8]) -> Header {
            Header {
                parent_hash: prev.hash_slow(),
                number: prev.number + 1,
                state_root: keccak256([prev.state_root.as_slice(), payload].concat()),
                receipts_root: keccak256([b"receipts".as_slice(), payload].concat()),
                transactions_root: keccak256([b"txs".as_slice(), payload].concat()),
                mix_hash: B256::with_last_byte(0x20),
                extra_data: payload.to_vec().into(),
                ..Default::default()
            }
        }
    }

    impl BlockReplayer for EchoReplayer {
        type Error = Infallible;

        fn replay_block(
            &self,
            prev_header: &Header,
            message: &L1IncomingMessage,
            _db: &mut litmus_state::PartialStateDb,
        ) -> Result<Header, Self::Error> {
            Ok(Self::derive(prev_header, &message.l2_msg))
        }

        fn build_genesis(&self, init: &ParsedInitMessage) -> Result<Header, Self::Error> {
            Ok(Header {
                number: 0,
                state_root: keccak256(init.chain_id.to_be_bytes::<32>()),
                extra_data: b"genesis".to_vec().into(),
                ..Default::default()
            })
        }
    }

    fn oracle() -> ExecutionOracle<EchoReplayer, TestWorld, TestWorld> {
        ExecutionOracle::new(
            EchoReplayer,
            StateReconstructor::new(TestWorld::sample(), TestWorld::sample()),
            CancellationToken::new(),
        )
    }

    fn l2_message(payload: &[u8]) -> L1IncomingMessage {
        L1IncomingMessage {
            header: litmus_inbox::L1MessageHeader {
                kind: L1MessageKind::L2Message,
                poster: litmus_inbox::BATCH_POSTER_ADDRESS,
                block_number: 1,
                timestamp: 1,
                request_id: None,
                l1_base_fee: U256::ZERO,
            },
            l2_msg: payload.to_vec().into(),
            batch_gas_cost: None,
        }
    }

    fn prev_header() -> Header {
        Header { number: 99, state_root: TestWorld::sample().state_root(), ..Default::default() }
    }

    #[tokio::test]
    async fn test_accepts_honest_claim() {
        let prev = prev_header();
        let message = l2_message(b"payload");
        let claimed = EchoReplayer::derive(&prev, b"payload");

        assert!(oracle().execute(&prev, &message, &claimed).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_corrupted_state_root() {
        let prev = prev_header();
        let message = l2_message(b"payload");
        let mut claimed = EchoReplayer::derive(&prev, b"payload");
        claimed.state_root = B256::with_last_byte(0xEE);

        assert!(!oracle().execute(&prev, &message, &claimed).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_corrupted_extra_data() {
        let prev = prev_header();
        let message = l2_message(b"payload");
        let mut claimed = EchoReplayer::derive(&prev, b"payload");
        claimed.extra_data = b"tampered".to_vec().into();

        assert!(!oracle().execute(&prev, &message, &claimed).await.unwrap());
    }

    #[tokio::test]
    async fn test_nonce_is_normalized_before_hashing() {
        let prev = prev_header();
        let message = l2_message(b"payload");
        let mut claimed = EchoReplayer::derive(&prev, b"payload");
        claimed.nonce = B64::from(7u64);

        assert!(oracle().execute(&prev, &message, &claimed).await.unwrap());
    }

    #[tokio::test]
    async fn test_genesis_path() {
        let init_payload = U256::from(412_346u64).to_be_bytes::<32>().to_vec();
        let mut message = l2_message(&init_payload);
        message.header.kind = L1MessageKind::Initialize;

        let init = ParsedInitMessage::parse(&message).unwrap();
        let claimed = EchoReplayer.build_genesis(&init).unwrap();

        let prev = Header::default();
        assert!(oracle().execute(&prev, &message, &claimed).await.unwrap());

        let mut wrong = claimed.clone();
        wrong.state_root = B256::with_last_byte(1);
        assert!(!oracle().execute(&prev, &message, &wrong).await.unwrap());
    }

    #[tokio::test]
    async fn test_verdict_is_idempotent() {
        let prev = prev_header();
        let message = l2_message(b"payload");
        let claimed = EchoReplayer::derive(&prev, b"payload");

        let oracle = oracle();
        let first = oracle.execute(&prev, &message, &claimed).await.unwrap();
        let second = oracle.execute(&prev, &message, &claimed).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancellation_escapes() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let oracle = ExecutionOracle::new(
            EchoReplayer,
            StateReconstructor::new(TestWorld::sample(), TestWorld::sample()),
            cancel,
        );

        let prev = prev_header();
        let message = l2_message(b"payload");
        let claimed = EchoReplayer::derive(&prev, b"payload");
        assert_eq!(
            oracle.execute(&prev, &message, &claimed).await.unwrap_err(),
            OracleError::Cancelled
        );
    }

    #[tokio::test]
    async fn test_reconstruction_failure_is_false() {
        // The claimed previous root does not match the world the providers answer from.
        let mut prev = prev_header();
        prev.state_root = B256::with_last_byte(0x77);
        let message = l2_message(b"payload");
        let claimed = EchoReplayer::derive(&prev, b"payload");

        assert!(!oracle().execute(&prev, &message, &claimed).await.unwrap());
    }
}
