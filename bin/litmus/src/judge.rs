//! The oracle-backed height judge handed to the tournament.

use async_trait::async_trait;
use litmus_inbox::L1MessageKind;
use litmus_oracle::{ConsensusOracle, OracleError};
use litmus_providers::{AlloyInboxProvider, ProverRpcClient};
use litmus_state::StateReconstructor;
use litmus_tournament::{HeightJudge, ProverNode, TournamentError, Verdict};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Judges one height of a prover's chain by driving the oracles.
///
/// The consensus oracle runs in full. On the execution side, block replay belongs to the
/// external execution engine; this build runs the execution oracle's defining prestate gate
/// (the state reconstructed from the prover's own proofs and trace must hash back to the
/// previous header's state root), which already convicts provers that lie about prior state.
pub(crate) struct OracleJudge {
    consensus: ConsensusOracle<AlloyInboxProvider>,
    cancel: CancellationToken,
}

impl OracleJudge {
    pub(crate) fn new(
        consensus: ConsensusOracle<AlloyInboxProvider>,
        cancel: CancellationToken,
    ) -> Self {
        Self { consensus, cancel }
    }
}

#[async_trait]
impl HeightJudge<ProverRpcClient> for OracleJudge {
    async fn judge(
        &self,
        prover: &ProverRpcClient,
        height: u64,
    ) -> Result<Verdict, TournamentError> {
        // The prover's claimed L1 records: the message producing this height, and its
        // successor, which pins adjacency under the batch stream.
        let Ok(record) = prover.l1_data_at(height).await else {
            return Ok(Verdict::Unreachable);
        };
        let Ok(next) = prover.l1_data_at(height + 1).await else {
            return Ok(Verdict::Unreachable);
        };

        match self.consensus.consecutive(&record, &next).await {
            Ok(true) => {}
            Ok(false) => return Ok(Verdict::ConsensusFailed),
            Err(OracleError::Cancelled) => return Err(TournamentError::Cancelled),
            Err(err @ OracleError::NodeOutOfDate(_)) => {
                return Err(TournamentError::Fatal(err.to_string()))
            }
        }

        if record.message.header.kind == L1MessageKind::Initialize {
            // Genesis replay is the engine's job; consensus adjacency is all this build can
            // check at the initialization height.
            return Ok(Verdict::Pass);
        }

        let Ok(claimed) = prover.header_by_number(height).await else {
            return Ok(Verdict::Unreachable);
        };
        let Ok(previous) = prover.header_by_number(height.saturating_sub(1)).await else {
            return Ok(Verdict::Unreachable);
        };

        let reconstructor = StateReconstructor::new(prover.clone(), prover.clone());
        let reconstruction = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(TournamentError::Cancelled),
            result = reconstructor.reconstruct(&previous, &claimed) => result,
        };
        match reconstruction {
            Ok(_) => Ok(Verdict::Pass),
            Err(err) => {
                debug!(target: "judge", %err, height, "prestate gate failed");
                Ok(Verdict::ExecutionFailed)
            }
        }
    }
}
