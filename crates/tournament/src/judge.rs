//! The judging seam between the tournament and the oracles.

use crate::{errors::TournamentError, prover::ProverNode};
use async_trait::async_trait;

/// The verdict of judging one height of one prover's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Both oracles accepted the height.
    Pass,
    /// The consensus oracle could not establish the claimed L1 records as consecutive.
    ConsensusFailed,
    /// The execution oracle's local replay disagreed with the claimed header.
    ExecutionFailed,
    /// The prover could not supply the data needed to judge the height.
    Unreachable,
}

impl Verdict {
    /// Whether the height was positively verified.
    pub const fn passed(self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Judges a single height of a prover's chain by driving the oracles as black boxes.
///
/// Implementations fetch the prover's headers and claimed L1 records around `height` and run
/// the consensus and execution oracles on them. Only run-fatal conditions (cancellation, an
/// out-of-date client) surface as errors; everything else is a [Verdict].
#[async_trait]
pub trait HeightJudge<P: ProverNode> {
    /// Judges `height` of `prover`'s chain.
    async fn judge(&self, prover: &P, height: u64) -> Result<Verdict, TournamentError>;
}
