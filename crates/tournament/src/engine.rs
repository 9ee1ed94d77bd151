//! The elimination engine: pairwise challenges with bisection over block heights.

use crate::{errors::TournamentError, judge::HeightJudge, prover::ProverNode, Verdict};
use litmus_inbox::L2TrackingRecord;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Tournament tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct TournamentConfig {
    /// How many heights beyond an agreed common prefix the leader is tested at before a
    /// challenger is admitted.
    pub extra_heights: u64,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self { extra_heights: 10 }
    }
}

/// The outcome of one pairwise challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Both provers stay.
    BothWin,
    /// Both provers failed the oracles at their disagreement.
    BothLose,
    /// The current leader survives; the challenger is eliminated.
    LargestWins,
    /// The current leader is eliminated.
    LargestLoses,
}

/// Why a prover was eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EliminationReason {
    /// The consensus oracle rejected the prover's L1 records at a height.
    ConsensusFailed {
        /// The judged height.
        height: u64,
    },
    /// The execution oracle's replay disagreed with the prover's header at a height.
    ExecutionFailed {
        /// The judged height.
        height: u64,
    },
    /// The prover lost the oracle test at the bisected point of first disagreement.
    Bisected {
        /// The first height of disagreement.
        height: u64,
    },
    /// The prover could not answer a query the protocol required.
    Unreachable,
}

impl std::fmt::Display for EliminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsensusFailed { height } => write!(f, "consensus failed at height {height}"),
            Self::ExecutionFailed { height } => write!(f, "execution failed at height {height}"),
            Self::Bisected { height } => write!(f, "bisected at height {height}"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// One eliminated prover, with its one-line reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elimination {
    /// The eliminated prover's endpoint.
    pub endpoint: String,
    /// Why it was eliminated.
    pub reason: EliminationReason,
}

/// One surviving prover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Survivor {
    /// The survivor's endpoint.
    pub endpoint: String,
    /// The survivor's claimed tip.
    pub tip: L2TrackingRecord,
    /// Whether some height of this prover's chain was positively verified by the oracles, as
    /// opposed to surviving purely because every rival was eliminated.
    pub verified: bool,
}

/// The result of a tournament run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentOutcome {
    /// Provers still consistent with the anchor, in descending tip order.
    pub survivors: Vec<Survivor>,
    /// Eliminated provers, in elimination order.
    pub eliminated: Vec<Elimination>,
}

impl TournamentOutcome {
    /// Whether at least one survivor's chain was positively verified.
    pub fn has_verified_survivor(&self) -> bool {
        self.survivors.iter().any(|s| s.verified)
    }
}

struct Entrant<P> {
    prover: P,
    tip: L2TrackingRecord,
}

/// Book-keeping across one run: which entrants were positively verified, and the last fault
/// attributed to each entrant, consumed when the entrant is eliminated.
#[derive(Default)]
struct RunState {
    verified: BTreeSet<usize>,
    faults: BTreeMap<usize, EliminationReason>,
    eliminated: Vec<(usize, EliminationReason)>,
}

impl RunState {
    fn eliminate(&mut self, entrant: usize) {
        let reason = self.faults.remove(&entrant).unwrap_or(EliminationReason::Unreachable);
        self.eliminated.push((entrant, reason));
    }
}

/// The tournament engine. Runs sequentially: one challenge at a time, one oracle invocation at
/// a time; the survivor set shrinks monotonically except for the single bootstrap insertion
/// when it empties.
#[derive(Debug)]
pub struct Tournament {
    config: TournamentConfig,
    anchor: L2TrackingRecord,
}

impl Tournament {
    /// Creates a tournament rooted at the trusted anchor record.
    pub const fn new(config: TournamentConfig, anchor: L2TrackingRecord) -> Self {
        Self { config, anchor }
    }

    /// Runs the tournament over `provers`, using `judge` to test contested heights.
    pub async fn run<P, J>(
        &self,
        provers: Vec<P>,
        judge: &J,
    ) -> Result<TournamentOutcome, TournamentError>
    where
        P: ProverNode + Sync,
        J: HeightJudge<P> + Sync,
    {
        let mut state = RunState::default();

        // Collect claimed tips; a prover that cannot state one is out before the first round.
        let mut entrants: Vec<Entrant<P>> = Vec::with_capacity(provers.len());
        let mut unreachable: Vec<String> = Vec::new();
        for prover in provers {
            match prover.latest_state().await {
                Ok(tip) => {
                    debug!(
                        target: "tournament",
                        endpoint = prover.endpoint(),
                        tip = tip.l2_block_number,
                        "prover claims tip"
                    );
                    entrants.push(Entrant { prover, tip });
                }
                Err(err) => {
                    warn!(target: "tournament", endpoint = prover.endpoint(), %err, "prover unreachable");
                    unreachable.push(prover.endpoint().to_string());
                }
            }
        }
        entrants.sort_by(|a, b| b.tip.l2_block_number.cmp(&a.tip.l2_block_number));

        let mut survivors: BTreeSet<usize> = BTreeSet::new();
        if !entrants.is_empty() {
            survivors.insert(0);
        }
        let mut largest = 0usize;

        for participant in 1..entrants.len() {
            loop {
                let outcome = self
                    .challenge(largest, participant, &entrants, judge, &mut state)
                    .await?;
                info!(
                    target: "tournament",
                    largest = entrants[largest].prover.endpoint(),
                    participant = entrants[participant].prover.endpoint(),
                    ?outcome,
                    "challenge decided"
                );

                match outcome {
                    ChallengeOutcome::BothWin => {
                        survivors.insert(participant);
                        break;
                    }
                    ChallengeOutcome::LargestWins => {
                        state.eliminate(participant);
                        break;
                    }
                    ChallengeOutcome::BothLose | ChallengeOutcome::LargestLoses => {
                        survivors.remove(&largest);
                        state.eliminate(largest);

                        // Hand the crown to the surviving prover with the highest tip and
                        // replay the challenge against it.
                        match survivors
                            .iter()
                            .max_by_key(|index| entrants[**index].tip.l2_block_number)
                        {
                            Some(next) => largest = *next,
                            None => break,
                        }
                    }
                }
            }

            if survivors.is_empty() {
                // Bootstrap: nobody is left to judge the participant against. It survives by
                // elimination, not by verification.
                survivors.insert(participant);
                largest = participant;
            }
        }

        let survivors = survivors
            .into_iter()
            .map(|index| Survivor {
                endpoint: entrants[index].prover.endpoint().to_string(),
                tip: entrants[index].tip,
                verified: state.verified.contains(&index),
            })
            .collect();
        let eliminated = state
            .eliminated
            .into_iter()
            .map(|(index, reason)| Elimination {
                endpoint: entrants[index].prover.endpoint().to_string(),
                reason,
            })
            .chain(unreachable.into_iter().map(|endpoint| Elimination {
                endpoint,
                reason: EliminationReason::Unreachable,
            }))
            .collect();

        Ok(TournamentOutcome { survivors, eliminated })
    }

    /// One pairwise challenge between the current leader and a challenger.
    async fn challenge<P, J>(
        &self,
        largest: usize,
        participant: usize,
        entrants: &[Entrant<P>],
        judge: &J,
        state: &mut RunState,
    ) -> Result<ChallengeOutcome, TournamentError>
    where
        P: ProverNode + Sync,
        J: HeightJudge<P> + Sync,
    {
        let leader = &entrants[largest];
        let challenger = &entrants[participant];
        debug!(
            target: "tournament",
            leader_tip = leader.tip.l2_block_number,
            challenger_tip = challenger.tip.l2_block_number,
            "challenge started"
        );

        let at_challenger_tip =
            match leader.prover.header_by_number(challenger.tip.l2_block_number).await {
                Ok(header) => header,
                Err(err) => {
                    warn!(target: "tournament", %err, "leader cannot produce challenger-height header");
                    state.faults.insert(largest, EliminationReason::Unreachable);
                    return Ok(ChallengeOutcome::LargestLoses);
                }
            };

        if at_challenger_tip.hash_slow() == challenger.tip.l2_block_hash {
            // Shared prefix. Test the leader over a bounded window beyond it; when the tips
            // coincide and the window is empty, judge the shared tip itself so agreement is
            // still positively verified at least once.
            let start = challenger.tip.l2_block_number + 1;
            let end = leader
                .tip
                .l2_block_number
                .min(challenger.tip.l2_block_number + self.config.extra_heights);
            let heights: Vec<u64> = if start < end {
                (start..end).collect()
            } else {
                vec![challenger.tip.l2_block_number]
            };

            for height in heights {
                let verdict = judge.judge(&leader.prover, height).await?;
                if !verdict.passed() {
                    state.faults.insert(largest, fault(verdict, height));
                    return Ok(ChallengeOutcome::LargestLoses);
                }
            }
            state.verified.insert(largest);
            // The challenger's whole chain is a prefix of the leader's verified one.
            state.verified.insert(participant);
            return Ok(ChallengeOutcome::BothWin);
        }

        if at_challenger_tip.number != challenger.tip.l2_block_number {
            // The leader could not even produce a header at the challenger's height.
            state.faults.insert(largest, EliminationReason::Unreachable);
            return Ok(ChallengeOutcome::LargestLoses);
        }

        self.bisect(largest, participant, entrants, judge, state).await
    }

    /// Binary search over `[anchor, challenger_tip]` for the first height of disagreement, then
    /// judge both provers there.
    async fn bisect<P, J>(
        &self,
        largest: usize,
        participant: usize,
        entrants: &[Entrant<P>],
        judge: &J,
        state: &mut RunState,
    ) -> Result<ChallengeOutcome, TournamentError>
    where
        P: ProverNode + Sync,
        J: HeightJudge<P> + Sync,
    {
        let leader = &entrants[largest];
        let challenger = &entrants[participant];

        let mut left = self.anchor.l2_block_number;
        let mut right = challenger.tip.l2_block_number;

        while left + 1 < right {
            let mid = left + (right - left) / 2;
            let leader_header = match leader.prover.header_by_number(mid).await {
                Ok(header) => header,
                Err(err) => {
                    warn!(target: "tournament", %err, mid, "leader unreachable during bisection");
                    state.faults.insert(largest, EliminationReason::Unreachable);
                    return Ok(ChallengeOutcome::LargestLoses);
                }
            };
            let challenger_header = match challenger.prover.header_by_number(mid).await {
                Ok(header) => header,
                Err(err) => {
                    warn!(target: "tournament", %err, mid, "challenger unreachable during bisection");
                    state.faults.insert(participant, EliminationReason::Unreachable);
                    return Ok(ChallengeOutcome::LargestWins);
                }
            };
            if leader_header.hash_slow() == challenger_header.hash_slow() {
                left = mid;
            } else {
                right = mid;
            }
        }
        debug!(target: "tournament", height = right, "bisection converged on first disagreement");

        let leader_verdict = judge.judge(&leader.prover, right).await?;
        let challenger_verdict = judge.judge(&challenger.prover, right).await?;

        match (leader_verdict.passed(), challenger_verdict.passed()) {
            (true, false) => {
                state.verified.insert(largest);
                state.faults.insert(participant, fault(challenger_verdict, right));
                Ok(ChallengeOutcome::LargestWins)
            }
            (false, true) => {
                state.verified.insert(participant);
                state.faults.insert(largest, fault(leader_verdict, right));
                Ok(ChallengeOutcome::LargestLoses)
            }
            (false, false) => {
                state.faults.insert(largest, fault(leader_verdict, right));
                state.faults.insert(participant, fault(challenger_verdict, right));
                Ok(ChallengeOutcome::BothLose)
            }
            (true, true) => {
                // Sound oracles cannot accept both sides of a disagreement.
                warn!(target: "tournament", height = right, "both provers passed at a disagreement height");
                state.verified.insert(largest);
                state.verified.insert(participant);
                Ok(ChallengeOutcome::BothWin)
            }
        }
    }
}

const fn fault(verdict: Verdict, height: u64) -> EliminationReason {
    match verdict {
        Verdict::ConsensusFailed => EliminationReason::ConsensusFailed { height },
        Verdict::ExecutionFailed => EliminationReason::ExecutionFailed { height },
        Verdict::Unreachable => EliminationReason::Unreachable,
        // Callers only attribute faults to failing verdicts.
        Verdict::Pass => EliminationReason::Bisected { height },
    }
}
