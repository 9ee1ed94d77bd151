//! The tournament: an interactive elimination protocol that cross-checks mutually distrustful
//! prover endpoints and outputs the set still consistent with the on-chain anchor.
//!
//! The engine never trusts a prover error: a prover that cannot answer is a prover that loses.
//! The oracles enter only through the [HeightJudge] seam, so the protocol itself is testable
//! without any network or L1 data.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

mod prover;
pub use prover::ProverNode;

mod judge;
pub use judge::{HeightJudge, Verdict};

mod engine;
pub use engine::{
    ChallengeOutcome, Elimination, EliminationReason, Survivor, Tournament, TournamentConfig,
    TournamentOutcome,
};

mod errors;
pub use errors::TournamentError;
