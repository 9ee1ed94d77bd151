//! Tournament error types.

use thiserror::Error;

/// Errors that abort the whole tournament run. Prover misbehavior is never one of them; it is
/// handled by elimination.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TournamentError {
    /// The run was cancelled; partial results are discarded.
    #[error("cancelled")]
    Cancelled,
    /// A condition that invalidates everything this client could verify, such as an
    /// authenticated batch encoding it cannot decode.
    #[error("fatal: {0}")]
    Fatal(String),
}
