//! The two oracles that judge a prover's claims: the consensus oracle proves two claimed L1
//! records are adjacent under the authoritative batch stream, and the execution oracle replays
//! one inbox message over reconstructed state and compares the produced header with the claim.
//!
//! Within an oracle, anything that prevents a definitive *true* becomes a definitive *false*.
//! Only two conditions escape: cancellation, and an authenticated batch encoding this client is
//! too old to understand.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

mod init;
pub use init::{default_chain_config, ParsedInitMessage, DEFAULT_INITIAL_L1_BASE_FEE};

mod traits;
pub use traits::BlockReplayer;

mod execution;
pub use execution::{headers_match, ExecutionOracle};

mod consensus;
pub use consensus::ConsensusOracle;

mod errors;
pub use errors::{ConsensusCheckError, OracleError};
