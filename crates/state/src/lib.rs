//! Partial-state reconstruction: given a prestate trace and account/storage proofs bound at the
//! previous block's state root, rebuild exactly the slice of L2 state a block replay touches,
//! and prove the rebuild hashes back to the previous state root.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

pub mod layout;

mod trace;
pub use trace::{AccountPrestate, TraceProvider, TxPrestate};

mod proof;
pub use proof::{ProofResponse, StateProofProvider, StorageProofEntry};

mod db;
pub use db::{PartialStateDb, ReconstructedAccount};

mod reconstructor;
pub use reconstructor::{Reconstruction, StateReconstructor};

mod errors;
pub use errors::ReconstructionError;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
