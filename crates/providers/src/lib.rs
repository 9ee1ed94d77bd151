//! Online provider implementations: the L1 inbox/bridge reader, the beacon blob fetcher, and
//! the prover RPC client. Everything here is transport; the logic that decides whether a prover
//! is lying lives behind the traits these types implement.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

mod contracts;
pub use contracts::{IBridge, IDelayedMessageProvider, ISequencerInbox};

mod l1;
pub use l1::AlloyInboxProvider;

mod beacon;
pub use beacon::{decode_blobs, BlobReader, OnlineBeaconClient};

mod prover;
pub use prover::{ProverRpcClient, ARBITRUM_ONE_CHAIN_ID, ARBITRUM_ONE_GENESIS_BLOCK};

mod retry;
pub use retry::with_retry;

mod errors;
pub use errors::ProviderError;
