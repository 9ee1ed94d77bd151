//! The L1 anchor: the single trusted input of the light client.
//!
//! Everything else in the system assumes provers lie. This crate reads the rollup contract's
//! latest *confirmed* assertion, re-derives its hash locally from the event data, has the
//! contract cross-validate both the hash and the config bindings, and hands back the L2 block
//! hash the tournament bootstraps trust from. Failures here are fatal to the whole run; with no
//! anchor there is nothing to extend trust forward from.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

mod contract;
pub use contract::RollupCore;

mod anchor;
pub use anchor::{
    assertion_chain_hash, hash_assertion_state, verify_created_assertion, AnchorReader,
    TrustedAnchor,
};

mod errors;
pub use errors::AnchorError;
