//! The interface to the L2 VM, consumed as a pure function.

use crate::init::ParsedInitMessage;
use alloy_consensus::Header;
use litmus_inbox::L1IncomingMessage;
use litmus_state::PartialStateDb;

/// The external L2 execution engine.
///
/// The engine is a pure function of its inputs: replaying the same message over the same state
/// must produce the same header, bit for bit. The oracle owns everything around the engine
/// (state reconstruction, header comparison); the engine owns transaction execution and header
/// assembly.
pub trait BlockReplayer {
    /// The error type for replay failures. A failing replay means the message is unprocessable
    /// under the given state, which the oracle treats as a lying prover.
    type Error: std::fmt::Display + Send;

    /// Replays one inbox message on top of `prev_header`, reading and writing through the
    /// reconstructed partial state, and returns the header of the block it produces.
    fn replay_block(
        &self,
        prev_header: &Header,
        message: &L1IncomingMessage,
        db: &mut PartialStateDb,
    ) -> Result<Header, Self::Error>;

    /// Builds the genesis block from a parsed initialization message: initializes the system
    /// state from the embedded (or fallback) chain config over an empty state database and
    /// returns the genesis header.
    fn build_genesis(&self, init: &ParsedInitMessage) -> Result<Header, Self::Error>;
}
