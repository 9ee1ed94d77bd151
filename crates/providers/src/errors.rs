//! Provider error types.

use thiserror::Error;

/// An error type shared by the online providers. Everything here is a transport or boundary
/// failure; logical verdicts about provers never originate in this crate.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// An RPC call failed after retries.
    #[error("rpc failed: {0}")]
    Transport(String),
    /// A response failed to decode into the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// A required log or entity was not found.
    #[error("not found: {0}")]
    NotFound(String),
}
