//! Error types for trie node decoding, the proof store, and proof verification.

use alloy_primitives::B256;
use thiserror::Error;

/// A [Result] type alias where the error is [TrieNodeError].
pub type TrieNodeResult<T> = Result<T, TrieNodeError>;

/// An error type for [TrieNode] operations.
///
/// [TrieNode]: crate::TrieNode
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TrieNodeError {
    /// Invalid trie node type encountered.
    #[error("Invalid trie node type encountered")]
    InvalidNodeType,
    /// Failed to decode trie node.
    #[error("Failed to decode trie node: {0}")]
    Rlp(alloy_rlp::Error),
    /// The preimage of a blinded node is not available.
    #[error("Missing preimage for trie node {0}")]
    MissingPreimage(B256),
}

/// An error type for [ProofStore] operations.
///
/// [ProofStore]: crate::ProofStore
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProofStoreError {
    /// The preimage inserted under an explicit key does not hash to that key.
    #[error("Preimage does not hash to its key: expected {expected}, got {actual}")]
    KeyMismatch {
        /// The key the preimage was inserted under.
        expected: B256,
        /// The keccak of the inserted preimage.
        actual: B256,
    },
}

/// A [Result] type alias where the error is [ProofError].
pub type ProofResult<T> = Result<T, ProofError>;

/// An error type for account and storage proof verification.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProofError {
    /// A node referenced along the proof path is absent from the store.
    #[error("Missing proof node {0}")]
    MissingNode(B256),
    /// The first node of the proof does not hash to the claimed root.
    #[error("Proof root hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The claimed trie root.
        expected: B256,
        /// The keccak of the first proof node.
        actual: B256,
    },
    /// A proof node failed to decode as a trie node or its value failed to
    /// decode as the expected RLP shape.
    #[error("Malformed proof node: {0}")]
    MalformedNode(String),
    /// The value proven by the trie disagrees with the claimed value.
    #[error("Proven value disagrees with the claim")]
    ValueMismatch,
}

impl From<TrieNodeError> for ProofError {
    fn from(err: TrieNodeError) -> Self {
        match err {
            TrieNodeError::MissingPreimage(hash) => Self::MissingNode(hash),
            other => Self::MalformedNode(other.to_string()),
        }
    }
}
