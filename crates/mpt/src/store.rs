//! Contains the [ProofStore], an in-memory content-addressed node store.

use crate::{errors::ProofStoreError, traits::NodeFetcher, TrieNodeError};
use alloy_primitives::{keccak256, Bytes, B256};
use std::collections::HashMap;

/// An in-memory, content-addressed store for Merkle-Patricia proof nodes.
///
/// Every node is keyed by the keccak-256 of its RLP encoding. A store is
/// scoped to a single state-reconstruction session and dropped afterwards;
/// nothing in it survives a verification step.
#[derive(Debug, Default, Clone)]
pub struct ProofStore {
    nodes: HashMap<B256, Bytes>,
}

impl ProofStore {
    /// Creates an empty [ProofStore].
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node preimage, returning its keccak commitment.
    ///
    /// Re-inserting an existing preimage is a no-op; content addressing makes
    /// writes idempotent.
    pub fn insert(&mut self, preimage: Bytes) -> B256 {
        let hash = keccak256(&preimage);
        self.nodes.entry(hash).or_insert(preimage);
        hash
    }

    /// Inserts a node preimage under an explicit key, rejecting the write if
    /// the preimage does not hash to that key.
    pub fn insert_keyed(&mut self, key: B256, preimage: Bytes) -> Result<(), ProofStoreError> {
        let actual = keccak256(&preimage);
        if actual != key {
            return Err(ProofStoreError::KeyMismatch { expected: key, actual });
        }
        self.nodes.entry(key).or_insert(preimage);
        Ok(())
    }

    /// Returns the preimage stored under `hash`, if present.
    pub fn get(&self, hash: &B256) -> Option<&Bytes> {
        self.nodes.get(hash)
    }

    /// Returns the number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeFetcher for ProofStore {
    type Error = TrieNodeError;

    fn node_preimage(&self, commitment: B256) -> Result<Bytes, Self::Error> {
        self.nodes.get(&commitment).cloned().ok_or(TrieNodeError::MissingPreimage(commitment))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::bytes;

    #[test]
    fn test_insert_is_idempotent() {
        let mut store = ProofStore::new();
        let preimage = bytes!("c0ffee");
        let a = store.insert(preimage.clone());
        let b = store.insert(preimage);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_keyed_rejects_rehash_mismatch() {
        let mut store = ProofStore::new();
        let preimage = bytes!("c0ffee");
        let wrong_key = B256::with_last_byte(1);
        let err = store.insert_keyed(wrong_key, preimage.clone()).unwrap_err();
        assert!(matches!(err, ProofStoreError::KeyMismatch { expected, .. } if expected == wrong_key));
        assert!(store.is_empty());

        let key = keccak256(&preimage);
        store.insert_keyed(key, preimage).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_preimage() {
        let store = ProofStore::new();
        let missing = B256::with_last_byte(7);
        assert_eq!(
            store.node_preimage(missing).unwrap_err(),
            TrieNodeError::MissingPreimage(missing)
        );
    }
}
