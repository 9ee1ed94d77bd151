//! Account and storage proof verification against a claimed trie root.
//!
//! A proof is the list of RLP-encoded trie nodes on the path from the root to the proven key,
//! exactly as returned by `eth_getProof`. Verification inserts the nodes into a scratch
//! [ProofStore] and walks the trie from the claimed root; any node that cannot be resolved by
//! its keccak commitment fails the proof.

use crate::{ProofError, ProofResult, ProofStore, TrieNode};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};
use alloy_trie::{Nibbles, EMPTY_ROOT_HASH};

/// The hash of empty code, `keccak256([])`.
pub const EMPTY_CODE_HASH: B256 =
    alloy_primitives::b256!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// An account within the state trie, RLP-encoded as the canonical 4-item tuple.
#[derive(RlpEncodable, RlpDecodable, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    /// The account's nonce.
    pub nonce: u64,
    /// The account's balance.
    pub balance: U256,
    /// The root of the account's storage trie.
    pub storage_root: B256,
    /// The keccak hash of the account's bytecode.
    pub code_hash: B256,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::ZERO,
            storage_root: EMPTY_ROOT_HASH,
            code_hash: EMPTY_CODE_HASH,
        }
    }
}

impl AccountState {
    /// Returns the RLP encoding of the account tuple.
    pub fn rlp(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.length());
        self.encode(&mut buf);
        buf.into()
    }
}

/// Verifies an account proof against `state_root`, returning the decoded [AccountState].
///
/// Returns `Ok(None)` when the proof is a valid *exclusion* proof: the trie rooted at
/// `state_root` provably holds no entry for `address`.
pub fn verify_account_proof(
    state_root: B256,
    address: Address,
    proof: &[Bytes],
) -> ProofResult<Option<AccountState>> {
    let key = Nibbles::unpack(keccak256(address));
    let Some(value) = walk_proof(state_root, &key, proof)? else {
        return Ok(None);
    };
    let account = AccountState::decode(&mut value.as_ref())
        .map_err(|e| ProofError::MalformedNode(e.to_string()))?;
    Ok(Some(account))
}

/// Verifies a storage proof against `storage_root`, checking the proven value against
/// `expected`.
///
/// Storage values are RLP-encoded big-endian integers; an absent slot proves the value zero.
pub fn verify_storage_proof(
    storage_root: B256,
    slot: B256,
    proof: &[Bytes],
    expected: U256,
) -> ProofResult<U256> {
    let key = Nibbles::unpack(keccak256(slot));
    let value = match walk_proof(storage_root, &key, proof)? {
        Some(value) => U256::decode(&mut value.as_ref())
            .map_err(|e| ProofError::MalformedNode(e.to_string()))?,
        // Zero-length value equals 0.
        None => U256::ZERO,
    };
    if value != expected {
        return Err(ProofError::ValueMismatch);
    }
    Ok(value)
}

/// Walks the proof nodes from `root` to the value at `key`.
///
/// The first node of the proof must hash to `root`; any deviation is fatal, there is no
/// best-effort fallback.
fn walk_proof(root: B256, key: &Nibbles, proof: &[Bytes]) -> ProofResult<Option<Bytes>> {
    let Some(first) = proof.first() else {
        // An empty proof only proves anything about the empty trie.
        if root == EMPTY_ROOT_HASH {
            return Ok(None);
        }
        return Err(ProofError::MissingNode(root));
    };

    let first_hash = keccak256(first);
    if first_hash != root {
        return Err(ProofError::HashMismatch { expected: root, actual: first_hash });
    }

    let mut scratch = ProofStore::new();
    for node in proof {
        scratch.insert(node.clone());
    }

    let mut trie = TrieNode::new_blinded(root);
    Ok(trie.open(key, &scratch)?.map(|value| value.clone()))
}
