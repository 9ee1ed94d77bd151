//! The `eth_getProof` response shape and the provider trait that fetches proofs and code.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One storage-slot proof within a [ProofResponse].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProofEntry {
    /// The proven slot, as echoed by the node (not necessarily left-padded).
    pub key: U256,
    /// The claimed value of the slot.
    pub value: U256,
    /// The trie nodes on the path from the storage root to the slot.
    pub proof: Vec<Bytes>,
}

impl StorageProofEntry {
    /// The proven slot as a 32-byte storage key.
    pub fn slot(&self) -> B256 {
        B256::from(self.key)
    }
}

/// The response of `eth_getProof`: the claimed account fields, the account's Merkle path from
/// the state root, and one proof per requested storage slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofResponse {
    /// The proven address.
    pub address: Address,
    /// The claimed balance.
    pub balance: U256,
    /// The claimed nonce.
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// The claimed code hash.
    pub code_hash: B256,
    /// The claimed storage root.
    pub storage_hash: B256,
    /// The trie nodes on the path from the state root to the account.
    pub account_proof: Vec<Bytes>,
    /// Proofs for each requested storage slot.
    pub storage_proof: Vec<StorageProofEntry>,
}

impl ProofResponse {
    /// Whether the response describes a provably absent account: every field zero, including
    /// both hashes. The exclusion proof must still verify.
    pub fn is_pure_nonexistence(&self) -> bool {
        self.nonce == 0
            && self.balance.is_zero()
            && self.storage_hash.is_zero()
            && self.code_hash.is_zero()
    }
}

/// Fetches account/storage proofs and contract code from a full node, bound at a block number.
#[async_trait]
pub trait StateProofProvider {
    /// The error type for provider failures.
    type Error: std::fmt::Display + Send;

    /// Returns the account and multi-storage proof for `address` at `block_number`.
    async fn proof(
        &self,
        address: Address,
        slots: Vec<B256>,
        block_number: u64,
    ) -> Result<ProofResponse, Self::Error>;

    /// Returns the code of `address` at `block_number`.
    async fn code_at(&self, address: Address, block_number: u64) -> Result<Bytes, Self::Error>;
}
