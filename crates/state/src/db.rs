//! The partial state database materialized from verified proofs.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Encodable;
use alloy_trie::Nibbles;
use litmus_mpt::{AccountState, ProofError, ProofStore, TrieNode};
use std::collections::BTreeMap;

/// One account of the partial state: its proven fields, its code (when nonzero), and the
/// storage slots the proofs covered.
#[derive(Debug, Clone, Default)]
pub struct ReconstructedAccount {
    /// The proven account tuple.
    pub info: AccountState,
    /// The account's bytecode, fetched when the proven code hash is nonzero.
    pub code: Option<Bytes>,
    /// Proven storage values, keyed by slot. Zero values record proven absence.
    pub storage: BTreeMap<B256, U256>,
}

/// A state database holding exactly the accounts and slots one block replay touches, anchored
/// at the previous block's state root.
///
/// The database is created by one reconstruction, handed to one execution-oracle invocation,
/// and dropped; the backing [ProofStore] travels with it.
#[derive(Debug)]
pub struct PartialStateDb {
    anchor_root: B256,
    store: ProofStore,
    accounts: BTreeMap<Address, ReconstructedAccount>,
}

impl PartialStateDb {
    /// Creates an empty database anchored at `anchor_root`, owning the proof store populated
    /// during reconstruction.
    pub const fn new(anchor_root: B256, store: ProofStore) -> Self {
        Self { anchor_root, store, accounts: BTreeMap::new() }
    }

    /// The state root the database was reconstructed against.
    pub const fn anchor_root(&self) -> B256 {
        self.anchor_root
    }

    /// The proof store backing the database.
    pub const fn store(&self) -> &ProofStore {
        &self.store
    }

    /// Inserts a reconstructed account.
    pub fn insert_account(&mut self, address: Address, account: ReconstructedAccount) {
        self.accounts.insert(address, account);
    }

    /// Returns the reconstructed account at `address`, if present.
    pub fn account(&self, address: &Address) -> Option<&ReconstructedAccount> {
        self.accounts.get(address)
    }

    /// Returns the proven value of `slot` under `address`; absent slots read zero.
    pub fn storage(&self, address: &Address, slot: &B256) -> U256 {
        self.accounts
            .get(address)
            .and_then(|account| account.storage.get(slot).copied())
            .unwrap_or(U256::ZERO)
    }

    /// Iterates the reconstructed accounts.
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &ReconstructedAccount)> {
        self.accounts.iter()
    }

    /// The number of reconstructed accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the database holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Recomputes the state root of the database by re-inserting every reconstructed account
    /// (with its storage overlay folded into a recomputed storage root) into the trie anchored
    /// at [Self::anchor_root].
    ///
    /// Every trie path exercised here must be resolvable from the proof store; a missing node
    /// preimage fails the computation rather than degrading it.
    pub fn state_root(&self) -> Result<B256, ProofError> {
        let mut state_trie = TrieNode::new_blinded(self.anchor_root);

        for (address, account) in &self.accounts {
            let storage_root = if account.storage.values().all(U256::is_zero) {
                account.info.storage_root
            } else {
                let mut storage_trie = TrieNode::new_blinded(account.info.storage_root);
                for (slot, value) in &account.storage {
                    if value.is_zero() {
                        // Zero-valued slots are absent from the trie.
                        continue;
                    }
                    let mut value_rlp = Vec::new();
                    value.encode(&mut value_rlp);
                    storage_trie.insert(
                        &Nibbles::unpack(keccak256(slot)),
                        value_rlp.into(),
                        &self.store,
                    )?;
                }
                storage_trie.root()
            };

            let info = AccountState { storage_root, ..account.info };
            state_trie.insert(
                &Nibbles::unpack(keccak256(address)),
                info.rlp(),
                &self.store,
            )?;
        }

        Ok(state_trie.root())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::TestWorld;

    #[test]
    fn test_state_root_closes_over_honest_data() {
        let world = TestWorld::sample();
        let db = world.partial_db();
        assert_eq!(db.state_root().unwrap(), world.state_root());
    }

    #[test]
    fn test_state_root_detects_tampered_balance() {
        let world = TestWorld::sample();
        let mut db = world.partial_db();

        let (address, account) = {
            let (a, acc) = db.accounts().next().unwrap();
            (*a, acc.clone())
        };
        let mut tampered = account;
        tampered.info.balance += U256::from(1u64);
        db.insert_account(address, tampered);

        assert_ne!(db.state_root().unwrap(), world.state_root());
    }

    #[test]
    fn test_state_root_detects_tampered_storage() {
        let world = TestWorld::sample();
        let mut db = world.partial_db();

        let address = world.account_with_storage();
        let mut account = db.account(&address).unwrap().clone();
        let slot = *account.storage.keys().next().unwrap();
        account.storage.insert(slot, U256::from(0xbad_beefu64));
        db.insert_account(address, account);

        assert_ne!(db.state_root().unwrap(), world.state_root());
    }

    #[test]
    fn test_zero_slots_do_not_perturb_root() {
        let world = TestWorld::sample();
        let mut db = world.partial_db();

        let address = world.account_with_storage();
        let mut account = db.account(&address).unwrap().clone();
        account.storage.insert(B256::with_last_byte(0xEE), U256::ZERO);
        db.insert_account(address, account);

        assert_eq!(db.state_root().unwrap(), world.state_root());
    }
}
