//! A self-contained test world: a handful of accounts with storage, their tries, and provider
//! implementations that answer with real proofs derived from those tries.

use crate::{
    layout, AccountPrestate, PartialStateDb, ProofResponse, ReconstructedAccount,
    StateProofProvider, StorageProofEntry, TraceProvider, TxPrestate,
};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::Encodable;
use alloy_trie::Nibbles;
use async_trait::async_trait;
use litmus_mpt::{AccountState, ProofStore, TrieNode, EMPTY_CODE_HASH};
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

/// One account of the [TestWorld].
#[derive(Debug, Clone, Default)]
pub struct TestAccount {
    /// The account's nonce.
    pub nonce: u64,
    /// The account's balance.
    pub balance: U256,
    /// The account's code; empty means no code.
    pub code: Bytes,
    /// The account's storage.
    pub storage: BTreeMap<B256, U256>,
}

/// A miniature L2 state with real Merkle-Patricia tries, able to answer proof, code, and trace
/// requests the way an honest full node would.
#[derive(Debug, Default)]
pub struct TestWorld {
    /// The accounts of the world.
    pub accounts: BTreeMap<Address, TestAccount>,
}

impl TestWorld {
    /// A world with a user account, a contract with storage, and the system account.
    pub fn sample() -> Self {
        let mut world = Self::default();
        world.accounts.insert(
            Address::with_last_byte(0x11),
            TestAccount { nonce: 3, balance: U256::from(1_000_000u64), ..Default::default() },
        );
        world.accounts.insert(
            Address::with_last_byte(0x22),
            TestAccount {
                nonce: 1,
                balance: U256::from(5u64),
                code: Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xf3]),
                storage: BTreeMap::from([
                    (B256::with_last_byte(1), U256::from(0xaau64)),
                    (B256::with_last_byte(2), U256::from(0xbbu64)),
                ]),
            },
        );
        world.accounts.insert(
            layout::SYSTEM_STATE_ADDRESS,
            TestAccount {
                nonce: 0,
                balance: U256::from(1u64),
                storage: BTreeMap::from([(
                    layout::root_offset_slots()[0],
                    U256::from(31u64),
                )]),
                ..Default::default()
            },
        );
        world
    }

    /// An address of a sample account that has storage.
    pub fn account_with_storage(&self) -> Address {
        *self
            .accounts
            .iter()
            .find(|(_, account)| !account.storage.is_empty())
            .expect("sample world has storage")
            .0
    }

    fn account_state(account: &TestAccount) -> AccountState {
        AccountState {
            nonce: account.nonce,
            balance: account.balance,
            storage_root: storage_trie(account).0,
            code_hash: if account.code.is_empty() {
                EMPTY_CODE_HASH
            } else {
                keccak256(&account.code)
            },
        }
    }

    /// The root of the world's state trie.
    pub fn state_root(&self) -> B256 {
        self.state_trie().0
    }

    fn state_trie(&self) -> (B256, Vec<Bytes>) {
        let store = ProofStore::new();
        let mut root = TrieNode::Empty;
        for (address, account) in &self.accounts {
            root.insert(
                &Nibbles::unpack(keccak256(address)),
                Self::account_state(account).rlp(),
                &store,
            )
            .expect("building over an open trie");
        }
        let mut nodes = Vec::new();
        collect_nodes(&root, &mut nodes);
        (root.root(), nodes)
    }

    /// Builds the [ProofResponse] an honest node would return for `address` and `slots`.
    pub fn proof_response(&self, address: Address, slots: &[B256]) -> ProofResponse {
        let (_, account_nodes) = self.state_trie();
        match self.accounts.get(&address) {
            Some(account) => {
                let (storage_root, storage_nodes) = storage_trie(account);
                let info = Self::account_state(account);
                ProofResponse {
                    address,
                    balance: info.balance,
                    nonce: info.nonce,
                    code_hash: info.code_hash,
                    storage_hash: storage_root,
                    account_proof: account_nodes,
                    storage_proof: slots
                        .iter()
                        .map(|slot| StorageProofEntry {
                            key: U256::from_be_bytes(slot.0),
                            value: account.storage.get(slot).copied().unwrap_or(U256::ZERO),
                            proof: storage_nodes.clone(),
                        })
                        .collect(),
                }
            }
            None => ProofResponse {
                address,
                balance: U256::ZERO,
                nonce: 0,
                code_hash: B256::ZERO,
                storage_hash: B256::ZERO,
                account_proof: account_nodes,
                storage_proof: vec![],
            },
        }
    }

    /// The prestate trace of a block touching every account and slot of the world.
    pub fn full_trace(&self) -> Vec<TxPrestate> {
        let result = self
            .accounts
            .iter()
            .map(|(address, account)| {
                (
                    *address,
                    AccountPrestate {
                        balance: Some(account.balance),
                        code: (!account.code.is_empty()).then(|| account.code.clone()),
                        nonce: Some(account.nonce),
                        storage: Some(
                            account
                                .storage
                                .iter()
                                .map(|(slot, value)| (*slot, B256::from(value.to_be_bytes::<32>())))
                                .collect(),
                        ),
                    },
                )
            })
            .collect::<HashMap<_, _>>();
        vec![TxPrestate { tx_hash: keccak256(b"tx"), result }]
    }

    /// Builds the [PartialStateDb] an honest reconstruction of the whole world produces.
    pub fn partial_db(&self) -> PartialStateDb {
        let (root, account_nodes) = self.state_trie();
        let mut store = ProofStore::new();
        for node in account_nodes {
            store.insert(node);
        }

        let mut db_accounts = BTreeMap::new();
        for (address, account) in &self.accounts {
            let (_, storage_nodes) = storage_trie(account);
            for node in storage_nodes {
                store.insert(node);
            }
            db_accounts.insert(
                *address,
                ReconstructedAccount {
                    info: Self::account_state(account),
                    code: (!account.code.is_empty()).then(|| account.code.clone()),
                    storage: account.storage.clone(),
                },
            );
        }

        let mut db = PartialStateDb::new(root, store);
        for (address, account) in db_accounts {
            db.insert_account(address, account);
        }
        db
    }
}

fn storage_trie(account: &TestAccount) -> (B256, Vec<Bytes>) {
    let store = ProofStore::new();
    let mut root = TrieNode::Empty;
    for (slot, value) in &account.storage {
        if value.is_zero() {
            continue;
        }
        let mut value_rlp = Vec::new();
        value.encode(&mut value_rlp);
        root.insert(&Nibbles::unpack(keccak256(slot)), value_rlp.into(), &store)
            .expect("building over an open trie");
    }
    let mut nodes = Vec::new();
    collect_nodes(&root, &mut nodes);
    (root.root(), nodes)
}

/// Pre-order node collection; the root node comes first, as in `eth_getProof` responses.
fn collect_nodes(node: &TrieNode, out: &mut Vec<Bytes>) {
    let mut rlp_buf = Vec::new();
    node.encode(&mut rlp_buf);
    out.push(rlp_buf.into());
    match node {
        TrieNode::Branch { stack } => {
            for child in stack {
                if !matches!(child, TrieNode::Empty | TrieNode::Blinded { .. }) {
                    collect_nodes(child, out);
                }
            }
        }
        TrieNode::Extension { node, .. } => {
            if !matches!(node.as_ref(), TrieNode::Empty | TrieNode::Blinded { .. }) {
                collect_nodes(node, out);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl StateProofProvider for TestWorld {
    type Error = Infallible;

    async fn proof(
        &self,
        address: Address,
        slots: Vec<B256>,
        _block_number: u64,
    ) -> Result<ProofResponse, Self::Error> {
        Ok(self.proof_response(address, &slots))
    }

    async fn code_at(&self, address: Address, _block_number: u64) -> Result<Bytes, Self::Error> {
        Ok(self.accounts.get(&address).map(|a| a.code.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl TraceProvider for TestWorld {
    type Error = Infallible;

    async fn prestate_trace(&self, _block_hash: B256) -> Result<Vec<TxPrestate>, Self::Error> {
        Ok(self.full_trace())
    }
}
