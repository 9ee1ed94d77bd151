//! The state reconstructor: trace-driven proof gathering and the root-closure gate.

use crate::{
    db::{PartialStateDb, ReconstructedAccount},
    errors::ReconstructionError,
    layout,
    proof::{ProofResponse, StateProofProvider},
    trace::TraceProvider,
};
use alloy_consensus::Header;
use alloy_primitives::{keccak256, Address, B256};
use futures::future::try_join_all;
use litmus_mpt::{verify_account_proof, verify_storage_proof, ProofStore, EMPTY_CODE_HASH};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

/// The output of one reconstruction: the partial database plus the account and slot sets it
/// covers, for callers that need to know what was reconstructed.
#[derive(Debug)]
pub struct Reconstruction {
    /// The partial state database, anchored at the previous header's state root.
    pub db: PartialStateDb,
    /// Every account the reconstruction requested a proof for.
    pub accounts: BTreeSet<Address>,
    /// Every storage slot requested, per account.
    pub slots: BTreeMap<Address, BTreeSet<B256>>,
}

/// Rebuilds the slice of state needed to replay one block, from an execution trace of the
/// target block and account/storage proofs bound at the previous block's state root.
#[derive(Debug)]
pub struct StateReconstructor<P, T> {
    proofs: P,
    tracer: T,
}

impl<P, T> StateReconstructor<P, T>
where
    P: StateProofProvider + Sync,
    T: TraceProvider + Sync,
{
    /// Creates a new [StateReconstructor] over the given providers.
    pub const fn new(proofs: P, tracer: T) -> Self {
        Self { proofs, tracer }
    }

    /// Builds the [PartialStateDb] for `previous_header`'s state root, sufficient to replay the
    /// block committed to by `current_header`.
    ///
    /// The final invariant is non-negotiable: the reconstructed database must hash back to
    /// `previous_header.state_root`, or the reconstruction fails with
    /// [ReconstructionError::StateRootMismatch]. No account is ever dropped or masked to force
    /// the roots to agree.
    pub async fn reconstruct(
        &self,
        previous_header: &Header,
        current_header: &Header,
    ) -> Result<Reconstruction, ReconstructionError> {
        let state_root = previous_header.state_root;
        let block_number = previous_header.number;

        // Step 1: what does executing the current block read?
        let trace = self
            .tracer
            .prestate_trace(current_header.hash_slow())
            .await
            .map_err(|e| ReconstructionError::Trace(e.to_string()))?;
        if trace.is_empty() {
            return Err(ReconstructionError::EmptyTrace);
        }

        // Step 2: union the traced accounts and slots with the accounts the VM prologue reads
        // unconditionally.
        let mut accounts: BTreeSet<Address> = BTreeSet::new();
        let mut slots: BTreeMap<Address, BTreeSet<B256>> = BTreeMap::new();
        for tx in &trace {
            for (address, prestate) in &tx.result {
                accounts.insert(*address);
                if let Some(storage) = &prestate.storage {
                    slots.entry(*address).or_default().extend(storage.keys().copied());
                }
            }
        }
        accounts.extend(layout::known_system_accounts());

        // Step 3: storage keys for the system account. The trace-reported set drives the proof
        // request whenever the tracer saw storage there; the synthetic enumeration is only the
        // fallback for blocks whose trace never touches the system account's storage.
        let system_slots = slots.entry(layout::SYSTEM_STATE_ADDRESS).or_default();
        if system_slots.is_empty() {
            system_slots.extend(layout::enumerate_system_storage_slots());
            debug!(
                target: "state_reconstructor",
                slots = system_slots.len(),
                "trace reports no system storage; enumerating the full layout"
            );
        } else {
            system_slots.extend(layout::root_offset_slots());
        }

        // Step 4: account + multi-storage proofs, fanned out in parallel within this one
        // logical RPC. Responses land in account order; the root check below is oblivious to
        // fetch order anyway.
        let responses: Vec<ProofResponse> = try_join_all(accounts.iter().map(|address| {
            let request_slots: Vec<B256> =
                slots.get(address).map(|s| s.iter().copied().collect()).unwrap_or_default();
            self.proofs.proof(*address, request_slots, block_number)
        }))
        .await
        .map_err(|e| ReconstructionError::ProofFetch(e.to_string()))?;

        let mut store = ProofStore::new();
        let mut verified: Vec<(Address, ReconstructedAccount)> = Vec::new();

        for response in responses {
            let address = response.address;

            // Step 5: drop provably absent accounts, but only after their exclusion proof
            // verifies against the anchor root.
            if response.is_pure_nonexistence() {
                if verify_account_proof(state_root, address, &response.account_proof)?.is_some()
                {
                    return Err(ReconstructionError::ResponseMismatch(address));
                }
                trace!(target: "state_reconstructor", %address, "skipping empty account");
                continue;
            }

            // Step 6: every proof node becomes content-addressed state.
            for node in &response.account_proof {
                store.insert(node.clone());
            }
            for entry in &response.storage_proof {
                for node in &entry.proof {
                    store.insert(node.clone());
                }
            }

            // Step 7: verify the account against the anchor root and the response against its
            // own proof, then overlay the proven storage.
            let account = verify_account_proof(state_root, address, &response.account_proof)?
                .ok_or(ReconstructionError::ResponseMismatch(address))?;
            if account.nonce != response.nonce
                || account.balance != response.balance
                || account.code_hash != response.code_hash
                || account.storage_root != response.storage_hash
            {
                return Err(ReconstructionError::ResponseMismatch(address));
            }

            let mut storage = BTreeMap::new();
            for entry in &response.storage_proof {
                let slot = entry.slot();
                verify_storage_proof(account.storage_root, slot, &entry.proof, entry.value)?;
                storage.insert(slot, entry.value);
            }

            let code = if account.code_hash != EMPTY_CODE_HASH && !account.code_hash.is_zero() {
                let code = self
                    .proofs
                    .code_at(address, block_number)
                    .await
                    .map_err(|e| ReconstructionError::ProofFetch(e.to_string()))?;
                if keccak256(&code) != account.code_hash {
                    return Err(ReconstructionError::CodeHashMismatch(address));
                }
                Some(code)
            } else {
                None
            };

            verified.push((address, ReconstructedAccount { info: account, code, storage }));
        }

        let mut db = PartialStateDb::new(state_root, store);
        for (address, account) in verified {
            db.insert_account(address, account);
        }

        // Steps 8 and 9: recompute the root and gate on equality.
        let computed = db.state_root()?;
        if computed != state_root {
            warn!(
                target: "state_reconstructor",
                %computed,
                expected = %state_root,
                "reconstructed root does not close"
            );
            return Err(ReconstructionError::StateRootMismatch {
                computed,
                expected: state_root,
            });
        }
        debug!(
            target: "state_reconstructor",
            accounts = db.len(),
            root = %computed,
            "partial state reconstructed"
        );

        Ok(Reconstruction { db, accounts, slots })
    }
}
