//! The system account's storage layout.
//!
//! The L2's system state lives in the storage trie of a single account, organized as a root
//! space of small integer offsets plus keyed *subspaces*. A subspace's backing key is derived by
//! hashing the parent key with the subspace id; slots within it are placed by hashing the
//! subspace key with the first 31 bytes of the logical slot, keeping the final byte verbatim so
//! that short runs of consecutive slots stay adjacent.

use alloy_primitives::{address, keccak256, Address, B256, U256};

/// The account whose storage trie holds the system state.
pub const SYSTEM_STATE_ADDRESS: Address = address!("a4b05fffffffffffffffffffffffffffffffffff");

/// The address system-originated messages are attributed to.
pub const SYSTEM_MESSAGE_ORIGIN_ADDRESS: Address =
    address!("00000000000000000000000000000000000a4b05");

/// The pool the L1 pricer collects funds into.
pub const PRICER_FUNDS_POOL_ADDRESS: Address =
    address!("a4b00000000000000000000000000000000000f6");

/// Batch-poster addresses observed across deployments; the VM prologue reads their pricing
/// state even when a block never references them.
pub const KNOWN_BATCH_POSTERS: [Address; 4] = [
    address!("a4b000000000000000000073657175656e636572"),
    address!("5e1497dd1f08c87b2d8fe23e9aab6c1de833d927"),
    address!("e6841d92b0c345144506576ec13ecf5103ac7f49"),
    address!("6ec62d826adc24aea360be9cf2647c42b9cdb19b"),
];

/// Identified subspaces of the system storage, by backing-key id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Subspace {
    /// L1 pricing state: per-poster tables, funds due, data-cost accounting.
    L1Pricing = 0,
    /// L2 gas pricing state.
    L2Pricing = 1,
    /// Outstanding retryable tickets.
    Retryables = 2,
    /// The address compression table.
    AddressTable = 3,
    /// The chain-owner set.
    ChainOwners = 4,
    /// The outgoing-message merkle accumulator.
    SendMerkle = 5,
    /// The ring buffer of recent L1 block hashes.
    Blockhashes = 6,
    /// The serialized chain config.
    ChainConfig = 7,
    /// Compiled-program metadata.
    Programs = 8,
    /// Feature flags.
    Features = 9,
}

impl Subspace {
    /// How many logical offsets of this subspace are enumerated when no trace information is
    /// available. The bounds are generous over-approximations of what the VM prologue and one
    /// block's execution can touch.
    const fn offset_bound(self) -> u64 {
        match self {
            Self::L1Pricing => 3800,
            Self::L2Pricing => 10,
            Self::Retryables => 1000,
            Self::AddressTable => 5,
            Self::ChainOwners => 5,
            Self::SendMerkle => 50,
            Self::Blockhashes => 300,
            Self::ChainConfig => 20,
            Self::Programs => 10,
            Self::Features => 50,
        }
    }

    const ALL: [Self; 10] = [
        Self::L1Pricing,
        Self::L2Pricing,
        Self::Retryables,
        Self::AddressTable,
        Self::ChainOwners,
        Self::SendMerkle,
        Self::Blockhashes,
        Self::ChainConfig,
        Self::Programs,
        Self::Features,
    ];
}

/// Reserved subspace ids beyond the identified set, enumerated shallowly.
const RESERVED_SUBSPACE_IDS: std::ops::RangeInclusive<u8> = 10..=20;

/// The number of root-space offsets.
const ROOT_OFFSET_COUNT: u64 = 8;

/// Derives the backing key of a subspace from its parent's key and the subspace id.
pub fn subspace_key(parent_key: &[u8], id: u8) -> B256 {
    keccak256([parent_key, &[id]].concat())
}

/// Maps a logical slot within a subspace to its physical storage key: hash the subspace key with
/// the slot's first 31 bytes, then append the slot's final byte unhashed.
pub fn map_storage_slot(subspace_key: B256, slot: B256) -> B256 {
    let mut mapped = [0u8; 32];
    let digest = keccak256([subspace_key.as_slice(), &slot[..31]].concat());
    mapped[..31].copy_from_slice(&digest[..31]);
    mapped[31] = slot[31];
    B256::from(mapped)
}

/// Returns the root-space storage slots, offsets `0..8`.
pub fn root_offset_slots() -> Vec<B256> {
    (0..ROOT_OFFSET_COUNT).map(|offset| B256::from(U256::from(offset))).collect()
}

/// Enumerates every storage slot the system account can plausibly be read at: the root offsets
/// plus the per-subspace mapped ranges.
///
/// This is the fallback when the execution trace reports no storage for the system account; a
/// trace-driven slot set is always preferred.
pub fn enumerate_system_storage_slots() -> Vec<B256> {
    let mut slots = root_offset_slots();

    for subspace in Subspace::ALL {
        let key = subspace_key(&[], subspace as u8);
        for offset in 0..=subspace.offset_bound() {
            slots.push(map_storage_slot(key, B256::from(U256::from(offset))));
        }
    }

    for id in RESERVED_SUBSPACE_IDS {
        let key = subspace_key(&[], id);
        for offset in 0..=3u64 {
            slots.push(map_storage_slot(key, B256::from(U256::from(offset))));
        }
    }

    slots
}

/// Returns every account the VM's prologue may read regardless of what a block references:
/// the system accounts, the precompile ranges `0x64..=0x72` and `0xc8..=0xff`, and the known
/// batch posters.
pub fn known_system_accounts() -> Vec<Address> {
    let mut accounts = vec![
        SYSTEM_STATE_ADDRESS,
        SYSTEM_MESSAGE_ORIGIN_ADDRESS,
        PRICER_FUNDS_POOL_ADDRESS,
    ];
    accounts.extend(KNOWN_BATCH_POSTERS);
    accounts.extend((0x64u8..=0x72).map(Address::with_last_byte));
    accounts.extend((0xc8u8..=0xff).map(Address::with_last_byte));
    accounts
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mapped_slot_keeps_final_byte() {
        let key = subspace_key(&[], Subspace::L1Pricing as u8);
        for offset in [0u64, 1, 77, 255] {
            let slot = B256::from(U256::from(offset));
            let mapped = map_storage_slot(key, slot);
            assert_eq!(mapped[31], slot[31]);
        }
    }

    #[test]
    fn test_adjacent_slots_share_mapped_prefix() {
        // Slots differing only in the final byte land in the same hashed bucket.
        let key = subspace_key(&[], Subspace::Retryables as u8);
        let a = map_storage_slot(key, B256::from(U256::from(0u64)));
        let b = map_storage_slot(key, B256::from(U256::from(1u64)));
        assert_eq!(a[..31], b[..31]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_subspaces_do_not_collide() {
        let a = map_storage_slot(subspace_key(&[], 0), B256::ZERO);
        let b = map_storage_slot(subspace_key(&[], 1), B256::ZERO);
        assert_ne!(a, b);
    }

    #[test]
    fn test_enumeration_is_duplicate_free() {
        let slots = enumerate_system_storage_slots();
        let unique: HashSet<_> = slots.iter().collect();
        assert_eq!(unique.len(), slots.len());
        // Root offsets, ten identified subspaces, and the reserved tail are all present.
        assert!(slots.len() > 5000);
    }

    #[test]
    fn test_known_accounts_include_precompile_ranges() {
        let accounts = known_system_accounts();
        assert!(accounts.contains(&Address::with_last_byte(0x64)));
        assert!(accounts.contains(&Address::with_last_byte(0x72)));
        assert!(accounts.contains(&Address::with_last_byte(0xc8)));
        assert!(accounts.contains(&Address::with_last_byte(0xff)));
        assert!(accounts.contains(&SYSTEM_STATE_ADDRESS));
    }
}
