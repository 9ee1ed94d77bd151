//! Compiled-in rollup contract addresses, keyed by child chain id.

use alloy_primitives::{address, Address};

/// The L1-side contract addresses of one rollup deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RollupAddresses {
    /// The sequencer inbox contract.
    pub(crate) sequencer_inbox: Address,
    /// The bridge contract.
    pub(crate) bridge: Address,
}

/// Returns the known addresses for `chain_id`, if this build ships them. Unknown chains must
/// supply addresses through the environment.
pub(crate) fn rollup_addresses(chain_id: u64) -> Option<RollupAddresses> {
    match chain_id {
        // Arbitrum One.
        42_161 => Some(RollupAddresses {
            sequencer_inbox: address!("1c479675ad559dc151f6ec7ed3fbf8cee79582b6"),
            bridge: address!("8315177ab297ba92a06054ce80a67ed4dbd7ed3a"),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_known_chain_resolves() {
        let addresses = rollup_addresses(42_161).unwrap();
        assert_ne!(addresses.sequencer_inbox, Address::ZERO);
        assert_ne!(addresses.bridge, Address::ZERO);
    }

    #[test]
    fn test_unknown_chain_requires_env() {
        assert!(rollup_addresses(412_346).is_none());
    }
}
