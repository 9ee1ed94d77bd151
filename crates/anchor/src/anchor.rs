//! Confirmed-assertion discovery and validation.

use crate::{contract::RollupCore, errors::AnchorError};
use alloy_primitives::{keccak256, Address, B256};
use alloy_provider::{Provider, ReqwestProvider};
use alloy_rpc_types_eth::{Filter, Log};
use alloy_sol_types::{SolEvent, SolValue};
use tracing::{debug, info};

/// How many blocks one backwards `eth_getLogs` window covers.
const LOG_SCAN_WINDOW: u64 = 1499;

/// How many windows are scanned before giving up on a lifecycle log.
const MAX_LOG_SCAN_WINDOWS: u64 = 256;

/// The validated trust root: what the chain itself confirms about the L2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedAnchor {
    /// The confirmed assertion's hash.
    pub assertion_hash: B256,
    /// The L2 block hash the assertion pins; the tournament's starting point.
    pub l2_block_hash: B256,
    /// The outgoing-message root the assertion pins.
    pub send_root: B256,
}

/// Hashes an assertion state the way the contract does: keccak over the ABI encoding of
/// `(bytes32[2], uint64[2], uint8, bytes32)`.
pub fn hash_assertion_state(state: &RollupCore::AssertionState) -> B256 {
    let encoded = (
        state.globalState.bytes32Vals,
        state.globalState.u64Vals,
        state.machineStatus as u64,
        state.endHistoryRoot,
    )
        .abi_encode();
    keccak256(encoded)
}

/// Chains an assertion-state hash with its parent assertion and the inbox accumulator.
pub fn assertion_chain_hash(parent: B256, state_hash: B256, inbox_acc: B256) -> B256 {
    keccak256([parent.as_slice(), state_hash.as_slice(), inbox_acc.as_slice()].concat())
}

/// Recomputes an `AssertionCreated` event's hash from its own fields and checks it against the
/// hash the event claims. Returns the (now trusted) hash.
pub fn verify_created_assertion(
    created: &RollupCore::AssertionCreated,
) -> Result<B256, AnchorError> {
    let state_hash = hash_assertion_state(&created.assertion.afterState);
    let computed =
        assertion_chain_hash(created.parentAssertionHash, state_hash, created.afterInboxBatchAcc);
    if computed != created.assertionHash {
        return Err(AnchorError::HashMismatch {
            expected: created.assertionHash,
            computed,
        });
    }
    Ok(computed)
}

/// Reads and validates the latest confirmed assertion from the rollup core contract.
#[derive(Debug, Clone)]
pub struct AnchorReader {
    provider: ReqwestProvider,
    address: Address,
}

impl AnchorReader {
    /// Creates a new [AnchorReader] over the given L1 provider and rollup core address.
    pub const fn new(provider: ReqwestProvider, address: Address) -> Self {
        Self { provider, address }
    }

    /// Creates a new [AnchorReader] from an L1 RPC URL.
    pub fn new_http(url: reqwest::Url, address: Address) -> Self {
        Self::new(ReqwestProvider::new_http(url), address)
    }

    /// Fetches, recomputes, and contract-validates the latest confirmed assertion.
    ///
    /// This is the one place where failure aborts the run: without a validated anchor there is
    /// nothing to bootstrap trust from.
    pub async fn trusted_anchor(&self) -> Result<TrustedAnchor, AnchorError> {
        let contract = RollupCore::new(self.address, self.provider.clone());
        let latest = contract
            .latestConfirmed()
            .call()
            .await
            .map_err(|e| AnchorError::Transport(e.to_string()))?
            ._0;
        info!(target: "anchor", assertion = %latest, "latest confirmed assertion");

        let confirmed = self
            .scan_for_log(RollupCore::AssertionConfirmed::SIGNATURE_HASH, latest, "AssertionConfirmed")
            .await?
            .log_decode::<RollupCore::AssertionConfirmed>()
            .map_err(|e| AnchorError::Transport(e.to_string()))?
            .inner
            .data;

        let created = self
            .scan_for_log(RollupCore::AssertionCreated::SIGNATURE_HASH, latest, "AssertionCreated")
            .await?
            .log_decode::<RollupCore::AssertionCreated>()
            .map_err(|e| AnchorError::Transport(e.to_string()))?
            .inner
            .data;

        self.validate_assertion(&created).await?;

        info!(target: "anchor", l2_block_hash = %confirmed.blockHash, "anchor validated");
        Ok(TrustedAnchor {
            assertion_hash: latest,
            l2_block_hash: confirmed.blockHash,
            send_root: confirmed.sendRoot,
        })
    }

    /// Validates a created assertion: recompute the hash locally, then have the contract check
    /// the hash and both config bindings.
    async fn validate_assertion(
        &self,
        created: &RollupCore::AssertionCreated,
    ) -> Result<(), AnchorError> {
        let computed = verify_created_assertion(created)?;

        let contract = RollupCore::new(self.address, self.provider.clone());
        contract
            .validateAssertionHash(
                computed,
                created.assertion.afterState.clone(),
                created.parentAssertionHash,
                created.afterInboxBatchAcc,
            )
            .call()
            .await
            .map_err(|e| AnchorError::ContractRejected(format!("assertion hash: {e}")))?;

        contract
            .validateConfig(
                created.parentAssertionHash,
                created.assertion.beforeStateData.configData.clone(),
            )
            .call()
            .await
            .map_err(|e| AnchorError::ContractRejected(format!("parent config: {e}")))?;

        let current_config = RollupCore::ConfigData {
            wasmModuleRoot: created.wasmModuleRoot,
            requiredStake: created.requiredStake,
            challengeManager: created.challengeManager,
            confirmPeriodBlocks: created.confirmPeriodBlocks,
            nextInboxPosition: created.inboxMaxCount.as_limbs()[0],
        };
        contract
            .validateConfig(created.assertionHash, current_config)
            .call()
            .await
            .map_err(|e| AnchorError::ContractRejected(format!("new config: {e}")))?;

        Ok(())
    }

    /// Scans backwards from the chain head in bounded windows for the first log matching the
    /// event signature and the indexed assertion hash.
    async fn scan_for_log(
        &self,
        signature: B256,
        assertion_hash: B256,
        name: &'static str,
    ) -> Result<Log, AnchorError> {
        let mut upper = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| AnchorError::Transport(e.to_string()))?;

        for _ in 0..MAX_LOG_SCAN_WINDOWS {
            let lower = upper.saturating_sub(LOG_SCAN_WINDOW);
            let filter = Filter::new()
                .address(self.address)
                .event_signature(signature)
                .topic1(assertion_hash)
                .from_block(lower)
                .to_block(upper);

            match self.provider.get_logs(&filter).await {
                Ok(logs) => {
                    if let Some(log) = logs.into_iter().next() {
                        return Ok(log);
                    }
                }
                Err(err) => {
                    // Providers cap result sizes unpredictably; slide the window and retry.
                    debug!(target: "anchor", %err, lower, upper, "log window query failed");
                }
            }

            if lower == 0 {
                break;
            }
            upper = lower.saturating_sub(1);
        }

        Err(AnchorError::LogMissing(name, assertion_hash))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::{Address, U256};

    fn sample_state() -> RollupCore::AssertionState {
        RollupCore::AssertionState {
            globalState: RollupCore::GlobalState {
                bytes32Vals: [B256::with_last_byte(0xAA), B256::with_last_byte(0xBB)],
                u64Vals: [41, 7],
            },
            machineStatus: 1,
            endHistoryRoot: B256::with_last_byte(0xCC),
        }
    }

    fn sample_created() -> RollupCore::AssertionCreated {
        let after_state = sample_state();
        let parent = B256::with_last_byte(0x01);
        let inbox_acc = B256::with_last_byte(0x02);
        let assertion_hash =
            assertion_chain_hash(parent, hash_assertion_state(&after_state), inbox_acc);
        RollupCore::AssertionCreated {
            assertionHash: assertion_hash,
            parentAssertionHash: parent,
            assertion: RollupCore::AssertionInputs {
                beforeStateData: RollupCore::BeforeStateData {
                    prevPrevAssertionHash: B256::ZERO,
                    sequencerBatchAcc: B256::ZERO,
                    configData: RollupCore::ConfigData {
                        wasmModuleRoot: B256::ZERO,
                        requiredStake: U256::from(100u64),
                        challengeManager: Address::with_last_byte(9),
                        confirmPeriodBlocks: 20,
                        nextInboxPosition: 1,
                    },
                },
                beforeState: sample_state(),
                afterState: after_state,
            },
            afterInboxBatchAcc: inbox_acc,
            inboxMaxCount: U256::from(2u64),
            wasmModuleRoot: B256::ZERO,
            requiredStake: U256::from(100u64),
            challengeManager: Address::with_last_byte(9),
            confirmPeriodBlocks: 20,
        }
    }

    #[test]
    fn test_state_hash_is_packed_abi_encoding() {
        let state = sample_state();
        let encoded = (
            state.globalState.bytes32Vals,
            state.globalState.u64Vals,
            state.machineStatus as u64,
            state.endHistoryRoot,
        )
            .abi_encode();
        // bytes32[2] + uint64[2] + uint8 + bytes32, all statically encoded.
        assert_eq!(encoded.len(), 64 + 64 + 32 + 32);
        assert_eq!(hash_assertion_state(&state), keccak256(encoded));
    }

    #[test]
    fn test_state_hash_covers_every_field() {
        let base = hash_assertion_state(&sample_state());

        let mut tampered = sample_state();
        tampered.machineStatus = 2;
        assert_ne!(hash_assertion_state(&tampered), base);

        let mut tampered = sample_state();
        tampered.globalState.u64Vals[1] += 1;
        assert_ne!(hash_assertion_state(&tampered), base);

        let mut tampered = sample_state();
        tampered.endHistoryRoot = B256::ZERO;
        assert_ne!(hash_assertion_state(&tampered), base);
    }

    #[test]
    fn test_chain_hash_links_parent_and_accumulator() {
        let state_hash = B256::with_last_byte(3);
        let base = assertion_chain_hash(B256::with_last_byte(1), state_hash, B256::with_last_byte(2));
        assert_ne!(
            assertion_chain_hash(B256::with_last_byte(9), state_hash, B256::with_last_byte(2)),
            base
        );
        assert_ne!(
            assertion_chain_hash(B256::with_last_byte(1), state_hash, B256::with_last_byte(9)),
            base
        );
    }

    #[test]
    fn test_verify_created_assertion_accepts_honest_event() {
        let created = sample_created();
        assert_eq!(verify_created_assertion(&created).unwrap(), created.assertionHash);
    }

    #[test]
    fn test_verify_created_assertion_rejects_tampered_hash() {
        let mut created = sample_created();
        created.assertionHash = B256::with_last_byte(0xEE);
        let err = verify_created_assertion(&created).unwrap_err();
        assert!(matches!(err, AnchorError::HashMismatch { expected, .. } if expected == created.assertionHash));
    }

    #[test]
    fn test_verify_created_assertion_rejects_tampered_state() {
        let mut created = sample_created();
        created.assertion.afterState.machineStatus = 0;
        assert!(verify_created_assertion(&created).is_err());
    }
}
