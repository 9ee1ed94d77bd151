//! Solidity bindings for the rollup core contract surface this client consumes.

#![allow(missing_docs, missing_debug_implementations, unreachable_pub)]

use alloy_sol_types::sol;

sol! {
    /// The confirmed-assertion surface of the rollup core contract: the two assertion
    /// lifecycle events, the latest-confirmed pointer, and the pure/view validators used to
    /// cross-check locally recomputed hashes.
    #[sol(rpc)]
    interface RollupCore {
        struct GlobalState {
            bytes32[2] bytes32Vals;
            uint64[2] u64Vals;
        }

        struct AssertionState {
            GlobalState globalState;
            uint8 machineStatus;
            bytes32 endHistoryRoot;
        }

        struct ConfigData {
            bytes32 wasmModuleRoot;
            uint256 requiredStake;
            address challengeManager;
            uint64 confirmPeriodBlocks;
            uint64 nextInboxPosition;
        }

        struct BeforeStateData {
            bytes32 prevPrevAssertionHash;
            bytes32 sequencerBatchAcc;
            ConfigData configData;
        }

        struct AssertionInputs {
            BeforeStateData beforeStateData;
            AssertionState beforeState;
            AssertionState afterState;
        }

        struct AssertionNode {
            uint64 firstChildBlock;
            uint64 secondChildBlock;
            uint64 createdAtBlock;
            bool isFirstChild;
            uint8 status;
            bytes32 configHash;
        }

        event AssertionConfirmed(bytes32 indexed assertionHash, bytes32 blockHash, bytes32 sendRoot);

        event AssertionCreated(
            bytes32 indexed assertionHash,
            bytes32 indexed parentAssertionHash,
            AssertionInputs assertion,
            bytes32 afterInboxBatchAcc,
            uint256 inboxMaxCount,
            bytes32 wasmModuleRoot,
            uint256 requiredStake,
            address challengeManager,
            uint64 confirmPeriodBlocks
        );

        function latestConfirmed() external view returns (bytes32);

        function getAssertion(bytes32 assertionHash) external view returns (AssertionNode memory);

        function validateAssertionHash(
            bytes32 assertionHash,
            AssertionState calldata state,
            bytes32 prevAssertionHash,
            bytes32 inboxAcc
        ) external pure;

        function validateConfig(bytes32 assertionHash, ConfigData calldata configData) external view;
    }
}
