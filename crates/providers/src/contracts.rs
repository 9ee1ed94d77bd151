//! Solidity bindings for the inbox and bridge surfaces the batch reader consumes.

#![allow(missing_docs, missing_debug_implementations, unreachable_pub)]

use alloy_sol_types::sol;

sol! {
    /// The sequencer inbox: batch delivery logs, the separate-data event, and the submission
    /// entrypoint whose calldata carries batch data for calldata-located batches.
    interface ISequencerInbox {
        struct TimeBounds {
            uint64 minTimestamp;
            uint64 maxTimestamp;
            uint64 minBlockNumber;
            uint64 maxBlockNumber;
        }

        enum BatchDataLocation {
            TxInput,
            SeparateBatchEvent,
            NoData,
            Blob
        }

        event SequencerBatchDelivered(
            uint256 indexed batchSequenceNumber,
            bytes32 indexed beforeAcc,
            bytes32 indexed afterAcc,
            bytes32 delayedAcc,
            uint256 afterDelayedMessagesRead,
            TimeBounds timeBounds,
            BatchDataLocation dataLocation
        );

        event SequencerBatchData(uint256 indexed batchSequenceNumber, bytes data);

        function addSequencerL2BatchFromOrigin(
            uint256 sequenceNumber,
            bytes calldata data,
            uint256 afterDelayedMessagesRead,
            address gasRefunder,
            uint256 prevMessageCount,
            uint256 newMessageCount
        ) external;
    }
}

sol! {
    /// The bridge: the authoritative record of delayed-message delivery.
    interface IBridge {
        event MessageDelivered(
            uint256 indexed messageIndex,
            bytes32 indexed beforeInboxAcc,
            address inbox,
            uint8 kind,
            address sender,
            bytes32 messageDataHash,
            uint256 baseFeeL1,
            uint64 timestamp
        );
    }
}

sol! {
    /// Delayed-inbox contracts emit the message payload alongside the bridge's delivery record.
    interface IDelayedMessageProvider {
        event InboxMessageDelivered(uint256 indexed messageNum, bytes data);

        event InboxMessageDeliveredFromOrigin(uint256 indexed messageNum);
    }
}
