//! Prestate execution-trace types and the provider trait that fetches them.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// The prestate of one account before a transaction executed: exactly the fields the tracer's
/// non-diff mode reports. Unknown fields are rejected; the trace is a trust boundary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountPrestate {
    /// The account's balance, if read.
    pub balance: Option<U256>,
    /// The account's code, if read.
    pub code: Option<Bytes>,
    /// The account's nonce, if read.
    pub nonce: Option<u64>,
    /// The storage slots read, keyed by slot.
    pub storage: Option<HashMap<B256, B256>>,
}

/// The prestate trace of a single transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TxPrestate {
    /// The traced transaction's hash.
    pub tx_hash: B256,
    /// Accounts read before execution, with the parts of their state that were read.
    pub result: HashMap<Address, AccountPrestate>,
}

/// Fetches prestate traces from an execution-trace service.
#[async_trait]
pub trait TraceProvider {
    /// The error type for trace failures.
    type Error: std::fmt::Display + Send;

    /// Returns the per-transaction prestate trace of the block with the given hash, in
    /// non-diff mode: every account and slot read before each transaction executes.
    async fn prestate_trace(&self, block_hash: B256) -> Result<Vec<TxPrestate>, Self::Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parses_tracer_output() {
        let raw = r#"[{
            "txHash": "0x52969d4839b6b0d72c0ae97f344b56dd54c961d4ee05dae3dd0bcf76f02c871e",
            "result": {
                "0x5e1497dd1f08c87b2d8fe23e9aab6c1de833d927": {
                    "balance": "0xde0b6b3a7640000",
                    "nonce": 3,
                    "storage": {
                        "0x0000000000000000000000000000000000000000000000000000000000000002": "0x0000000000000000000000000000000000000000000000000000000000000001"
                    }
                },
                "0x0000000000000000000000000000000000000064": {
                    "balance": "0x0"
                }
            }
        }]"#;
        let trace: Vec<TxPrestate> = serde_json::from_str(raw).unwrap();
        assert_eq!(trace.len(), 1);
        assert_eq!(trace[0].result.len(), 2);
        let account = &trace[0].result
            [&"0x5e1497dd1f08c87b2d8fe23e9aab6c1de833d927".parse::<Address>().unwrap()];
        assert_eq!(account.nonce, Some(3));
        assert_eq!(account.storage.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let raw = r#"[{
            "txHash": "0x52969d4839b6b0d72c0ae97f344b56dd54c961d4ee05dae3dd0bcf76f02c871e",
            "result": {
                "0x5e1497dd1f08c87b2d8fe23e9aab6c1de833d927": { "surprise": true }
            }
        }]"#;
        assert!(serde_json::from_str::<Vec<TxPrestate>>(raw).is_err());
    }
}
