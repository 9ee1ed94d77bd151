//! The prover RPC client: the standard eth namespace, the light-client extension namespace,
//! and prestate tracing, over one untrusted L2 endpoint.

use crate::{errors::ProviderError, retry::with_retry};
use alloy_consensus::Header;
use alloy_primitives::{Address, Bytes, B256, U64};
use alloy_provider::{Provider, ReqwestProvider};
use alloy_rlp::Decodable;
use async_trait::async_trait;
use litmus_inbox::{L1TrackingRecord, L2TrackingRecord};
use litmus_state::{ProofResponse, StateProofProvider, TraceProvider, TxPrestate};
use litmus_tournament::ProverNode;
use serde::Deserialize;

/// The chain id whose block numbering starts above zero.
pub const ARBITRUM_ONE_CHAIN_ID: u64 = 42_161;

/// The first L2 block of the offset chain. Message indices are zero-based; block numbers on
/// that chain are not.
pub const ARBITRUM_ONE_GENESIS_BLOCK: u64 = 22_207_817;

/// The response of `lightclient_getLatestIndexL1`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct L1IndexResponse {
    state_index: u64,
}

/// A client for one prover endpoint.
///
/// Heights exposed by this type are always *chain* block numbers. The `lightclient_*` namespace
/// speaks message indices (`chain height − genesis offset`); the conversion happens here at the
/// RPC boundary, in both directions, and nowhere else.
#[derive(Debug, Clone)]
pub struct ProverRpcClient {
    endpoint: String,
    inner: ReqwestProvider,
    chain_id: u64,
}

impl ProverRpcClient {
    /// Creates a new [ProverRpcClient] for the given endpoint and L2 chain id.
    pub fn new(endpoint: String, chain_id: u64) -> Result<Self, ProviderError> {
        let url = endpoint
            .parse::<reqwest::Url>()
            .map_err(|e| ProviderError::MalformedResponse(format!("endpoint url: {e}")))?;
        Ok(Self { inner: ReqwestProvider::new_http(url), endpoint, chain_id })
    }

    const fn genesis_offset(&self) -> u64 {
        if self.chain_id == ARBITRUM_ONE_CHAIN_ID {
            ARBITRUM_ONE_GENESIS_BLOCK
        } else {
            0
        }
    }

    /// Converts a chain block number into a zero-based message index.
    const fn to_message_index(&self, chain_height: u64) -> u64 {
        chain_height.saturating_sub(self.genesis_offset())
    }

    /// Converts a zero-based message index into a chain block number.
    const fn to_chain_height(&self, index: u64) -> u64 {
        index + self.genesis_offset()
    }

    /// Fetches and decodes a raw RLP header by chain block number.
    async fn raw_header_by_number(&self, number: u64) -> Result<Header, ProviderError> {
        let raw: Bytes = with_retry("debug_getRawHeader", || {
            self.inner.raw_request("debug_getRawHeader".into(), [U64::from(number)])
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Header::decode(&mut raw.as_ref())
            .map_err(|e| ProviderError::MalformedResponse(format!("raw header: {e}")))
    }

    /// Fetches and decodes a raw RLP header by block hash.
    pub async fn header_by_hash(&self, hash: B256) -> Result<Header, ProviderError> {
        let raw: Bytes = with_retry("debug_getRawHeader", || {
            self.inner.raw_request("debug_getRawHeader".into(), [hash])
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Header::decode(&mut raw.as_ref())
            .map_err(|e| ProviderError::MalformedResponse(format!("raw header: {e}")))
    }

    /// The claimed L1 record for the given chain height, from the light-client namespace.
    pub async fn l1_data_at(&self, chain_height: u64) -> Result<L1TrackingRecord, ProviderError> {
        let index = self.to_message_index(chain_height);
        with_retry("lightclient_getL1DataAt", || {
            self.inner.raw_request("lightclient_getL1DataAt".into(), [index])
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    /// The claimed tracking record at the given chain height.
    pub async fn state_at(&self, chain_height: u64) -> Result<L2TrackingRecord, ProviderError> {
        let index = self.to_message_index(chain_height);
        let mut record: L2TrackingRecord = with_retry("lightclient_getStateAt", || {
            self.inner.raw_request("lightclient_getStateAt".into(), [index])
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;
        record.l2_block_number = self.to_chain_height(record.l2_block_number);
        Ok(record)
    }
}

#[async_trait]
impl ProverNode for ProverRpcClient {
    type Error = ProviderError;

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn latest_state(&self) -> Result<L2TrackingRecord, Self::Error> {
        let index: L1IndexResponse = with_retry("lightclient_getLatestIndexL1", || {
            self.inner.raw_request("lightclient_getLatestIndexL1".into(), Vec::<u64>::new())
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let chain_tip = with_retry("eth_blockNumber", || self.inner.get_block_number())
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        // The newest fully-tracked block: one behind the claimed L1 index, clamped to what the
        // node has actually executed.
        let tracked =
            index.state_index.saturating_sub(1).min(self.to_message_index(chain_tip));
        let height = self.to_chain_height(tracked);
        let header = self.raw_header_by_number(height).await?;

        Ok(L2TrackingRecord { l2_block_number: height, l2_block_hash: header.hash_slow() })
    }

    async fn header_by_number(&self, number: u64) -> Result<Header, Self::Error> {
        self.raw_header_by_number(number).await
    }
}

#[async_trait]
impl StateProofProvider for ProverRpcClient {
    type Error = ProviderError;

    async fn proof(
        &self,
        address: Address,
        slots: Vec<B256>,
        block_number: u64,
    ) -> Result<ProofResponse, Self::Error> {
        let params = (address, slots, format!("0x{block_number:x}"));
        with_retry("eth_getProof", || {
            self.inner.raw_request("eth_getProof".into(), params.clone())
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    async fn code_at(&self, address: Address, block_number: u64) -> Result<Bytes, Self::Error> {
        let params = (address, format!("0x{block_number:x}"));
        with_retry("eth_getCode", || self.inner.raw_request("eth_getCode".into(), params.clone()))
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }
}

#[async_trait]
impl TraceProvider for ProverRpcClient {
    type Error = ProviderError;

    async fn prestate_trace(&self, block_hash: B256) -> Result<Vec<TxPrestate>, Self::Error> {
        let config = serde_json::json!({
            "tracer": "prestateTracer",
            "tracerConfig": { "diffMode": false },
        });
        let params = (block_hash, config);
        with_retry("debug_traceBlockByHash", || {
            self.inner.raw_request("debug_traceBlockByHash".into(), params.clone())
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))
    }
}
