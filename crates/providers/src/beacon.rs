//! The beacon client and the blob-backed data-availability reader.

use crate::{errors::ProviderError, retry::with_retry};
use alloy_eips::eip4844::Blob;
use alloy_primitives::{Bytes, B256};
use alloy_rlp::Decodable;
use alloy_provider::{Provider, ReqwestProvider};
use alloy_rpc_types_beacon::sidecar::{BeaconBlobBundle, BlobData};
use alloy_rpc_types_eth::BlockTransactionsKind;
use async_trait::async_trait;
use litmus_inbox::{is_blob_hashes_header_byte, DaReader, DaReaderError};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::debug;

/// The config spec beacon api method.
const SPEC_METHOD: &str = "eth/v1/config/spec";

/// The beacon genesis api method.
const GENESIS_METHOD: &str = "eth/v1/beacon/genesis";

/// The blob sidecars api method prefix.
const SIDECARS_METHOD_PREFIX: &str = "eth/v1/beacon/blob_sidecars";

/// The version byte of a KZG versioned hash.
const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// A reduced genesis data.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct ReducedGenesisData {
    /// The genesis time.
    #[serde(rename = "genesis_time")]
    #[serde(with = "quantity_string")]
    pub(crate) genesis_time: u64,
}

/// An API genesis response.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct APIGenesisResponse {
    pub(crate) data: ReducedGenesisData,
}

/// A reduced config data.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct ReducedConfigData {
    /// The seconds per slot.
    #[serde(rename = "SECONDS_PER_SLOT")]
    #[serde(with = "quantity_string")]
    pub(crate) seconds_per_slot: u64,
}

/// An API config response.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct APIConfigResponse {
    pub(crate) data: ReducedConfigData,
}

/// Beacon API quantities arrive as decimal strings.
mod quantity_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A thin wrapper around the beacon REST API.
#[derive(Debug, Clone)]
pub struct OnlineBeaconClient {
    base: String,
    inner: reqwest::Client,
}

impl OnlineBeaconClient {
    /// Creates a new [OnlineBeaconClient] from the given base URL.
    pub fn new_http(mut base: String) -> Self {
        // If base ends with a slash, remove it
        if base.ends_with('/') {
            base.remove(base.len() - 1);
        }
        Self { base, inner: reqwest::Client::new() }
    }

    pub(crate) async fn config_spec(&self) -> Result<APIConfigResponse, ProviderError> {
        let response = self
            .inner
            .get(format!("{}/{}", self.base, SPEC_METHOD))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        response
            .json::<APIConfigResponse>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }

    pub(crate) async fn beacon_genesis(&self) -> Result<APIGenesisResponse, ProviderError> {
        let response = self
            .inner
            .get(format!("{}/{}", self.base, GENESIS_METHOD))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        response
            .json::<APIGenesisResponse>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }

    /// Fetches every blob sidecar confirmed in the given slot.
    pub(crate) async fn blob_sidecars(&self, slot: u64) -> Result<Vec<BlobData>, ProviderError> {
        let response = self
            .inner
            .get(format!("{}/{}/{}", self.base, SIDECARS_METHOD_PREFIX, slot))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let bundle = response
            .json::<BeaconBlobBundle>()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(bundle.data)
    }
}

/// The EIP-4844 versioned hash of a KZG commitment.
fn versioned_hash(commitment: &[u8]) -> B256 {
    let mut hash: [u8; 32] = Sha256::digest(commitment).into();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    B256::from(hash)
}

/// Unpacks blob field elements back into the batch payload.
///
/// The sequencer packs 31 data bytes per 32-byte field element (the first byte of each element
/// stays clear of the modulus), and length-frames the whole payload as one RLP byte string, so
/// trailing padding falls away on decode.
pub fn decode_blobs(blobs: &[Blob]) -> Result<Bytes, ProviderError> {
    let mut packed = Vec::with_capacity(blobs.len() * Blob::len_bytes() * 31 / 32);
    for blob in blobs {
        for field_element in blob.chunks(32) {
            packed.extend_from_slice(&field_element[1..]);
        }
    }
    Bytes::decode(&mut packed.as_slice())
        .map_err(|e| ProviderError::MalformedResponse(format!("blob payload rlp: {e}")))
}

/// Parses the versioned hash list out of a blob batch payload (everything after the fixed
/// header and the marker byte).
fn parse_blob_hash_list(data: &[u8]) -> Result<Vec<B256>, ProviderError> {
    let body = data
        .get(41..)
        .ok_or_else(|| ProviderError::MalformedResponse("blob batch too short".into()))?;
    if body.is_empty() || body.len() % 32 != 0 {
        return Err(ProviderError::MalformedResponse(format!(
            "blob hash list has invalid length {}",
            body.len()
        )));
    }
    Ok(body.chunks(32).map(B256::from_slice).collect())
}

/// A [DaReader] that recovers batch payloads from EIP-4844 blobs via the beacon API.
///
/// The L1 block that delivered the batch authenticates the lookup: its timestamp pins the slot,
/// and the versioned hashes in the (contract-authenticated) payload pin the blob contents.
#[derive(Debug)]
pub struct BlobReader {
    beacon: OnlineBeaconClient,
    l1: ReqwestProvider,
    /// `(genesis_time, seconds_per_slot)`, loaded once on first use.
    slot_config: OnceCell<(u64, u64)>,
}

impl BlobReader {
    /// Creates a new [BlobReader] over the given beacon client and L1 provider.
    pub fn new(beacon: OnlineBeaconClient, l1: ReqwestProvider) -> Self {
        Self { beacon, l1, slot_config: OnceCell::new() }
    }

    /// Creates a new [BlobReader] from a beacon client and an L1 RPC URL.
    pub fn new_http(beacon: OnlineBeaconClient, l1_url: reqwest::Url) -> Self {
        Self::new(beacon, ReqwestProvider::new_http(l1_url))
    }

    async fn slot_for_block(&self, block_hash: B256) -> Result<u64, ProviderError> {
        let (genesis_time, seconds_per_slot) = *self
            .slot_config
            .get_or_try_init(|| async {
                let genesis = self.beacon.beacon_genesis().await?.data.genesis_time;
                let interval = self.beacon.config_spec().await?.data.seconds_per_slot;
                Ok::<_, ProviderError>((genesis, interval))
            })
            .await?;

        let block = with_retry("eth_getBlockByHash", || {
            self.l1.get_block_by_hash(block_hash, BlockTransactionsKind::Hashes)
        })
        .await
        .map_err(|e| ProviderError::Transport(e.to_string()))?
        .ok_or_else(|| ProviderError::NotFound(format!("l1 block {block_hash}")))?;

        let timestamp = block.header.timestamp;
        if timestamp < genesis_time {
            return Err(ProviderError::MalformedResponse(
                "block timestamp predates beacon genesis".into(),
            ));
        }
        Ok((timestamp - genesis_time) / seconds_per_slot)
    }
}

#[async_trait]
impl DaReader for BlobReader {
    fn is_valid_header_byte(&self, byte: u8) -> bool {
        is_blob_hashes_header_byte(byte)
    }

    async fn recover_payload(
        &self,
        batch_num: u64,
        batch_block_hash: B256,
        data: &[u8],
    ) -> Result<Bytes, DaReaderError> {
        let requested = parse_blob_hash_list(data)
            .map_err(|e| DaReaderError::Recovery(e.to_string()))?;
        let slot = self
            .slot_for_block(batch_block_hash)
            .await
            .map_err(|e| DaReaderError::Recovery(e.to_string()))?;
        debug!(target: "blob_reader", batch_num, slot, blobs = requested.len(), "recovering blob batch");

        let sidecars = self
            .beacon
            .blob_sidecars(slot)
            .await
            .map_err(|e| DaReaderError::Recovery(e.to_string()))?;

        // Select sidecars in the order the batch names them, matching on versioned hash.
        let mut blobs = Vec::with_capacity(requested.len());
        for hash in &requested {
            let sidecar = sidecars
                .iter()
                .find(|sidecar| versioned_hash(sidecar.kzg_commitment.as_ref()) == *hash)
                .ok_or_else(|| {
                    DaReaderError::Recovery(format!("no sidecar with versioned hash {hash}"))
                })?;
            blobs.push(*sidecar.blob);
        }

        decode_blobs(&blobs).map_err(|e| DaReaderError::Recovery(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_rlp::Encodable;

    /// Packs a payload into blobs the way the sequencer does: RLP length framing, then 31 data
    /// bytes per field element.
    fn encode_blobs(payload: &[u8]) -> Vec<Blob> {
        let mut framed = Vec::new();
        Bytes::copy_from_slice(payload).encode(&mut framed);

        let mut blobs = Vec::new();
        for blob_chunk in framed.chunks(31 * (Blob::len_bytes() / 32)) {
            let mut blob = [0u8; 131072];
            for (i, fe_chunk) in blob_chunk.chunks(31).enumerate() {
                blob[i * 32 + 1..i * 32 + 1 + fe_chunk.len()].copy_from_slice(fe_chunk);
            }
            blobs.push(Blob::from(blob));
        }
        blobs
    }

    #[test]
    fn test_blob_round_trip() {
        let payload = b"a batch payload that spans a handful of field elements".repeat(20);
        let blobs = encode_blobs(&payload);
        assert_eq!(decode_blobs(&blobs).unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let blob = Blob::from([0xFFu8; 131072]);
        assert!(decode_blobs(&[blob]).is_err());
    }

    #[test]
    fn test_versioned_hash_version_byte() {
        let hash = versioned_hash(&[0u8; 48]);
        assert_eq!(hash[0], VERSIONED_HASH_VERSION_KZG);
    }

    #[test]
    fn test_parse_blob_hash_list() {
        let mut data = vec![0u8; 40];
        data.push(litmus_inbox::BLOB_HASHES_HEADER_BYTE);
        data.extend_from_slice(B256::with_last_byte(1).as_slice());
        data.extend_from_slice(B256::with_last_byte(2).as_slice());

        let hashes = parse_blob_hash_list(&data).unwrap();
        assert_eq!(hashes, vec![B256::with_last_byte(1), B256::with_last_byte(2)]);

        // A truncated list is rejected.
        data.pop();
        assert!(parse_blob_hash_list(&data).is_err());
    }
}
