//! Parsing of the chain-initialization message.

use alloy_primitives::{Bytes, U256};
use alloy_rlp::{Decodable, Header as RlpHeader};
use litmus_inbox::{L1IncomingMessage, L1MessageKind};
use serde_json::Value;

/// The L1 base fee assumed at chain initialization when the init message predates the versioned
/// format: 50 gwei.
pub const DEFAULT_INITIAL_L1_BASE_FEE: u64 = 50_000_000_000;

/// The parsed payload of an [L1MessageKind::Initialize] message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInitMessage {
    /// The L2 chain id.
    pub chain_id: U256,
    /// The initial L1 base fee.
    pub initial_l1_base_fee: U256,
    /// The embedded chain config, when the init message carries one.
    pub chain_config: Option<Value>,
}

impl ParsedInitMessage {
    /// Parses an initialize message's payload.
    ///
    /// Two formats exist on the wire: the legacy form is a bare 32-byte chain id; the versioned
    /// form is `rlp([chain_id, initial_l1_base_fee, chain_config_json])`.
    pub fn parse(message: &L1IncomingMessage) -> Option<Self> {
        if message.header.kind != L1MessageKind::Initialize {
            return None;
        }
        let payload = message.l2_msg.as_ref();

        if payload.len() == 32 {
            return Some(Self {
                chain_id: U256::from_be_slice(payload),
                initial_l1_base_fee: U256::from(DEFAULT_INITIAL_L1_BASE_FEE),
                chain_config: None,
            });
        }

        let mut buf = payload;
        let header = RlpHeader::decode(&mut buf).ok()?;
        if !header.list {
            return None;
        }
        let chain_id = U256::decode(&mut buf).ok()?;
        let initial_l1_base_fee = U256::decode(&mut buf).ok()?;
        let config_bytes = Bytes::decode(&mut buf).ok()?;
        let chain_config = serde_json::from_slice(&config_bytes).ok()?;

        Some(Self { chain_id, initial_l1_base_fee, chain_config: Some(chain_config) })
    }

    /// The chain config to initialize with: the embedded one, or the compiled-in fallback for
    /// init messages that carry none.
    pub fn chain_config_or_default(&self) -> Value {
        self.chain_config.clone().unwrap_or_else(|| default_chain_config(self.chain_id))
    }
}

/// The fallback chain config used when the init message embeds none.
pub fn default_chain_config(chain_id: U256) -> Value {
    serde_json::json!({
        "chainId": chain_id.to::<u64>(),
        "homesteadBlock": 0,
        "eip150Block": 0,
        "eip155Block": 0,
        "eip158Block": 0,
        "byzantiumBlock": 0,
        "constantinopleBlock": 0,
        "petersburgBlock": 0,
        "istanbulBlock": 0,
        "muirGlacierBlock": 0,
        "berlinBlock": 0,
        "londonBlock": 0,
        "clique": { "period": 0, "epoch": 0 },
        "arbitrum": {
            "EnableArbOS": true,
            "AllowDebugPrecompiles": false,
            "DataAvailabilityCommittee": false,
            "InitialArbOSVersion": 32,
            "InitialChainOwner": "0x0000000000000000000000000000000000000000",
            "GenesisBlockNum": 0
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::Address;
    use alloy_rlp::Encodable;
    use litmus_inbox::L1MessageHeader;

    fn init_message(payload: Vec<u8>) -> L1IncomingMessage {
        L1IncomingMessage {
            header: L1MessageHeader {
                kind: L1MessageKind::Initialize,
                poster: Address::ZERO,
                block_number: 0,
                timestamp: 0,
                request_id: None,
                l1_base_fee: U256::ZERO,
            },
            l2_msg: payload.into(),
            batch_gas_cost: None,
        }
    }

    #[test]
    fn test_parses_legacy_chain_id_form() {
        let chain_id = U256::from(412_346u64);
        let parsed = ParsedInitMessage::parse(&init_message(
            chain_id.to_be_bytes::<32>().to_vec(),
        ))
        .unwrap();
        assert_eq!(parsed.chain_id, chain_id);
        assert_eq!(parsed.initial_l1_base_fee, U256::from(DEFAULT_INITIAL_L1_BASE_FEE));
        assert!(parsed.chain_config.is_none());
        // The fallback config carries the parsed chain id.
        assert_eq!(parsed.chain_config_or_default()["chainId"], 412_346u64.into());
    }

    #[test]
    fn test_parses_versioned_form() {
        let config = serde_json::json!({ "chainId": 42161, "arbitrum": { "GenesisBlockNum": 0 } });
        let config_bytes = serde_json::to_vec(&config).unwrap();

        let mut payload = Vec::new();
        let chain_id = U256::from(42_161u64);
        let base_fee = U256::from(100_000_000u64);
        let body_len = chain_id.length() + base_fee.length() + Bytes::from(config_bytes.clone()).length();
        RlpHeader { list: true, payload_length: body_len }.encode(&mut payload);
        chain_id.encode(&mut payload);
        base_fee.encode(&mut payload);
        Bytes::from(config_bytes).encode(&mut payload);

        let parsed = ParsedInitMessage::parse(&init_message(payload)).unwrap();
        assert_eq!(parsed.chain_id, chain_id);
        assert_eq!(parsed.initial_l1_base_fee, base_fee);
        assert_eq!(parsed.chain_config_or_default(), config);
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let mut message = init_message(vec![0u8; 32]);
        message.header.kind = L1MessageKind::L2Message;
        assert!(ParsedInitMessage::parse(&message).is_none());
    }

    #[test]
    fn test_rejects_garbage_payload() {
        assert!(ParsedInitMessage::parse(&init_message(vec![0xff, 0x01, 0x02])).is_none());
    }
}
