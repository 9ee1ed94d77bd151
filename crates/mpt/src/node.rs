//! This module contains the [TrieNode] type, which represents a node within a standard Merkle
//! Patricia Trie.

use crate::{
    errors::TrieNodeResult,
    util::{rlp_list_element_length, unpack_path_to_nibbles},
    NodeFetcher, TrieNodeError,
};
use alloy_primitives::{keccak256, Bytes, B256};
use alloy_rlp::{length_of_length, Buf, Decodable, Encodable, Header, EMPTY_STRING_CODE};
use alloy_trie::{nodes::encode_path_leaf, Nibbles, EMPTY_ROOT_HASH};

/// The length of the branch list when RLP encoded.
const BRANCH_LIST_LENGTH: usize = 17;

/// The length of a leaf or extension node's RLP encoded list.
const LEAF_OR_EXTENSION_LIST_LENGTH: usize = 2;

/// The number of nibbles traversed in a branch node.
const BRANCH_NODE_NIBBLES: usize = 1;

/// Prefix for even-nibbled extension node paths.
const PREFIX_EXTENSION_EVEN: u8 = 0;

/// Prefix for odd-nibbled extension node paths.
const PREFIX_EXTENSION_ODD: u8 = 1;

/// Prefix for even-nibbled leaf node paths.
const PREFIX_LEAF_EVEN: u8 = 2;

/// Prefix for odd-nibbled leaf node paths.
const PREFIX_LEAF_ODD: u8 = 3;

/// Nibble bit width.
const NIBBLE_WIDTH: usize = 4;

/// A [TrieNode] is a node within a standard Ethereum Merkle Patricia Trie. Keys are fixed-size
/// nibble sequences (hashed addresses or slots), values are arbitrary byte strings.
///
/// Nodes whose RLP encoding is 32 bytes or longer are *blinded*: replaced by their keccak-256
/// commitment. Walking through a blinded node requires opening it against a [NodeFetcher]
/// (in this crate, the [crate::ProofStore] populated from an `eth_getProof` response), so a
/// walk only ever succeeds over nodes whose preimages were actually supplied.
///
/// The [alloy_rlp::Encodable] and [alloy_rlp::Decodable] implementations blind children longer
/// than 32 bytes on encode, and leave blinded nodes in place on decode.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TrieNode {
    /// An empty [TrieNode] is represented as an [EMPTY_STRING_CODE] (0x80).
    Empty,
    /// A blinded node is a node that has been replaced by a [keccak256] commitment.
    Blinded {
        /// The commitment that blinds the node.
        commitment: B256,
    },
    /// A leaf node is a 2-item node with the encoding `rlp([encoded_path, value])`.
    Leaf {
        /// The key of the leaf node
        prefix: Nibbles,
        /// The value of the leaf node
        value: Bytes,
    },
    /// An extension node is a 2-item pointer node with the encoding `rlp([encoded_path, key])`.
    Extension {
        /// The path prefix of the extension
        prefix: Nibbles,
        /// The pointer to the child node
        node: Box<TrieNode>,
    },
    /// A branch node refers to up to 16 child nodes with the encoding `rlp([ v0, ..., v15, value ])`.
    Branch {
        /// The 16 child nodes and value of the branch.
        stack: Vec<TrieNode>,
    },
}

impl TrieNode {
    /// Creates a new [TrieNode::Blinded] node from a commitment.
    pub const fn new_blinded(commitment: B256) -> Self {
        Self::Blinded { commitment }
    }

    /// Returns the commitment of a [TrieNode::Blinded] node, if `self` is of the
    /// [TrieNode::Blinded] variant.
    pub const fn blinded_commitment(&self) -> Option<B256> {
        match self {
            Self::Blinded { commitment } => Some(*commitment),
            _ => None,
        }
    }

    /// Blinds the [TrieNode] if its encoded length is longer than an encoded [B256] string in
    /// length. A [TrieNode::Blinded] node is left as-is.
    pub fn blind(&mut self) {
        if self.length() >= B256::ZERO.len() && !matches!(self, Self::Blinded { .. }) {
            let mut rlp_buf = Vec::with_capacity(self.length());
            self.encode_in_place(&mut rlp_buf);
            *self = Self::Blinded { commitment: keccak256(rlp_buf) }
        }
    }

    /// Computes the keccak commitment of the node's RLP encoding. The root of a trie is always
    /// addressed by hash, even when the encoding is shorter than 32 bytes.
    pub fn root(&mut self) -> B256 {
        let mut rlp_buf = Vec::with_capacity(self.length());
        self.encode_in_place(&mut rlp_buf);
        keccak256(rlp_buf)
    }

    /// Unblinds the [TrieNode] if it is a [TrieNode::Blinded] node, fetching the preimage of the
    /// commitment from the `fetcher`.
    pub fn unblind<F: NodeFetcher>(&mut self, fetcher: &F) -> TrieNodeResult<()> {
        if let Self::Blinded { commitment } = self {
            if *commitment == EMPTY_ROOT_HASH {
                // The commitment of the empty node; no preimage to fetch.
                *self = Self::Empty;
            } else {
                let commitment = *commitment;
                let rlp = fetcher
                    .node_preimage(commitment)
                    .map_err(|_| TrieNodeError::MissingPreimage(commitment))?;
                *self = Self::decode(&mut rlp.as_ref()).map_err(TrieNodeError::Rlp)?;
            }
        }
        Ok(())
    }

    /// Walks down the trie to a leaf value with the given key, if it exists. Preimages for blinded
    /// nodes along the path are resolved through the `fetcher` and persisted in the inner
    /// [TrieNode] elements.
    ///
    /// Returns `Ok(None)` if the key provably does not exist below `self`, and an error if a node
    /// on the path could not be resolved or decoded.
    pub fn open<'a, F: NodeFetcher>(
        &'a mut self,
        path: &Nibbles,
        fetcher: &F,
    ) -> TrieNodeResult<Option<&'a mut Bytes>> {
        match self {
            Self::Branch { ref mut stack } => {
                let branch_nibble = path[0] as usize;
                stack
                    .get_mut(branch_nibble)
                    .map(|node| node.open(&path.slice(BRANCH_NODE_NIBBLES..), fetcher))
                    .unwrap_or(Ok(None))
            }
            Self::Leaf { prefix, value } => {
                Ok((path.as_slice() == prefix.as_slice()).then_some(value))
            }
            Self::Extension { prefix, node } => {
                if path.len() >= prefix.len()
                    && path.slice(..prefix.len()).as_slice() == prefix.as_slice()
                {
                    // Follow extension branch
                    node.unblind(fetcher)?;
                    node.open(&path.slice(prefix.len()..), fetcher)
                } else {
                    Ok(None)
                }
            }
            Self::Blinded { .. } => {
                self.unblind(fetcher)?;
                self.open(path, fetcher)
            }
            Self::Empty => Ok(None),
        }
    }

    /// Inserts a value at the given path into the trie rooted at `self`, resolving blinded nodes
    /// on the path through the `fetcher`.
    pub fn insert<F: NodeFetcher>(
        &mut self,
        path: &Nibbles,
        value: Bytes,
        fetcher: &F,
    ) -> TrieNodeResult<()> {
        match self {
            Self::Empty => {
                // If the trie node is null, insert the leaf node at the current path.
                *self = Self::Leaf { prefix: path.clone(), value };
                Ok(())
            }
            Self::Leaf { prefix, value: leaf_value } => {
                let shared_extension_nibbles = path.common_prefix_length(prefix);

                // If all nibbles are shared, update the leaf node with the new value.
                if path.as_slice() == prefix.as_slice() {
                    *self = Self::Leaf { prefix: prefix.clone(), value };
                    return Ok(());
                }

                // Create a branch node stack containing the leaf node and the new value.
                let mut stack = vec![Self::Empty; BRANCH_LIST_LENGTH];

                // Insert the shortened extension into the branch stack.
                let extension_nibble = prefix[shared_extension_nibbles] as usize;
                stack[extension_nibble] = Self::Leaf {
                    prefix: prefix.slice(shared_extension_nibbles + BRANCH_NODE_NIBBLES..),
                    value: leaf_value.clone(),
                };

                // Insert the new value into the branch stack.
                let branch_nibble_new = path[shared_extension_nibbles] as usize;
                stack[branch_nibble_new] = Self::Leaf {
                    prefix: path.slice(shared_extension_nibbles + BRANCH_NODE_NIBBLES..),
                    value,
                };

                // Replace the leaf node with the branch if no nibbles are shared, else create an
                // extension.
                if shared_extension_nibbles == 0 {
                    *self = Self::Branch { stack };
                } else {
                    let raw_ext_nibbles = path.slice(..shared_extension_nibbles);
                    *self = Self::Extension {
                        prefix: raw_ext_nibbles,
                        node: Box::new(Self::Branch { stack }),
                    };
                }
                Ok(())
            }
            Self::Extension { prefix, node } => {
                let shared_extension_nibbles = path.common_prefix_length(prefix);
                if shared_extension_nibbles == prefix.len() {
                    node.unblind(fetcher)?;
                    node.insert(&path.slice(shared_extension_nibbles..), value, fetcher)?;
                    return Ok(());
                }

                // Create a branch node stack containing the leaf node and the new value.
                let mut stack = vec![Self::Empty; BRANCH_LIST_LENGTH];

                // Insert the shortened extension into the branch stack.
                let extension_nibble = prefix[shared_extension_nibbles] as usize;
                let new_prefix = prefix.slice(shared_extension_nibbles + BRANCH_NODE_NIBBLES..);
                stack[extension_nibble] = if new_prefix.is_empty() {
                    // In the case that the extension node no longer has a prefix, insert the node
                    // verbatim into the branch.
                    node.as_ref().clone()
                } else {
                    Self::Extension { prefix: new_prefix, node: node.clone() }
                };

                // Insert the new value into the branch stack.
                let branch_nibble_new = path[shared_extension_nibbles] as usize;
                stack[branch_nibble_new] = Self::Leaf {
                    prefix: path.slice(shared_extension_nibbles + BRANCH_NODE_NIBBLES..),
                    value,
                };

                // Replace the extension node with the branch if no nibbles are shared, else create
                // an extension.
                if shared_extension_nibbles == 0 {
                    *self = Self::Branch { stack };
                } else {
                    let extension = path.slice(..shared_extension_nibbles);
                    *self = Self::Extension {
                        prefix: extension,
                        node: Box::new(Self::Branch { stack }),
                    };
                }
                Ok(())
            }
            Self::Branch { stack } => {
                // Follow the branch node to the next node in the path.
                let branch_nibble = path[0] as usize;
                stack[branch_nibble].unblind(fetcher)?;
                stack[branch_nibble].insert(&path.slice(BRANCH_NODE_NIBBLES..), value, fetcher)
            }
            Self::Blinded { .. } => {
                // If a blinded node is approached, reveal the node and continue the insertion
                // recursion.
                self.unblind(fetcher)?;
                self.insert(path, value, fetcher)
            }
        }
    }

    /// Alternative to the [Encodable::encode] implementation for this type that blinds children
    /// in place throughout the encoding process, avoiding clones when the open node cache is no
    /// longer required.
    pub fn encode_in_place(&mut self, out: &mut dyn alloy_rlp::BufMut) {
        let payload_length = self.payload_length();
        match self {
            Self::Empty => out.put_u8(EMPTY_STRING_CODE),
            Self::Blinded { commitment } => commitment.encode(out),
            Self::Leaf { prefix, value } => {
                // Encode the leaf node's header and key-value pair.
                Header { list: true, payload_length }.encode(out);
                encode_path_leaf(prefix, true).as_slice().encode(out);
                value.encode(out);
            }
            Self::Extension { prefix, node } => {
                // Encode the extension node's header, prefix, and pointer node.
                Header { list: true, payload_length }.encode(out);
                encode_path_leaf(prefix, false).as_slice().encode(out);
                node.blind();
                node.encode_in_place(out);
            }
            Self::Branch { stack } => {
                // In branch nodes, elements longer than 32 bytes are blinded before encoding.
                Header { list: true, payload_length }.encode(out);
                stack.iter_mut().for_each(|node| {
                    node.blind();
                    node.encode_in_place(out);
                });
            }
        }
    }

    /// Attempts to convert a `path` and `value` into a [TrieNode], if they correspond to a
    /// [TrieNode::Leaf] or [TrieNode::Extension].
    ///
    /// **Note:** This function assumes that the passed reader has already consumed the RLP header
    /// of the [TrieNode::Leaf] or [TrieNode::Extension] node.
    fn try_decode_leaf_or_extension_payload(buf: &mut &[u8]) -> TrieNodeResult<Self> {
        // Decode the path and value of the leaf or extension node.
        let path = Bytes::decode(buf).map_err(TrieNodeError::Rlp)?;
        if path.is_empty() {
            return Err(TrieNodeError::InvalidNodeType);
        }
        let first_nibble = path[0] >> NIBBLE_WIDTH;
        let first = match first_nibble {
            PREFIX_EXTENSION_ODD | PREFIX_LEAF_ODD => Some(path[0] & 0x0F),
            PREFIX_EXTENSION_EVEN | PREFIX_LEAF_EVEN => None,
            _ => return Err(TrieNodeError::InvalidNodeType),
        };

        // Check the high-order nibble of the path to determine the type of node.
        match first_nibble {
            PREFIX_EXTENSION_EVEN | PREFIX_EXTENSION_ODD => {
                // Extension node
                let extension_node_value = Self::decode(buf).map_err(TrieNodeError::Rlp)?;
                Ok(Self::Extension {
                    prefix: unpack_path_to_nibbles(first, path[1..].as_ref()),
                    node: Box::new(extension_node_value),
                })
            }
            PREFIX_LEAF_EVEN | PREFIX_LEAF_ODD => {
                // Leaf node
                let value = Bytes::decode(buf).map_err(TrieNodeError::Rlp)?;
                Ok(Self::Leaf { prefix: unpack_path_to_nibbles(first, path[1..].as_ref()), value })
            }
            _ => Err(TrieNodeError::InvalidNodeType),
        }
    }

    /// Returns the RLP payload length of the [TrieNode].
    pub(crate) fn payload_length(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Blinded { commitment } => commitment.len(),
            Self::Leaf { prefix, value } => {
                let mut encoded_key_len = prefix.len() / 2 + 1;
                if encoded_key_len != 1 {
                    encoded_key_len += length_of_length(encoded_key_len);
                }
                encoded_key_len + value.length()
            }
            Self::Extension { prefix, node } => {
                let mut encoded_key_len = prefix.len() / 2 + 1;
                if encoded_key_len != 1 {
                    encoded_key_len += length_of_length(encoded_key_len);
                }
                encoded_key_len + node.blinded_length()
            }
            Self::Branch { stack } => {
                // In branch nodes, elements longer than an encoded 32 byte string are blinded.
                stack.iter().fold(0, |mut acc, node| {
                    acc += node.blinded_length();
                    acc
                })
            }
        }
    }

    /// Returns the encoded length of the trie node, blinding it if it is longer than an encoded
    /// [B256] string in length.
    fn blinded_length(&self) -> usize {
        let encoded_len = self.length();
        if encoded_len >= B256::ZERO.len() && !matches!(self, Self::Blinded { .. }) {
            B256::ZERO.length()
        } else {
            encoded_len
        }
    }
}

impl Encodable for TrieNode {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        match self {
            Self::Empty => out.put_u8(EMPTY_STRING_CODE),
            Self::Blinded { commitment } => commitment.encode(out),
            Self::Leaf { prefix, value } => {
                // Encode the leaf node's header and key-value pair.
                Header { list: true, payload_length: self.payload_length() }.encode(out);
                encode_path_leaf(prefix, true).as_slice().encode(out);
                value.encode(out);
            }
            Self::Extension { prefix, node } => {
                // Encode the extension node's header, prefix, and pointer node.
                Header { list: true, payload_length: self.payload_length() }.encode(out);
                encode_path_leaf(prefix, false).as_slice().encode(out);
                let mut blinded = node.clone();
                blinded.blind();
                blinded.encode(out);
            }
            Self::Branch { stack } => {
                // In branch nodes, elements longer than 32 bytes are blinded before encoding.
                Header { list: true, payload_length: self.payload_length() }.encode(out);
                stack.iter().for_each(|node| {
                    let mut blinded = node.clone();
                    blinded.blind();
                    blinded.encode(out);
                });
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            Self::Empty => 1,
            Self::Blinded { commitment } => commitment.length(),
            Self::Leaf { .. } | Self::Extension { .. } | Self::Branch { .. } => {
                let payload_length = self.payload_length();
                Header { list: true, payload_length }.length() + payload_length
            }
        }
    }
}

impl Decodable for TrieNode {
    /// Attempts to decode the [TrieNode].
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        // Peek at the header to determine the type of Trie node we're currently decoding.
        let header = Header::decode(&mut (**buf).as_ref())?;

        if header.list {
            // Peek at the RLP stream to determine the number of elements in the list.
            let list_length = rlp_list_element_length(&mut (**buf).as_ref())?;

            match list_length {
                BRANCH_LIST_LENGTH => {
                    let list = Vec::<Self>::decode(buf)?;
                    Ok(Self::Branch { stack: list })
                }
                LEAF_OR_EXTENSION_LIST_LENGTH => {
                    // Advance the buffer to the start of the list payload.
                    buf.advance(header.length());
                    // Decode the leaf or extension node's raw payload.
                    Self::try_decode_leaf_or_extension_payload(buf)
                        .map_err(|_| alloy_rlp::Error::UnexpectedList)
                }
                _ => Err(alloy_rlp::Error::UnexpectedLength),
            }
        } else {
            match header.payload_length {
                0 => {
                    buf.advance(header.length());
                    Ok(Self::Empty)
                }
                32 => {
                    let commitment = B256::decode(buf)?;
                    Ok(Self::new_blinded(commitment))
                }
                _ => Err(alloy_rlp::Error::UnexpectedLength),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ProofStore;
    use alloy_primitives::{b256, bytes, hex, keccak256};
    use alloy_rlp::{Decodable, Encodable};

    #[test]
    fn test_decode_branch() {
        const BRANCH_RLP: [u8; 83] = hex!("f851a0eb08a66a94882454bec899d3e82952dcc918ba4b35a09a84acd98019aef4345080808080808080a05d87a81d9bbf5aee61a6bfeab3a5643347e2c751b36789d988a5b6b163d496518080808080808080");
        let expected = TrieNode::Branch {
            stack: vec![
                TrieNode::new_blinded(b256!(
                    "eb08a66a94882454bec899d3e82952dcc918ba4b35a09a84acd98019aef43450"
                )),
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::new_blinded(b256!(
                    "5d87a81d9bbf5aee61a6bfeab3a5643347e2c751b36789d988a5b6b163d49651"
                )),
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
                TrieNode::Empty,
            ],
        };

        let mut rlp_buf = Vec::with_capacity(expected.length());
        expected.encode(&mut rlp_buf);
        assert_eq!(rlp_buf.len(), BRANCH_RLP.len());
        assert_eq!(expected.length(), BRANCH_RLP.len());

        assert_eq!(expected, TrieNode::decode(&mut BRANCH_RLP.as_slice()).unwrap());
        assert_eq!(rlp_buf.as_slice(), &BRANCH_RLP[..]);
    }

    #[test]
    fn test_encode_decode_extension_open_short() {
        const EXTENSION_RLP: [u8; 19] = hex!("d28300646fcd308b8a74657374207468726565");

        let opened = TrieNode::Leaf {
            prefix: Nibbles::from_nibbles([0x00]),
            value: bytes!("8a74657374207468726565"),
        };
        let expected =
            TrieNode::Extension { prefix: Nibbles::unpack(bytes!("646f")), node: Box::new(opened) };

        let mut rlp_buf = Vec::with_capacity(expected.length());
        expected.encode(&mut rlp_buf);

        assert_eq!(expected, TrieNode::decode(&mut EXTENSION_RLP.as_slice()).unwrap());
    }

    #[test]
    fn test_encode_decode_extension_blinded_long() {
        const EXTENSION_RLP: [u8; 38] =
            hex!("e58300646fa0f3fe8b3c5b21d3e52860f1e4a5825a6100bb341069c1e88f4ebf6bd98de0c190");
        let mut rlp_buf = Vec::new();

        let opened =
            TrieNode::Leaf { prefix: Nibbles::from_nibbles([0x00]), value: [0xFF; 64].into() };
        opened.encode(&mut rlp_buf);
        let blinded = TrieNode::new_blinded(keccak256(&rlp_buf));

        rlp_buf.clear();
        let opened_extension =
            TrieNode::Extension { prefix: Nibbles::unpack(bytes!("646f")), node: Box::new(opened) };
        opened_extension.encode(&mut rlp_buf);
        assert_eq!(rlp_buf.as_slice(), &EXTENSION_RLP[..]);

        let expected = TrieNode::Extension {
            prefix: Nibbles::unpack(bytes!("646f")),
            node: Box::new(blinded),
        };
        assert_eq!(expected, TrieNode::decode(&mut EXTENSION_RLP.as_slice()).unwrap());
    }

    #[test]
    fn test_insert_and_open_round_trip() {
        let store = ProofStore::new();
        let mut root = TrieNode::Empty;

        let keys = [b"first key", b"secnd key", b"third key"];
        for (i, key) in keys.iter().enumerate() {
            let path = Nibbles::unpack(keccak256(key));
            root.insert(&path, Bytes::from(vec![i as u8 + 1; 4]), &store).unwrap();
        }

        for (i, key) in keys.iter().enumerate() {
            let path = Nibbles::unpack(keccak256(key));
            let value = root.open(&path, &store).unwrap().expect("key must exist");
            assert_eq!(value.as_ref(), &[i as u8 + 1; 4]);
        }

        // A key never inserted resolves to an exclusion.
        let absent = Nibbles::unpack(keccak256(b"absent"));
        assert!(root.open(&absent, &store).unwrap().is_none());
    }

    #[test]
    fn test_open_through_blinded_nodes() {
        let mut store = ProofStore::new();
        let mut root = TrieNode::Empty;

        let entries: Vec<(Nibbles, Bytes)> = (0u8..16)
            .map(|i| (Nibbles::unpack(keccak256([i])), Bytes::from(vec![i; 40])))
            .collect();
        for (path, value) in &entries {
            root.insert(path, value.clone(), &store).unwrap();
        }

        // Persist every node of the trie, then reduce the root to its bare commitment.
        let root_hash = persist(&mut root.clone(), &mut store);
        let mut blinded_root = TrieNode::new_blinded(root_hash);

        for (path, value) in &entries {
            let opened = blinded_root.open(path, &store).unwrap().expect("key must exist");
            assert_eq!(opened, value);
        }
    }

    #[test]
    fn test_open_missing_preimage() {
        let store = ProofStore::new();
        let absent = B256::with_last_byte(9);
        let mut root = TrieNode::new_blinded(absent);
        let path = Nibbles::unpack(keccak256(b"key"));
        assert_eq!(
            root.open(&path, &store).unwrap_err(),
            TrieNodeError::MissingPreimage(absent)
        );
    }

    /// Stores the RLP preimage of `node` and all of its open descendants, returning the node's
    /// commitment.
    fn persist(node: &mut TrieNode, store: &mut ProofStore) -> B256 {
        match node {
            TrieNode::Branch { stack } => {
                for child in stack.iter_mut() {
                    if !matches!(child, TrieNode::Empty | TrieNode::Blinded { .. }) {
                        persist(child, store);
                    }
                }
            }
            TrieNode::Extension { node, .. } => {
                if !matches!(node.as_ref(), TrieNode::Empty | TrieNode::Blinded { .. }) {
                    persist(node, store);
                }
            }
            _ => {}
        }
        let mut rlp_buf = Vec::with_capacity(node.length());
        node.encode(&mut rlp_buf);
        store.insert(rlp_buf.into())
    }
}
