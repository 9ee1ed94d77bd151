//! Utilities for trie node decoding.

use alloy_rlp::{Buf, Header};
use alloy_trie::Nibbles;

/// Walks through an RLP list's elements and returns the count of elements in the list.
pub(crate) fn rlp_list_element_length(buf: &mut &[u8]) -> alloy_rlp::Result<usize> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    let len_after_consume = buf.len() - header.payload_length;

    let mut list_element_length = 0;
    while buf.len() > len_after_consume {
        let header = Header::decode(&mut (**buf).as_ref())?;
        buf.advance(header.length() + header.payload_length);
        list_element_length += 1;
    }
    Ok(list_element_length)
}

/// Unpacks a compact-encoded path (with its first nibble already separated, if the path length is
/// odd) into a [Nibbles] sequence.
pub(crate) fn unpack_path_to_nibbles(first: Option<u8>, rest: &[u8]) -> Nibbles {
    let rest = Nibbles::unpack(rest);
    Nibbles::from_vec_unchecked(
        first.into_iter().chain(rest.iter().copied()).collect::<Vec<u8>>(),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::hex;

    #[test]
    fn test_rlp_list_element_count() {
        // rlp(["do", "verb"]) = 0xc8 0x82 'd' 'o' 0x84 'v' 'e' 'r' 'b'
        let encoded = hex!("c8826f648476657262");
        assert_eq!(rlp_list_element_length(&mut encoded.as_slice()).unwrap(), 2);
    }

    #[test]
    fn test_unpack_odd_path() {
        let nibbles = unpack_path_to_nibbles(Some(0x3), &[0xab]);
        assert_eq!(nibbles.as_slice(), &[0x3, 0xa, 0xb]);
    }
}
