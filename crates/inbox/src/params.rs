//! Parameters and header-byte taxonomy for the sequencer inbox wire format.
//!
//! A batch payload's first byte selects the encoding of everything that follows. Header bytes
//! carrying the [L1_AUTHENTICATED_FLAG] were validated by the inbox contract on L1; encountering
//! an authenticated byte this client does not understand means the client is out of date, not
//! that the batch is invalid.

/// The maximum number of bytes a batch payload may decompress to.
pub const MAX_DECOMPRESSED_LEN: usize = 16 * 1024 * 1024;

/// The maximum number of segments in a single sequencer message.
pub const MAX_SEGMENTS_PER_MESSAGE: usize = 100 * 1024;

/// The maximum size of a single L2 message, compressed segments included.
pub const MAX_L2_MESSAGE_SIZE: usize = 256 * 1024;

/// The output cap of the zero-heavy decoder: 101% of [MAX_DECOMPRESSED_LEN], plus slack.
pub const MAX_ZEROHEAVY_DECOMPRESSED_LEN: usize = 101 * MAX_DECOMPRESSED_LEN / 100 + 64;

/// Header byte of a brotli-compressed batch payload.
pub const BROTLI_HEADER_BYTE: u8 = 0x00;

/// Flag bit of a DAS (data availability committee) certificate payload.
pub const DAS_HEADER_FLAG: u8 = 0x80;

/// Flag bit of a tree-shaped DAS certificate payload.
pub const TREE_DAS_HEADER_FLAG: u8 = 0x08;

/// Flag bit of a zero-heavy encoded payload.
pub const ZEROHEAVY_HEADER_FLAG: u8 = 0x20;

/// Header byte of a payload that is a list of EIP-4844 versioned blob hashes.
pub const BLOB_HASHES_HEADER_BYTE: u8 = 0x50;

/// Flag bit of header bytes that the L1 inbox contract authenticates itself.
pub const L1_AUTHENTICATED_FLAG: u8 = 0x40;

const fn has_bits(checking: u8, bits: u8) -> bool {
    checking & bits == bits
}

/// Returns `true` if the byte marks a brotli-compressed payload.
pub const fn is_brotli_header_byte(byte: u8) -> bool {
    byte == BROTLI_HEADER_BYTE
}

/// Returns `true` if the byte carries the DAS certificate flag.
pub const fn is_das_header_byte(byte: u8) -> bool {
    has_bits(byte, DAS_HEADER_FLAG)
}

/// Returns `true` if the byte carries the tree-DAS flag.
pub const fn is_tree_das_header_byte(byte: u8) -> bool {
    has_bits(byte, TREE_DAS_HEADER_FLAG)
}

/// Returns `true` if the byte carries the zero-heavy encoding flag.
pub const fn is_zeroheavy_header_byte(byte: u8) -> bool {
    has_bits(byte, ZEROHEAVY_HEADER_FLAG)
}

/// Returns `true` if the byte marks a blob-hashes payload.
pub const fn is_blob_hashes_header_byte(byte: u8) -> bool {
    has_bits(byte, BLOB_HASHES_HEADER_BYTE)
}

/// Returns `true` if the byte is one the L1 inbox contract authenticates.
pub const fn is_l1_authenticated_header_byte(byte: u8) -> bool {
    has_bits(byte, L1_AUTHENTICATED_FLAG)
}

/// Returns `true` if the byte belongs to an encoding this client understands.
pub const fn is_known_header_byte(byte: u8) -> bool {
    is_brotli_header_byte(byte)
        || is_das_header_byte(byte)
        || is_tree_das_header_byte(byte)
        || is_zeroheavy_header_byte(byte)
        || is_blob_hashes_header_byte(byte)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_blob_header_byte_is_authenticated() {
        assert!(is_blob_hashes_header_byte(BLOB_HASHES_HEADER_BYTE));
        assert!(is_l1_authenticated_header_byte(BLOB_HASHES_HEADER_BYTE));
        assert!(is_known_header_byte(BLOB_HASHES_HEADER_BYTE));
    }

    #[test]
    fn test_unknown_authenticated_byte() {
        // 0x44 carries the authenticated flag but matches no known encoding.
        assert!(is_l1_authenticated_header_byte(0x44));
        assert!(!is_known_header_byte(0x44));
    }

    #[test]
    fn test_brotli_header_byte() {
        assert!(is_brotli_header_byte(0x00));
        assert!(!is_brotli_header_byte(0x01));
        assert!(is_known_header_byte(0x00));
    }
}
