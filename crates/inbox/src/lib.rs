//! Sequencer inbox handling: locating the batch delivered by an L1 transaction, peeling its
//! data-availability wrappers, and materializing the ordered L1 incoming messages it produces.

#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]

mod types;
pub use types::{
    compute_batch_gas_cost, BatchDataLocation, BatchPostingReport, L1IncomingMessage,
    L1MessageHeader, L1MessageKind, L1TrackingRecord, L2TrackingRecord, SequencerBatch,
    TimeBounds, BATCH_POSTER_ADDRESS,
};

mod params;
pub use params::{
    is_blob_hashes_header_byte, is_brotli_header_byte, is_das_header_byte,
    is_known_header_byte, is_l1_authenticated_header_byte, is_tree_das_header_byte,
    is_zeroheavy_header_byte, BLOB_HASHES_HEADER_BYTE, BROTLI_HEADER_BYTE, DAS_HEADER_FLAG,
    L1_AUTHENTICATED_FLAG, MAX_DECOMPRESSED_LEN, MAX_L2_MESSAGE_SIZE,
    MAX_SEGMENTS_PER_MESSAGE, MAX_ZEROHEAVY_DECOMPRESSED_LEN, TREE_DAS_HEADER_FLAG,
    ZEROHEAVY_HEADER_FLAG,
};

mod compress;
pub use compress::{compress_brotli, decompress_brotli};

mod zeroheavy;
pub use zeroheavy::{zeroheavy_decode, zeroheavy_encode};

mod decoder;
pub use decoder::{
    parse_sequencer_message, BatchSegmentKind, DaReader, KeysetValidationMode,
    ParsedSequencerMessage,
};

mod materialize;
pub use materialize::materialize_messages;

mod reader;
pub use reader::{InboxContents, InboxProvider, InboxReader};

mod errors;
pub use errors::{DaReaderError, DecoderError, InboxReaderError, MaterializeError};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
