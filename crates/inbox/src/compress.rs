//! Brotli decompression with an explicit output cap.

use std::io::{Error, ErrorKind, Read};

/// Decompresses `data` using the [`brotli`](https://crates.io/crates/brotli) crate, refusing to
/// produce more than `max_len` bytes of output.
pub fn decompress_brotli(data: &[u8], max_len: usize) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut decompressor = brotli::Decompressor::new(data, 4096);
    let read = (&mut decompressor).take(max_len as u64 + 1).read_to_end(&mut out)?;
    if read > max_len {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("decompressed output exceeds {max_len} bytes"),
        ));
    }
    Ok(out)
}

/// Compresses `data` at the sequencer's default quality. Primarily exercised by round-trip
/// tests; materialized batches only ever decompress.
pub fn compress_brotli(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut params = brotli::enc::BrotliEncoderParams::default();
    params.quality = 6;
    brotli::BrotliCompress(&mut &data[..], &mut out, &params)
        .expect("in-memory compression cannot fail");
    out
}
