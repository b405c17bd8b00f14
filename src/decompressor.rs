use std::io::{BufReader, Read};

use flate2::bufread::MultiGzDecoder;

const GZIP_BUFFER_SIZE: usize = 256 * 1024;

/// Turns a compressed payload back into raw sample bytes.
///
/// Only consulted when the header declares `gzip`/`gz` encoding.
pub trait StreamDecompressor: Send + Sync {
    fn decompress(&self, bytes: &[u8]) -> std::io::Result<Vec<u8>>;
}

/// gzip (RFC 1952) decompressor, multi-member streams included.
#[derive(Debug, Default, Clone, Copy)]
pub struct GzipDecompressor;

impl StreamDecompressor for GzipDecompressor {
    fn decompress(&self, bytes: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = MultiGzDecoder::new(BufReader::with_capacity(GZIP_BUFFER_SIZE, bytes));
        let mut output = Vec::with_capacity(estimate_uncompressed_size(bytes));
        decoder.read_to_end(&mut output)?;
        Ok(output)
    }
}

/// Upper bound of the deflate compression ratio.
const MAX_DEFLATE_RATIO: usize = 1032;

/// ISIZE trailer of the last member, reliable for single-member streams < 4GB.
/// Clamped so a corrupt trailer cannot trigger a huge allocation.
fn estimate_uncompressed_size(compressed: &[u8]) -> usize {
    let Some(start) = compressed.len().checked_sub(4) else {
        return 0;
    };
    let trailer = &compressed[start..];
    let declared = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]) as usize;
    declared.min(compressed.len().saturating_mul(MAX_DEFLATE_RATIO))
}
