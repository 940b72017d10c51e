//! Transparent decompression of resource blobs
//!
//! Compression is detected from magic bytes, not from names, so a blob stored
//! as `flux.yaml.gz` and one stored as `flux.yaml` are read the same way.

use std::io::{Cursor, Read};

use flate2::read::MultiGzDecoder;
use lzma_rs::xz_decompress;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Xz,
    None,
}

/// Detect the compression of `data` from its leading bytes
pub fn detect(data: &[u8]) -> Compression {
    if data.starts_with(&GZIP_MAGIC) {
        Compression::Gzip
    } else if data.starts_with(&XZ_MAGIC) {
        Compression::Xz
    } else {
        Compression::None
    }
}

/// Read `reader` to completion, decompressing gzip and xz streams
pub fn read_all(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;

    match detect(&raw) {
        Compression::Gzip => {
            let mut decoded = Vec::new();
            MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
            Ok(decoded)
        }
        Compression::Xz => {
            let mut decoded = Vec::new();
            xz_decompress(&mut Cursor::new(raw.as_slice()), &mut decoded)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
            Ok(decoded)
        }
        Compression::None => Ok(raw),
    }
}
