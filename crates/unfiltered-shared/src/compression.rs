//! DEFLATE compression applied to plaintext before encryption.
//!
//! The first byte of the output is a marker: `0` = stored as-is, `1` =
//! deflated. Incompressible input is stored so the output never grows by more
//! than one byte.

use std::io::Read;

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;

use crate::error::CompressionError;

const MARKER_STORED: u8 = 0;
const MARKER_DEFLATE: u8 = 1;

pub fn compress(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut compressed = Vec::new();
    if !data.is_empty() {
        DeflateEncoder::new(data, Compression::default())
            .read_to_end(&mut compressed)
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
    }

    let (marker, body) = if !data.is_empty() && compressed.len() < data.len() {
        (MARKER_DEFLATE, compressed.as_slice())
    } else {
        (MARKER_STORED, data)
    };

    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(marker);
    out.extend_from_slice(body);
    Ok(out)
}

/// Reverse [`compress`]. Output larger than `max_len` is rejected so a small
/// payload cannot expand without bound.
pub fn decompress(data: &[u8], max_len: usize) -> Result<Vec<u8>, CompressionError> {
    let (&marker, payload) = data
        .split_first()
        .ok_or_else(|| CompressionError::DecompressionFailed("empty input".to_string()))?;

    match marker {
        MARKER_STORED => {
            if payload.len() > max_len {
                return Err(CompressionError::TooLarge { max: max_len });
            }
            Ok(payload.to_vec())
        }
        MARKER_DEFLATE => {
            let mut out = Vec::new();
            DeflateDecoder::new(payload)
                .take(max_len as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
            if out.len() > max_len {
                return Err(CompressionError::TooLarge { max: max_len });
            }
            Ok(out)
        }
        other => Err(CompressionError::DecompressionFailed(format!(
            "invalid marker byte: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repetitive_input_shrinks() {
        let data = b"hello hello hello hello hello hello hello hello".repeat(20);
        let packed = compress(&data).unwrap();
        assert_eq!(packed[0], MARKER_DEFLATE);
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_incompressible_input_stored() {
        let data = [0x5a, 0x13, 0xc7];
        let packed = compress(&data).unwrap();
        assert_eq!(packed, vec![MARKER_STORED, 0x5a, 0x13, 0xc7]);
        assert_eq!(decompress(&packed, 16).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        let packed = compress(&[]).unwrap();
        assert_eq!(packed, vec![MARKER_STORED]);
        assert!(decompress(&packed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_marker() {
        assert!(matches!(
            decompress(&[7, 1, 2], 16),
            Err(CompressionError::DecompressionFailed(_))
        ));
        assert!(decompress(&[], 16).is_err());
    }

    #[test]
    fn test_expansion_limit() {
        let data = vec![0u8; 100_000];
        let packed = compress(&data).unwrap();
        assert_eq!(
            decompress(&packed, 1_000),
            Err(CompressionError::TooLarge { max: 1_000 })
        );
    }
}
