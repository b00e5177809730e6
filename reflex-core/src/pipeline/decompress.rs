//! Frame decompression

/// Decompression failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Zero-length input
    Empty,
    /// Malformed compressed stream, or output does not fit
    Corrupt,
    /// Decompressed size differs from one frame
    SizeMismatch { expected: usize, actual: usize },
    /// Input is a zstd frame, not an LZ4 block
    Zstd,
}

/// Leading bytes of every zstd frame
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Turns a compressed slot into a formatted frame
pub trait Decompressor {
    /// Decompress `input` into `output`, returning the bytes produced
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, DecodeError>;

    /// Decompress and require exactly `output.len()` bytes
    fn decompress_frame(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), DecodeError> {
        if input.is_empty() {
            return Err(DecodeError::Empty);
        }
        let actual = self.decompress(input, output)?;
        if actual != output.len() {
            return Err(DecodeError::SizeMismatch {
                expected: output.len(),
                actual,
            });
        }
        Ok(())
    }
}

/// LZ4 block format
///
/// zstd frames are refused up front. An LZ4 block of a formatted frame opens
/// with literal pixel bytes, which never exceed `0x3F`, so the zstd magic
/// cannot start a valid one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Decompressor;

impl Decompressor for Lz4Decompressor {
    fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, DecodeError> {
        if input.starts_with(&ZSTD_MAGIC) {
            return Err(DecodeError::Zstd);
        }
        lz4_flex::block::decompress_into(input, output).map_err(|_| DecodeError::Corrupt)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec;

    fn compress(data: &[u8]) -> std::vec::Vec<u8> {
        let mut out = vec![0u8; lz4_flex::block::get_maximum_output_size(data.len())];
        let len = lz4_flex::block::compress_into(data, &mut out).unwrap();
        out.truncate(len);
        out
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame: std::vec::Vec<u8> = (0..1024u32).map(|i| (i / 7) as u8).collect();
        let packed = compress(&frame);
        let mut out = vec![0u8; 1024];
        Lz4Decompressor.decompress_frame(&packed, &mut out).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_empty_input() {
        let mut out = [0u8; 8];
        assert_eq!(
            Lz4Decompressor.decompress_frame(&[], &mut out),
            Err(DecodeError::Empty)
        );
    }

    #[test]
    fn test_short_frame_is_size_mismatch() {
        let packed = compress(&[5u8; 100]);
        let mut out = [0u8; 128];
        assert_eq!(
            Lz4Decompressor.decompress_frame(&packed, &mut out),
            Err(DecodeError::SizeMismatch {
                expected: 128,
                actual: 100
            })
        );
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let mut out = [0u8; 64];
        // Literal length runs past the end of the input
        assert_eq!(
            Lz4Decompressor.decompress_frame(&[0xF0, 0xFF, 0xFF], &mut out),
            Err(DecodeError::Corrupt)
        );
    }

    #[test]
    fn test_zstd_frame_refused() {
        let mut out = [0u8; 64];
        // Frame header of `zstd::encode_all` output
        let zstd = [0x28, 0xB5, 0x2F, 0xFD, 0x04, 0x58, 0x45, 0x00, 0x00];
        assert_eq!(
            Lz4Decompressor.decompress_frame(&zstd, &mut out),
            Err(DecodeError::Zstd)
        );
    }
}
