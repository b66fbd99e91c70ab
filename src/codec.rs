//! Fixed-width little-endian field encoding used by every PM5 frame.
//!
//! PM5 characteristics pack their numeric fields as `[lo]`, `[lo, hi]` or
//! `[lo, mid, hi]`. Encoding never fails: a value that does not fit the
//! field width wraps around and only its low `width` bytes are kept. The
//! elapsed-time field, for instance, is 3 bytes of centiseconds and rolls over after roughly
//! 46.6 hours, exactly like the device does.

use crate::error::DecodeError;

/// Encode `value` as `width` little-endian bytes, least-significant first.
///
/// Bytes beyond `width` are discarded, so `encode(0x01_0000, 2)` is
/// `[0x00, 0x00]`.
///
/// # Examples
///
/// ```
/// use pm5_emulator::codec::encode;
///
/// // 224 + 46 * 256 = 12000
/// assert_eq!(encode(12000, 2), vec![0xE0, 0x2E]);
/// ```
#[must_use]
pub fn encode(value: u64, width: usize) -> Vec<u8> {
    let mut bytes = vec![0; width];
    put(&mut bytes, 0, value, width);
    bytes
}

/// Write `value` as `width` little-endian bytes into `buf` starting at `offset`.
///
/// Same wrapping rules as [`encode`].
///
/// # Panics
///
/// Panics if `offset + width` exceeds `buf.len()`. Frame builders only call
/// this with offsets from their own fixed layout.
pub fn put(buf: &mut [u8], offset: usize, value: u64, width: usize) {
    let mut remaining = value;
    for byte in &mut buf[offset..offset + width] {
        *byte = (remaining % 256) as u8;
        remaining /= 256;
    }
}

/// Decode a hex string (either case) into raw bytes.
///
/// # Errors
///
/// Returns [`DecodeError::OddLength`] when the string has an odd number of
/// digits and [`DecodeError::InvalidHexCharacter`] for anything outside
/// `[0-9a-fA-F]`.
pub fn decode(hex_str: &str) -> Result<Vec<u8>, DecodeError> {
    hex::decode(hex_str).map_err(DecodeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_split_example() {
        assert_eq!(encode(12000, 2), vec![0xE0, 0x2E]);
    }

    #[test]
    fn test_encode_widths() {
        assert_eq!(encode(27, 1), vec![27]);
        assert_eq!(encode(0x0A_0B0C, 3), vec![0x0C, 0x0B, 0x0A]);
        assert_eq!(encode(0, 3), vec![0, 0, 0]);
    }

    #[test]
    fn test_encode_wraps_instead_of_failing() {
        assert_eq!(encode(256, 1), vec![0x00]);
        assert_eq!(encode(0x0100_0001, 3), vec![0x01, 0x00, 0x00]);
        assert_eq!(encode(u64::MAX, 2), vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_put_writes_only_its_window() {
        let mut buf = [0xAAu8; 6];
        put(&mut buf, 2, 0x1234, 2);
        assert_eq!(buf, [0xAA, 0xAA, 0x34, 0x12, 0xAA, 0xAA]);
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("AABB").unwrap(), vec![0xAA, 0xBB]);
        assert_eq!(decode("0aff").unwrap(), vec![0x0A, 0xFF]);
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode("ABC"), Err(DecodeError::OddLength));
        assert_eq!(
            decode("AG"),
            Err(DecodeError::InvalidHexCharacter {
                character: 'G',
                index: 1
            })
        );
    }
}
