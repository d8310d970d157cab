//! RFC 1071 Internet checksum.
//!
//! Words are assembled low byte first (`byte[1] << 8 | byte[0]`). Because
//! the one's-complement sum is byte-order independent, the resulting value
//! is written back into a header with [`u16::to_le_bytes`] and lands on the
//! wire in the correct order. Both halves must change together: summing
//! big-endian words while storing little-endian (or the reverse) produces
//! byte-swapped checksums.

/// Compute the Internet checksum of `bytes`.
///
/// An odd trailing byte is treated as the low byte of a zero-extended word.
/// The empty buffer yields `0xFFFF`.
pub fn ip_sum(bytes: &[u8]) -> u16 {
    let mut sum: u64 = 0;

    let mut words = bytes.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_le_bytes([word[0], word[1]]) as u64;
    }
    if let [odd] = words.remainder() {
        sum += *odd as u64;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Returns `true` when `bytes`, with its checksum field filled in, sums to zero.
pub fn verify(bytes: &[u8]) -> bool {
    ip_sum(bytes) == 0
}

/// Write `checksum` into `bytes[offset..offset + 2]` in summation order.
pub(crate) fn put(bytes: &mut [u8], offset: usize, checksum: u16) {
    bytes[offset..offset + 2].copy_from_slice(&checksum.to_le_bytes());
}

/// Read a checksum field previously written by [`put`].
pub(crate) fn get(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_buffer_folds_every_carry() {
        // 100 000 words of 0xFFFF overflow 32 bits before folding
        let bytes = vec![0xFFu8; 200_000];
        assert_eq!(ip_sum(&bytes), 0x0000);

        let mut bytes = vec![0u8; 300_001];
        bytes[300_000] = 0x01;
        assert_eq!(ip_sum(&bytes), 0xFFFE);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(ip_sum(&[]), 0xFFFF);
    }

    #[test]
    fn test_odd_length_zero_extends_low_byte() {
        // 0x0201 + 0x0003 = 0x0204
        assert_eq!(ip_sum(&[0x01, 0x02, 0x03]), 0xFDFB);
        assert_eq!(ip_sum(&[0x01, 0x02, 0x03]), ip_sum(&[0x01, 0x02, 0x03, 0x00]));
    }

    #[test]
    fn test_known_ipv4_header() {
        let mut header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let checksum = ip_sum(&header);
        put(&mut header, 10, checksum);

        // Wire order matches the textbook value 0xB861.
        assert_eq!(&header[10..12], &[0xb8, 0x61]);
        assert!(verify(&header));
        assert_eq!(get(&header, 10), checksum);
    }

    #[test]
    fn test_carry_folding() {
        let bytes = [0xFF; 64];
        assert_eq!(ip_sum(&bytes), 0x0000);

        let mut bytes = vec![0xFF, 0xFF, 0x01, 0x00];
        // 0xFFFF + 0x0001 folds to 0x0001
        assert_eq!(ip_sum(&bytes), 0xFFFE);
        bytes.push(0x01);
        assert_eq!(ip_sum(&bytes), 0xFFFD);
    }

    #[test]
    fn test_deterministic() {
        let data = b"Hello world!";
        assert_eq!(ip_sum(data), ip_sum(data));
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut bytes = vec![0x12, 0x34, 0x56, 0x78, 0x00, 0x00];
        let checksum = ip_sum(&bytes);
        put(&mut bytes, 4, checksum);
        assert!(verify(&bytes));

        bytes[0] ^= 0x01;
        assert!(!verify(&bytes));
    }
}
