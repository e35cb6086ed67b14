//! # Table Checksum
//!
//! Coreboot protects the record area of its table with the 16-bit one's
//! complement "IP checksum". The firmware computes it over whole 16-bit words
//! only; for an odd length the last byte is not part of the sum. The stored
//! value can only be reproduced by doing exactly the same.

/// Computes the coreboot/IP checksum of `bytes`.
///
/// `bytes` is summed as `len / 2` little-endian 16-bit words into a 32-bit
/// accumulator, the carries are folded back twice and the one's complement of
/// the low 16 bits is returned.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u16 {
    let sum = bytes.chunks_exact(2).fold(0u32, |acc, word| {
        acc.wrapping_add(u32::from(u16::from_le_bytes([word[0], word[1]])))
    });

    let sum = (sum >> 16) + (sum & 0xffff);
    let sum = sum + (sum >> 16);
    let [lo, hi, ..] = sum.to_le_bytes();
    !u16::from_le_bytes([lo, hi])
}
