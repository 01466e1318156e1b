//! Checksum and name hashing, both built on the same 16-bit polynomial.

const POLY: u16 = 0x8F57;

fn shift_xor(mut acc: u16, rounds: u8) -> u16 {
    for _ in 0..rounds {
        acc = if acc & 0x8000 != 0 {
            (acc << 1) ^ POLY
        } else {
            acc << 1
        };
    }
    acc
}

/// Frame checksum, computed over everything preceding the CRC field.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter()
        .fold(0, |crc, &b| shift_xor(crc ^ (b as u16) << 8, 8))
}

/// Mixes the four name slot codes into the parameter hash.
///
/// Only the low 7 bits of each code take part, shifted into the top byte.
pub(crate) fn name_hash(codes: &[u8]) -> u16 {
    codes
        .iter()
        .fold(0, |hash, &b| shift_xor(hash ^ ((b as u16) << 9 & 0xff00), 7))
}
