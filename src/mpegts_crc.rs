//! The CRC-32 variant used to protect PSI/SI sections, per _ISO/IEC 13818-1, Annex A_.
//!
//! Polynomial `0x04c11db7`, initial value `0xffffffff`, no bit reflection and no final XOR.
//! Because nothing is XORed at the end, running the checksum over a whole section including its
//! trailing 4-byte CRC field yields zero when the section is intact.

const POLYNOMIAL: u32 = 0x04c1_1db7;

const TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Size in bytes of the `CRC_32` field that ends every section using section syntax.
pub const CRC_SIZE: usize = 4;

/// Computes the checksum of the given bytes.
pub fn sum32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xffff_ffff;
    for &b in data {
        crc = (crc << 8) ^ TABLE[((crc >> 24) ^ u32::from(b)) as usize & 0xff];
    }
    crc
}

/// `true` if the checksum over the whole section, trailing `CRC_32` field included, is zero.
///
/// This is the check applied to every reassembled section.
pub fn is_valid(section: &[u8]) -> bool {
    section.len() >= CRC_SIZE && sum32(section) == 0
}

/// `true` if the checksum over all but the last 4 bytes equals the big-endian value held in
/// those last 4 bytes.
pub fn matches_trailing(section: &[u8]) -> bool {
    if section.len() < CRC_SIZE {
        return false;
    }
    let (body, trailer) = section.split_at(section.len() - CRC_SIZE);
    let stored = u32::from(trailer[0]) << 24
        | u32::from(trailer[1]) << 16
        | u32::from(trailer[2]) << 8
        | u32::from(trailer[3]);
    sum32(body) == stored
}
