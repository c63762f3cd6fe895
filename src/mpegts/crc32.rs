use bytes::BytesMut;

/// MPEG-2 section CRC-32 (poly 0x04C11DB7, no reflection, no final
/// xor), as required for PAT/PMT sections.
#[must_use]
pub fn gen_crc32(seed: u32, data: BytesMut) -> u32 {
    let mut crc = seed;
    for byte in &data {
        crc ^= u32::from(*byte) << 24;
        for _ in 0..8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        //CRC of the empty message is the seed itself
        assert_eq!(gen_crc32(0xffff_ffff, BytesMut::new()), 0xffff_ffff);
    }

    #[test]
    fn test_crc_changes_with_data() {
        let a = gen_crc32(0xffff_ffff, BytesMut::from(&[0x00, 0xb0, 0x0d][..]));
        let b = gen_crc32(0xffff_ffff, BytesMut::from(&[0x00, 0xb0, 0x0e][..]));
        assert_ne!(a, b);
    }
}
