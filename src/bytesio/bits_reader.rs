use {
    super::{
        bits_errors::{BitError, BitErrorValue},
        bytes_reader::BytesReader,
    },
    bytes::BytesMut,
};

/// MSB-first bit reader over a byte buffer, used for SPS and other
/// bitstream-level headers.
pub struct BitsReader {
    reader: BytesReader,
    cur_byte: u8,
    cur_bit_left: usize,
}

impl BitsReader {
    #[must_use]
    pub const fn new(reader: BytesReader) -> Self {
        Self {
            reader,
            cur_byte: 0,
            cur_bit_left: 0,
        }
    }

    pub fn extend_data(&mut self, data: BytesMut) -> Result<(), BitError> {
        self.reader.extend_from_slice(&data)?;
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<u8, BitError> {
        if self.cur_bit_left == 0 {
            self.cur_byte = self.reader.read_u8()?;
            self.cur_bit_left = 8;
        }
        self.cur_bit_left -= 1;
        Ok((self.cur_byte >> self.cur_bit_left) & 0x01)
    }

    pub fn read_n_bits(&mut self, n: usize) -> Result<u64, BitError> {
        if n > 64 {
            return Err(BitError {
                value: BitErrorValue::TooBig,
            });
        }
        let mut result: u64 = 0;
        for _ in 0..n {
            result = (result << 1) | u64::from(self.read_bit()?);
        }
        Ok(result)
    }

    /// Unsigned exp-Golomb code (ue(v)).
    pub fn read_ue(&mut self) -> Result<u64, BitError> {
        let mut leading_zero_bits = 0_usize;
        while self.read_bit()? == 0 {
            leading_zero_bits += 1;
            if leading_zero_bits > 32 {
                return Err(BitError {
                    value: BitErrorValue::TooBig,
                });
            }
        }
        let suffix = self.read_n_bits(leading_zero_bits)?;
        Ok((1_u64 << leading_zero_bits) - 1 + suffix)
    }

    /// Signed exp-Golomb code (se(v)).
    pub fn read_se(&mut self) -> Result<i64, BitError> {
        let code = self.read_ue()?;
        let value = code.div_ceil(2) as i64;
        if code & 0x01 == 0 {
            Ok(-value)
        } else {
            Ok(value)
        }
    }

    #[must_use]
    pub fn bytes_left(&self) -> usize {
        self.reader.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_over(data: &[u8]) -> BitsReader {
        BitsReader::new(BytesReader::new(BytesMut::from(data)))
    }

    #[test]
    fn test_read_bits_msb_first() {
        let mut bits = reader_over(&[0b1010_0000]);
        assert_eq!(bits.read_bit().unwrap(), 1);
        assert_eq!(bits.read_bit().unwrap(), 0);
        assert_eq!(bits.read_bit().unwrap(), 1);
    }

    #[test]
    fn test_read_n_bits_across_bytes() {
        let mut bits = reader_over(&[0xAB, 0xCD]);
        assert_eq!(bits.read_n_bits(16).unwrap(), 0xABCD);
    }

    #[test]
    fn test_exp_golomb_ue() {
        // 1 -> 0, 010 -> 1, 011 -> 2, 00100 -> 3
        let mut bits = reader_over(&[0b1_010_011_0, 0b0100_0000]);
        assert_eq!(bits.read_ue().unwrap(), 0);
        assert_eq!(bits.read_ue().unwrap(), 1);
        assert_eq!(bits.read_ue().unwrap(), 2);
        assert_eq!(bits.read_ue().unwrap(), 3);
    }

    #[test]
    fn test_exp_golomb_se() {
        // ue codes 1,2 map to se +1,-1
        let mut bits = reader_over(&[0b010_011_00]);
        assert_eq!(bits.read_se().unwrap(), 1);
        assert_eq!(bits.read_se().unwrap(), -1);
    }

    #[test]
    fn test_too_many_bits() {
        let mut bits = reader_over(&[0xFF]);
        assert!(matches!(
            bits.read_n_bits(65).unwrap_err().value,
            BitErrorValue::TooBig
        ));
    }
}
