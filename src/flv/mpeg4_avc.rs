use {
    super::errors::{MpegError, MpegErrorValue},
    byteorder::BigEndian,
    bytes::BytesMut,
    crate::bytesio::{bytes_reader::BytesReader, bytes_writer::BytesWriter},
};

pub mod nalu_type {
    pub const SLICE: u8 = 1;
    pub const IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const AUD: u8 = 9;
}

const ANNEXB_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

#[derive(Debug, Clone, Default)]
pub struct Sps {
    pub size: u16,
    pub data: BytesMut,
}

#[derive(Debug, Clone, Default)]
pub struct Pps {
    pub size: u16,
    pub data: BytesMut,
}

/*
 aligned(8) class AVCDecoderConfigurationRecord {
    unsigned int(8) configurationVersion = 1;
    unsigned int(8) AVCProfileIndication;
    unsigned int(8) profile_compatibility;
    unsigned int(8) AVCLevelIndication;
    bit(6) reserved = '111111'b;
    unsigned int(2) lengthSizeMinusOne;
    bit(3) reserved = '111'b;
    unsigned int(5) numOfSequenceParameterSets;
    for (i=0; i< numOfSequenceParameterSets; i++) {
        unsigned int(16) sequenceParameterSetLength ;
        bit(8*sequenceParameterSetLength) sequenceParameterSetNALUnit;
    }
    unsigned int(8) numOfPictureParameterSets;
    for (i=0; i< numOfPictureParameterSets; i++) {
        unsigned int(16) pictureParameterSetLength;
        bit(8*pictureParameterSetLength) pictureParameterSetNALUnit;
    }
 }
*/
#[derive(Debug, Clone, Default)]
pub struct Mpeg4Avc {
    pub profile: u8,
    pub compatibility: u8,
    pub level: u8,
    /// NALU length field size in bytes (lengthSizeMinusOne + 1).
    pub nalu_length: u8,
    pub sps: Vec<Sps>,
    pub pps: Vec<Pps>,
}

impl Mpeg4Avc {
    #[must_use]
    pub fn first_sps(&self) -> Option<&BytesMut> {
        self.sps.first().map(|sps| &sps.data)
    }
}

#[derive(Default)]
pub struct Mpeg4AvcProcessor {
    pub mpeg4_avc: Mpeg4Avc,
    sps_pps_appended: bool,
}

impl Mpeg4AvcProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decoder_configuration_record_load(
        &mut self,
        reader: &mut BytesReader,
    ) -> Result<&mut Self, MpegError> {
        /*configuration version*/
        reader.read_u8()?;
        self.mpeg4_avc.profile = reader.read_u8()?;
        self.mpeg4_avc.compatibility = reader.read_u8()?;
        self.mpeg4_avc.level = reader.read_u8()?;
        self.mpeg4_avc.nalu_length = (reader.read_u8()? & 0x03) + 1;

        self.mpeg4_avc.sps.clear();
        self.mpeg4_avc.pps.clear();

        let nb_sps = reader.read_u8()? & 0x1F;
        for _ in 0..nb_sps {
            let size = reader.read_u16::<BigEndian>()?;
            let data = reader.read_bytes(size as usize)?;
            self.mpeg4_avc.sps.push(Sps { size, data });
        }

        let nb_pps = reader.read_u8()?;
        for _ in 0..nb_pps {
            let size = reader.read_u16::<BigEndian>()?;
            let data = reader.read_bytes(size as usize)?;
            self.mpeg4_avc.pps.push(Pps { size, data });
        }

        Ok(self)
    }

    /// Serialize the stored parameter sets back into an
    /// AVCDecoderConfigurationRecord (the `avcC` box body).
    pub fn decoder_configuration_record_save(&self) -> Result<BytesMut, MpegError> {
        if self.mpeg4_avc.sps.is_empty() {
            return Err(MpegError {
                value: MpegErrorValue::SPSNotFound,
            });
        }

        let mut writer = BytesWriter::new();
        writer.write_u8(1)?;
        writer.write_u8(self.mpeg4_avc.profile)?;
        writer.write_u8(self.mpeg4_avc.compatibility)?;
        writer.write_u8(self.mpeg4_avc.level)?;
        writer.write_u8(0xFC | (self.mpeg4_avc.nalu_length - 1))?;

        writer.write_u8(0xE0 | (self.mpeg4_avc.sps.len() as u8))?;
        for sps in &self.mpeg4_avc.sps {
            writer.write_u16::<BigEndian>(sps.size)?;
            writer.write(&sps.data[..])?;
        }

        writer.write_u8(self.mpeg4_avc.pps.len() as u8)?;
        for pps in &self.mpeg4_avc.pps {
            writer.write_u16::<BigEndian>(pps.size)?;
            writer.write(&pps.data[..])?;
        }

        Ok(writer.extract_current_bytes())
    }

    /// Convert one AVCC access unit into Annex-B, inserting the cached
    /// SPS/PPS in front of IDR slices so every segment can start clean.
    pub fn h264_mp4toannexb(&mut self, reader: &mut BytesReader) -> Result<BytesMut, MpegError> {
        let mut writer = BytesWriter::new();
        self.sps_pps_appended = false;

        while !reader.is_empty() {
            let size = self.read_nalu_size(reader)? as usize;
            if reader.len() < size || size == 0 {
                return Err(MpegError {
                    value: MpegErrorValue::NotEnoughBytesToParse,
                });
            }

            let header = reader.advance_u8()?;
            match header & 0x1f {
                nalu_type::AUD => {
                    reader.read_bytes(size)?;
                    continue;
                }
                nalu_type::SPS | nalu_type::PPS => {
                    self.sps_pps_appended = true;
                }
                nalu_type::IDR => {
                    if !self.sps_pps_appended {
                        for sps in &self.mpeg4_avc.sps {
                            writer.write(&ANNEXB_START_CODE)?;
                            writer.write(&sps.data[..])?;
                        }
                        for pps in &self.mpeg4_avc.pps {
                            writer.write(&ANNEXB_START_CODE)?;
                            writer.write(&pps.data[..])?;
                        }
                        self.sps_pps_appended = true;
                    }
                }
                _ => {}
            }

            writer.write(&ANNEXB_START_CODE)?;
            writer.write(&reader.read_bytes(size)?[..])?;
        }

        Ok(writer.extract_current_bytes())
    }

    fn read_nalu_size(&self, reader: &mut BytesReader) -> Result<u32, MpegError> {
        let mut size: u32 = 0;
        for _ in 0..self.mpeg4_avc.nalu_length {
            size = (size << 8) | u32::from(reader.read_u8()?);
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Vec<u8> {
        let sps: &[u8] = &[0x67, 0x42, 0x00, 0x1f, 0x96, 0x54, 0x05, 0x01];
        let pps: &[u8] = &[0x68, 0xce, 0x38, 0x80];
        let mut record = vec![
            0x01, // version
            0x42, // profile (baseline)
            0x00, // compatibility
            0x1f, // level 3.1
            0xff, // lengthSizeMinusOne = 3
            0xe1, // 1 sps
        ];
        record.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        record.extend_from_slice(sps);
        record.push(0x01); // 1 pps
        record.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        record.extend_from_slice(pps);
        record
    }

    #[test]
    fn test_configuration_record_load() {
        let mut processor = Mpeg4AvcProcessor::new();
        let mut reader = BytesReader::new(BytesMut::from(&sample_record()[..]));
        processor.decoder_configuration_record_load(&mut reader).unwrap();

        assert_eq!(processor.mpeg4_avc.profile, 0x42);
        assert_eq!(processor.mpeg4_avc.level, 0x1f);
        assert_eq!(processor.mpeg4_avc.nalu_length, 4);
        assert_eq!(processor.mpeg4_avc.sps.len(), 1);
        assert_eq!(processor.mpeg4_avc.pps.len(), 1);
    }

    #[test]
    fn test_configuration_record_round_trip() {
        let record = sample_record();
        let mut processor = Mpeg4AvcProcessor::new();
        let mut reader = BytesReader::new(BytesMut::from(&record[..]));
        processor.decoder_configuration_record_load(&mut reader).unwrap();

        let saved = processor.decoder_configuration_record_save().unwrap();
        assert_eq!(&saved[..], &record[..]);
    }

    #[test]
    fn test_mp4_to_annexb_inserts_parameter_sets_before_idr() {
        let mut processor = Mpeg4AvcProcessor::new();
        let mut reader = BytesReader::new(BytesMut::from(&sample_record()[..]));
        processor.decoder_configuration_record_load(&mut reader).unwrap();

        // one IDR nalu of 3 bytes in AVCC framing
        let avcc = [0x00, 0x00, 0x00, 0x03, 0x65, 0x11, 0x22];
        let mut payload_reader = BytesReader::new(BytesMut::from(&avcc[..]));
        let annexb = processor.h264_mp4toannexb(&mut payload_reader).unwrap();

        // sps + pps + idr, each with a 4-byte start code
        let expected_len = 4 + 8 + 4 + 4 + 4 + 3;
        assert_eq!(annexb.len(), expected_len);
        assert_eq!(&annexb[..4], &[0, 0, 0, 1]);
        assert_eq!(annexb[4], 0x67);
    }

    #[test]
    fn test_mp4_to_annexb_truncated_nalu() {
        let mut processor = Mpeg4AvcProcessor::new();
        let mut reader = BytesReader::new(BytesMut::from(&sample_record()[..]));
        processor.decoder_configuration_record_load(&mut reader).unwrap();

        let avcc = [0x00, 0x00, 0x00, 0x10, 0x65];
        let mut payload_reader = BytesReader::new(BytesMut::from(&avcc[..]));
        let result = processor.h264_mp4toannexb(&mut payload_reader);
        assert!(matches!(
            result.unwrap_err().value,
            MpegErrorValue::NotEnoughBytesToParse
        ));
    }
}
