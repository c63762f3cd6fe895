use {
    super::errors::MpegError,
    bytes::BytesMut,
    crate::bytesio::{bytes_reader::BytesReader, bytes_writer::BytesWriter},
};

/// Sampling frequencies indexed by the ASC frequency index.
pub const AAC_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Samples per AAC frame.
pub const AAC_SAMPLES_PER_FRAME: u32 = 1024;

/*
 AudioSpecificConfig (ISO 14496-3):
   audioObjectType        5 bits
   samplingFrequencyIndex 4 bits
   channelConfiguration   4 bits
*/
#[derive(Debug, Clone, Default)]
pub struct Mpeg4Aac {
    pub profile: u8,
    pub sampling_frequency_index: u8,
    pub channel_configuration: u8,
    pub sampling_frequency: u32,
}

pub struct Mpeg4AacProcessor {
    pub bytes_reader: BytesReader,
    pub bytes_writer: BytesWriter,
    pub mpeg4_aac: Mpeg4Aac,
}

impl Default for Mpeg4AacProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Mpeg4AacProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes_reader: BytesReader::new(BytesMut::new()),
            bytes_writer: BytesWriter::new(),
            mpeg4_aac: Mpeg4Aac {
                profile: 0,
                sampling_frequency_index: 0,
                channel_configuration: 0,
                sampling_frequency: 0,
            },
        }
    }

    pub fn extend_data(&mut self, data: BytesMut) -> Result<&mut Self, MpegError> {
        self.bytes_reader.extend_from_slice(&data)?;
        Ok(self)
    }

    pub fn audio_specific_config_load(&mut self) -> Result<&mut Self, MpegError> {
        let byte_0 = self.bytes_reader.read_u8()?;
        let byte_1 = self.bytes_reader.read_u8()?;

        self.mpeg4_aac.profile = (byte_0 >> 3) & 0x1f;
        self.mpeg4_aac.sampling_frequency_index = ((byte_0 & 0x07) << 1) | (byte_1 >> 7);
        self.mpeg4_aac.channel_configuration = (byte_1 >> 3) & 0x0f;
        self.mpeg4_aac.sampling_frequency = AAC_FREQUENCIES
            .get(self.mpeg4_aac.sampling_frequency_index as usize)
            .copied()
            .unwrap_or(44100);

        //discard any trailing extension bytes
        self.bytes_reader.extract_remaining_bytes();

        Ok(self)
    }

    /// Serialize the stored configuration back into a 2-byte
    /// AudioSpecificConfig (the `esds` decoder specific info).
    pub fn audio_specific_config_save(&self) -> Result<BytesMut, MpegError> {
        let mut writer = BytesWriter::new();
        writer.write_u8(
            (self.mpeg4_aac.profile << 3) | (self.mpeg4_aac.sampling_frequency_index >> 1),
        )?;
        writer.write_u8(
            ((self.mpeg4_aac.sampling_frequency_index & 0x01) << 7)
                | (self.mpeg4_aac.channel_configuration << 3),
        )?;
        Ok(writer.extract_current_bytes())
    }

    /// Wrap the buffered raw AAC frame in a 7-byte ADTS header; the
    /// result accumulates in `bytes_writer`.
    pub fn adts_save(&mut self) -> Result<&mut Self, MpegError> {
        let payload = self.bytes_reader.extract_remaining_bytes();
        let frame_length = (payload.len() + 7) as u32;

        /*syncword + ID + layer + protection_absent*/
        self.bytes_writer.write_u8(0xFF)?;
        self.bytes_writer.write_u8(0xF1)?;
        /*profile is audioObjectType - 1 in ADTS*/
        self.bytes_writer.write_u8(
            (self.mpeg4_aac.profile.saturating_sub(1) << 6)
                | (self.mpeg4_aac.sampling_frequency_index << 2)
                | ((self.mpeg4_aac.channel_configuration >> 2) & 0x01),
        )?;
        self.bytes_writer.write_u8(
            ((self.mpeg4_aac.channel_configuration & 0x03) << 6)
                | (((frame_length >> 11) & 0x03) as u8),
        )?;
        self.bytes_writer.write_u8(((frame_length >> 3) & 0xff) as u8)?;
        self.bytes_writer
            .write_u8((((frame_length & 0x07) << 5) as u8) | 0x1f)?;
        /*buffer fullness: VBR*/
        self.bytes_writer.write_u8(0xfc)?;

        self.bytes_writer.write(&payload[..])?;

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // AAC-LC, 44.1kHz, stereo: 0x12 0x10
    const ASC_LC_44100_STEREO: [u8; 2] = [0x12, 0x10];

    #[test]
    fn test_audio_specific_config_load() {
        let mut processor = Mpeg4AacProcessor::new();
        processor
            .extend_data(BytesMut::from(&ASC_LC_44100_STEREO[..]))
            .unwrap()
            .audio_specific_config_load()
            .unwrap();

        assert_eq!(processor.mpeg4_aac.profile, 2);
        assert_eq!(processor.mpeg4_aac.sampling_frequency_index, 4);
        assert_eq!(processor.mpeg4_aac.sampling_frequency, 44100);
        assert_eq!(processor.mpeg4_aac.channel_configuration, 2);
    }

    #[test]
    fn test_audio_specific_config_round_trip() {
        let mut processor = Mpeg4AacProcessor::new();
        processor
            .extend_data(BytesMut::from(&ASC_LC_44100_STEREO[..]))
            .unwrap()
            .audio_specific_config_load()
            .unwrap();

        let saved = processor.audio_specific_config_save().unwrap();
        assert_eq!(&saved[..], &ASC_LC_44100_STEREO[..]);
    }

    #[test]
    fn test_adts_header() {
        let mut processor = Mpeg4AacProcessor::new();
        processor
            .extend_data(BytesMut::from(&ASC_LC_44100_STEREO[..]))
            .unwrap()
            .audio_specific_config_load()
            .unwrap();

        let raw = [0x21_u8, 0x00, 0x49, 0x90];
        processor
            .extend_data(BytesMut::from(&raw[..]))
            .unwrap()
            .adts_save()
            .unwrap();

        let adts = processor.bytes_writer.extract_current_bytes();
        assert_eq!(adts.len(), 7 + raw.len());
        assert_eq!(adts[0], 0xFF);
        assert_eq!(adts[1], 0xF1);

        // frame length field
        let frame_length =
            ((u32::from(adts[3]) & 0x03) << 11) | (u32::from(adts[4]) << 3) | (u32::from(adts[5]) >> 5);
        assert_eq!(frame_length as usize, 7 + raw.len());

        assert_eq!(&adts[7..], &raw[..]);
    }
}
