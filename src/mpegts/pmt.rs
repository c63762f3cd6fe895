use {
    super::{
        crc32,
        define::{epat_pid, epsi_stream_type},
        errors::MpegTsError,
        pes,
    },
    byteorder::{BigEndian, LittleEndian},
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
};

#[derive(Debug, Clone)]
pub struct Pmt {
    pub pid: u16,
    pub program_number: u16,
    pub version_number: u8, //5 bits
    pub continuity_counter: u8,
    pub pcr_pid: u16, //13 bits
    pub program_info: BytesMut,
    pub streams: Vec<pes::Pes>,
}

impl Default for Pmt {
    fn default() -> Self {
        Self::new()
    }
}

impl Pmt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pid: 0,
            program_number: 0,
            version_number: 0,
            continuity_counter: 0,
            pcr_pid: 0x1fff,
            program_info: BytesMut::new(),
            streams: Vec::new(),
        }
    }
}

pub struct PmtMuxer {
    pub bytes_writer: BytesWriter,
}

impl Default for PmtMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl PmtMuxer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes_writer: BytesWriter::new(),
        }
    }

    pub fn write(&mut self, pmt: &Pmt) -> Result<BytesMut, MpegTsError> {
        /*table id*/
        self.bytes_writer.write_u8(epat_pid::PAT_TID_PMS as u8)?;

        let mut body_writer = BytesWriter::new();
        /*program_number*/
        body_writer.write_u16::<BigEndian>(pmt.program_number)?;
        /*version_number + current_next_indicator*/
        body_writer.write_u8(0xC1 | (pmt.version_number << 1))?;
        /*section_number*/
        body_writer.write_u8(0x00)?;
        /*last_section_number*/
        body_writer.write_u8(0x00)?;
        /*PCR_PID*/
        body_writer.write_u16::<BigEndian>(0xE000 | pmt.pcr_pid)?;
        /*program_info_length*/
        let program_info_length = pmt.program_info.len() as u16;
        body_writer.write_u16::<BigEndian>(0xF000 | program_info_length)?;
        if program_info_length > 0 && program_info_length < 0x400 {
            body_writer.write(&pmt.program_info[..])?;
        }

        for stream in &pmt.streams {
            /*stream_type; opus rides in private data*/
            let stream_type = if stream.codec_id == epsi_stream_type::PSI_STREAM_AUDIO_OPUS {
                epsi_stream_type::PSI_STREAM_PRIVATE_DATA
            } else {
                stream.codec_id
            };
            body_writer.write_u8(stream_type)?;
            /*elementary_PID*/
            body_writer.write_u16::<BigEndian>(0xE000 | stream.pid)?;
            /*ES_info_length*/
            body_writer.write_u16::<BigEndian>(0xF000)?;
        }

        /*section_length*/
        self.bytes_writer
            .write_u16::<BigEndian>(0xB000 | ((body_writer.len() as u16) + 4))?;
        self.bytes_writer
            .write(&body_writer.extract_current_bytes()[..])?;

        /*crc32*/
        let crc32_value = crc32::gen_crc32(0xffff_ffff, self.bytes_writer.get_current_bytes());
        self.bytes_writer.write_u32::<LittleEndian>(crc32_value)?;

        Ok(self.bytes_writer.extract_current_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pmt_without_streams() {
        let mut muxer = PmtMuxer::new();
        let data = muxer.write(&Pmt::new()).unwrap();
        assert!(!data.is_empty());
        assert_eq!(data[0], epat_pid::PAT_TID_PMS as u8);
    }

    #[test]
    fn test_pmt_with_streams_lists_both() {
        let mut pmt = Pmt::new();
        pmt.program_number = 1;
        pmt.pcr_pid = 0x101;
        pmt.streams.push(pes::Pes::new(
            0x100,
            epsi_stream_type::PSI_STREAM_AAC,
            BytesMut::new(),
        ));
        pmt.streams.push(pes::Pes::new(
            0x101,
            epsi_stream_type::PSI_STREAM_H264,
            BytesMut::new(),
        ));

        let mut muxer = PmtMuxer::new();
        let data = muxer.write(&pmt).unwrap();
        // 2 entries of 5 bytes each on top of the 16-byte base section
        assert_eq!(data.len(), 16 + 10);
    }
}
