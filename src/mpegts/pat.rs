use {
    super::{crc32, define::epat_pid, errors::MpegTsError, pmt},
    byteorder::{BigEndian, LittleEndian},
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
};

#[derive(Debug, Clone)]
pub struct Pat {
    transport_stream_id: u16,
    version_number: u8, //5 bits
    pub pmt: Vec<pmt::Pmt>,
}

impl Default for Pat {
    fn default() -> Self {
        Self::new()
    }
}

impl Pat {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            transport_stream_id: 1,
            version_number: 0,
            pmt: Vec::new(),
        }
    }
}

//ITU-T H.222.0 program association section
pub struct PatMuxer {
    pub bytes_writer: BytesWriter,
}

impl Default for PatMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl PatMuxer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes_writer: BytesWriter::new(),
        }
    }

    pub fn write(&mut self, pat: &Pat) -> Result<BytesMut, MpegTsError> {
        /*table id*/
        self.bytes_writer.write_u8(epat_pid::PAT_TID_PAS as u8)?;

        /*section length*/
        let length = pat.pmt.len() as u16 * 4 + 5 + 4;
        self.bytes_writer.write_u16::<BigEndian>(0xb000 | length)?;
        /*transport_stream_id*/
        self.bytes_writer
            .write_u16::<BigEndian>(pat.transport_stream_id)?;
        /*version_number + current_next_indicator*/
        self.bytes_writer
            .write_u8(0xC1 | (pat.version_number << 1))?;
        /*section_number + last_section_number*/
        self.bytes_writer.write_u16::<BigEndian>(0x00)?;

        for program in &pat.pmt {
            /*program number*/
            self.bytes_writer
                .write_u16::<BigEndian>(program.program_number)?;
            /*PID*/
            self.bytes_writer
                .write_u16::<BigEndian>(0xE000 | program.pid)?;
        }

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
    fn test_empty_pat_section_size() {
        let mut muxer = PatMuxer::new();
        let data = muxer.write(&Pat::new()).unwrap();
        // table_id(1) + section_length(2) + tsid(2) + version(1) +
        // section numbers(2) + crc32(4)
        assert_eq!(data.len(), 12);
        assert_eq!(data[0], epat_pid::PAT_TID_PAS as u8);
    }

    #[test]
    fn test_pat_with_one_program() {
        let mut pat = Pat::new();
        let mut pmt = pmt::Pmt::new();
        pmt.program_number = 1;
        pmt.pid = super::super::define::PMT_PID;
        pat.pmt.push(pmt);

        let mut muxer = PatMuxer::new();
        let data = muxer.write(&pat).unwrap();
        assert_eq!(data.len(), 16);
        // program number 1, then PID with reserved bits set
        assert_eq!(&data[8..10], &[0x00, 0x01]);
    }
}
