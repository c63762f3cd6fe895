use {
    super::{
        define::{
            epes_stream_id, epsi_stream_type, FIRST_ES_PID, MPEG_FLAG_IDR_FRAME, PAT_PID,
            PCR_INTERVAL_90KHZ, PMT_PID, TS_PACKET_SIZE, TS_SYNC_BYTE,
        },
        errors::{MpegTsError, MpegTsErrorValue},
        pat::{Pat, PatMuxer},
        pes::Pes,
        pmt::{Pmt, PmtMuxer},
    },
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
};

/// Muxes timed elementary-stream payloads into 188-byte transport
/// packets. Each segment re-opens with PAT and PMT; PCR rides the
/// video PID (or the first stream of an audio-only program).
pub struct TsMuxer {
    bytes_writer: BytesWriter,
    pat: Pat,
    next_pid: u16,
    pat_continuity_counter: u8,
    pmt_continuity_counter: u8,
    wrote_psi: bool,
    last_pcr_dts: Option<i64>,
}

impl Default for TsMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl TsMuxer {
    #[must_use]
    pub fn new() -> Self {
        let mut pat = Pat::new();
        let mut pmt = Pmt::new();
        pmt.pid = PMT_PID;
        pmt.program_number = 1;
        pat.pmt.push(pmt);

        Self {
            bytes_writer: BytesWriter::new(),
            pat,
            next_pid: FIRST_ES_PID,
            pat_continuity_counter: 0,
            pmt_continuity_counter: 0,
            wrote_psi: false,
            last_pcr_dts: None,
        }
    }

    /// Registers an elementary stream and returns its PID.
    pub fn add_stream(&mut self, stream_type: u8, esinfo: BytesMut) -> Result<u16, MpegTsError> {
        let pmt = &mut self.pat.pmt[0];
        if pmt.streams.len() >= 4 {
            return Err(MpegTsError {
                value: MpegTsErrorValue::StreamCountExeceed,
            });
        }

        let pid = self.next_pid;
        self.next_pid += 1;
        pmt.streams.push(Pes::new(pid, stream_type, esinfo));

        //PCR rides the video stream when there is one
        if stream_type == epsi_stream_type::PSI_STREAM_H264
            || stream_type == epsi_stream_type::PSI_STREAM_H265
            || pmt.pcr_pid == 0x1fff
        {
            pmt.pcr_pid = pid;
        }

        Ok(pid)
    }

    /// All packets muxed since the last `reset`, drained.
    pub fn get_data(&mut self) -> BytesMut {
        self.bytes_writer.extract_current_bytes()
    }

    /// Starts a new segment: the next write re-emits PAT/PMT.
    /// Continuity counters roll on so players see one seamless
    /// transport stream across segments.
    pub fn reset(&mut self) {
        self.wrote_psi = false;
        self.last_pcr_dts = None;
    }

    /// Writes one access unit. `pts`/`dts` are on the 90 kHz clock;
    /// `flags` marks IDR frames for random-access signalling.
    pub fn write(
        &mut self,
        pid: u16,
        pts: i64,
        dts: i64,
        flags: u16,
        payload: BytesMut,
    ) -> Result<(), MpegTsError> {
        if !self.wrote_psi {
            self.write_pat_pmt()?;
            self.wrote_psi = true;
        }

        let pcr_pid = self.pat.pmt[0].pcr_pid;
        let mut pcr = None;
        if pid == pcr_pid {
            let due = self
                .last_pcr_dts
                .is_none_or(|last| dts - last >= PCR_INTERVAL_90KHZ);
            if due {
                self.last_pcr_dts = Some(dts);
                pcr = Some(dts);
            }
        }

        let stream_index = self.pat.pmt[0]
            .streams
            .iter()
            .position(|stream| stream.pid == pid)
            .ok_or(MpegTsError {
                value: MpegTsErrorValue::UnknownPid(pid),
            })?;

        let stream_type = self.pat.pmt[0].streams[stream_index].codec_id;
        let pes_data = Self::build_pes(stream_type, pts, dts, &payload)?;

        let is_idr = flags & MPEG_FLAG_IDR_FRAME != 0;
        self.write_pes_packets(stream_index, &pes_data, pcr, is_idr)?;
        Ok(())
    }

    fn write_pat_pmt(&mut self) -> Result<(), MpegTsError> {
        let pat_section = PatMuxer::new().write(&self.pat)?;
        let pat_counter = self.pat_continuity_counter;
        self.pat_continuity_counter = (self.pat_continuity_counter + 1) & 0x0f;
        self.write_section_packet(PAT_PID, pat_counter, &pat_section)?;

        let pmt_section = PmtMuxer::new().write(&self.pat.pmt[0])?;
        let pmt_counter = self.pmt_continuity_counter;
        self.pmt_continuity_counter = (self.pmt_continuity_counter + 1) & 0x0f;
        self.write_section_packet(PMT_PID, pmt_counter, &pmt_section)?;

        Ok(())
    }

    fn write_section_packet(
        &mut self,
        pid: u16,
        continuity_counter: u8,
        section: &BytesMut,
    ) -> Result<(), MpegTsError> {
        let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
        packet.push(TS_SYNC_BYTE);
        /*payload_unit_start_indicator set*/
        packet.push(0x40 | ((pid >> 8) & 0x1f) as u8);
        packet.push((pid & 0xff) as u8);
        /*payload only*/
        packet.push(0x10 | continuity_counter);
        /*pointer field*/
        packet.push(0x00);
        packet.extend_from_slice(section);
        packet.resize(TS_PACKET_SIZE, 0xff);

        self.bytes_writer.write(&packet)?;
        Ok(())
    }

    fn build_pes(
        stream_type: u8,
        pts: i64,
        dts: i64,
        payload: &BytesMut,
    ) -> Result<Vec<u8>, MpegTsError> {
        let is_video = stream_type == epsi_stream_type::PSI_STREAM_H264
            || stream_type == epsi_stream_type::PSI_STREAM_H265;
        let stream_id = if is_video {
            epes_stream_id::PES_SID_VIDEO
        } else {
            epes_stream_id::PES_SID_AUDIO
        };
        let with_dts = pts != dts || is_video;

        let header_data_length: u8 = if with_dts { 10 } else { 5 };
        let mut pes = Vec::with_capacity(payload.len() + 14 + 5);

        /*packet_start_code_prefix + stream id*/
        pes.extend_from_slice(&[0x00, 0x00, 0x01, stream_id]);

        /*PES_packet_length; 0 means unbounded, required for large video*/
        let body_len = 3 + usize::from(header_data_length) + payload.len();
        let pes_packet_length = if body_len > 0xffff { 0 } else { body_len as u16 };
        pes.extend_from_slice(&pes_packet_length.to_be_bytes());

        /*'10' + flags*/
        pes.push(0x80);
        pes.push(if with_dts { 0xc0 } else { 0x80 });
        pes.push(header_data_length);

        Self::write_timestamp(&mut pes, if with_dts { 0x03 } else { 0x02 }, pts);
        if with_dts {
            Self::write_timestamp(&mut pes, 0x01, dts);
        }

        pes.extend_from_slice(payload);
        Ok(pes)
    }

    fn write_timestamp(buffer: &mut Vec<u8>, fourbits: u8, timestamp: i64) {
        let timestamp = timestamp & 0x1_ffff_ffff;
        buffer.push((fourbits << 4) | (((timestamp >> 30) as u8 & 0x07) << 1) | 1);
        buffer.push((timestamp >> 22) as u8);
        buffer.push((((timestamp >> 15) as u8 & 0x7f) << 1) | 1);
        buffer.push((timestamp >> 7) as u8);
        buffer.push((((timestamp as u8) & 0x7f) << 1) | 1);
    }

    fn write_pes_packets(
        &mut self,
        stream_index: usize,
        pes_data: &[u8],
        pcr: Option<i64>,
        is_idr: bool,
    ) -> Result<(), MpegTsError> {
        let pid = self.pat.pmt[0].streams[stream_index].pid;
        let mut position = 0_usize;
        let mut first = true;

        while position < pes_data.len() {
            let remaining = pes_data.len() - position;

            //adaptation flags + optional PCR, without the length byte
            let mut adaptation: Vec<u8> = Vec::new();
            if first && (pcr.is_some() || is_idr) {
                let mut flags = 0_u8;
                if is_idr {
                    flags |= 0x40; //random access indicator
                }
                if pcr.is_some() {
                    flags |= 0x10; //PCR flag
                }
                adaptation.push(flags);
                if let Some(pcr_value) = pcr {
                    Self::write_pcr(&mut adaptation, pcr_value);
                }
            }

            let mut adaptation_total = if adaptation.is_empty() {
                0
            } else {
                1 + adaptation.len()
            };
            let mut payload_space = TS_PACKET_SIZE - 4 - adaptation_total;

            if remaining < payload_space {
                let stuffing = payload_space - remaining;
                if adaptation.is_empty() {
                    if stuffing > 1 {
                        adaptation.push(0x00);
                        adaptation.extend(std::iter::repeat_n(0xff, stuffing - 2));
                    }
                    //stuffing == 1: a bare zero-length field fills it
                } else {
                    adaptation.extend(std::iter::repeat_n(0xff, stuffing));
                }
                adaptation_total = 1 + adaptation.len();
                if adaptation.is_empty() {
                    adaptation_total = 1;
                }
                payload_space = TS_PACKET_SIZE - 4 - adaptation_total;
            }

            let continuity_counter = self.pat.pmt[0].streams[stream_index].bump_continuity();

            let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
            packet.push(TS_SYNC_BYTE);
            let pusi: u8 = if first { 0x40 } else { 0x00 };
            packet.push(pusi | ((pid >> 8) & 0x1f) as u8);
            packet.push((pid & 0xff) as u8);
            let adaptation_control: u8 = if adaptation_total > 0 { 0x30 } else { 0x10 };
            packet.push(adaptation_control | continuity_counter);

            if adaptation_total > 0 {
                packet.push((adaptation_total - 1) as u8);
                packet.extend_from_slice(&adaptation);
            }

            packet.extend_from_slice(&pes_data[position..position + payload_space]);
            debug_assert_eq!(packet.len(), TS_PACKET_SIZE);

            self.bytes_writer.write(&packet)?;
            position += payload_space;
            first = false;
        }

        Ok(())
    }

    fn write_pcr(buffer: &mut Vec<u8>, pcr_base: i64) {
        let base = pcr_base & 0x1_ffff_ffff;
        buffer.push((base >> 25) as u8);
        buffer.push((base >> 17) as u8);
        buffer.push((base >> 9) as u8);
        buffer.push((base >> 1) as u8);
        buffer.push((((base & 0x01) as u8) << 7) | 0x7e);
        buffer.push(0x00);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn muxer_with_av() -> (TsMuxer, u16, u16) {
        let mut muxer = TsMuxer::new();
        let audio_pid = muxer
            .add_stream(epsi_stream_type::PSI_STREAM_AAC, BytesMut::new())
            .unwrap();
        let video_pid = muxer
            .add_stream(epsi_stream_type::PSI_STREAM_H264, BytesMut::new())
            .unwrap();
        (muxer, audio_pid, video_pid)
    }

    #[test]
    fn test_output_is_packet_aligned() {
        let (mut muxer, _, video_pid) = muxer_with_av();
        let payload = BytesMut::from(&[0_u8; 1000][..]);
        muxer
            .write(video_pid, 90_000, 90_000, MPEG_FLAG_IDR_FRAME, payload)
            .unwrap();

        let data = muxer.get_data();
        assert!(!data.is_empty());
        assert_eq!(data.len() % TS_PACKET_SIZE, 0);
        for packet in data.chunks(TS_PACKET_SIZE) {
            assert_eq!(packet[0], TS_SYNC_BYTE);
        }
    }

    #[test]
    fn test_segment_opens_with_pat_then_pmt() {
        let (mut muxer, audio_pid, _) = muxer_with_av();
        muxer
            .write(audio_pid, 0, 0, 0, BytesMut::from(&[0xff_u8; 100][..]))
            .unwrap();

        let data = muxer.get_data();
        let pat_pid = ((u16::from(data[1] & 0x1f)) << 8) | u16::from(data[2]);
        assert_eq!(pat_pid, PAT_PID);
        let second = &data[TS_PACKET_SIZE..];
        let pmt_pid = ((u16::from(second[1] & 0x1f)) << 8) | u16::from(second[2]);
        assert_eq!(pmt_pid, PMT_PID);
    }

    #[test]
    fn test_pcr_on_video_pid(){
        let (mut muxer, _, video_pid) = muxer_with_av();
        muxer
            .write(
                video_pid,
                180_000,
                180_000,
                MPEG_FLAG_IDR_FRAME,
                BytesMut::from(&[0_u8; 10][..]),
            )
            .unwrap();

        let data = muxer.get_data();
        //first video packet is the third one (after PAT and PMT)
        let video_packet = &data[2 * TS_PACKET_SIZE..3 * TS_PACKET_SIZE];
        assert_eq!(video_packet[3] & 0x30, 0x30, "adaptation field expected");
        let adaptation_flags = video_packet[5];
        assert_eq!(adaptation_flags & 0x10, 0x10, "PCR flag expected");
        assert_eq!(adaptation_flags & 0x40, 0x40, "random access expected");
    }

    #[test]
    fn test_reset_reemits_psi() {
        let (mut muxer, audio_pid, _) = muxer_with_av();
        muxer
            .write(audio_pid, 0, 0, 0, BytesMut::from(&[0_u8; 10][..]))
            .unwrap();
        let first_segment = muxer.get_data();
        assert!(!first_segment.is_empty());

        muxer.reset();
        muxer
            .write(audio_pid, 9000, 9000, 0, BytesMut::from(&[0_u8; 10][..]))
            .unwrap();
        let second_segment = muxer.get_data();

        let pat_pid = ((u16::from(second_segment[1] & 0x1f)) << 8) | u16::from(second_segment[2]);
        assert_eq!(pat_pid, PAT_PID);
    }

    #[test]
    fn test_small_payload_fits_one_stuffed_packet() {
        let (mut muxer, audio_pid, _) = muxer_with_av();
        muxer
            .write(audio_pid, 0, 0, 0, BytesMut::from(&[0xAB_u8; 8][..]))
            .unwrap();
        let data = muxer.get_data();
        //PAT + PMT + exactly one ES packet
        assert_eq!(data.len(), 3 * TS_PACKET_SIZE);
        let es_packet = &data[2 * TS_PACKET_SIZE..];
        //payload ends with our bytes
        assert_eq!(&es_packet[TS_PACKET_SIZE - 8..], &[0xAB_u8; 8]);
    }
}
