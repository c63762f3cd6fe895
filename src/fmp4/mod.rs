pub mod errors;

use {
    byteorder::BigEndian,
    bytes::BytesMut,
    crate::bytesio::bytes_writer::BytesWriter,
    errors::{Fmp4Error, Fmp4ErrorValue},
};

/// Milliseconds everywhere: mdhd, tfdt and trun all run on this
/// timescale, matching the hub's timestamps one to one.
pub const TIMESCALE: u32 = 1000;

pub const VIDEO_TRACK_ID: u32 = 1;
pub const AUDIO_TRACK_ID: u32 = 2;

/// ISO-BMFF box building on top of the byte writer: boxes open with a
/// size placeholder that closes back-patch.
pub struct BoxWriter {
    pub writer: BytesWriter,
}

impl Default for BoxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BoxWriter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: BytesWriter::new(),
        }
    }

    pub fn open_box(&mut self, box_type: &[u8; 4]) -> Result<usize, Fmp4Error> {
        let position = self.writer.len();
        self.writer.write_u32::<BigEndian>(0)?;
        self.writer.write(box_type)?;
        Ok(position)
    }

    pub fn close_box(&mut self, position: usize) -> Result<(), Fmp4Error> {
        let size = (self.writer.len() - position) as u32;
        self.writer.write_at(position, &size.to_be_bytes())?;
        Ok(())
    }

    pub fn full_box_header(&mut self, version: u8, flags: u32) -> Result<(), Fmp4Error> {
        self.writer.write_u8(version)?;
        self.writer.write_u24::<BigEndian>(flags)?;
        Ok(())
    }

    pub fn extract(&mut self) -> BytesMut {
        self.writer.extract_current_bytes()
    }
}

/// What a track's init segment needs to describe its samples.
pub enum TrackConfig {
    Video {
        width: u32,
        height: u32,
        /// AVCDecoderConfigurationRecord (avcC body).
        avc_config: BytesMut,
    },
    Audio {
        channels: u8,
        sample_rate: u32,
        /// AudioSpecificConfig (esds decoder specific info).
        audio_config: BytesMut,
    },
}

impl TrackConfig {
    const fn track_id(&self) -> u32 {
        match self {
            Self::Video { .. } => VIDEO_TRACK_ID,
            Self::Audio { .. } => AUDIO_TRACK_ID,
        }
    }

    /// RFC 6381 codecs attribute for the MPD.
    #[must_use]
    pub fn codec_string(&self) -> String {
        match self {
            Self::Video { avc_config, .. } => {
                if avc_config.len() >= 4 {
                    format!(
                        "avc1.{:02X}{:02X}{:02X}",
                        avc_config[1], avc_config[2], avc_config[3]
                    )
                } else {
                    "avc1.42C01E".to_string()
                }
            }
            Self::Audio { .. } => "mp4a.40.2".to_string(),
        }
    }
}

/// One sample inside a media fragment.
#[derive(Debug, Clone)]
pub struct Sample {
    pub duration_ms: u32,
    pub size: u32,
    pub is_keyframe: bool,
    /// pts - dts, video only.
    pub composition_offset_ms: i32,
}

/// Builds `video-init.mp4` / `audio-init.mp4`.
pub struct InitSegmentWriter;

impl InitSegmentWriter {
    pub fn write(config: &TrackConfig) -> Result<BytesMut, Fmp4Error> {
        let mut boxes = BoxWriter::new();

        let ftyp = boxes.open_box(b"ftyp")?;
        boxes.writer.write(b"iso5")?;
        boxes.writer.write_u32::<BigEndian>(512)?;
        boxes.writer.write(b"iso5")?;
        boxes.writer.write(b"iso6")?;
        boxes.writer.write(b"mp41")?;
        boxes.close_box(ftyp)?;

        let moov = boxes.open_box(b"moov")?;
        Self::write_mvhd(&mut boxes)?;
        Self::write_trak(&mut boxes, config)?;
        Self::write_mvex(&mut boxes, config.track_id())?;
        boxes.close_box(moov)?;

        Ok(boxes.extract())
    }

    fn write_mvhd(boxes: &mut BoxWriter) -> Result<(), Fmp4Error> {
        let mvhd = boxes.open_box(b"mvhd")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(0)?; //creation_time
        boxes.writer.write_u32::<BigEndian>(0)?; //modification_time
        boxes.writer.write_u32::<BigEndian>(TIMESCALE)?;
        boxes.writer.write_u32::<BigEndian>(0)?; //duration: live
        boxes.writer.write_u32::<BigEndian>(0x0001_0000)?; //rate 1.0
        boxes.writer.write_u16::<BigEndian>(0x0100)?; //volume 1.0
        boxes.writer.write_u16::<BigEndian>(0)?; //reserved
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write_u32::<BigEndian>(0)?;
        Self::write_identity_matrix(boxes)?;
        for _ in 0..6 {
            boxes.writer.write_u32::<BigEndian>(0)?; //pre_defined
        }
        boxes.writer.write_u32::<BigEndian>(0xffff_ffff)?; //next_track_ID
        boxes.close_box(mvhd)?;
        Ok(())
    }

    fn write_identity_matrix(boxes: &mut BoxWriter) -> Result<(), Fmp4Error> {
        let matrix: [u32; 9] = [
            0x0001_0000, 0, 0, //
            0, 0x0001_0000, 0, //
            0, 0, 0x4000_0000,
        ];
        for value in matrix {
            boxes.writer.write_u32::<BigEndian>(value)?;
        }
        Ok(())
    }

    fn write_trak(boxes: &mut BoxWriter, config: &TrackConfig) -> Result<(), Fmp4Error> {
        let trak = boxes.open_box(b"trak")?;

        let tkhd = boxes.open_box(b"tkhd")?;
        boxes.full_box_header(0, 0x07)?; //enabled | in_movie | in_preview
        boxes.writer.write_u32::<BigEndian>(0)?; //creation_time
        boxes.writer.write_u32::<BigEndian>(0)?; //modification_time
        boxes.writer.write_u32::<BigEndian>(config.track_id())?;
        boxes.writer.write_u32::<BigEndian>(0)?; //reserved
        boxes.writer.write_u32::<BigEndian>(0)?; //duration
        boxes.writer.write_u32::<BigEndian>(0)?; //reserved
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write_u16::<BigEndian>(0)?; //layer
        boxes.writer.write_u16::<BigEndian>(0)?; //alternate_group
        let volume: u16 = match config {
            TrackConfig::Audio { .. } => 0x0100,
            TrackConfig::Video { .. } => 0,
        };
        boxes.writer.write_u16::<BigEndian>(volume)?;
        boxes.writer.write_u16::<BigEndian>(0)?; //reserved
        Self::write_identity_matrix(boxes)?;
        let (width, height) = match config {
            TrackConfig::Video { width, height, .. } => (*width, *height),
            TrackConfig::Audio { .. } => (0, 0),
        };
        boxes.writer.write_u32::<BigEndian>(width << 16)?; //16.16
        boxes.writer.write_u32::<BigEndian>(height << 16)?;
        boxes.close_box(tkhd)?;

        let mdia = boxes.open_box(b"mdia")?;

        let mdhd = boxes.open_box(b"mdhd")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write_u32::<BigEndian>(TIMESCALE)?;
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write_u16::<BigEndian>(0x55c4)?; //language: und
        boxes.writer.write_u16::<BigEndian>(0)?;
        boxes.close_box(mdhd)?;

        let hdlr = boxes.open_box(b"hdlr")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(0)?; //pre_defined
        match config {
            TrackConfig::Video { .. } => {
                boxes.writer.write(b"vide")?;
                for _ in 0..3 {
                    boxes.writer.write_u32::<BigEndian>(0)?;
                }
                boxes.writer.write(b"VideoHandler\0")?;
            }
            TrackConfig::Audio { .. } => {
                boxes.writer.write(b"soun")?;
                for _ in 0..3 {
                    boxes.writer.write_u32::<BigEndian>(0)?;
                }
                boxes.writer.write(b"SoundHandler\0")?;
            }
        }
        boxes.close_box(hdlr)?;

        let minf = boxes.open_box(b"minf")?;
        match config {
            TrackConfig::Video { .. } => {
                let vmhd = boxes.open_box(b"vmhd")?;
                boxes.full_box_header(0, 1)?;
                boxes.writer.write_u16::<BigEndian>(0)?; //graphicsmode
                for _ in 0..3 {
                    boxes.writer.write_u16::<BigEndian>(0)?; //opcolor
                }
                boxes.close_box(vmhd)?;
            }
            TrackConfig::Audio { .. } => {
                let smhd = boxes.open_box(b"smhd")?;
                boxes.full_box_header(0, 0)?;
                boxes.writer.write_u16::<BigEndian>(0)?; //balance
                boxes.writer.write_u16::<BigEndian>(0)?;
                boxes.close_box(smhd)?;
            }
        }

        let dinf = boxes.open_box(b"dinf")?;
        let dref = boxes.open_box(b"dref")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(1)?; //entry_count
        let url = boxes.open_box(b"url ")?;
        boxes.full_box_header(0, 1)?; //self-contained
        boxes.close_box(url)?;
        boxes.close_box(dref)?;
        boxes.close_box(dinf)?;

        Self::write_stbl(boxes, config)?;

        boxes.close_box(minf)?;
        boxes.close_box(mdia)?;
        boxes.close_box(trak)?;
        Ok(())
    }

    fn write_stbl(boxes: &mut BoxWriter, config: &TrackConfig) -> Result<(), Fmp4Error> {
        let stbl = boxes.open_box(b"stbl")?;

        let stsd = boxes.open_box(b"stsd")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(1)?; //entry_count
        match config {
            TrackConfig::Video {
                width,
                height,
                avc_config,
            } => {
                let avc1 = boxes.open_box(b"avc1")?;
                for _ in 0..6 {
                    boxes.writer.write_u8(0)?; //reserved
                }
                boxes.writer.write_u16::<BigEndian>(1)?; //data_reference_index
                boxes.writer.write_u16::<BigEndian>(0)?; //pre_defined
                boxes.writer.write_u16::<BigEndian>(0)?; //reserved
                for _ in 0..3 {
                    boxes.writer.write_u32::<BigEndian>(0)?; //pre_defined
                }
                boxes.writer.write_u16::<BigEndian>(*width as u16)?;
                boxes.writer.write_u16::<BigEndian>(*height as u16)?;
                boxes.writer.write_u32::<BigEndian>(0x0048_0000)?; //72dpi
                boxes.writer.write_u32::<BigEndian>(0x0048_0000)?;
                boxes.writer.write_u32::<BigEndian>(0)?; //reserved
                boxes.writer.write_u16::<BigEndian>(1)?; //frame_count
                boxes.writer.write(&[0_u8; 32])?; //compressorname
                boxes.writer.write_u16::<BigEndian>(0x0018)?; //depth 24
                boxes.writer.write_u16::<BigEndian>(0xffff)?; //pre_defined -1

                let avcc = boxes.open_box(b"avcC")?;
                boxes.writer.write(&avc_config[..])?;
                boxes.close_box(avcc)?;

                boxes.close_box(avc1)?;
            }
            TrackConfig::Audio {
                channels,
                sample_rate,
                audio_config,
            } => {
                let mp4a = boxes.open_box(b"mp4a")?;
                for _ in 0..6 {
                    boxes.writer.write_u8(0)?; //reserved
                }
                boxes.writer.write_u16::<BigEndian>(1)?; //data_reference_index
                boxes.writer.write_u32::<BigEndian>(0)?; //reserved
                boxes.writer.write_u32::<BigEndian>(0)?;
                boxes.writer.write_u16::<BigEndian>(u16::from(*channels))?;
                boxes.writer.write_u16::<BigEndian>(16)?; //samplesize
                boxes.writer.write_u32::<BigEndian>(0)?; //pre_defined + reserved
                boxes.writer.write_u32::<BigEndian>(sample_rate << 16)?;

                Self::write_esds(boxes, audio_config)?;

                boxes.close_box(mp4a)?;
            }
        }
        boxes.close_box(stsd)?;

        //fragmented movies leave the static sample tables empty
        for box_type in [b"stts", b"stsc", b"stco"] {
            let empty = boxes.open_box(box_type)?;
            boxes.full_box_header(0, 0)?;
            boxes.writer.write_u32::<BigEndian>(0)?;
            boxes.close_box(empty)?;
        }
        let stsz = boxes.open_box(b"stsz")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(0)?; //sample_size
        boxes.writer.write_u32::<BigEndian>(0)?; //sample_count
        boxes.close_box(stsz)?;

        boxes.close_box(stbl)?;
        Ok(())
    }

    fn write_esds(boxes: &mut BoxWriter, audio_config: &BytesMut) -> Result<(), Fmp4Error> {
        let esds = boxes.open_box(b"esds")?;
        boxes.full_box_header(0, 0)?;

        let config_len = audio_config.len() as u8;
        /*ES descriptor*/
        boxes.writer.write_u8(0x03)?;
        boxes.writer.write_u8(23 + config_len)?;
        boxes.writer.write_u16::<BigEndian>(0)?; //ES_ID
        boxes.writer.write_u8(0)?; //flags
        /*DecoderConfig descriptor*/
        boxes.writer.write_u8(0x04)?;
        boxes.writer.write_u8(15 + config_len)?;
        boxes.writer.write_u8(0x40)?; //AAC
        boxes.writer.write_u8(0x15)?; //audio stream
        boxes.writer.write_u24::<BigEndian>(0)?; //buffer size
        boxes.writer.write_u32::<BigEndian>(0)?; //max bitrate
        boxes.writer.write_u32::<BigEndian>(0)?; //avg bitrate
        /*DecoderSpecificInfo*/
        boxes.writer.write_u8(0x05)?;
        boxes.writer.write_u8(config_len)?;
        boxes.writer.write(&audio_config[..])?;
        /*SLConfig descriptor*/
        boxes.writer.write_u8(0x06)?;
        boxes.writer.write_u8(0x01)?;
        boxes.writer.write_u8(0x02)?;

        boxes.close_box(esds)?;
        Ok(())
    }

    fn write_mvex(boxes: &mut BoxWriter, track_id: u32) -> Result<(), Fmp4Error> {
        let mvex = boxes.open_box(b"mvex")?;
        let trex = boxes.open_box(b"trex")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(track_id)?;
        boxes.writer.write_u32::<BigEndian>(1)?; //default_sample_description_index
        boxes.writer.write_u32::<BigEndian>(0)?; //default_sample_duration
        boxes.writer.write_u32::<BigEndian>(0)?; //default_sample_size
        boxes.writer.write_u32::<BigEndian>(0)?; //default_sample_flags
        boxes.close_box(trex)?;
        boxes.close_box(mvex)?;
        Ok(())
    }
}

/// Builds one `styp` + `sidx` + `moof` + `mdat` media segment.
pub struct MediaSegmentWriter;

impl MediaSegmentWriter {
    pub fn write(
        track_id: u32,
        sequence_number: u32,
        base_decode_time_ms: u64,
        samples: &[Sample],
        payload: &BytesMut,
    ) -> Result<BytesMut, Fmp4Error> {
        if samples.is_empty() {
            return Err(Fmp4Error {
                value: Fmp4ErrorValue::EmptyFragment,
            });
        }

        let mut boxes = BoxWriter::new();

        let styp = boxes.open_box(b"styp")?;
        boxes.writer.write(b"msdh")?;
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write(b"msdh")?;
        boxes.writer.write(b"msix")?;
        boxes.close_box(styp)?;

        let total_duration: u32 = samples.iter().map(|sample| sample.duration_ms).sum();
        Self::write_sidx(&mut boxes, track_id, base_decode_time_ms, total_duration)?;

        let is_video = track_id == VIDEO_TRACK_ID;
        let moof = boxes.open_box(b"moof")?;

        let mfhd = boxes.open_box(b"mfhd")?;
        boxes.full_box_header(0, 0)?;
        boxes.writer.write_u32::<BigEndian>(sequence_number)?;
        boxes.close_box(mfhd)?;

        let traf = boxes.open_box(b"traf")?;

        let tfhd = boxes.open_box(b"tfhd")?;
        boxes.full_box_header(0, 0x020000)?; //default-base-is-moof
        boxes.writer.write_u32::<BigEndian>(track_id)?;
        boxes.close_box(tfhd)?;

        let tfdt = boxes.open_box(b"tfdt")?;
        boxes.full_box_header(1, 0)?;
        boxes.writer.write_u64::<BigEndian>(base_decode_time_ms)?;
        boxes.close_box(tfdt)?;

        /*
         * trun flags: data-offset, duration, size, flags, and for video
         * the composition offsets.
         */
        let mut trun_flags: u32 = 0x000001 | 0x000100 | 0x000200 | 0x000400;
        if is_video {
            trun_flags |= 0x000800;
        }
        let trun = boxes.open_box(b"trun")?;
        boxes.full_box_header(if is_video { 1 } else { 0 }, trun_flags)?;
        boxes.writer.write_u32::<BigEndian>(samples.len() as u32)?;
        let data_offset_position = boxes.writer.len();
        boxes.writer.write_u32::<BigEndian>(0)?; //patched below
        for sample in samples {
            boxes.writer.write_u32::<BigEndian>(sample.duration_ms)?;
            boxes.writer.write_u32::<BigEndian>(sample.size)?;
            let flags: u32 = if sample.is_keyframe {
                0x0200_0000
            } else {
                0x0101_0000
            };
            boxes.writer.write_u32::<BigEndian>(flags)?;
            if is_video {
                boxes
                    .writer
                    .write_u32::<BigEndian>(sample.composition_offset_ms as u32)?;
            }
        }
        boxes.close_box(trun)?;
        boxes.close_box(traf)?;
        boxes.close_box(moof)?;

        //data offset points at the first mdat payload byte, measured
        //from the start of moof
        let moof_size = boxes.writer.len() - moof;
        let data_offset = (moof_size + 8) as u32;
        boxes
            .writer
            .write_at(data_offset_position, &data_offset.to_be_bytes())?;

        let mdat = boxes.open_box(b"mdat")?;
        boxes.writer.write(&payload[..])?;
        boxes.close_box(mdat)?;

        Ok(boxes.extract())
    }

    fn write_sidx(
        boxes: &mut BoxWriter,
        track_id: u32,
        earliest_presentation_time_ms: u64,
        duration_ms: u32,
    ) -> Result<(), Fmp4Error> {
        let sidx = boxes.open_box(b"sidx")?;
        boxes.full_box_header(1, 0)?;
        boxes.writer.write_u32::<BigEndian>(track_id)?; //reference_ID
        boxes.writer.write_u32::<BigEndian>(TIMESCALE)?;
        boxes
            .writer
            .write_u64::<BigEndian>(earliest_presentation_time_ms)?;
        boxes.writer.write_u64::<BigEndian>(0)?; //first_offset
        boxes.writer.write_u16::<BigEndian>(0)?; //reserved
        boxes.writer.write_u16::<BigEndian>(1)?; //reference_count
        //referenced_size is unknown until the segment is closed; 0 is
        //tolerated by players for live profiles
        boxes.writer.write_u32::<BigEndian>(0)?;
        boxes.writer.write_u32::<BigEndian>(duration_ms)?;
        boxes.writer.write_u32::<BigEndian>(0x9000_0000)?; //starts_with_SAP
        boxes.close_box(sidx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_types(data: &BytesMut) -> Vec<String> {
        let mut types = Vec::new();
        let mut position = 0;
        while position + 8 <= data.len() {
            let size = u32::from_be_bytes([
                data[position],
                data[position + 1],
                data[position + 2],
                data[position + 3],
            ]) as usize;
            types.push(String::from_utf8_lossy(&data[position + 4..position + 8]).to_string());
            if size < 8 {
                break;
            }
            position += size;
        }
        types
    }

    #[test]
    fn test_video_init_segment_box_layout() {
        let config = TrackConfig::Video {
            width: 1280,
            height: 720,
            avc_config: BytesMut::from(&[0x01, 0x64, 0x00, 0x1f, 0xff, 0xe1, 0x00, 0x00][..]),
        };
        let init = InitSegmentWriter::write(&config).unwrap();
        assert_eq!(box_types(&init), vec!["ftyp", "moov"]);
        //avcC must appear inside the moov
        let needle = b"avcC";
        assert!(init.windows(4).any(|window| window == needle));
    }

    #[test]
    fn test_audio_init_segment_has_esds() {
        let config = TrackConfig::Audio {
            channels: 2,
            sample_rate: 44_100,
            audio_config: BytesMut::from(&[0x12, 0x10][..]),
        };
        let init = InitSegmentWriter::write(&config).unwrap();
        assert!(init.windows(4).any(|window| window == b"esds"));
        assert!(init.windows(4).any(|window| window == b"mp4a"));
    }

    #[test]
    fn test_codec_strings() {
        let video = TrackConfig::Video {
            width: 0,
            height: 0,
            avc_config: BytesMut::from(&[0x01, 0x64, 0x00, 0x1f][..]),
        };
        assert_eq!(video.codec_string(), "avc1.64001F");
        let audio = TrackConfig::Audio {
            channels: 2,
            sample_rate: 44_100,
            audio_config: BytesMut::new(),
        };
        assert_eq!(audio.codec_string(), "mp4a.40.2");
    }

    #[test]
    fn test_media_segment_layout_and_data_offset() {
        let samples = vec![
            Sample {
                duration_ms: 33,
                size: 4,
                is_keyframe: true,
                composition_offset_ms: 0,
            },
            Sample {
                duration_ms: 33,
                size: 3,
                is_keyframe: false,
                composition_offset_ms: 40,
            },
        ];
        let payload = BytesMut::from(&[1, 2, 3, 4, 5, 6, 7][..]);
        let segment =
            MediaSegmentWriter::write(VIDEO_TRACK_ID, 1, 10_000, &samples, &payload).unwrap();

        assert_eq!(box_types(&segment), vec!["styp", "sidx", "moof", "mdat"]);
        //mdat payload is the concatenated samples
        assert_eq!(&segment[segment.len() - 7..], &[1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_media_segment_rejects_empty() {
        let result = MediaSegmentWriter::write(AUDIO_TRACK_ID, 1, 0, &[], &BytesMut::new());
        assert!(matches!(
            result.unwrap_err().value,
            Fmp4ErrorValue::EmptyFragment
        ));
    }
}
