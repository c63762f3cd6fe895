use {
    super::errors::{H264Error, H264ErrorValue},
    bytes::BytesMut,
    crate::bytesio::{bits_reader::BitsReader, bytes_reader::BytesReader},
};

/// The fields of a sequence parameter set that the server cares about:
/// stream geometry for statistics and manifests, profile/level for
/// codec reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
}

pub struct SpsParser;

impl SpsParser {
    /// Parse one SPS NALU (with its 1-byte NAL header, no start code).
    pub fn parse(data: BytesMut) -> Result<SpsInfo, H264Error> {
        let rbsp = Self::extract_rbsp(&data);
        let mut bits = BitsReader::new(BytesReader::new(rbsp));

        let nal_header = bits.read_n_bits(8)? as u8;
        if nal_header & 0x1f != 7 {
            return Err(H264Error {
                value: H264ErrorValue::NotSpsNalu,
            });
        }

        let profile_idc = bits.read_n_bits(8)? as u8;
        /*constraint flags + reserved*/
        bits.read_n_bits(8)?;
        let level_idc = bits.read_n_bits(8)? as u8;
        /*seq_parameter_set_id*/
        bits.read_ue()?;

        let mut chroma_format_idc = 1;
        if matches!(
            profile_idc,
            100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
        ) {
            chroma_format_idc = bits.read_ue()?;
            if chroma_format_idc > 3 {
                return Err(H264Error {
                    value: H264ErrorValue::UnsupportedChromaFormat(chroma_format_idc),
                });
            }
            if chroma_format_idc == 3 {
                /*separate_colour_plane_flag*/
                bits.read_bit()?;
            }
            /*bit_depth_luma_minus8*/
            bits.read_ue()?;
            /*bit_depth_chroma_minus8*/
            bits.read_ue()?;
            /*qpprime_y_zero_transform_bypass_flag*/
            bits.read_bit()?;
            let seq_scaling_matrix_present = bits.read_bit()?;
            if seq_scaling_matrix_present == 1 {
                let count = if chroma_format_idc == 3 { 12 } else { 8 };
                for i in 0..count {
                    let present = bits.read_bit()?;
                    if present == 1 {
                        Self::skip_scaling_list(&mut bits, if i < 6 { 16 } else { 64 })?;
                    }
                }
            }
        }

        /*log2_max_frame_num_minus4*/
        bits.read_ue()?;
        let pic_order_cnt_type = bits.read_ue()?;
        if pic_order_cnt_type == 0 {
            /*log2_max_pic_order_cnt_lsb_minus4*/
            bits.read_ue()?;
        } else if pic_order_cnt_type == 1 {
            /*delta_pic_order_always_zero_flag*/
            bits.read_bit()?;
            /*offset_for_non_ref_pic*/
            bits.read_se()?;
            /*offset_for_top_to_bottom_field*/
            bits.read_se()?;
            let cycle_len = bits.read_ue()?;
            for _ in 0..cycle_len {
                bits.read_se()?;
            }
        }

        /*max_num_ref_frames*/
        bits.read_ue()?;
        /*gaps_in_frame_num_value_allowed_flag*/
        bits.read_bit()?;

        let pic_width_in_mbs_minus1 = bits.read_ue()?;
        let pic_height_in_map_units_minus1 = bits.read_ue()?;
        let frame_mbs_only_flag = bits.read_bit()?;
        if frame_mbs_only_flag == 0 {
            /*mb_adaptive_frame_field_flag*/
            bits.read_bit()?;
        }
        /*direct_8x8_inference_flag*/
        bits.read_bit()?;

        let mut crop_left = 0_u64;
        let mut crop_right = 0_u64;
        let mut crop_top = 0_u64;
        let mut crop_bottom = 0_u64;
        let frame_cropping_flag = bits.read_bit()?;
        if frame_cropping_flag == 1 {
            crop_left = bits.read_ue()?;
            crop_right = bits.read_ue()?;
            crop_top = bits.read_ue()?;
            crop_bottom = bits.read_ue()?;
        }

        let (crop_unit_x, crop_unit_y) = match chroma_format_idc {
            0 => (1, 2 - u64::from(frame_mbs_only_flag)),
            1 => (2, 2 * (2 - u64::from(frame_mbs_only_flag))),
            2 => (2, 2 - u64::from(frame_mbs_only_flag)),
            _ => (1, 2 - u64::from(frame_mbs_only_flag)),
        };

        let width = (pic_width_in_mbs_minus1 + 1) * 16 - crop_unit_x * (crop_left + crop_right);
        let height = (2 - u64::from(frame_mbs_only_flag))
            * (pic_height_in_map_units_minus1 + 1)
            * 16
            - crop_unit_y * (crop_top + crop_bottom);

        Ok(SpsInfo {
            profile_idc,
            level_idc,
            width: width as u32,
            height: height as u32,
        })
    }

    /// Strip emulation prevention bytes (00 00 03 -> 00 00).
    fn extract_rbsp(data: &BytesMut) -> BytesMut {
        let mut rbsp = BytesMut::with_capacity(data.len());
        let mut zero_count = 0;
        for &byte in data.iter() {
            if zero_count == 2 && byte == 0x03 {
                zero_count = 0;
                continue;
            }
            zero_count = if byte == 0 { zero_count + 1 } else { 0 };
            rbsp.extend_from_slice(&[byte]);
        }
        rbsp
    }

    fn skip_scaling_list(bits: &mut BitsReader, size: usize) -> Result<(), H264Error> {
        let mut last_scale: i64 = 8;
        let mut next_scale: i64 = 8;
        for _ in 0..size {
            if next_scale != 0 {
                let delta = bits.read_se()?;
                next_scale = (last_scale + delta + 256) % 256;
            }
            if next_scale != 0 {
                last_scale = next_scale;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_baseline_640x480() {
        // Baseline profile, level 3.0, 640x480
        let sps: &[u8] = &[0x67, 0x42, 0xc0, 0x1e, 0xf4, 0x05, 0x01, 0xec, 0x80];
        let info = SpsParser::parse(BytesMut::from(sps)).unwrap();
        assert_eq!(info.profile_idc, 66);
        assert_eq!(info.level_idc, 30);
        assert_eq!(info.width, 640);
        assert_eq!(info.height, 480);
    }

    #[test]
    fn test_parse_high_1280x720() {
        // High profile, level 3.1, 1280x720
        let sps: &[u8] = &[0x67, 0x64, 0x00, 0x1f, 0xac, 0xe8, 0x05, 0x00, 0x5b, 0x90];
        let info = SpsParser::parse(BytesMut::from(sps)).unwrap();
        assert_eq!(info.profile_idc, 100);
        assert_eq!(info.level_idc, 31);
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
    }

    #[test]
    fn test_parse_rejects_non_sps() {
        let pps: &[u8] = &[0x68, 0xce, 0x38, 0x80];
        let result = SpsParser::parse(BytesMut::from(pps));
        assert!(matches!(
            result.unwrap_err().value,
            H264ErrorValue::NotSpsNalu
        ));
    }
}
