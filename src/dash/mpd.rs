use {
    chrono::{DateTime, SecondsFormat, Utc},
    std::collections::VecDeque,
    std::fmt::Write as _,
};

/// One media segment as the manifest sees it: start time and duration
/// on the millisecond timescale, file name derived from the start.
#[derive(Debug, Clone)]
pub struct TimelineSegment {
    pub start_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct VideoTrackInfo {
    pub codec_string: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct AudioTrackInfo {
    pub codec_string: String,
    pub sample_rate: u32,
    pub channels: u8,
}

struct Timeline {
    segments: VecDeque<TimelineSegment>,
}

impl Timeline {
    const fn new() -> Self {
        Self {
            segments: VecDeque::new(),
        }
    }

    fn push(&mut self, segment: TimelineSegment, window_size: usize) {
        self.segments.push_back(segment);
        while self.segments.len() > window_size {
            self.segments.pop_front();
        }
    }

    fn last_duration_ms(&self) -> u64 {
        self.segments.back().map_or(0, |segment| segment.duration_ms)
    }

    fn write_segment_timeline(&self, mpd: &mut String) {
        let _ = writeln!(
            mpd,
            "                <SegmentTemplate initialization=\"$RepresentationID$-init.mp4\" media=\"$RepresentationID$-$Time$.m4s\" timescale=\"1000\">"
        );
        mpd.push_str("                    <SegmentTimeline>\n");
        for segment in &self.segments {
            let _ = writeln!(
                mpd,
                "                        <S t=\"{}\" d=\"{}\" />",
                segment.start_ms, segment.duration_ms
            );
        }
        mpd.push_str("                    </SegmentTimeline>\n");
        mpd.push_str("                </SegmentTemplate>\n");
    }
}

/// Dynamic live-profile MPD over per-track segment timelines. The
/// manifest withholds itself until every declared track has filled its
/// window.
pub struct Mpd {
    window_size: usize,
    update_period_secs: u64,
    availability_start_time: Option<DateTime<Utc>>,

    video_info: Option<VideoTrackInfo>,
    audio_info: Option<AudioTrackInfo>,
    video_timeline: Timeline,
    audio_timeline: Timeline,
}

impl Mpd {
    #[must_use]
    pub const fn new(window_size: usize, update_period_secs: u64) -> Self {
        Self {
            window_size,
            update_period_secs,
            availability_start_time: None,
            video_info: None,
            audio_info: None,
            video_timeline: Timeline::new(),
            audio_timeline: Timeline::new(),
        }
    }

    /// Anchors the wall-clock origin of the media timeline: called at
    /// the first media sample with its DTS.
    pub fn set_availability_start(&mut self, first_dts_ms: u64) {
        if self.availability_start_time.is_none() {
            let start =
                Utc::now() - chrono::Duration::milliseconds(first_dts_ms as i64);
            self.availability_start_time = Some(start);
        }
    }

    pub fn set_video_info(&mut self, info: VideoTrackInfo) {
        self.video_info = Some(info);
    }

    pub fn set_audio_info(&mut self, info: AudioTrackInfo) {
        self.audio_info = Some(info);
    }

    pub fn push_video_segment(&mut self, segment: TimelineSegment) {
        self.video_timeline.push(segment, self.window_size);
    }

    pub fn push_audio_segment(&mut self, segment: TimelineSegment) {
        self.audio_timeline.push(segment, self.window_size);
    }

    /// Every declared track has a full window.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        if self.video_info.is_none() && self.audio_info.is_none() {
            return false;
        }
        if self.video_info.is_some() && self.video_timeline.segments.len() < self.window_size {
            return false;
        }
        if self.audio_info.is_some() && self.audio_timeline.segments.len() < self.window_size {
            return false;
        }
        true
    }

    #[must_use]
    pub fn time_shift_buffer_depth_secs(&self) -> f64 {
        let last_duration = self
            .video_timeline
            .last_duration_ms()
            .max(self.audio_timeline.last_duration_ms());
        (last_duration * self.window_size as u64) as f64 / 1000.0
    }

    /// The manifest, or `None` while the window is still filling.
    #[must_use]
    pub fn generate(&self, base_url: &str) -> Option<String> {
        if !self.is_ready() {
            return None;
        }
        let availability_start_time = self.availability_start_time?;

        let mut mpd = String::new();
        mpd.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        mpd.push_str(
            "<MPD profiles=\"urn:mpeg:dash:profile:isoff-live:2011,http://dashif.org/guidelines/dash-if-simple\" \n",
        );
        mpd.push_str("    xmlns=\"urn:mpeg:dash:schema:mpd:2011\" \n");
        mpd.push_str("    type=\"dynamic\" \n");
        let _ = writeln!(
            mpd,
            "    minimumUpdatePeriod=\"PT{}S\" ",
            self.update_period_secs
        );
        let _ = writeln!(
            mpd,
            "    timeShiftBufferDepth=\"PT{:.1}S\" ",
            self.time_shift_buffer_depth_secs()
        );
        let _ = writeln!(
            mpd,
            "    availabilityStartTime=\"{}\" ",
            availability_start_time.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let _ = writeln!(
            mpd,
            "    publishTime=\"{}\" ",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        mpd.push_str("    minBufferTime=\"PT1.0S\">\n");
        let _ = writeln!(mpd, "    <BaseURL>{base_url}/</BaseURL>");
        mpd.push_str("    <Period start=\"PT0S\">\n");

        if let Some(video) = &self.video_info {
            mpd.push_str(
                "        <AdaptationSet mimeType=\"video/mp4\" segmentAlignment=\"true\" startWithSAP=\"1\">\n",
            );
            let _ = writeln!(
                mpd,
                "            <Representation id=\"video\" bandwidth=\"2000000\" codecs=\"{}\" width=\"{}\" height=\"{}\">",
                video.codec_string, video.width, video.height
            );
            self.video_timeline.write_segment_timeline(&mut mpd);
            mpd.push_str("            </Representation>\n");
            mpd.push_str("        </AdaptationSet>\n");
        }

        if let Some(audio) = &self.audio_info {
            mpd.push_str(
                "        <AdaptationSet mimeType=\"audio/mp4\" segmentAlignment=\"true\" startWithSAP=\"1\">\n",
            );
            let _ = writeln!(
                mpd,
                "            <Representation id=\"audio\" bandwidth=\"128000\" codecs=\"{}\" audioSamplingRate=\"{}\">",
                audio.codec_string, audio.sample_rate
            );
            let _ = writeln!(
                mpd,
                "                <AudioChannelConfiguration schemeIdUri=\"urn:mpeg:dash:23003:3:audio_channel_configuration:2011\" value=\"{}\"/>",
                audio.channels
            );
            self.audio_timeline.write_segment_timeline(&mut mpd);
            mpd.push_str("            </Representation>\n");
            mpd.push_str("        </AdaptationSet>\n");
        }

        mpd.push_str("    </Period>\n");
        mpd.push_str("</MPD>\n");
        Some(mpd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpd_with_tracks() -> Mpd {
        let mut mpd = Mpd::new(2, 30);
        mpd.set_availability_start(0);
        mpd.set_video_info(VideoTrackInfo {
            codec_string: "avc1.64001F".to_string(),
            width: 1280,
            height: 720,
        });
        mpd.set_audio_info(AudioTrackInfo {
            codec_string: "mp4a.40.2".to_string(),
            sample_rate: 44_100,
            channels: 2,
        });
        mpd
    }

    #[test]
    fn test_not_ready_until_windows_full() {
        let mut mpd = mpd_with_tracks();
        assert!(mpd.generate("foo").is_none());

        for i in 0..2_u64 {
            mpd.push_video_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
        }
        //audio still empty
        assert!(mpd.generate("foo").is_none());

        for i in 0..2_u64 {
            mpd.push_audio_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
        }
        assert!(mpd.generate("foo").is_some());
    }

    #[test]
    fn test_time_shift_buffer_depth() {
        let mut mpd = mpd_with_tracks();
        for i in 0..2_u64 {
            mpd.push_video_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
            mpd.push_audio_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 9_000,
            });
        }
        //last video duration (10s) x window (2)
        assert!((mpd.time_shift_buffer_depth_secs() - 20.0).abs() < f64::EPSILON);

        let manifest = mpd.generate("foo").unwrap();
        assert!(manifest.contains("timeShiftBufferDepth=\"PT20.0S\""));
    }

    #[test]
    fn test_manifest_shape() {
        let mut mpd = mpd_with_tracks();
        for i in 0..2_u64 {
            mpd.push_video_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
            mpd.push_audio_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
        }

        let manifest = mpd.generate("foo").unwrap();
        assert!(manifest.contains("profiles=\"urn:mpeg:dash:profile:isoff-live:2011"));
        assert!(manifest.contains("type=\"dynamic\""));
        assert!(manifest.contains("$RepresentationID$-init.mp4"));
        assert!(manifest.contains("$RepresentationID$-$Time$.m4s"));
        assert!(manifest.contains("<S t=\"0\" d=\"10000\" />"));
        assert!(manifest.contains("<BaseURL>foo/</BaseURL>"));
    }

    #[test]
    fn test_window_slides() {
        let mut mpd = mpd_with_tracks();
        for i in 0..5_u64 {
            mpd.push_video_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
            mpd.push_audio_segment(TimelineSegment {
                start_ms: i * 10_000,
                duration_ms: 10_000,
            });
        }
        let manifest = mpd.generate("foo").unwrap();
        //only the last two segments remain listed
        assert!(!manifest.contains("<S t=\"0\""));
        assert!(manifest.contains("<S t=\"30000\""));
        assert!(manifest.contains("<S t=\"40000\""));
    }
}
