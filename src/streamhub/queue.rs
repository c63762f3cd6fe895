use {
    super::define::FrameData,
    super::errors::{StreamHubError, StreamHubErrorValue},
    crate::flv::define::{avc_packet_type, frame_type},
    std::collections::VecDeque,
};

/// Returns true for a video frame whose FLV body marks it as a
/// keyframe access unit (not a sequence header).
#[must_use]
pub fn is_video_keyframe(frame: &FrameData) -> bool {
    if let FrameData::Video { data, .. } = frame {
        data.len() > 1
            && (data[0] >> 4) == frame_type::KEY_FRAME
            && data[1] == avc_packet_type::AVC_NALU
    } else {
        false
    }
}

/// Per-subscriber pending queue with a duration high-water mark.
///
/// When the queued span exceeds the budget the queue is trimmed back
/// to its most recent video keyframe so a lagging player resumes on a
/// decodable frame. A queue that cannot be trimmed under budget marks
/// the subscriber as stalled.
pub struct SubscriberQueue {
    frames: VecDeque<FrameData>,
    max_duration_ms: u64,
}

impl SubscriberQueue {
    #[must_use]
    pub const fn new(max_duration_ms: u64) -> Self {
        Self {
            frames: VecDeque::new(),
            max_duration_ms,
        }
    }

    fn duration_ms(&self) -> u64 {
        match (self.frames.front(), self.frames.back()) {
            (Some(first), Some(last)) => {
                last.timestamp().saturating_sub(first.timestamp())
            }
            _ => 0,
        }
    }

    fn last_keyframe_index(&self) -> Option<usize> {
        self.frames.iter().rposition(is_video_keyframe)
    }

    fn contains_video(&self) -> bool {
        self.frames
            .iter()
            .any(|frame| matches!(frame, FrameData::Video { .. }))
    }

    pub fn push(&mut self, frame: FrameData) -> Result<(), StreamHubError> {
        self.frames.push_back(frame);

        if self.duration_ms() <= self.max_duration_ms {
            return Ok(());
        }

        if self.contains_video() {
            match self.last_keyframe_index() {
                Some(index) if index > 0 => {
                    self.frames.drain(..index);
                }
                _ => {}
            }
        } else {
            //audio-only: shed oldest frames until back under budget
            while self.duration_ms() > self.max_duration_ms && self.frames.len() > 1 {
                self.frames.pop_front();
            }
        }

        if self.duration_ms() > self.max_duration_ms {
            return Err(StreamHubError {
                value: StreamHubErrorValue::QueueOverflow,
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn front(&self) -> Option<&FrameData> {
        self.frames.front()
    }

    pub fn pop(&mut self) -> Option<FrameData> {
        self.frames.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn video(timestamp: u64, keyframe: bool) -> FrameData {
        let flags: u8 = if keyframe { 0x17 } else { 0x27 };
        FrameData::Video {
            timestamp,
            data: Bytes::copy_from_slice(&[flags, 0x01, 0x00, 0x00, 0x00, 0xAA]),
        }
    }

    fn audio(timestamp: u64) -> FrameData {
        FrameData::Audio {
            timestamp,
            data: Bytes::copy_from_slice(&[0xAF, 0x01, 0xBB]),
        }
    }

    #[test]
    fn test_under_budget_keeps_everything() {
        let mut queue = SubscriberQueue::new(1000);
        for i in 0..10 {
            queue.push(video(i * 33, i == 0)).unwrap();
        }
        assert_eq!(queue.len(), 10);
    }

    #[test]
    fn test_overflow_trims_to_last_keyframe() {
        let mut queue = SubscriberQueue::new(2000);
        // GOP 1 at t=0, GOP 2 keyframe at t=2000
        queue.push(video(0, true)).unwrap();
        for i in 1..10 {
            queue.push(video(i * 100, false)).unwrap();
        }
        queue.push(video(2000, true)).unwrap();
        // pushing past the budget forces a trim to the t=2000 keyframe
        queue.push(video(2100, false)).unwrap();

        assert!(is_video_keyframe(queue.front().unwrap()));
        assert_eq!(queue.front().unwrap().timestamp(), 2000);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_frames_stay_in_order_after_trim() {
        let mut queue = SubscriberQueue::new(1000);
        queue.push(video(0, true)).unwrap();
        for i in 1..5 {
            queue.push(video(i * 200, false)).unwrap();
        }
        queue.push(video(1100, true)).unwrap();
        queue.push(video(1150, false)).unwrap();

        let mut last = 0;
        while let Some(frame) = queue.pop() {
            assert!(frame.timestamp() >= last);
            last = frame.timestamp();
        }
    }

    #[test]
    fn test_stalled_when_single_gop_exceeds_budget() {
        let mut queue = SubscriberQueue::new(500);
        queue.push(video(0, true)).unwrap();
        for i in 1..5 {
            queue.push(video(i * 100, false)).unwrap();
        }
        // one giant GOP with no second keyframe to trim to
        let result = queue.push(video(600, false));
        assert!(matches!(
            result.unwrap_err().value,
            StreamHubErrorValue::QueueOverflow
        ));
    }

    #[test]
    fn test_audio_only_sheds_oldest() {
        let mut queue = SubscriberQueue::new(1000);
        for i in 0..50 {
            queue.push(audio(i * 100)).unwrap();
        }
        assert!(queue.front().unwrap().timestamp() > 0);
        assert!(queue.len() <= 12);
    }
}
