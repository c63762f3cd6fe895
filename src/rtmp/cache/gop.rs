use {crate::streamhub::define::FrameData, std::collections::VecDeque};

/// Frames kept per GOP before the tail is shed; roughly a minute at
/// 24fps, far beyond any sane keyframe interval.
const MAX_FRAMES_PER_GOP: usize = 1500;

/// Memory ceiling per GOP.
const MAX_MEMORY_PER_GOP: usize = 100 * 1024 * 1024;

/// One group of pictures: a keyframe and everything up to the next
/// keyframe. Payloads are `Bytes`, so cloning a GOP for a joining
/// subscriber only bumps reference counts.
#[derive(Clone, Default)]
pub struct Gop {
    frames: Vec<FrameData>,
    memory_bytes: usize,
}

impl Gop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_frame_data(&mut self, data: FrameData) {
        if self.frames.len() >= MAX_FRAMES_PER_GOP {
            if self.frames.len() == MAX_FRAMES_PER_GOP {
                tracing::warn!(
                    "gop hit {MAX_FRAMES_PER_GOP} frames, shedding the tail until the next keyframe"
                );
            }
            return;
        }

        let frame_size = data.len();
        if self.memory_bytes + frame_size > MAX_MEMORY_PER_GOP {
            tracing::warn!(
                memory_bytes = self.memory_bytes,
                frame_size,
                "gop hit its memory ceiling, dropping frame"
            );
            return;
        }

        self.memory_bytes += frame_size;
        self.frames.push(data);
    }

    #[must_use]
    pub fn frame_data(&self) -> &[FrameData] {
        &self.frames
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

/// The bounded GOP cache. `size` counts whole GOPs; size 1 is the
/// "cache everything since the last keyframe" policy, size 0 disables
/// caching entirely (lower latency, slower first frame).
#[derive(Clone)]
pub struct Gops {
    gops: VecDeque<Gop>,
    size: usize,
}

impl Default for Gops {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Gops {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            gops: VecDeque::from([Gop::new()]),
            size,
        }
    }

    pub fn save_frame_data(&mut self, data: FrameData, is_key_frame: bool) {
        if self.size == 0 {
            return;
        }

        if is_key_frame {
            if self.gops.len() == self.size {
                self.gops.pop_front();
            }
            self.gops.push_back(Gop::new());
        }

        if let Some(gop) = self.gops.back_mut() {
            gop.save_frame_data(data);
        }
    }

    #[must_use]
    pub const fn setted(&self) -> bool {
        self.size != 0
    }

    #[must_use]
    pub const fn get_gops(&self) -> &VecDeque<Gop> {
        &self.gops
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
            data: Bytes::copy_from_slice(&[flags, 0x01, 0, 0, 0]),
        }
    }

    #[test]
    fn test_first_frame_of_cache_is_keyframe() {
        let mut gops = Gops::new(1);
        gops.save_frame_data(video(0, true), true);
        gops.save_frame_data(video(33, false), false);

        let cached = gops.get_gops();
        let first = &cached[0].frame_data()[0];
        assert_eq!(first.timestamp(), 0);
    }

    #[test]
    fn test_single_gop_policy_drops_previous_on_keyframe() {
        let mut gops = Gops::new(1);
        gops.save_frame_data(video(0, true), true);
        gops.save_frame_data(video(33, false), false);
        gops.save_frame_data(video(2000, true), true);

        let cached = gops.get_gops();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].frame_data()[0].timestamp(), 2000);
    }

    #[test]
    fn test_n_gop_policy_keeps_n() {
        let mut gops = Gops::new(2);
        for i in 0..4_u64 {
            gops.save_frame_data(video(i * 1000, true), true);
            gops.save_frame_data(video(i * 1000 + 33, false), false);
        }
        assert_eq!(gops.get_gops().len(), 2);
        assert_eq!(gops.get_gops()[0].frame_data()[0].timestamp(), 2000);
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let mut gops = Gops::new(0);
        gops.save_frame_data(video(0, true), true);
        assert!(!gops.setted());
        assert_eq!(gops.get_gops().len(), 1);
        assert!(gops.get_gops()[0].is_empty());
    }
}
