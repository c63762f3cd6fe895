use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Copy)]
pub struct Uuid(uuid::Uuid);

impl Default for Uuid {
    fn default() -> Self {
        Self(uuid::Uuid::nil())
    }
}

impl Serialize for Uuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl Uuid {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rebases wire timestamps onto a contiguous, monotonic 64-bit
/// timeline. Publisher restarts and 32-bit wraps both appear as a
/// large backwards jump; when the jump exceeds the threshold the base
/// moves so the next output lands right after the previous maximum.
pub struct TimestampFixer {
    base: i64,
    prev_max: Option<u64>,
    threshold_ms: u64,
}

impl TimestampFixer {
    #[must_use]
    pub const fn new(threshold_ms: u64) -> Self {
        Self {
            base: 0,
            prev_max: None,
            threshold_ms,
        }
    }

    pub fn correct(&mut self, wire_timestamp: u32) -> u64 {
        let raw = i64::from(wire_timestamp);
        let mut virtual_ts = raw + self.base;

        if let Some(prev_max) = self.prev_max {
            if virtual_ts + (self.threshold_ms as i64) < prev_max as i64 {
                self.base = prev_max as i64 + 1 - raw;
                virtual_ts = prev_max as i64 + 1;
                tracing::warn!(
                    wire_timestamp,
                    rebased_to = virtual_ts,
                    "timestamp regressed past threshold, rebasing timeline"
                );
            }
        }

        let virtual_ts = virtual_ts.max(0) as u64;
        self.prev_max = Some(self.prev_max.map_or(virtual_ts, |m| m.max(virtual_ts)));
        virtual_ts
    }

    #[must_use]
    pub const fn rebase_count_changed(&self) -> i64 {
        self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_unique_and_serializable() {
        let id = Uuid::new();
        let s = id.to_string();
        let serialized = serde_json::to_string(&id).unwrap();
        assert!(serialized.contains(&s));
        assert_ne!(id, Uuid::new());
    }

    #[test]
    fn test_fixer_passthrough_when_monotonic() {
        let mut fixer = TimestampFixer::new(90_000);
        assert_eq!(fixer.correct(0), 0);
        assert_eq!(fixer.correct(33), 33);
        assert_eq!(fixer.correct(1000), 1000);
    }

    #[test]
    fn test_fixer_small_jitter_not_rebased() {
        let mut fixer = TimestampFixer::new(90_000);
        fixer.correct(5000);
        // audio/video interleave can go slightly backwards
        assert_eq!(fixer.correct(4980), 4980);
    }

    #[test]
    fn test_fixer_rebases_on_restart() {
        let mut fixer = TimestampFixer::new(90_000);
        fixer.correct(1_000_000);
        // publisher restarted from 50
        assert_eq!(fixer.correct(50), 1_000_001);
        assert_eq!(fixer.correct(83), 1_000_034);
    }

    #[test]
    fn test_fixer_continuous_after_wrap() {
        let mut fixer = TimestampFixer::new(90_000);
        let near_wrap = u32::MAX - 10;
        assert_eq!(fixer.correct(near_wrap), u64::from(near_wrap));
        // wire wrapped to a tiny value
        assert_eq!(fixer.correct(5), u64::from(near_wrap) + 1);
    }
}
