pub mod errors;
pub mod pull;
pub mod push;

use std::time::Duration;

/// Reconnect policy shared by the forwarder and the edge puller:
/// exponential, jittered, bounded.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// The delays to sleep between attempts, jittered.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        use backon::{BackoffBuilder, ExponentialBuilder};
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts)
            .with_jitter()
            .build()
    }
}
