use {
    super::{define::SubscribeType, stream::StreamIdentifier, utils::Uuid},
    crate::flv::define::{AacProfile, AvcCodecId, AvcLevel, AvcProfile, SoundFormat},
    chrono::{DateTime, Local},
    serde::Serialize,
    std::collections::HashMap,
    std::sync::Arc,
    std::time::Duration,
    tokio::sync::{broadcast, Mutex},
};

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatisticAudio {
    pub sound_format: SoundFormat,
    pub profile: AacProfile,
    pub samplerate: u32,
    pub channels: u8,
    pub recv_bytes: u64,
    pub recv_bitrate_kbps: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatisticVideo {
    pub codec: AvcCodecId,
    pub profile: AvcProfile,
    pub level: AvcLevel,
    pub width: u32,
    pub height: u32,
    pub recv_bytes: u64,
    pub recv_bitrate_kbps: u64,
    pub recv_frame_count: u64,
    /// Frames in the most recently completed GOP.
    pub gop: u64,
    #[serde(skip_serializing)]
    pub recv_frame_count_for_gop: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticPublisher {
    pub id: Uuid,
    pub remote_address: String,
    pub start_time: DateTime<Local>,
    pub audio: StatisticAudio,
    pub video: StatisticVideo,
    pub recv_bytes: u64,
}

impl Default for StatisticPublisher {
    fn default() -> Self {
        Self {
            id: Uuid::default(),
            remote_address: String::new(),
            start_time: Local::now(),
            audio: StatisticAudio::default(),
            video: StatisticVideo::default(),
            recv_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticSubscriber {
    pub id: Uuid,
    pub remote_address: String,
    pub sub_type: SubscribeType,
    pub start_time: DateTime<Local>,
    pub send_bytes: u64,
    pub send_bitrate_kbps: u64,
    #[serde(skip_serializing)]
    pub send_bytes_for_bitrate: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamStatistics {
    pub identifier: StreamIdentifier,
    pub publisher: StatisticPublisher,
    pub subscribers: HashMap<Uuid, StatisticSubscriber>,
    pub subscriber_count: usize,
    pub total_recv_bytes: u64,
    pub total_send_bytes: u64,
    #[serde(skip_serializing)]
    recv_bytes_for_bitrate: u64,
}

impl StreamStatistics {
    #[must_use]
    pub fn new(identifier: StreamIdentifier) -> Self {
        Self {
            identifier,
            publisher: StatisticPublisher::default(),
            subscribers: HashMap::new(),
            subscriber_count: 0,
            total_recv_bytes: 0,
            total_send_bytes: 0,
            recv_bytes_for_bitrate: 0,
        }
    }

    pub fn accumulate_recv(&mut self, bytes: u64) {
        self.total_recv_bytes += bytes;
        self.recv_bytes_for_bitrate += bytes;
    }
}

/// Interval on which per-stream bitrates are recomputed.
const CALCULATE_INTERVAL: Duration = Duration::from_secs(2);

/// Periodically folds the accumulated byte counters into bitrates.
pub struct StatisticsCalculate {
    statistics: Arc<Mutex<StreamStatistics>>,
    exit: broadcast::Receiver<()>,
}

impl StatisticsCalculate {
    #[must_use]
    pub const fn new(
        statistics: Arc<Mutex<StreamStatistics>>,
        exit: broadcast::Receiver<()>,
    ) -> Self {
        Self { statistics, exit }
    }

    async fn calculate(&mut self) {
        let mut statistics = self.statistics.lock().await;
        let statistics = &mut *statistics;

        let interval_ms = CALCULATE_INTERVAL.as_millis() as u64;
        statistics.publisher.video.recv_bitrate_kbps =
            statistics.recv_bytes_for_bitrate * 8 / interval_ms;
        statistics.recv_bytes_for_bitrate = 0;

        for subscriber in statistics.subscribers.values_mut() {
            subscriber.send_bitrate_kbps = subscriber.send_bytes_for_bitrate * 8 / interval_ms;
            subscriber.send_bytes_for_bitrate = 0;
        }
    }

    pub async fn start(&mut self) {
        let mut interval = tokio::time::interval(CALCULATE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.calculate().await;
                }
                _ = self.exit.recv() => {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_recv() {
        let mut statistics =
            StreamStatistics::new(StreamIdentifier::with_default_vhost("live", "foo"));
        statistics.accumulate_recv(1000);
        statistics.accumulate_recv(500);
        assert_eq!(statistics.total_recv_bytes, 1500);
    }

    #[test]
    fn test_serializes_without_internal_counters() {
        let statistics =
            StreamStatistics::new(StreamIdentifier::with_default_vhost("live", "foo"));
        let json = serde_json::to_string(&statistics).unwrap();
        assert!(json.contains("subscriber_count"));
        assert!(!json.contains("recv_bytes_for_bitrate"));
    }
}
