use chrono::{DateTime, Local};
use crate::flv::define::{AacProfile, AvcCodecId, AvcLevel, AvcProfile, SoundFormat};

use {
    super::errors::StreamHubError,
    super::statistics::StreamStatistics,
    super::stream::StreamIdentifier,
    super::utils::Uuid,
    async_trait::async_trait,
    bytes::Bytes,
    serde::Serialize,
    std::sync::Arc,
    tokio::sync::{broadcast, mpsc, oneshot},
};

/* Ways a subscriber can attach to the hub. */
#[derive(Debug, Serialize, Clone, Copy, Eq, PartialEq)]
pub enum SubscribeType {
    /* Remote RTMP client plays the stream. */
    RtmpPull,
    /* HTTP client pulls the stream wrapped as FLV. */
    HttpFlvPull,
    /* HTTP client pulls the stream muxed as MPEG-TS. */
    HttpTsPull,
    /* The HLS segmenter consumes the stream on publish. */
    HlsRemux,
    /* The DASH segmenter consumes the stream on publish. */
    DashRemux,
    /* The forwarder relays the stream to a remote peer. */
    RtmpForward,
}

/* Ways a publisher can feed the hub. */
#[derive(Debug, Serialize, Clone, Copy, Eq, PartialEq)]
pub enum PublishType {
    /* Remote RTMP client pushes the stream. */
    RtmpPush,
    /* The edge puller ingests the stream from an upstream origin. */
    RtmpEdgePull,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct NotifyInfo {
    pub request_url: String,
    pub remote_addr: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct SubscriberInfo {
    pub id: Uuid,
    pub sub_type: SubscribeType,
    pub notify_info: NotifyInfo,
}

#[derive(Debug, Serialize, Clone)]
pub struct PublisherInfo {
    pub id: Uuid,
    pub pub_type: PublishType,
    pub notify_info: NotifyInfo,
}

/// Frame data on the hub's virtual timeline. `Bytes` payloads make the
/// fan-out clone a reference-count bump, never a copy.
#[derive(Clone)]
pub enum FrameData {
    Video { timestamp: u64, data: Bytes },
    Audio { timestamp: u64, data: Bytes },
    MetaData { timestamp: u64, data: Bytes },
}

impl FrameData {
    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        match self {
            Self::Video { timestamp, .. }
            | Self::Audio { timestamp, .. }
            | Self::MetaData { timestamp, .. } => *timestamp,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Video { data, .. } | Self::Audio { data, .. } | Self::MetaData { data, .. } => {
                data.len()
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type FrameDataSender = mpsc::Sender<FrameData>;
pub type FrameDataReceiver = mpsc::Receiver<FrameData>;

/// Per-subscriber channel capacity. The duration-based high-water mark
/// lives in the transceiver's pending queue; this only smooths bursts.
pub const FRAME_DATA_CHANNEL_CAPACITY: usize = 256;

pub type StreamHubEventSender = mpsc::Sender<StreamHubEvent>;
pub type StreamHubEventReceiver = mpsc::Receiver<StreamHubEvent>;

pub const STREAM_HUB_EVENT_CHANNEL_CAPACITY: usize = 4096;

pub type BroadcastEventSender = broadcast::Sender<BroadcastEvent>;
pub type BroadcastEventReceiver = broadcast::Receiver<BroadcastEvent>;

pub type TransceiverEventSender = mpsc::Sender<TransceiverEvent>;
pub type TransceiverEventReceiver = mpsc::Receiver<TransceiverEvent>;

pub const TRANSCEIVER_EVENT_CHANNEL_CAPACITY: usize = 1024;

pub type StatisticDataSender = mpsc::Sender<StatisticData>;
pub type StatisticDataReceiver = mpsc::Receiver<StatisticData>;

pub const STATISTIC_DATA_CHANNEL_CAPACITY: usize = 1024;

pub type SubEventExecuteResultSender =
    oneshot::Sender<Result<(FrameDataReceiver, StatisticDataSender), StreamHubError>>;
pub type PubEventExecuteResultSender =
    oneshot::Sender<Result<(FrameDataSender, StatisticDataSender), StreamHubError>>;
pub type TransceiverEventExecuteResultSender = oneshot::Sender<StatisticDataSender>;

/// Implemented by publisher sessions: replays the cold-start prefix
/// (metadata, sequence headers, cached GOPs) into a fresh subscriber
/// before it joins the live fan-out.
#[async_trait]
pub trait TStreamHandler: Send + Sync {
    async fn send_prior_data(
        &self,
        sender: FrameDataSender,
        sub_type: SubscribeType,
    ) -> Result<(), StreamHubError>;
}

#[derive(Serialize)]
pub enum StreamHubEvent {
    Publish {
        identifier: StreamIdentifier,
        info: PublisherInfo,
        #[serde(skip_serializing)]
        result_sender: PubEventExecuteResultSender,
        #[serde(skip_serializing)]
        stream_handler: Arc<dyn TStreamHandler>,
    },
    UnPublish {
        identifier: StreamIdentifier,
        info: PublisherInfo,
    },
    Subscribe {
        identifier: StreamIdentifier,
        info: SubscriberInfo,
        #[serde(skip_serializing)]
        result_sender: SubEventExecuteResultSender,
    },
    UnSubscribe {
        identifier: StreamIdentifier,
        info: SubscriberInfo,
    },
    ApiStatistic {
        identifier: Option<StreamIdentifier>,
        #[serde(skip_serializing)]
        result_sender: oneshot::Sender<Vec<StreamStatistics>>,
    },
    ApiKickClient {
        id: Uuid,
    },
}

pub enum TransceiverEvent {
    Subscribe {
        sender: FrameDataSender,
        info: SubscriberInfo,
        result_sender: TransceiverEventExecuteResultSender,
    },
    UnSubscribe {
        info: SubscriberInfo,
    },
    UnPublish {},
    KickClient {
        id: Uuid,
    },
    Api {
        result_sender: oneshot::Sender<StreamStatistics>,
    },
}

#[derive(Debug, Clone)]
pub enum BroadcastEvent {
    Publish {
        identifier: StreamIdentifier,
    },
    UnPublish {
        identifier: StreamIdentifier,
    },
}

pub enum StatisticData {
    AudioCodec {
        sound_format: SoundFormat,
        profile: AacProfile,
        samplerate: u32,
        channels: u8,
    },
    VideoCodec {
        codec: AvcCodecId,
        profile: AvcProfile,
        level: AvcLevel,
        width: u32,
        height: u32,
    },
    Audio {
        uuid: Option<Uuid>,
        data_size: usize,
    },
    Video {
        uuid: Option<Uuid>,
        data_size: usize,
        is_key_frame: Option<bool>,
    },
    Publisher {
        id: Uuid,
        remote_addr: String,
        start_time: DateTime<Local>,
    },
    Subscriber {
        id: Uuid,
        remote_addr: String,
        sub_type: SubscribeType,
        start_time: DateTime<Local>,
    },
}
