// HTTP-TS session: subscribes to the hub and muxes the stream into a
// continuous MPEG-TS body. PAT/PMT repeat at every keyframe so a
// player joining mid-stream resynchronizes quickly.

use bytes::BytesMut;
use crate::flv::define::frame_type;
use crate::flv::demuxer::{FlvAudioTagDemuxer, FlvVideoTagDemuxer};
use crate::httpflv::HttpResponseDataSender;
use crate::mpegts::define::{epsi_stream_type, MPEG_FLAG_IDR_FRAME};
use crate::mpegts::TsMuxer;
use crate::streamhub::define::{
    FrameData, FrameDataReceiver, NotifyInfo, StreamHubEvent, StreamHubEventSender,
    SubscribeType, SubscriberInfo,
};
use crate::streamhub::stream::StreamIdentifier;
use crate::streamhub::utils::Uuid;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

pub struct HttpTsSession {
    identifier: StreamIdentifier,
    event_producer: StreamHubEventSender,
    response_producer: HttpResponseDataSender,
    subscriber_id: Uuid,

    video_demuxer: FlvVideoTagDemuxer,
    audio_demuxer: FlvAudioTagDemuxer,
    ts_muxer: TsMuxer,
    video_pid: u16,
    audio_pid: u16,
}

impl HttpTsSession {
    pub fn new(
        identifier: StreamIdentifier,
        event_producer: StreamHubEventSender,
        response_producer: HttpResponseDataSender,
    ) -> Result<Self, anyhow::Error> {
        let mut ts_muxer = TsMuxer::new();
        let audio_pid = ts_muxer
            .add_stream(epsi_stream_type::PSI_STREAM_AAC, BytesMut::new())
            .map_err(|err| anyhow::anyhow!("add audio stream: {err}"))?;
        let video_pid = ts_muxer
            .add_stream(epsi_stream_type::PSI_STREAM_H264, BytesMut::new())
            .map_err(|err| anyhow::anyhow!("add video stream: {err}"))?;

        Ok(Self {
            identifier,
            event_producer,
            response_producer,
            subscriber_id: Uuid::new(),
            video_demuxer: FlvVideoTagDemuxer::new(),
            audio_demuxer: FlvAudioTagDemuxer::new(),
            ts_muxer,
            video_pid,
            audio_pid,
        })
    }

    fn subscriber_info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.subscriber_id,
            sub_type: SubscribeType::HttpTsPull,
            notify_info: NotifyInfo {
                request_url: format!(
                    "/{}/{}.ts",
                    self.identifier.app_name, self.identifier.stream_name
                ),
                remote_addr: String::new(),
            },
        }
    }

    pub async fn subscribe(&mut self) -> Result<FrameDataReceiver, anyhow::Error> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.event_producer
            .try_send(StreamHubEvent::Subscribe {
                identifier: self.identifier.clone(),
                info: self.subscriber_info(),
                result_sender,
            })
            .map_err(|_| anyhow::anyhow!("stream hub event channel unavailable"))?;

        let (receiver, _statistic_sender) = result_receiver
            .await
            .map_err(|err| anyhow::anyhow!("subscribe result dropped: {err}"))?
            .map_err(|err| anyhow::anyhow!("subscribe failed: {err}"))?;

        info!(
            subscriber_id = %self.subscriber_id,
            identifier = %self.identifier,
            "http-ts subscribed"
        );
        Ok(receiver)
    }

    pub async fn run(&mut self, mut receiver: FrameDataReceiver) -> Result<(), anyhow::Error> {
        loop {
            let Some(frame) = receiver.recv().await else {
                info!(identifier = %self.identifier, "http-ts: source drained");
                break;
            };

            match frame {
                FrameData::Video { timestamp, data } => {
                    let body = BytesMut::from(&data[..]);
                    let Some(video) = self
                        .video_demuxer
                        .demux(timestamp, body)
                        .map_err(|err| anyhow::anyhow!("video demux: {err}"))?
                    else {
                        continue;
                    };

                    let is_key = video.frame_type == frame_type::KEY_FRAME;
                    if is_key {
                        //re-emit PAT/PMT ahead of each keyframe
                        self.flush_response_data()?;
                        self.ts_muxer.reset();
                    }
                    let flags = if is_key { MPEG_FLAG_IDR_FRAME } else { 0 };
                    self.ts_muxer
                        .write(self.video_pid, video.pts * 90, video.dts * 90, flags, video.data)
                        .map_err(|err| anyhow::anyhow!("ts mux: {err}"))?;
                }
                FrameData::Audio { timestamp, data } => {
                    let body = BytesMut::from(&data[..]);
                    let audio = self
                        .audio_demuxer
                        .demux(timestamp, body)
                        .map_err(|err| anyhow::anyhow!("audio demux: {err}"))?;
                    if !audio.has_data {
                        continue;
                    }
                    self.ts_muxer
                        .write(self.audio_pid, audio.pts * 90, audio.dts * 90, 0, audio.data)
                        .map_err(|err| anyhow::anyhow!("ts mux: {err}"))?;
                }
                FrameData::MetaData { .. } => continue,
            }

            self.flush_response_data()?;
        }

        self.unsubscribe();
        Ok(())
    }

    fn flush_response_data(&mut self) -> Result<(), anyhow::Error> {
        let data = self.ts_muxer.get_data();
        if data.is_empty() {
            return Ok(());
        }
        match self.response_producer.try_send(Ok(data.freeze())) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    identifier = %self.identifier,
                    "http-ts response channel full, dropping data for slow client"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(anyhow::anyhow!("response channel closed"))
            }
        }
    }

    fn unsubscribe(&self) {
        let event = StreamHubEvent::UnSubscribe {
            identifier: self.identifier.clone(),
            info: self.subscriber_info(),
        };
        if self.event_producer.try_send(event).is_err() {
            warn!("http-ts unsubscribe: hub event channel unavailable");
        }
    }
}
