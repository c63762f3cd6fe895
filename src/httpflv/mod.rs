// HTTP-FLV session: subscribes to the hub and frames the stream as an
// FLV body over a bounded channel; the HTTP layer turns the channel
// into a chunked response.

use bytes::BytesMut;
use crate::flv::amf0::Amf0Writer;
use crate::flv::define::tag_type;
use crate::flv::muxer::{FlvMuxer, HEADER_LENGTH};
use crate::streamhub::define::{
    FrameData, FrameDataReceiver, NotifyInfo, StreamHubEvent, StreamHubEventSender,
    SubscribeType, SubscriberInfo,
};
use crate::streamhub::stream::StreamIdentifier;
use crate::streamhub::utils::Uuid;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Bound on buffered response chunks per client; at a typical frame
/// size this is a few megabytes of slack for a slow reader.
pub const FLV_RESPONSE_CHANNEL_CAPACITY: usize = 512;

pub type HttpResponseDataSender = mpsc::Sender<Result<bytes::Bytes, std::io::Error>>;

pub struct HttpFlvSession {
    identifier: StreamIdentifier,
    event_producer: StreamHubEventSender,
    response_producer: HttpResponseDataSender,
    subscriber_id: Uuid,
    muxer: FlvMuxer,
    has_audio: bool,
    has_video: bool,
    has_sent_header: bool,
}

impl HttpFlvSession {
    #[must_use]
    pub fn new(
        identifier: StreamIdentifier,
        event_producer: StreamHubEventSender,
        response_producer: HttpResponseDataSender,
    ) -> Self {
        Self {
            identifier,
            event_producer,
            response_producer,
            subscriber_id: Uuid::new(),
            muxer: FlvMuxer::new(),
            has_audio: false,
            has_video: false,
            has_sent_header: false,
        }
    }

    fn subscriber_info(&self) -> SubscriberInfo {
        SubscriberInfo {
            id: self.subscriber_id,
            sub_type: SubscribeType::HttpFlvPull,
            notify_info: NotifyInfo {
                request_url: format!(
                    "/{}/{}.flv",
                    self.identifier.app_name, self.identifier.stream_name
                ),
                remote_addr: String::new(),
            },
        }
    }

    /// Subscribe up-front so a missing stream can fail the request
    /// with a 404 before any body bytes are committed.
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
            "http-flv subscribed"
        );
        Ok(receiver)
    }

    pub async fn run(&mut self, mut receiver: FrameDataReceiver) -> Result<(), anyhow::Error> {
        let mut probe_count = 0_usize;
        let mut cached_frames: Vec<FrameData> = Vec::new();

        loop {
            let Some(frame) = receiver.recv().await else {
                info!(identifier = %self.identifier, "http-flv: source drained");
                break;
            };

            //the FLV header needs the audio/video flags before the
            //first tag goes out, so probe a few frames first
            if !self.has_sent_header {
                probe_count += 1;
                match &frame {
                    FrameData::Audio { .. } => self.has_audio = true,
                    FrameData::Video { .. } => self.has_video = true,
                    FrameData::MetaData { .. } => {}
                }
                cached_frames.push(frame);

                if (self.has_audio && self.has_video) || probe_count > 10 {
                    self.has_sent_header = true;
                    self.muxer.write_flv_header(self.has_audio, self.has_video)?;
                    self.muxer.write_previous_tag_size(0)?;
                    self.flush_response_data()?;

                    for cached in cached_frames.drain(..) {
                        self.write_flv_tag(cached)?;
                    }
                }
                continue;
            }

            self.write_flv_tag(frame)?;
        }

        self.unsubscribe();
        Ok(())
    }

    fn write_flv_tag(&mut self, frame: FrameData) -> Result<(), anyhow::Error> {
        let (body, timestamp, tag_type) = match frame {
            FrameData::Audio { timestamp, data } => {
                (BytesMut::from(&data[..]), timestamp, tag_type::AUDIO)
            }
            FrameData::Video { timestamp, data } => {
                (BytesMut::from(&data[..]), timestamp, tag_type::VIDEO)
            }
            FrameData::MetaData { timestamp, data } => {
                //RTMP metadata arrives as @setDataFrame + onMetaData;
                //FLV wants the onMetaData object only
                let mut amf_writer = Amf0Writer::new();
                amf_writer.write_string("@setDataFrame")?;
                let prefix_len = amf_writer.len();
                let body = if data.len() > prefix_len
                    && data[..prefix_len] == amf_writer.extract_current_bytes()[..]
                {
                    BytesMut::from(&data[prefix_len..])
                } else {
                    BytesMut::from(&data[..])
                };
                (body, timestamp, tag_type::SCRIPT_DATA_AMF)
            }
        };

        let body_len = body.len() as u32;
        self.muxer
            .write_flv_tag_header(tag_type, body_len, (timestamp & 0xffff_ffff) as u32)?;
        self.muxer.write_flv_tag_body(body)?;
        self.muxer.write_previous_tag_size(body_len + HEADER_LENGTH)?;
        self.flush_response_data()?;
        Ok(())
    }

    fn flush_response_data(&mut self) -> Result<(), anyhow::Error> {
        let data = self.muxer.writer.extract_current_bytes();
        match self.response_producer.try_send(Ok(data.freeze())) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    identifier = %self.identifier,
                    "http-flv response channel full, dropping data for slow client"
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
            warn!("http-flv unsubscribe: hub event channel unavailable");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_header_written_after_av_probe() {
        let (event_sender, _event_receiver) = mpsc::channel(64);
        let (response_sender, mut response_receiver) = mpsc::channel(FLV_RESPONSE_CHANNEL_CAPACITY);
        let (frame_sender, frame_receiver) = mpsc::channel(64);

        let mut session = HttpFlvSession::new(
            StreamIdentifier::with_default_vhost("live", "foo"),
            event_sender,
            response_sender,
        );

        frame_sender
            .send(FrameData::Audio {
                timestamp: 0,
                data: Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]),
            })
            .await
            .unwrap();
        frame_sender
            .send(FrameData::Video {
                timestamp: 0,
                data: Bytes::from_static(&[0x17, 0x00, 0x01]),
            })
            .await
            .unwrap();
        drop(frame_sender);

        session.run(frame_receiver).await.unwrap();

        let first = response_receiver.recv().await.unwrap().unwrap();
        //FLV magic with both audio and video flagged
        assert_eq!(&first[..3], b"FLV");
        assert_eq!(first[4], 0x05);

        //the probed frames follow as tags
        let tags = response_receiver.recv().await.unwrap().unwrap();
        assert_eq!(tags[0], tag_type::AUDIO);
    }
}
