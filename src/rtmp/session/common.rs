use {
    super::define::{SessionType, STREAM_ID},
    super::errors::{SessionError, SessionErrorValue},
    async_trait::async_trait,
    bytes::{Bytes, BytesMut},
    chrono::Local,
    crate::bytesio::bytesio::BytesIO,
    crate::rtmp::cache::StreamCache,
    crate::rtmp::chunk::define::csid_type,
    crate::rtmp::chunk::packetizer::ChunkPacketizer,
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::messages::define::msg_type_id,
    crate::streamhub::define::{
        FrameData, FrameDataReceiver, FrameDataSender, NotifyInfo, PublishType, PublisherInfo,
        StatisticData, StatisticDataSender, StreamHubEvent, StreamHubEventSender, SubscribeType,
        SubscriberInfo, TStreamHandler,
    },
    crate::streamhub::errors::StreamHubError,
    crate::streamhub::stream::StreamIdentifier,
    crate::streamhub::utils::Uuid,
    std::sync::Arc,
    tokio::sync::{oneshot, Mutex},
};

/// Publisher-side cache holder; the hub calls into it to replay the
/// cold-start prefix for every new subscriber.
pub struct RtmpStreamHandler {
    pub cache: Mutex<Option<StreamCache>>,
}

impl RtmpStreamHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(None),
        }
    }

    pub async fn set_cache(&self, cache: StreamCache) {
        *self.cache.lock().await = Some(cache);
    }

    pub async fn save_metadata(&self, data: &Bytes, timestamp: u32) -> Option<u64> {
        self.cache
            .lock()
            .await
            .as_mut()
            .map(|cache| cache.save_metadata(data, timestamp))
    }

    pub async fn save_audio(&self, data: &Bytes, timestamp: u32) -> Result<Option<u64>, SessionError> {
        match self.cache.lock().await.as_mut() {
            Some(cache) => Ok(Some(cache.save_audio(data, timestamp)?)),
            None => Ok(None),
        }
    }

    pub async fn save_video(&self, data: &Bytes, timestamp: u32) -> Result<Option<u64>, SessionError> {
        match self.cache.lock().await.as_mut() {
            Some(cache) => Ok(Some(cache.save_video(data, timestamp)?)),
            None => Ok(None),
        }
    }
}

impl Default for RtmpStreamHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TStreamHandler for RtmpStreamHandler {
    async fn send_prior_data(
        &self,
        sender: FrameDataSender,
        _sub_type: SubscribeType,
    ) -> Result<(), StreamHubError> {
        let cache = self.cache.lock().await;
        let Some(cache) = cache.as_ref() else {
            return Ok(());
        };

        for frame in cache.prior_data() {
            sender
                .send(frame)
                .await
                .map_err(|_| StreamHubError {
                    value: crate::streamhub::errors::StreamHubErrorValue::SubscriberClosed,
                })?;
        }
        Ok(())
    }
}

/// Plumbing shared by the server and client sessions: chunk
/// serialization out of the socket, frame exchange with the hub, and
/// the publisher-side cache.
pub struct Common {
    packetizer: ChunkPacketizer,
    io: Arc<Mutex<BytesIO>>,

    //publish direction: session -> hub
    data_sender: Option<FrameDataSender>,
    statistic_sender: Option<StatisticDataSender>,

    event_producer: StreamHubEventSender,
    pub session_type: SessionType,
    pub session_id: Uuid,
    pub remote_addr: String,
    pub stream_handler: Arc<RtmpStreamHandler>,
}

impl Common {
    #[must_use]
    pub fn new(
        io: Arc<Mutex<BytesIO>>,
        event_producer: StreamHubEventSender,
        session_type: SessionType,
        remote_addr: String,
    ) -> Self {
        Self {
            packetizer: ChunkPacketizer::new(),
            io,
            data_sender: None,
            statistic_sender: None,
            event_producer,
            session_type,
            session_id: Uuid::new(),
            remote_addr,
            stream_handler: Arc::new(RtmpStreamHandler::new()),
        }
    }

    pub fn update_out_chunk_size(&mut self, chunk_size: usize) {
        self.packetizer.update_max_chunk_size(chunk_size);
    }

    pub async fn send_chunk(&mut self, chunk_info: &ChunkInfo) -> Result<(), SessionError> {
        let wire = self.packetizer.write_chunk(chunk_info)?;
        self.io.lock().await.write(wire.freeze()).await?;
        Ok(())
    }

    /*** publish direction ********************************************/

    pub async fn publish_to_stream_hub(
        &mut self,
        identifier: StreamIdentifier,
        pub_type: PublishType,
        request_url: String,
        gop_num: usize,
        atc_threshold_ms: u64,
    ) -> Result<(), SessionError> {
        self.stream_handler
            .set_cache(StreamCache::new(gop_num, atc_threshold_ms))
            .await;

        let info = PublisherInfo {
            id: self.session_id,
            pub_type,
            notify_info: NotifyInfo {
                request_url,
                remote_addr: self.remote_addr.clone(),
            },
        };

        let (result_sender, result_receiver) = oneshot::channel();
        let event = StreamHubEvent::Publish {
            identifier,
            info,
            result_sender,
            stream_handler: self.stream_handler.clone(),
        };
        self.event_producer
            .try_send(event)
            .map_err(|_| SessionError {
                value: SessionErrorValue::StreamHubEventSendErr,
            })?;

        let (data_sender, statistic_sender) = match result_receiver.await? {
            Ok(senders) => senders,
            Err(err) => {
                if matches!(
                    err.value,
                    crate::streamhub::errors::StreamHubErrorValue::Exists
                ) {
                    return Err(SessionError {
                        value: SessionErrorValue::StreamInUse,
                    });
                }
                return Err(SessionError {
                    value: SessionErrorValue::StreamHubError(err),
                });
            }
        };

        if let Some(cache) = self.stream_handler.cache.lock().await.as_mut() {
            cache.set_statistic_sender(statistic_sender.clone());
        }
        let _ = statistic_sender.try_send(StatisticData::Publisher {
            id: self.session_id,
            remote_addr: self.remote_addr.clone(),
            start_time: Local::now(),
        });

        self.data_sender = Some(data_sender);
        self.statistic_sender = Some(statistic_sender);
        Ok(())
    }

    pub fn unpublish_from_stream_hub(
        &mut self,
        identifier: StreamIdentifier,
        pub_type: PublishType,
    ) -> Result<(), SessionError> {
        let info = PublisherInfo {
            id: self.session_id,
            pub_type,
            notify_info: NotifyInfo {
                request_url: String::new(),
                remote_addr: self.remote_addr.clone(),
            },
        };
        self.event_producer
            .try_send(StreamHubEvent::UnPublish { identifier, info })
            .map_err(|_| SessionError {
                value: SessionErrorValue::StreamHubEventSendErr,
            })?;
        self.data_sender = None;
        Ok(())
    }

    fn send_frame(&mut self, frame: FrameData) -> Result<(), SessionError> {
        let Some(sender) = &self.data_sender else {
            return Err(SessionError {
                value: SessionErrorValue::NoneFrameDataSender,
            });
        };
        //the hub applies backpressure by queue policy, not by blocking
        //the publisher's network loop
        if sender.try_send(frame).is_err() {
            tracing::warn!(
                session_id = %self.session_id,
                "hub frame channel full, dropping publisher frame"
            );
        }
        Ok(())
    }

    pub async fn on_audio_data(
        &mut self,
        data: &BytesMut,
        wire_timestamp: u32,
    ) -> Result<(), SessionError> {
        let payload = Bytes::copy_from_slice(&data[..]);
        let timestamp = self
            .stream_handler
            .save_audio(&payload, wire_timestamp)
            .await?
            .unwrap_or(u64::from(wire_timestamp));

        if let Some(statistic_sender) = &self.statistic_sender {
            let _ = statistic_sender.try_send(StatisticData::Audio {
                uuid: None,
                data_size: payload.len(),
            });
        }

        self.send_frame(FrameData::Audio {
            timestamp,
            data: payload,
        })
    }

    pub async fn on_video_data(
        &mut self,
        data: &BytesMut,
        wire_timestamp: u32,
    ) -> Result<(), SessionError> {
        let payload = Bytes::copy_from_slice(&data[..]);
        let timestamp = self
            .stream_handler
            .save_video(&payload, wire_timestamp)
            .await?
            .unwrap_or(u64::from(wire_timestamp));

        if let Some(statistic_sender) = &self.statistic_sender {
            let is_key_frame = crate::rtmp::cache::is_video_keyframe(&payload);
            let _ = statistic_sender.try_send(StatisticData::Video {
                uuid: None,
                data_size: payload.len(),
                is_key_frame: Some(is_key_frame),
            });
        }

        self.send_frame(FrameData::Video {
            timestamp,
            data: payload,
        })
    }

    pub async fn on_meta_data(
        &mut self,
        data: &BytesMut,
        wire_timestamp: u32,
    ) -> Result<(), SessionError> {
        let payload = Bytes::copy_from_slice(&data[..]);
        let timestamp = self
            .stream_handler
            .save_metadata(&payload, wire_timestamp)
            .await
            .unwrap_or(u64::from(wire_timestamp));

        self.send_frame(FrameData::MetaData {
            timestamp,
            data: payload,
        })
    }

    /*** play direction ***********************************************/

    pub async fn subscribe_from_stream_hub(
        &mut self,
        identifier: StreamIdentifier,
        sub_type: SubscribeType,
        request_url: String,
    ) -> Result<FrameDataReceiver, SessionError> {
        let info = SubscriberInfo {
            id: self.session_id,
            sub_type,
            notify_info: NotifyInfo {
                request_url,
                remote_addr: self.remote_addr.clone(),
            },
        };

        let (result_sender, result_receiver) = oneshot::channel();
        let event = StreamHubEvent::Subscribe {
            identifier,
            info,
            result_sender,
        };
        self.event_producer
            .try_send(event)
            .map_err(|_| SessionError {
                value: SessionErrorValue::StreamHubEventSendErr,
            })?;

        let (receiver, statistic_sender) = result_receiver.await??;
        let _ = statistic_sender.try_send(StatisticData::Subscriber {
            id: self.session_id,
            remote_addr: self.remote_addr.clone(),
            sub_type,
            start_time: Local::now(),
        });
        self.statistic_sender = Some(statistic_sender);
        Ok(receiver)
    }

    pub fn unsubscribe_from_stream_hub(
        &mut self,
        identifier: StreamIdentifier,
        sub_type: SubscribeType,
    ) -> Result<(), SessionError> {
        let info = SubscriberInfo {
            id: self.session_id,
            sub_type,
            notify_info: NotifyInfo {
                request_url: String::new(),
                remote_addr: self.remote_addr.clone(),
            },
        };
        self.event_producer
            .try_send(StreamHubEvent::UnSubscribe { identifier, info })
            .map_err(|_| SessionError {
                value: SessionErrorValue::StreamHubEventSendErr,
            })?;
        Ok(())
    }

    /// Writes one hub frame back out as an RTMP message.
    pub async fn send_media(&mut self, frame: FrameData) -> Result<(), SessionError> {
        let (csid, msg_type, timestamp, data) = match frame {
            FrameData::Audio { timestamp, data } => {
                (csid_type::AUDIO, msg_type_id::AUDIO, timestamp, data)
            }
            FrameData::Video { timestamp, data } => {
                (csid_type::VIDEO, msg_type_id::VIDEO, timestamp, data)
            }
            FrameData::MetaData { timestamp, data } => (
                csid_type::DATA_AMF0_AMF3,
                msg_type_id::DATA_AMF0,
                timestamp,
                data,
            ),
        };

        if let Some(statistic_sender) = &self.statistic_sender {
            let statistic = match msg_type {
                msg_type_id::AUDIO => Some(StatisticData::Audio {
                    uuid: Some(self.session_id),
                    data_size: data.len(),
                }),
                msg_type_id::VIDEO => Some(StatisticData::Video {
                    uuid: Some(self.session_id),
                    data_size: data.len(),
                    is_key_frame: None,
                }),
                _ => None,
            };
            if let Some(statistic) = statistic {
                let _ = statistic_sender.try_send(statistic);
            }
        }

        let chunk_info = ChunkInfo::new(
            csid,
            0,
            //wire timestamps are 32-bit; the virtual timeline wraps here
            (timestamp & 0xffff_ffff) as u32,
            data.len() as u32,
            msg_type,
            STREAM_ID,
            BytesMut::from(&data[..]),
        );
        self.send_chunk(&chunk_info).await
    }
}
