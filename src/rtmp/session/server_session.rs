use {
    super::common::Common,
    super::define::{
        ServerSessionState, SessionType, OUT_CHUNK_SIZE, OUT_PEER_BANDWIDTH, OUT_WINDOW_ACK_SIZE,
        STREAM_ID,
    },
    super::errors::{SessionError, SessionErrorValue},
    bytes::BytesMut,
    crate::bytesio::bytesio::BytesIO,
    crate::flv::amf0::{Amf0ValueType, Amf0Writer},
    crate::rtmp::auth::AuthCallback,
    crate::rtmp::chunk::unpacketizer::{ChunkUnpacketizer, UnpackResult},
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::handshake::{HandshakeServer, ServerHandshakeState},
    crate::rtmp::messages::define::{msg_type_id, RtmpMessageData, UserControlEvent},
    crate::rtmp::messages::MessageParser,
    crate::rtmp::netconnection::NetConnection,
    crate::rtmp::netstream::{status_code, NetStreamWriter},
    crate::rtmp::protocol_control_messages::writer::ControlMessagesWriter,
    crate::rtmp::user_control_messages::writer::EventMessagesWriter,
    crate::rtmp::utils,
    crate::streamhub::define::{
        FrameDataReceiver, PublishType, StreamHubEventSender, SubscribeType,
    },
    crate::streamhub::stream::StreamIdentifier,
    std::sync::Arc,
    std::time::Duration,
    tokio::net::TcpStream,
    tokio::sync::mpsc,
    tokio::sync::Mutex,
};

/// Notifies the edge puller that a player asked for a stream nobody
/// publishes locally.
pub type PullEventSender = mpsc::UnboundedSender<StreamIdentifier>;

/// How long to wait between subscribe retries while an edge pull warms
/// up, and how many times to try.
const PULL_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const PULL_RETRY_COUNT: usize = 10;

/// Default peer acknowledgement window until the client negotiates one.
const DEFAULT_ACK_WINDOW: u32 = 2_500_000;

pub struct ServerSessionConfig {
    pub gop_num: usize,
    pub atc_threshold_ms: u64,
    pub read_timeout: Duration,
    pub auth: Option<Arc<dyn AuthCallback>>,
    pub pull_notifier: Option<PullEventSender>,
}

/*
 *  ACCEPT -> HANDSHAKE -> CONNECT -> { PLAY | PUBLISH } -> STREAMING -> CLOSED
 */
pub struct ServerSession {
    pub app_name: String,
    pub stream_name: String,
    pub query: Option<String>,
    tc_url_host: String,

    io: Arc<Mutex<BytesIO>>,
    handshake: HandshakeServer,
    unpacketizer: ChunkUnpacketizer,
    pub common: Common,

    config: ServerSessionConfig,
    state: ServerSessionState,

    //play side: filled after a successful subscribe
    data_receiver: Option<FrameDataReceiver>,
    is_pause: bool,

    ack_window_size: u32,
    total_recv_bytes: u64,
    acked_bytes: u64,
}

impl ServerSession {
    #[must_use]
    pub fn new(
        stream: TcpStream,
        event_producer: StreamHubEventSender,
        config: ServerSessionConfig,
    ) -> Self {
        let remote_addr = stream
            .peer_addr()
            .map_or_else(|_| String::new(), |addr| addr.to_string());
        let io = Arc::new(Mutex::new(BytesIO::new(stream)));

        Self {
            app_name: String::new(),
            stream_name: String::new(),
            query: None,
            tc_url_host: String::new(),
            io: io.clone(),
            handshake: HandshakeServer::new(),
            unpacketizer: ChunkUnpacketizer::new(),
            common: Common::new(io, event_producer, SessionType::Server, remote_addr),
            config,
            state: ServerSessionState::Handshake,
            data_receiver: None,
            is_pause: false,
            ack_window_size: DEFAULT_ACK_WINDOW,
            total_recv_bytes: 0,
            acked_bytes: 0,
        }
    }

    fn identifier(&self) -> StreamIdentifier {
        StreamIdentifier::new(
            utils::resolve_vhost(&self.tc_url_host, self.query.as_deref()),
            self.app_name.clone(),
            self.stream_name.clone(),
        )
    }

    pub async fn run(&mut self) -> Result<(), SessionError> {
        let result = self.run_inner().await;
        self.cleanup().await;
        result
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        self.do_handshake().await?;
        self.state = ServerSessionState::ReadMessages;

        loop {
            if self.state == ServerSessionState::Play {
                return self.play_loop().await;
            }

            let data = self
                .io
                .lock()
                .await
                .read_timeout(self.config.read_timeout)
                .await?;
            self.on_bytes_received(data.len() as u64).await?;
            self.unpacketizer.extend_data(&data)?;
            self.process_buffered_messages().await?;
        }
    }

    async fn do_handshake(&mut self) -> Result<(), SessionError> {
        loop {
            let data = self
                .io
                .lock()
                .await
                .read_timeout(self.config.read_timeout)
                .await?;
            self.handshake.extend_data(&data)?;
            let state = self.handshake.handshake()?;

            let response = self.handshake.extract_response();
            if !response.is_empty() {
                self.io.lock().await.write(response.freeze()).await?;
            }

            if state == ServerHandshakeState::Finish {
                let leftover = self.handshake.extract_remaining_bytes();
                if !leftover.is_empty() {
                    self.unpacketizer.extend_data(&leftover)?;
                }
                tracing::debug!(session_id = %self.common.session_id, "handshake finished");
                return Ok(());
            }
        }
    }

    async fn on_bytes_received(&mut self, len: u64) -> Result<(), SessionError> {
        self.total_recv_bytes += len;
        if self.total_recv_bytes - self.acked_bytes >= u64::from(self.ack_window_size) {
            self.acked_bytes = self.total_recv_bytes;
            let chunk =
                ControlMessagesWriter::write_acknowledgement(self.total_recv_bytes as u32)?;
            self.common.send_chunk(&chunk).await?;
        }
        Ok(())
    }

    async fn process_buffered_messages(&mut self) -> Result<(), SessionError> {
        loop {
            let chunks = match self.unpacketizer.read_chunks() {
                Ok(UnpackResult::Chunks(chunks)) => chunks,
                Ok(_) => break,
                Err(err) => {
                    if matches!(
                        err.value,
                        crate::rtmp::chunk::errors::UnpackErrorValue::EmptyChunks
                    ) {
                        break;
                    }
                    return Err(err.into());
                }
            };

            let mut saw_set_chunk_size = false;
            for chunk in chunks {
                saw_set_chunk_size |=
                    chunk.message_header.msg_type_id == msg_type_id::SET_CHUNK_SIZE;
                self.process_chunk(chunk).await?;
            }
            //after SetChunkSize the unpacketizer was reconfigured by the
            //handler; loop to parse what follows under the new size
            if !saw_set_chunk_size {
                break;
            }
        }
        Ok(())
    }

    async fn process_chunk(&mut self, chunk: ChunkInfo) -> Result<(), SessionError> {
        let timestamp = chunk.message_header.timestamp;
        let msg_stream_id = chunk.message_header.msg_stream_id;

        let Some(message) = MessageParser::new(chunk).parse()? else {
            return Ok(());
        };

        match message {
            RtmpMessageData::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                others,
            } => {
                self.on_amf0_command(
                    msg_stream_id,
                    &command_name,
                    &transaction_id,
                    &command_object,
                    &others,
                )
                .await?;
            }
            RtmpMessageData::SetChunkSize { chunk_size } => {
                self.unpacketizer.update_max_chunk_size(chunk_size as usize);
            }
            RtmpMessageData::WindowAcknowledgementSize { size } => {
                if size > 0 {
                    self.ack_window_size = size;
                }
            }
            RtmpMessageData::Acknowledgement { .. }
            | RtmpMessageData::SetPeerBandwidth { .. }
            | RtmpMessageData::AbortMessage { .. } => {}
            RtmpMessageData::UserControl(event) => self.on_user_control(event).await?,
            RtmpMessageData::AudioData { data } => {
                self.common.on_audio_data(&data, timestamp).await?;
            }
            RtmpMessageData::VideoData { data } => {
                self.common.on_video_data(&data, timestamp).await?;
            }
            RtmpMessageData::AmfData { raw_data } => {
                self.on_amf_data(raw_data, timestamp).await?;
            }
        }
        Ok(())
    }

    async fn on_user_control(&mut self, event: UserControlEvent) -> Result<(), SessionError> {
        match event {
            UserControlEvent::PingRequest { timestamp } => {
                let chunk = EventMessagesWriter::write_ping_response(timestamp)?;
                self.common.send_chunk(&chunk).await?;
            }
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            } => {
                tracing::trace!(stream_id, buffer_ms, "client buffer length");
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_amf0_command(
        &mut self,
        msg_stream_id: u32,
        command_name: &Amf0ValueType,
        transaction_id: &Amf0ValueType,
        command_object: &Amf0ValueType,
        others: &[Amf0ValueType],
    ) -> Result<(), SessionError> {
        let command_name = match command_name {
            Amf0ValueType::UTF8String(name) => name.as_str(),
            _ => {
                return Err(SessionError {
                    value: SessionErrorValue::Amf0ValueTypeNotCorrect,
                })
            }
        };
        let transaction_id = match transaction_id {
            Amf0ValueType::Number(id) => *id,
            _ => {
                return Err(SessionError {
                    value: SessionErrorValue::Amf0ValueTypeNotCorrect,
                })
            }
        };

        tracing::debug!(
            session_id = %self.common.session_id,
            command_name,
            transaction_id,
            "amf0 command"
        );

        match command_name {
            "connect" => self.on_connect(transaction_id, command_object).await,
            "createStream" => self.on_create_stream(transaction_id).await,
            "releaseStream" | "FCPublish" | "FCUnpublish" => {
                //FMLE bookkeeping commands only need an empty _result
                let chunk = NetConnection::write_create_stream_response(transaction_id, 0.0)?;
                self.common.send_chunk(&chunk).await
            }
            "publish" => self.on_publish(transaction_id, others).await,
            "play" => self.on_play(transaction_id, others).await,
            "pause" => self.on_pause(others).await,
            "deleteStream" | "closeStream" => self.on_delete_stream(msg_stream_id).await,
            _ => {
                tracing::debug!(command_name, "unhandled command, ignored");
                Ok(())
            }
        }
    }

    async fn on_connect(
        &mut self,
        transaction_id: f64,
        command_object: &Amf0ValueType,
    ) -> Result<(), SessionError> {
        if let Amf0ValueType::Object(properties) = command_object {
            if let Some(Amf0ValueType::UTF8String(app)) = properties.get("app") {
                //the app may carry vhost parameters: live?vhost=x
                let (app_name, query) = utils::split_stream_query(app);
                self.app_name = app_name;
                if query.is_some() {
                    self.query = query;
                }
            }
            if let Some(Amf0ValueType::UTF8String(tc_url)) = properties.get("tcUrl") {
                if let Some(host) = utils::tc_url_host(tc_url) {
                    self.tc_url_host = host;
                }
            }
        }

        if self.app_name.is_empty() {
            let chunk = NetConnection::write_error(
                transaction_id,
                status_code::CONNECT_REJECTED,
                "error",
                "no app name",
            )?;
            self.common.send_chunk(&chunk).await?;
            return Err(SessionError {
                value: SessionErrorValue::NoAppName,
            });
        }

        let window = ControlMessagesWriter::write_window_acknowledgement_size(
            OUT_WINDOW_ACK_SIZE,
        )?;
        self.common.send_chunk(&window).await?;
        let bandwidth = ControlMessagesWriter::write_set_peer_bandwidth(
            OUT_PEER_BANDWIDTH,
            crate::rtmp::messages::define::peer_bandwidth_limit_type::DYNAMIC,
        )?;
        self.common.send_chunk(&bandwidth).await?;
        let chunk_size = ControlMessagesWriter::write_set_chunk_size(OUT_CHUNK_SIZE)?;
        self.common.send_chunk(&chunk_size).await?;
        self.common.update_out_chunk_size(OUT_CHUNK_SIZE as usize);

        let response = NetConnection::write_connect_response(
            transaction_id,
            "FMS/3,0,1,123",
            31.0,
            status_code::CONNECT_SUCCESS,
            "status",
            "Connection Succeeded.",
            0.0,
        )?;
        self.common.send_chunk(&response).await?;

        Ok(())
    }

    async fn on_create_stream(&mut self, transaction_id: f64) -> Result<(), SessionError> {
        let response =
            NetConnection::write_create_stream_response(transaction_id, f64::from(STREAM_ID))?;
        self.common.send_chunk(&response).await?;
        Ok(())
    }

    fn parse_stream_name(&mut self, others: &[Amf0ValueType]) -> Result<(), SessionError> {
        let Some(Amf0ValueType::UTF8String(raw_stream)) = others.first() else {
            return Err(SessionError {
                value: SessionErrorValue::NoStreamName,
            });
        };

        let (stream_name, query) = utils::split_stream_query(raw_stream);
        if stream_name.is_empty() {
            return Err(SessionError {
                value: SessionErrorValue::NoStreamName,
            });
        }
        self.stream_name = stream_name;
        if query.is_some() {
            self.query = query;
        }
        Ok(())
    }

    async fn authenticate(
        &self,
        publishing: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let Some(auth) = &self.config.auth else {
            return Ok(());
        };
        if publishing {
            auth.on_publish(&self.app_name, &self.stream_name, self.query.as_deref())
                .await
        } else {
            auth.on_play(&self.app_name, &self.stream_name, self.query.as_deref())
                .await
        }
    }

    async fn on_publish(
        &mut self,
        transaction_id: f64,
        others: &[Amf0ValueType],
    ) -> Result<(), SessionError> {
        self.parse_stream_name(others)?;
        let identifier = self.identifier();

        tracing::info!(
            session_id = %self.common.session_id,
            identifier = %identifier,
            "publish requested"
        );

        if let Err(err) = self.authenticate(true).await {
            let status = NetStreamWriter::write_on_status(
                transaction_id,
                "error",
                status_code::PUBLISH_BAD_NAME,
                "publish denied",
                STREAM_ID,
            )?;
            self.common.send_chunk(&status).await?;
            return Err(SessionError {
                value: SessionErrorValue::AuthFailed(err.to_string()),
            });
        }

        let begin = EventMessagesWriter::write_stream_begin(STREAM_ID)?;
        self.common.send_chunk(&begin).await?;

        match self
            .common
            .publish_to_stream_hub(
                identifier.clone(),
                PublishType::RtmpPush,
                format!("rtmp://{}/{}/{}", self.tc_url_host, self.app_name, self.stream_name),
                self.config.gop_num,
                self.config.atc_threshold_ms,
            )
            .await
        {
            Ok(()) => {}
            Err(err) => {
                if matches!(err.value, SessionErrorValue::StreamInUse) {
                    //another publisher holds this name
                    let status = NetStreamWriter::write_on_status(
                        transaction_id,
                        "error",
                        status_code::PUBLISH_BAD_NAME,
                        "stream is already publishing",
                        STREAM_ID,
                    )?;
                    self.common.send_chunk(&status).await?;
                }
                return Err(err);
            }
        }

        let status = NetStreamWriter::write_on_status(
            transaction_id,
            "status",
            status_code::PUBLISH_START,
            "publish started",
            STREAM_ID,
        )?;
        self.common.send_chunk(&status).await?;

        self.state = ServerSessionState::Publish;
        Ok(())
    }

    async fn on_play(
        &mut self,
        transaction_id: f64,
        others: &[Amf0ValueType],
    ) -> Result<(), SessionError> {
        self.parse_stream_name(others)?;
        let identifier = self.identifier();

        tracing::info!(
            session_id = %self.common.session_id,
            identifier = %identifier,
            "play requested"
        );

        if let Err(err) = self.authenticate(false).await {
            let status = NetStreamWriter::write_on_status(
                transaction_id,
                "error",
                "NetStream.Play.Failed",
                "play denied",
                STREAM_ID,
            )?;
            self.common.send_chunk(&status).await?;
            return Err(SessionError {
                value: SessionErrorValue::AuthFailed(err.to_string()),
            });
        }

        let receiver = self.subscribe_with_pull_retry(identifier).await;
        let receiver = match receiver {
            Ok(receiver) => receiver,
            Err(err) => {
                let status = NetStreamWriter::write_on_status(
                    transaction_id,
                    "error",
                    status_code::PLAY_STREAM_NOT_FOUND,
                    "no publisher for this stream",
                    STREAM_ID,
                )?;
                self.common.send_chunk(&status).await?;
                return Err(err);
            }
        };

        let begin = EventMessagesWriter::write_stream_begin(STREAM_ID)?;
        self.common.send_chunk(&begin).await?;
        let recorded = EventMessagesWriter::write_stream_is_recorded(STREAM_ID)?;
        self.common.send_chunk(&recorded).await?;

        for (code, description) in [
            (status_code::PLAY_RESET, "play reset"),
            (status_code::PLAY_START, "play started"),
        ] {
            let status = NetStreamWriter::write_on_status(
                transaction_id,
                "status",
                code,
                description,
                STREAM_ID,
            )?;
            self.common.send_chunk(&status).await?;
        }

        self.data_receiver = Some(receiver);
        self.state = ServerSessionState::Play;
        Ok(())
    }

    /// Subscribes; when the stream is absent and an edge puller is
    /// wired up, kicks it and polls until the upstream ingest lands.
    async fn subscribe_with_pull_retry(
        &mut self,
        identifier: StreamIdentifier,
    ) -> Result<FrameDataReceiver, SessionError> {
        let request_url = format!(
            "rtmp://{}/{}/{}",
            self.tc_url_host, self.app_name, self.stream_name
        );

        let first_attempt = self
            .common
            .subscribe_from_stream_hub(
                identifier.clone(),
                SubscribeType::RtmpPull,
                request_url.clone(),
            )
            .await;

        let err = match first_attempt {
            Ok(receiver) => return Ok(receiver),
            Err(err) => err,
        };

        let Some(notifier) = &self.config.pull_notifier else {
            return Err(err);
        };
        if notifier.send(identifier.clone()).is_err() {
            return Err(err);
        }
        tracing::info!(identifier = %identifier, "asked edge puller to fetch missing stream");

        for _ in 0..PULL_RETRY_COUNT {
            tokio::time::sleep(PULL_RETRY_INTERVAL).await;
            if let Ok(receiver) = self
                .common
                .subscribe_from_stream_hub(
                    identifier.clone(),
                    SubscribeType::RtmpPull,
                    request_url.clone(),
                )
                .await
            {
                return Ok(receiver);
            }
        }

        Err(SessionError {
            value: SessionErrorValue::PullRetriesExhausted,
        })
    }

    async fn on_pause(&mut self, others: &[Amf0ValueType]) -> Result<(), SessionError> {
        if let Some(Amf0ValueType::Boolean(pause)) = others.first() {
            self.is_pause = *pause;
            let (code, description) = if *pause {
                ("NetStream.Pause.Notify", "paused")
            } else {
                ("NetStream.Unpause.Notify", "unpaused")
            };
            let status =
                NetStreamWriter::write_on_status(0.0, "status", code, description, STREAM_ID)?;
            self.common.send_chunk(&status).await?;
        }
        Ok(())
    }

    async fn on_delete_stream(&mut self, _msg_stream_id: u32) -> Result<(), SessionError> {
        match self.state {
            ServerSessionState::Publish => {
                let status = NetStreamWriter::write_on_status(
                    0.0,
                    "status",
                    status_code::UNPUBLISH_SUCCESS,
                    "unpublish succeeded",
                    STREAM_ID,
                )?;
                self.common.send_chunk(&status).await?;
            }
            _ => {
                let status = NetStreamWriter::write_on_status(
                    0.0,
                    "status",
                    status_code::PLAY_STOP,
                    "play stopped",
                    STREAM_ID,
                )?;
                self.common.send_chunk(&status).await?;
            }
        }
        Err(SessionError {
            value: SessionErrorValue::Finish,
        })
    }

    /// onMetaData / @setDataFrame script payloads.
    async fn on_amf_data(&mut self, body: BytesMut, timestamp: u32) -> Result<(), SessionError> {
        if self.state != ServerSessionState::Publish {
            return Ok(());
        }
        self.common.on_meta_data(&body, timestamp).await
    }

    async fn play_loop(&mut self) -> Result<(), SessionError> {
        let mut receiver = self.data_receiver.take().ok_or(SessionError {
            value: SessionErrorValue::NoneFrameDataSender,
        })?;
        let io = self.io.clone();

        loop {
            tokio::select! {
                frame = receiver.recv() => {
                    match frame {
                        Some(frame) => {
                            if !self.is_pause {
                                self.common.send_media(frame).await?;
                            }
                        }
                        None => {
                            //publisher went away: notify and drain out
                            tracing::info!(
                                session_id = %self.common.session_id,
                                "source drained, ending play session"
                            );
                            let eof = EventMessagesWriter::write_stream_eof(STREAM_ID)?;
                            self.common.send_chunk(&eof).await?;
                            let status = NetStreamWriter::write_on_status(
                                0.0,
                                "status",
                                status_code::UNPUBLISH_NOTIFY,
                                "the publisher stopped",
                                STREAM_ID,
                            )?;
                            self.common.send_chunk(&status).await?;
                            return Ok(());
                        }
                    }
                }
                data = async {
                    io.lock().await.read().await
                } => {
                    let data = data?;
                    self.unpacketizer.extend_data(&data)?;
                    //control traffic (pause, closeStream) while playing
                    loop {
                        match self.unpacketizer.read_chunk() {
                            Ok(UnpackResult::ChunkInfo(chunk)) => {
                                self.process_play_control(chunk).await?;
                            }
                            Ok(_) => break,
                            Err(_) => break,
                        }
                    }
                }
            }
        }
    }

    async fn process_play_control(&mut self, chunk: ChunkInfo) -> Result<(), SessionError> {
        let msg_stream_id = chunk.message_header.msg_stream_id;
        let Some(message) = MessageParser::new(chunk).parse()? else {
            return Ok(());
        };

        match message {
            RtmpMessageData::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                others,
            } => {
                self.on_amf0_command(
                    msg_stream_id,
                    &command_name,
                    &transaction_id,
                    &command_object,
                    &others,
                )
                .await
            }
            RtmpMessageData::SetChunkSize { chunk_size } => {
                self.unpacketizer.update_max_chunk_size(chunk_size as usize);
                Ok(())
            }
            RtmpMessageData::UserControl(event) => self.on_user_control(event).await,
            _ => Ok(()),
        }
    }

    async fn cleanup(&mut self) {
        let identifier = self.identifier();
        match self.state {
            ServerSessionState::Publish => {
                if let Err(err) = self
                    .common
                    .unpublish_from_stream_hub(identifier, PublishType::RtmpPush)
                {
                    tracing::debug!("unpublish on cleanup: {err}");
                }
                if let Some(auth) = &self.config.auth {
                    auth.on_unpublish(&self.app_name, &self.stream_name, self.query.as_deref())
                        .await;
                }
            }
            ServerSessionState::Play => {
                if let Err(err) = self
                    .common
                    .unsubscribe_from_stream_hub(identifier, SubscribeType::RtmpPull)
                {
                    tracing::debug!("unsubscribe on cleanup: {err}");
                }
                if let Some(auth) = &self.config.auth {
                    auth.on_unplay(&self.app_name, &self.stream_name, self.query.as_deref())
                        .await;
                }
            }
            _ => {}
        }
    }
}

/// Builds the AMF body of an `onMetaData` script message from a
/// `@setDataFrame` payload check; used by tests and the HTTP-FLV path.
pub fn strip_set_data_frame(body: &BytesMut) -> Result<BytesMut, SessionError> {
    let mut amf_writer = Amf0Writer::new();
    amf_writer.write_string("@setDataFrame")?;
    let prefix_len = amf_writer.len();

    if body.len() > prefix_len && body[..prefix_len] == amf_writer.extract_current_bytes()[..] {
        Ok(BytesMut::from(&body[prefix_len..]))
    } else {
        Ok(body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_set_data_frame() {
        let mut writer = Amf0Writer::new();
        writer.write_string("@setDataFrame").unwrap();
        writer.write_string("onMetaData").unwrap();
        let body = BytesMut::from(&writer.extract_current_bytes()[..]);

        let stripped = strip_set_data_frame(&body).unwrap();
        //the remaining AMF starts at the onMetaData string marker
        assert_eq!(stripped[0], 0x02);

        let plain = BytesMut::from(&b"plain"[..]);
        assert_eq!(strip_set_data_frame(&plain).unwrap(), plain);
    }
}
