use {
    super::common::Common,
    super::define::{ClientSessionType, SessionType, STREAM_ID},
    super::errors::{SessionError, SessionErrorValue},
    crate::bytesio::bytesio::BytesIO,
    crate::flv::amf0::Amf0ValueType,
    crate::rtmp::chunk::unpacketizer::{ChunkUnpacketizer, UnpackResult},
    crate::rtmp::chunk::ChunkInfo,
    crate::rtmp::handshake::{ClientHandshakeState, HandshakeClient},
    crate::rtmp::messages::define::RtmpMessageData,
    crate::rtmp::messages::MessageParser,
    crate::rtmp::netconnection::{ConnectProperties, NetConnection},
    crate::rtmp::netstream::{status_code, NetStreamWriter},
    crate::rtmp::protocol_control_messages::writer::ControlMessagesWriter,
    crate::rtmp::utils::RtmpUrlParser,
    crate::streamhub::define::{
        FrameDataReceiver, PublishType, StreamHubEventSender, SubscribeType,
    },
    crate::streamhub::stream::StreamIdentifier,
    std::sync::Arc,
    std::time::Duration,
    tokio::net::TcpStream,
    tokio::sync::Mutex,
};

const CONNECT_TRANSACTION_ID: f64 = 1.0;
const CREATE_STREAM_TRANSACTION_ID: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientSessionState {
    Handshake,
    WaitConnectResult,
    WaitCreateStreamResult,
    WaitStreamStart,
    Streaming,
}

/// Outbound RTMP session. In `Pull` mode it plays a remote stream and
/// publishes the frames into the local hub (edge ingest); in `Push`
/// mode it subscribes locally and publishes to the remote peer
/// (forward).
pub struct ClientSession {
    url: RtmpUrlParser,
    local_identifier: StreamIdentifier,
    session_type: ClientSessionType,

    io: Arc<Mutex<BytesIO>>,
    handshake: HandshakeClient,
    unpacketizer: ChunkUnpacketizer,
    pub common: Common,

    state: ClientSessionState,
    gop_num: usize,
    atc_threshold_ms: u64,
    read_timeout: Duration,
}

impl ClientSession {
    #[must_use]
    pub fn new(
        stream: TcpStream,
        event_producer: StreamHubEventSender,
        url: RtmpUrlParser,
        local_identifier: StreamIdentifier,
        session_type: ClientSessionType,
        gop_num: usize,
        atc_threshold_ms: u64,
        read_timeout: Duration,
    ) -> Self {
        let remote_addr = stream
            .peer_addr()
            .map_or_else(|_| String::new(), |addr| addr.to_string());
        let io = Arc::new(Mutex::new(BytesIO::new(stream)));

        Self {
            url,
            local_identifier,
            session_type,
            io: io.clone(),
            handshake: HandshakeClient::new(),
            unpacketizer: ChunkUnpacketizer::new(),
            common: Common::new(io, event_producer, SessionType::Client, remote_addr),
            state: ClientSessionState::Handshake,
            gop_num,
            atc_threshold_ms,
            read_timeout,
        }
    }

    pub async fn run(&mut self) -> Result<(), SessionError> {
        let result = self.run_inner().await;
        self.cleanup().await;
        result
    }

    async fn run_inner(&mut self) -> Result<(), SessionError> {
        self.do_handshake().await?;

        let properties = ConnectProperties::new(
            self.url.app_name.clone(),
            format!("rtmp://{}/{}", self.url.host_with_port, self.url.app_name),
        );
        let connect = NetConnection::write_connect(CONNECT_TRANSACTION_ID, &properties)?;
        self.common.send_chunk(&connect).await?;
        self.state = ClientSessionState::WaitConnectResult;

        loop {
            if self.state == ClientSessionState::Streaming
                && self.session_type == ClientSessionType::Push
            {
                return self.push_loop().await;
            }

            let data = self
                .io
                .lock()
                .await
                .read_timeout(self.read_timeout)
                .await?;
            self.unpacketizer.extend_data(&data)?;

            loop {
                match self.unpacketizer.read_chunk() {
                    Ok(UnpackResult::ChunkInfo(chunk)) => self.process_chunk(chunk).await?,
                    Ok(_) => break,
                    Err(_) => break,
                }
            }
        }
    }

    async fn do_handshake(&mut self) -> Result<(), SessionError> {
        self.handshake.handshake()?;
        let c0c1 = self.handshake.extract_response();
        self.io.lock().await.write(c0c1.freeze()).await?;

        loop {
            let data = self
                .io
                .lock()
                .await
                .read_timeout(self.read_timeout)
                .await?;
            self.handshake.extend_data(&data)?;
            let state = self.handshake.handshake()?;

            let response = self.handshake.extract_response();
            if !response.is_empty() {
                self.io.lock().await.write(response.freeze()).await?;
            }

            if state == ClientHandshakeState::Finish {
                let leftover = self.handshake.extract_remaining_bytes();
                if !leftover.is_empty() {
                    self.unpacketizer.extend_data(&leftover)?;
                }
                return Ok(());
            }
        }
    }

    async fn process_chunk(&mut self, chunk: ChunkInfo) -> Result<(), SessionError> {
        let timestamp = chunk.message_header.timestamp;
        let Some(message) = MessageParser::new(chunk).parse()? else {
            return Ok(());
        };

        match message {
            RtmpMessageData::SetChunkSize { chunk_size } => {
                self.unpacketizer.update_max_chunk_size(chunk_size as usize);
            }
            RtmpMessageData::WindowAcknowledgementSize { .. }
            | RtmpMessageData::SetPeerBandwidth { .. }
            | RtmpMessageData::Acknowledgement { .. }
            | RtmpMessageData::AbortMessage { .. }
            | RtmpMessageData::UserControl(_) => {}
            RtmpMessageData::Amf0Command {
                command_name,
                transaction_id,
                others,
                ..
            } => {
                self.on_amf0_command(&command_name, &transaction_id, &others)
                    .await?;
            }
            RtmpMessageData::AudioData { data } => {
                if self.state == ClientSessionState::Streaming {
                    self.common.on_audio_data(&data, timestamp).await?;
                }
            }
            RtmpMessageData::VideoData { data } => {
                if self.state == ClientSessionState::Streaming {
                    self.common.on_video_data(&data, timestamp).await?;
                }
            }
            RtmpMessageData::AmfData { raw_data } => {
                if self.state == ClientSessionState::Streaming {
                    self.common.on_meta_data(&raw_data, timestamp).await?;
                }
            }
        }
        Ok(())
    }

    async fn on_amf0_command(
        &mut self,
        command_name: &Amf0ValueType,
        _transaction_id: &Amf0ValueType,
        others: &[Amf0ValueType],
    ) -> Result<(), SessionError> {
        let Amf0ValueType::UTF8String(command_name) = command_name else {
            return Ok(());
        };

        match (command_name.as_str(), self.state) {
            ("_result", ClientSessionState::WaitConnectResult) => {
                //FMLE-style bookkeeping before createStream on push
                if self.session_type == ClientSessionType::Push {
                    let release = NetConnection::write_stream_command(
                        "releaseStream",
                        2.0,
                        &self.url.stream_name,
                    )?;
                    self.common.send_chunk(&release).await?;
                    let fcpublish = NetConnection::write_stream_command(
                        "FCPublish",
                        3.0,
                        &self.url.stream_name,
                    )?;
                    self.common.send_chunk(&fcpublish).await?;
                }

                let create_stream =
                    NetConnection::write_create_stream(CREATE_STREAM_TRANSACTION_ID)?;
                self.common.send_chunk(&create_stream).await?;
                self.state = ClientSessionState::WaitCreateStreamResult;
            }
            ("_result", ClientSessionState::WaitCreateStreamResult) => {
                let msg_stream_id = match others.first() {
                    Some(Amf0ValueType::Number(stream_id)) => *stream_id as u32,
                    _ => STREAM_ID,
                };
                self.start_stream(msg_stream_id).await?;
                self.state = ClientSessionState::WaitStreamStart;
            }
            ("onStatus", _) => {
                self.on_status(others).await?;
            }
            ("_error", _) => {
                tracing::error!(session_id = %self.common.session_id, "peer answered _error");
                return Err(SessionError {
                    value: SessionErrorValue::UnexpectedResponse("_error".to_string()),
                });
            }
            _ => {}
        }
        Ok(())
    }

    async fn start_stream(&mut self, msg_stream_id: u32) -> Result<(), SessionError> {
        match self.session_type {
            ClientSessionType::Pull => {
                let chunk_size = ControlMessagesWriter::write_set_chunk_size(
                    super::define::OUT_CHUNK_SIZE,
                )?;
                self.common.send_chunk(&chunk_size).await?;
                self.common
                    .update_out_chunk_size(super::define::OUT_CHUNK_SIZE as usize);

                let play = NetStreamWriter::write_play(
                    5.0,
                    &self.url.stream_name,
                    -2.0,
                    -1.0,
                    true,
                    msg_stream_id,
                )?;
                self.common.send_chunk(&play).await?;
            }
            ClientSessionType::Push => {
                let chunk_size = ControlMessagesWriter::write_set_chunk_size(
                    super::define::OUT_CHUNK_SIZE,
                )?;
                self.common.send_chunk(&chunk_size).await?;
                self.common
                    .update_out_chunk_size(super::define::OUT_CHUNK_SIZE as usize);

                let publish = NetStreamWriter::write_publish(
                    5.0,
                    &self.url.stream_name,
                    "live",
                    msg_stream_id,
                )?;
                self.common.send_chunk(&publish).await?;
            }
        }
        Ok(())
    }

    async fn on_status(&mut self, others: &[Amf0ValueType]) -> Result<(), SessionError> {
        let code = others.iter().find_map(|value| {
            if let Amf0ValueType::Object(object) = value {
                if let Some(Amf0ValueType::UTF8String(code)) = object.get("code") {
                    return Some(code.clone());
                }
            }
            None
        });
        let Some(code) = code else {
            return Ok(());
        };

        tracing::info!(session_id = %self.common.session_id, code, "onStatus from peer");

        match code.as_str() {
            status_code::PLAY_START => {
                if self.session_type == ClientSessionType::Pull {
                    //remote play rolling: become the local publisher
                    self.common
                        .publish_to_stream_hub(
                            self.local_identifier.clone(),
                            PublishType::RtmpEdgePull,
                            self.url.raw_url.clone(),
                            self.gop_num,
                            self.atc_threshold_ms,
                        )
                        .await?;
                    self.state = ClientSessionState::Streaming;
                }
            }
            status_code::PUBLISH_START => {
                if self.session_type == ClientSessionType::Push {
                    self.state = ClientSessionState::Streaming;
                }
            }
            status_code::PLAY_STREAM_NOT_FOUND
            | status_code::PUBLISH_BAD_NAME
            | status_code::UNPUBLISH_NOTIFY => {
                return Err(SessionError {
                    value: SessionErrorValue::UnexpectedResponse(code),
                });
            }
            _ => {}
        }
        Ok(())
    }

    /// Push mode streaming: local hub frames out to the remote peer.
    async fn push_loop(&mut self) -> Result<(), SessionError> {
        let mut receiver: FrameDataReceiver = self
            .common
            .subscribe_from_stream_hub(
                self.local_identifier.clone(),
                SubscribeType::RtmpForward,
                self.url.raw_url.clone(),
            )
            .await?;
        let io = self.io.clone();

        loop {
            tokio::select! {
                frame = receiver.recv() => {
                    match frame {
                        Some(frame) => self.common.send_media(frame).await?,
                        None => {
                            tracing::info!(
                                identifier = %self.local_identifier,
                                "local source drained, ending forward push"
                            );
                            return Ok(());
                        }
                    }
                }
                data = async {
                    io.lock().await.read().await
                } => {
                    let data = data?;
                    self.unpacketizer.extend_data(&data)?;
                    loop {
                        match self.unpacketizer.read_chunk() {
                            Ok(UnpackResult::ChunkInfo(chunk)) => {
                                self.process_chunk(chunk).await?;
                            }
                            Ok(_) => break,
                            Err(_) => break,
                        }
                    }
                }
            }
        }
    }

    async fn cleanup(&mut self) {
        match self.session_type {
            ClientSessionType::Pull => {
                if self.state == ClientSessionState::Streaming {
                    if let Err(err) = self.common.unpublish_from_stream_hub(
                        self.local_identifier.clone(),
                        PublishType::RtmpEdgePull,
                    ) {
                        tracing::debug!("edge unpublish on cleanup: {err}");
                    }
                }
            }
            ClientSessionType::Push => {
                if self.state == ClientSessionState::Streaming {
                    if let Err(err) = self.common.unsubscribe_from_stream_hub(
                        self.local_identifier.clone(),
                        SubscribeType::RtmpForward,
                    ) {
                        tracing::debug!("forward unsubscribe on cleanup: {err}");
                    }
                }
            }
        }
    }
}
