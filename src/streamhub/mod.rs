pub mod define;
pub mod errors;
pub mod queue;
pub mod statistics;
pub mod stream;
pub mod utils;

use {
    define::{
        BroadcastEvent, BroadcastEventSender, FrameData, FrameDataReceiver, FrameDataSender,
        PublisherInfo, StatisticData, StatisticDataReceiver, StatisticDataSender, StreamHubEvent,
        StreamHubEventReceiver, StreamHubEventSender, SubscriberInfo, TStreamHandler,
        TransceiverEvent, TransceiverEventReceiver, TransceiverEventSender,
    },
    errors::{StreamHubError, StreamHubErrorValue},
    queue::SubscriberQueue,
    statistics::{StatisticsCalculate, StreamStatistics},
    std::collections::HashMap,
    std::sync::Arc,
    stream::StreamIdentifier,
    tokio::sync::{broadcast, mpsc, oneshot, Mutex},
    utils::Uuid,
};

/// A subscriber as the transceiver sees it: the channel into its
/// session plus the duration-bounded pending queue in front of it.
struct Subscriber {
    sender: FrameDataSender,
    queue: SubscriberQueue,
    info: SubscriberInfo,
}

/// One task per live stream: receives frames from the publisher and
/// fans them out, in arrival order, to every subscriber. All
/// per-stream state is owned by this task, so frames are never
/// observed out of order or interleaved mid-message.
pub struct StreamDataTransceiver {
    data_receiver: FrameDataReceiver,
    event_receiver: TransceiverEventReceiver,
    statistic_data_sender: StatisticDataSender,
    statistic_data_receiver: StatisticDataReceiver,
    statistic_data: Arc<Mutex<StreamStatistics>>,
    stream_handler: Arc<dyn TStreamHandler>,
    subscribers: HashMap<Uuid, Subscriber>,
    subscriber_queue_duration_ms: u64,
}

impl StreamDataTransceiver {
    fn new(
        data_receiver: FrameDataReceiver,
        event_receiver: TransceiverEventReceiver,
        identifier: StreamIdentifier,
        handler: Arc<dyn TStreamHandler>,
        subscriber_queue_duration_ms: u64,
    ) -> Self {
        let (statistic_data_sender, statistic_data_receiver) =
            mpsc::channel(define::STATISTIC_DATA_CHANNEL_CAPACITY);
        Self {
            data_receiver,
            event_receiver,
            statistic_data_sender,
            statistic_data_receiver,
            statistic_data: Arc::new(Mutex::new(StreamStatistics::new(identifier))),
            stream_handler: handler,
            subscribers: HashMap::new(),
            subscriber_queue_duration_ms,
        }
    }

    fn get_statistics_data_sender(&self) -> StatisticDataSender {
        self.statistic_data_sender.clone()
    }

    async fn fan_out(&mut self, frame: FrameData) {
        let mut dead: Vec<Uuid> = Vec::new();

        for (id, subscriber) in &mut self.subscribers {
            if subscriber.queue.push(frame.clone()).is_err() {
                tracing::warn!(
                    subscriber_id = %id,
                    sub_type = ?subscriber.info.sub_type,
                    "subscriber stalled past its queue budget, dropping it"
                );
                dead.push(*id);
                continue;
            }

            //drain as much of the pending queue as the channel accepts
            while let Some(front) = subscriber.queue.front() {
                match subscriber.sender.try_send(front.clone()) {
                    Ok(()) => {
                        subscriber.queue.pop();
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => break,
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(*id);
                        break;
                    }
                }
            }
        }

        for id in dead {
            self.subscribers.remove(&id);
            tracing::debug!(subscriber_id = %id, "removed subscriber");
        }
    }

    async fn on_statistic_data(&mut self, data: StatisticData) {
        let mut statistics = self.statistic_data.lock().await;
        let statistics = &mut *statistics;
        match data {
            StatisticData::Audio { uuid, data_size } => {
                if let Some(uid) = uuid {
                    if let Some(subscriber) = statistics.subscribers.get_mut(&uid) {
                        subscriber.send_bytes += data_size as u64;
                        subscriber.send_bytes_for_bitrate += data_size as u64;
                    }
                    statistics.total_send_bytes += data_size as u64;
                } else {
                    statistics.publisher.audio.recv_bytes += data_size as u64;
                    statistics.publisher.recv_bytes += data_size as u64;
                    statistics.accumulate_recv(data_size as u64);
                }
            }
            StatisticData::Video {
                uuid,
                data_size,
                is_key_frame,
            } => {
                if let Some(uid) = uuid {
                    if let Some(subscriber) = statistics.subscribers.get_mut(&uid) {
                        subscriber.send_bytes += data_size as u64;
                        subscriber.send_bytes_for_bitrate += data_size as u64;
                    }
                    statistics.total_send_bytes += data_size as u64;
                } else {
                    statistics.publisher.video.recv_bytes += data_size as u64;
                    statistics.publisher.video.recv_frame_count += 1;
                    statistics.publisher.recv_bytes += data_size as u64;
                    statistics.accumulate_recv(data_size as u64);
                    match is_key_frame {
                        Some(true) => {
                            statistics.publisher.video.gop =
                                statistics.publisher.video.recv_frame_count_for_gop;
                            statistics.publisher.video.recv_frame_count_for_gop = 1;
                        }
                        Some(false) => {
                            statistics.publisher.video.recv_frame_count_for_gop += 1;
                        }
                        None => {}
                    }
                }
            }
            StatisticData::AudioCodec {
                sound_format,
                profile,
                samplerate,
                channels,
            } => {
                let audio = &mut statistics.publisher.audio;
                audio.sound_format = sound_format;
                audio.profile = profile;
                audio.samplerate = samplerate;
                audio.channels = channels;
            }
            StatisticData::VideoCodec {
                codec,
                profile,
                level,
                width,
                height,
            } => {
                let video = &mut statistics.publisher.video;
                video.codec = codec;
                video.profile = profile;
                video.level = level;
                video.width = width;
                video.height = height;
            }
            StatisticData::Publisher {
                id,
                remote_addr,
                start_time,
            } => {
                let publisher = &mut statistics.publisher;
                publisher.id = id;
                publisher.remote_address = remote_addr;
                publisher.start_time = start_time;
            }
            StatisticData::Subscriber {
                id,
                remote_addr,
                sub_type,
                start_time,
            } => {
                statistics.subscribers.insert(
                    id,
                    statistics::StatisticSubscriber {
                        id,
                        remote_address: remote_addr,
                        sub_type,
                        start_time,
                        send_bytes: 0,
                        send_bitrate_kbps: 0,
                        send_bytes_for_bitrate: 0,
                    },
                );
            }
        }
    }

    /// Returns true when the transceiver should exit.
    async fn on_event(&mut self, event: TransceiverEvent) -> bool {
        match event {
            TransceiverEvent::Subscribe {
                sender,
                info,
                result_sender,
            } => {
                if let Err(err) = self
                    .stream_handler
                    .send_prior_data(sender.clone(), info.sub_type)
                    .await
                {
                    tracing::error!("send_prior_data err: {err}");
                    return false;
                }

                let id = info.id;
                self.subscribers.insert(
                    id,
                    Subscriber {
                        sender,
                        queue: SubscriberQueue::new(self.subscriber_queue_duration_ms),
                        info,
                    },
                );

                if result_sender.send(self.statistic_data_sender.clone()).is_err() {
                    tracing::error!("subscribe result receiver dropped");
                }

                self.statistic_data.lock().await.subscriber_count += 1;
            }
            TransceiverEvent::UnSubscribe { info } => {
                self.subscribers.remove(&info.id);
                let mut statistics = self.statistic_data.lock().await;
                let statistics = &mut *statistics;
                statistics.subscribers.remove(&info.id);
                statistics.subscriber_count = statistics.subscriber_count.saturating_sub(1);
            }
            TransceiverEvent::UnPublish {} => {
                return true;
            }
            TransceiverEvent::KickClient { id } => {
                if self.subscribers.remove(&id).is_some() {
                    tracing::info!(client_id = %id, "kicked subscriber");
                    let mut statistics = self.statistic_data.lock().await;
                    let statistics = &mut *statistics;
                    statistics.subscribers.remove(&id);
                    statistics.subscriber_count = statistics.subscriber_count.saturating_sub(1);
                }
            }
            TransceiverEvent::Api { result_sender } => {
                let statistics = self.statistic_data.lock().await.clone();
                if result_sender.send(statistics).is_err() {
                    tracing::error!("api result receiver dropped");
                }
            }
        }
        false
    }

    pub async fn run(mut self) -> Result<(), StreamHubError> {
        let (exit_sender, exit_receiver) = broadcast::channel(1);
        let mut calculate = StatisticsCalculate::new(self.statistic_data.clone(), exit_receiver);
        tokio::spawn(async move { calculate.start().await });

        loop {
            tokio::select! {
                data = self.data_receiver.recv() => {
                    match data {
                        Some(frame) => self.fan_out(frame).await,
                        //publisher dropped its sender: the stream is over
                        None => break,
                    }
                }
                event = self.event_receiver.recv() => {
                    match event {
                        Some(event) => {
                            if self.on_event(event).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                data = self.statistic_data_receiver.recv() => {
                    if let Some(data) = data {
                        self.on_statistic_data(data).await;
                    }
                }
            }
        }

        let _ = exit_sender.send(());
        //dropping the subscribers closes their channels: that is the EOF
        //every play session observes
        Ok(())
    }
}

struct PublishedStream {
    event_sender: TransceiverEventSender,
    publisher_info: PublisherInfo,
}

pub struct StreamsHub {
    //stream identifier to per-stream transceiver handle
    streams: HashMap<StreamIdentifier, PublishedStream>,
    //events produced by protocol sessions, consumed here
    hub_event_receiver: StreamHubEventReceiver,
    hub_event_sender: StreamHubEventSender,
    //publish/unpublish notifications for segmenters and relays
    client_event_sender: BroadcastEventSender,
    //"latest wins": a new publisher displaces the current one
    latest_wins: bool,
    subscriber_queue_duration_ms: u64,
}

impl StreamsHub {
    #[must_use]
    pub fn new(latest_wins: bool, subscriber_queue_duration_ms: u64) -> Self {
        let (event_producer, event_consumer) =
            mpsc::channel(define::STREAM_HUB_EVENT_CHANNEL_CAPACITY);
        let (client_producer, _) = broadcast::channel(1000);

        Self {
            streams: HashMap::new(),
            hub_event_receiver: event_consumer,
            hub_event_sender: event_producer,
            client_event_sender: client_producer,
            latest_wins,
            subscriber_queue_duration_ms,
        }
    }

    pub fn get_hub_event_sender(&self) -> StreamHubEventSender {
        self.hub_event_sender.clone()
    }

    pub fn get_client_event_consumer(&self) -> define::BroadcastEventReceiver {
        self.client_event_sender.subscribe()
    }

    pub async fn run(&mut self) {
        self.event_loop().await;
        tracing::error!(
            "stream hub event loop exited: every event sender was dropped, \
             no further publish or play can be served"
        );
    }

    pub async fn event_loop(&mut self) {
        while let Some(event) = self.hub_event_receiver.recv().await {
            match event {
                StreamHubEvent::Publish {
                    identifier,
                    info,
                    result_sender,
                    stream_handler,
                } => {
                    let result = self
                        .publish(identifier.clone(), info, stream_handler)
                        .await;
                    if result_sender.send(result).is_err() {
                        tracing::error!("publish result receiver dropped: {identifier}");
                    }
                }
                StreamHubEvent::UnPublish { identifier, info } => {
                    if let Err(err) = self.unpublish(&identifier, &info) {
                        tracing::error!("unpublish err: {err} identifier: {identifier}");
                    }
                }
                StreamHubEvent::Subscribe {
                    identifier,
                    info,
                    result_sender,
                } => {
                    let result = self.subscribe(&identifier, info).await;
                    if result_sender.send(result).is_err() {
                        tracing::error!("subscribe result receiver dropped: {identifier}");
                    }
                }
                StreamHubEvent::UnSubscribe { identifier, info } => {
                    let _ = self.unsubscribe(&identifier, info);
                }
                StreamHubEvent::ApiStatistic {
                    identifier,
                    result_sender,
                } => {
                    let statistics = self.collect_statistics(identifier.as_ref()).await;
                    if result_sender.send(statistics).is_err() {
                        tracing::error!("statistic result receiver dropped");
                    }
                }
                StreamHubEvent::ApiKickClient { id } => {
                    self.kick_client(id).await;
                }
            }
        }
    }

    async fn collect_statistics(
        &mut self,
        identifier: Option<&StreamIdentifier>,
    ) -> Vec<StreamStatistics> {
        let mut results = Vec::new();
        for (stream_id, stream) in &self.streams {
            if identifier.is_some_and(|wanted| wanted != stream_id) {
                continue;
            }
            let (result_sender, result_receiver) = oneshot::channel();
            if stream
                .event_sender
                .send(TransceiverEvent::Api { result_sender })
                .await
                .is_ok()
            {
                if let Ok(statistics) = result_receiver.await {
                    results.push(statistics);
                }
            }
        }
        results
    }

    async fn kick_client(&mut self, id: Uuid) {
        //a publisher id ends the whole stream; a subscriber id only
        //detaches that one consumer
        let publisher_key = self
            .streams
            .iter()
            .find(|(_, stream)| stream.publisher_info.id == id)
            .map(|(key, _)| key.clone());

        if let Some(key) = publisher_key {
            tracing::info!(client_id = %id, identifier = %key, "kicking publisher");
            let info = self.streams[&key].publisher_info.clone();
            if let Err(err) = self.unpublish(&key, &info) {
                tracing::error!("kick publisher err: {err}");
            }
            return;
        }

        for stream in self.streams.values() {
            let _ = stream
                .event_sender
                .send(TransceiverEvent::KickClient { id })
                .await;
        }
    }

    //player subscribes to a stream
    pub async fn subscribe(
        &mut self,
        identifier: &StreamIdentifier,
        sub_info: SubscriberInfo,
    ) -> Result<(FrameDataReceiver, StatisticDataSender), StreamHubError> {
        let Some(stream) = self.streams.get_mut(identifier) else {
            return Err(StreamHubError {
                value: StreamHubErrorValue::NoAppOrStreamName,
            });
        };

        tracing::info!("subscribe: stream identifier: {identifier}");
        let (frame_sender, frame_receiver) = mpsc::channel(define::FRAME_DATA_CHANNEL_CAPACITY);
        let (result_sender, result_receiver) = oneshot::channel();
        let event = TransceiverEvent::Subscribe {
            sender: frame_sender,
            info: sub_info,
            result_sender,
        };
        stream
            .event_sender
            .send(event)
            .await
            .map_err(|_| StreamHubError {
                value: StreamHubErrorValue::SendError,
            })?;

        let statistic_sender = result_receiver.await?;
        Ok((frame_receiver, statistic_sender))
    }

    pub fn unsubscribe(
        &mut self,
        identifier: &StreamIdentifier,
        sub_info: SubscriberInfo,
    ) -> Result<(), StreamHubError> {
        match self.streams.get_mut(identifier) {
            Some(stream) => {
                tracing::info!("unsubscribe: {identifier}");
                stream
                    .event_sender
                    .try_send(TransceiverEvent::UnSubscribe { info: sub_info })
                    .map_err(|_| StreamHubError {
                        value: StreamHubErrorValue::SendError,
                    })?;
            }
            None => {
                return Err(StreamHubError {
                    value: StreamHubErrorValue::NoAppOrStreamName,
                });
            }
        }
        Ok(())
    }

    //publisher claims a stream
    pub async fn publish(
        &mut self,
        identifier: StreamIdentifier,
        info: PublisherInfo,
        handler: Arc<dyn TStreamHandler>,
    ) -> Result<(FrameDataSender, StatisticDataSender), StreamHubError> {
        if self.streams.contains_key(&identifier) {
            if !self.latest_wins {
                return Err(StreamHubError {
                    value: StreamHubErrorValue::Exists,
                });
            }
            tracing::warn!(
                "publish: {identifier} already active, latest-wins displaces the old publisher"
            );
            let old_info = self.streams[&identifier].publisher_info.clone();
            self.unpublish(&identifier, &old_info)?;
        }

        let (frame_sender, frame_receiver) = mpsc::channel(define::FRAME_DATA_CHANNEL_CAPACITY);
        let (event_sender, event_receiver) =
            mpsc::channel(define::TRANSCEIVER_EVENT_CHANNEL_CAPACITY);

        let transceiver = StreamDataTransceiver::new(
            frame_receiver,
            event_receiver,
            identifier.clone(),
            handler,
            self.subscriber_queue_duration_ms,
        );
        let statistic_sender = transceiver.get_statistics_data_sender();

        let identifier_clone = identifier.clone();
        tokio::spawn(async move {
            if let Err(err) = transceiver.run().await {
                tracing::error!("transceiver exited with error, identifier: {identifier_clone}, error: {err}");
            } else {
                tracing::info!("transceiver exited, identifier: {identifier_clone}");
            }
        });

        self.streams.insert(
            identifier.clone(),
            PublishedStream {
                event_sender,
                publisher_info: info,
            },
        );

        let client_event = BroadcastEvent::Publish {
            identifier: identifier.clone(),
        };
        if let Err(err) = self.client_event_sender.send(client_event) {
            tracing::debug!("broadcast publish event: no receivers ({err})");
        }

        Ok((frame_sender, statistic_sender))
    }

    fn unpublish(
        &mut self,
        identifier: &StreamIdentifier,
        info: &PublisherInfo,
    ) -> Result<(), StreamHubError> {
        match self.streams.get_mut(identifier) {
            Some(stream) => {
                //ignore a stale unpublish from a publisher that was
                //already displaced under latest-wins
                if stream.publisher_info.id != info.id {
                    tracing::info!(
                        "unpublish from stale publisher {} ignored for {identifier}",
                        info.id
                    );
                    return Ok(());
                }
                stream
                    .event_sender
                    .try_send(TransceiverEvent::UnPublish {})
                    .map_err(|_| StreamHubError {
                        value: StreamHubErrorValue::SendError,
                    })?;
                self.streams.remove(identifier);
                tracing::info!("unpublish remove stream, identifier: {identifier}");

                let client_event = BroadcastEvent::UnPublish {
                    identifier: identifier.clone(),
                };
                if let Err(err) = self.client_event_sender.send(client_event) {
                    tracing::debug!("broadcast unpublish event: no receivers ({err})");
                }
            }
            None => {
                return Err(StreamHubError {
                    value: StreamHubErrorValue::NoAppOrStreamName,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use define::{NotifyInfo, PublishType, SubscribeType};

    struct NoPriorData;

    #[async_trait]
    impl TStreamHandler for NoPriorData {
        async fn send_prior_data(
            &self,
            _sender: FrameDataSender,
            _sub_type: SubscribeType,
        ) -> Result<(), StreamHubError> {
            Ok(())
        }
    }

    fn publisher_info() -> PublisherInfo {
        PublisherInfo {
            id: Uuid::new(),
            pub_type: PublishType::RtmpPush,
            notify_info: NotifyInfo::default(),
        }
    }

    fn subscriber_info() -> SubscriberInfo {
        SubscriberInfo {
            id: Uuid::new(),
            sub_type: SubscribeType::RtmpPull,
            notify_info: NotifyInfo::default(),
        }
    }

    #[tokio::test]
    async fn test_at_most_one_publisher() {
        let mut hub = StreamsHub::new(false, 5000);
        let identifier = StreamIdentifier::with_default_vhost("live", "foo");

        let first = hub
            .publish(identifier.clone(), publisher_info(), Arc::new(NoPriorData))
            .await;
        assert!(first.is_ok());

        let second = hub
            .publish(identifier, publisher_info(), Arc::new(NoPriorData))
            .await;
        assert!(matches!(
            second.unwrap_err().value,
            StreamHubErrorValue::Exists
        ));
    }

    #[tokio::test]
    async fn test_latest_wins_displaces_publisher() {
        let mut hub = StreamsHub::new(true, 5000);
        let identifier = StreamIdentifier::with_default_vhost("live", "foo");

        hub.publish(identifier.clone(), publisher_info(), Arc::new(NoPriorData))
            .await
            .unwrap();
        let second = hub
            .publish(identifier, publisher_info(), Arc::new(NoPriorData))
            .await;
        assert!(second.is_ok());
        assert_eq!(hub.streams.len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_stream_not_found() {
        let mut hub = StreamsHub::new(false, 5000);
        let identifier = StreamIdentifier::with_default_vhost("live", "nope");
        let result = hub.subscribe(&identifier, subscriber_info()).await;
        assert!(matches!(
            result.unwrap_err().value,
            StreamHubErrorValue::NoAppOrStreamName
        ));
    }

    #[tokio::test]
    async fn test_frames_fan_out_in_order() {
        let mut hub = StreamsHub::new(false, 5000);
        let identifier = StreamIdentifier::with_default_vhost("live", "foo");

        let (frame_sender, _stat) = hub
            .publish(identifier.clone(), publisher_info(), Arc::new(NoPriorData))
            .await
            .unwrap();
        let (mut frame_receiver, _stat) =
            hub.subscribe(&identifier, subscriber_info()).await.unwrap();

        for i in 0..5_u64 {
            frame_sender
                .send(FrameData::Audio {
                    timestamp: i * 20,
                    data: Bytes::from_static(&[0xAF, 0x01, 0x00]),
                })
                .await
                .unwrap();
        }

        for i in 0..5_u64 {
            let frame = frame_receiver.recv().await.unwrap();
            assert_eq!(frame.timestamp(), i * 20);
        }
    }

    #[tokio::test]
    async fn test_unpublish_sends_eof_to_subscribers() {
        let mut hub = StreamsHub::new(false, 5000);
        let identifier = StreamIdentifier::with_default_vhost("live", "foo");
        let info = publisher_info();

        hub.publish(identifier.clone(), info.clone(), Arc::new(NoPriorData))
            .await
            .unwrap();
        let (mut frame_receiver, _stat) =
            hub.subscribe(&identifier, subscriber_info()).await.unwrap();

        hub.unpublish(&identifier, &info).unwrap();

        //channel closes once the transceiver exits
        assert!(frame_receiver.recv().await.is_none());
        assert!(hub.streams.is_empty());
    }
}
