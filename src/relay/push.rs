// Forward push: every local publish is mirrored to each configured
// peer over an outbound RTMP session, reconnecting with backoff while
// the local source stays live.

use {
    super::errors::{RelayError, RelayErrorValue},
    super::RetryPolicy,
    crate::rtmp::session::client_session::ClientSession,
    crate::rtmp::session::define::ClientSessionType,
    crate::rtmp::utils::RtmpUrlParser,
    crate::streamhub::define::{
        BroadcastEvent, BroadcastEventReceiver, StreamHubEventSender,
    },
    crate::streamhub::stream::StreamIdentifier,
    std::collections::HashMap,
    std::time::Duration,
    tokio::net::TcpStream,
    tokio_util::sync::CancellationToken,
};

const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ForwardManager {
    client_event_consumer: BroadcastEventReceiver,
    event_producer: StreamHubEventSender,
    /// Peer addresses, `host:port`.
    destinations: Vec<String>,
    retry: RetryPolicy,
    cancel_token: CancellationToken,
    /// One cancel token per (stream, destination) push task.
    active: HashMap<(StreamIdentifier, String), CancellationToken>,
}

impl ForwardManager {
    #[must_use]
    pub fn new(
        client_event_consumer: BroadcastEventReceiver,
        event_producer: StreamHubEventSender,
        destinations: Vec<String>,
        retry: RetryPolicy,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            client_event_consumer,
            event_producer,
            destinations,
            retry,
            cancel_token,
            active: HashMap::new(),
        }
    }

    pub async fn run(&mut self) {
        tracing::info!(destinations = ?self.destinations, "forwarder started");

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    for token in self.active.values() {
                        token.cancel();
                    }
                    return;
                }
                result = self.client_event_consumer.recv() => {
                    match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("forwarder lagged {n} hub events");
                            continue;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
            };

            match event {
                BroadcastEvent::Publish { identifier } => {
                    for destination in self.destinations.clone() {
                        self.start_push(identifier.clone(), destination);
                    }
                }
                BroadcastEvent::UnPublish { identifier } => {
                    self.active.retain(|(stream_id, _), token| {
                        if *stream_id == identifier {
                            token.cancel();
                            false
                        } else {
                            true
                        }
                    });
                }
            }
        }
    }

    fn start_push(&mut self, identifier: StreamIdentifier, destination: String) {
        let key = (identifier.clone(), destination.clone());
        if self.active.contains_key(&key) {
            return;
        }

        let token = self.cancel_token.child_token();
        self.active.insert(key, token.clone());

        let event_producer = self.event_producer.clone();
        let retry = self.retry.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => Ok(()),
                result = push_with_retry(&identifier, &destination, event_producer, &retry) => result,
            };
            if let Err(err) = result {
                tracing::error!(
                    identifier = %identifier,
                    destination,
                    "forward push gave up: {err}"
                );
            }
        });
    }
}

async fn push_with_retry(
    identifier: &StreamIdentifier,
    destination: &str,
    event_producer: StreamHubEventSender,
    retry: &RetryPolicy,
) -> Result<(), RelayError> {
    let url = format!(
        "rtmp://{destination}/{}/{}",
        identifier.app_name, identifier.stream_name
    );

    let mut attempts = 0_usize;
    for delay in std::iter::once(Duration::ZERO).chain(retry.delays()) {
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        attempts += 1;

        match run_push_once(identifier, &url, event_producer.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::warn!(
                    identifier = %identifier,
                    destination,
                    attempt = attempts,
                    "forward push failed: {err}, retrying"
                );
            }
        }
    }

    Err(RelayError {
        value: RelayErrorValue::Exhausted { attempts },
    })
}

async fn run_push_once(
    identifier: &StreamIdentifier,
    url: &str,
    event_producer: StreamHubEventSender,
) -> Result<(), RelayError> {
    let mut parser = RtmpUrlParser::new(url.to_string());
    parser.parse_url()?;

    let address = format!("{}:{}", parser.host, parser.port.unwrap_or(1935));
    let stream = TcpStream::connect(&address).await?;

    let mut session = ClientSession::new(
        stream,
        event_producer,
        parser,
        identifier.clone(),
        ClientSessionType::Push,
        0, //the push side never caches
        90_000,
        CLIENT_READ_TIMEOUT,
    );
    session.run().await?;
    Ok(())
}
