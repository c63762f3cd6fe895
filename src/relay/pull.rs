// Edge pull: a play request for a stream nobody publishes locally
// triggers an ingest from the configured upstream origin. The puller
// becomes that stream's publisher until the upstream goes away.

use {
    super::errors::{RelayError, RelayErrorValue},
    super::RetryPolicy,
    crate::rtmp::session::client_session::ClientSession,
    crate::rtmp::session::define::ClientSessionType,
    crate::rtmp::utils::RtmpUrlParser,
    crate::streamhub::define::StreamHubEventSender,
    crate::streamhub::stream::StreamIdentifier,
    std::collections::HashSet,
    std::sync::Arc,
    std::time::Duration,
    tokio::net::TcpStream,
    tokio::sync::{mpsc, Mutex},
    tokio_util::sync::CancellationToken,
};

const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PullManager {
    pull_request_receiver: mpsc::UnboundedReceiver<StreamIdentifier>,
    event_producer: StreamHubEventSender,
    /// Upstream origin, `host:port`.
    upstream: String,
    gop_num: usize,
    atc_threshold_ms: u64,
    retry: RetryPolicy,
    cancel_token: CancellationToken,
    active: Arc<Mutex<HashSet<StreamIdentifier>>>,
}

impl PullManager {
    #[must_use]
    pub fn new(
        pull_request_receiver: mpsc::UnboundedReceiver<StreamIdentifier>,
        event_producer: StreamHubEventSender,
        upstream: String,
        gop_num: usize,
        atc_threshold_ms: u64,
        retry: RetryPolicy,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            pull_request_receiver,
            event_producer,
            upstream,
            gop_num,
            atc_threshold_ms,
            retry,
            cancel_token,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn run(&mut self) {
        tracing::info!(upstream = %self.upstream, "edge puller started");

        loop {
            let identifier = tokio::select! {
                _ = self.cancel_token.cancelled() => return,
                request = self.pull_request_receiver.recv() => {
                    match request {
                        Some(identifier) => identifier,
                        None => return,
                    }
                }
            };

            //one active pull per stream, however many players asked
            {
                let mut active = self.active.lock().await;
                if !active.insert(identifier.clone()) {
                    continue;
                }
            }

            let event_producer = self.event_producer.clone();
            let upstream = self.upstream.clone();
            let retry = self.retry.clone();
            let gop_num = self.gop_num;
            let atc_threshold_ms = self.atc_threshold_ms;
            let active = self.active.clone();
            let cancel_token = self.cancel_token.clone();

            tokio::spawn(async move {
                let result = tokio::select! {
                    _ = cancel_token.cancelled() => Ok(()),
                    result = pull_with_retry(
                        &identifier,
                        &upstream,
                        event_producer,
                        gop_num,
                        atc_threshold_ms,
                        &retry,
                    ) => result,
                };
                if let Err(err) = result {
                    tracing::error!(
                        identifier = %identifier,
                        upstream,
                        "edge pull gave up, source unavailable: {err}"
                    );
                }
                active.lock().await.remove(&identifier);
            });
        }
    }
}

async fn pull_with_retry(
    identifier: &StreamIdentifier,
    upstream: &str,
    event_producer: StreamHubEventSender,
    gop_num: usize,
    atc_threshold_ms: u64,
    retry: &RetryPolicy,
) -> Result<(), RelayError> {
    let url = format!(
        "rtmp://{upstream}/{}/{}",
        identifier.app_name, identifier.stream_name
    );

    let mut attempts = 0_usize;
    for delay in std::iter::once(Duration::ZERO).chain(retry.delays()) {
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        attempts += 1;

        match run_pull_once(
            identifier,
            &url,
            event_producer.clone(),
            gop_num,
            atc_threshold_ms,
        )
        .await
        {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::warn!(
                    identifier = %identifier,
                    attempt = attempts,
                    "edge pull failed: {err}, retrying"
                );
            }
        }
    }

    Err(RelayError {
        value: RelayErrorValue::Exhausted { attempts },
    })
}

async fn run_pull_once(
    identifier: &StreamIdentifier,
    url: &str,
    event_producer: StreamHubEventSender,
    gop_num: usize,
    atc_threshold_ms: u64,
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
        ClientSessionType::Pull,
        gop_num,
        atc_threshold_ms,
        CLIENT_READ_TIMEOUT,
    );
    session.run().await?;
    Ok(())
}
