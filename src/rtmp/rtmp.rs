use {
    super::auth::AuthCallback,
    super::session::server_session::{PullEventSender, ServerSession, ServerSessionConfig},
    crate::streamhub::define::StreamHubEventSender,
    std::net::SocketAddr,
    std::sync::atomic::{AtomicUsize, Ordering},
    std::sync::Arc,
    std::time::Duration,
    tokio::io::Error,
    tokio::net::TcpListener,
};

pub struct RtmpServer {
    address: String,
    event_producer: StreamHubEventSender,
    gop_num: usize,
    atc_threshold_ms: u64,
    read_timeout: Duration,
    max_connections: usize,
    auth: Option<Arc<dyn AuthCallback>>,
    pull_notifier: Option<PullEventSender>,
}

impl RtmpServer {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: String,
        event_producer: StreamHubEventSender,
        gop_num: usize,
        atc_threshold_ms: u64,
        read_timeout: Duration,
        max_connections: usize,
        auth: Option<Arc<dyn AuthCallback>>,
        pull_notifier: Option<PullEventSender>,
    ) -> Self {
        Self {
            address,
            event_producer,
            gop_num,
            atc_threshold_ms,
            read_timeout,
            max_connections,
            auth,
            pull_notifier,
        }
    }

    pub async fn run(&mut self) -> Result<(), Error> {
        let socket_addr: SocketAddr = self.address.parse().map_err(|err| {
            Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid address '{}': {}", self.address, err),
            )
        })?;
        let listener = TcpListener::bind(&socket_addr).await?;
        let active_connections = Arc::new(AtomicUsize::new(0));

        tracing::info!(
            "rtmp server listening on tcp://{socket_addr} (max_connections: {})",
            self.max_connections
        );
        loop {
            let (tcp_stream, remote_addr) = listener.accept().await?;

            let current = active_connections.load(Ordering::Relaxed);
            if current >= self.max_connections {
                tracing::warn!(
                    "rtmp connection rejected from {remote_addr}: at capacity ({current}/{})",
                    self.max_connections
                );
                drop(tcp_stream);
                continue;
            }

            active_connections.fetch_add(1, Ordering::Relaxed);
            let connection_counter = active_connections.clone();

            let config = ServerSessionConfig {
                gop_num: self.gop_num,
                atc_threshold_ms: self.atc_threshold_ms,
                read_timeout: self.read_timeout,
                auth: self.auth.clone(),
                pull_notifier: self.pull_notifier.clone(),
            };
            let mut session =
                ServerSession::new(tcp_stream, self.event_producer.clone(), config);
            tokio::spawn(async move {
                if let Err(err) = session.run().await {
                    tracing::info!(
                        app_name = %session.app_name,
                        stream_name = %session.stream_name,
                        "session ended: {err}"
                    );
                }
                connection_counter.fetch_sub(1, Ordering::Relaxed);
            });
        }
    }
}
