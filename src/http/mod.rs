// HTTP front-end: live HTTP-FLV / HTTP-TS bodies wrapped around hub
// subscribers, plus playlist/segment/manifest serving from storage.

use {
    axum::{
        body::Body,
        extract::{Path, State},
        http::{header, HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::get,
        Router,
    },
    crate::httpflv::{HttpFlvSession, FLV_RESPONSE_CHANNEL_CAPACITY},
    crate::httpts::HttpTsSession,
    crate::storage::SegmentStorage,
    crate::streamhub::define::StreamHubEventSender,
    crate::streamhub::stream::StreamIdentifier,
    std::sync::Arc,
    tokio::sync::mpsc,
    tokio_stream::wrappers::ReceiverStream,
    tokio_util::sync::CancellationToken,
};

#[derive(Clone)]
struct HttpServerState {
    event_producer: StreamHubEventSender,
    storage: Arc<dyn SegmentStorage>,
}

pub struct HttpServer {
    address: String,
    event_producer: StreamHubEventSender,
    storage: Arc<dyn SegmentStorage>,
    shutdown_token: CancellationToken,
}

impl HttpServer {
    #[must_use]
    pub fn new(
        address: String,
        event_producer: StreamHubEventSender,
        storage: Arc<dyn SegmentStorage>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            address,
            event_producer,
            storage,
            shutdown_token,
        }
    }

    pub async fn run(self) -> Result<(), std::io::Error> {
        let state = HttpServerState {
            event_producer: self.event_producer,
            storage: self.storage,
        };

        let router = Router::new()
            .route("/{app}/{file}", get(stream_or_manifest))
            .route("/{app}/{stream}/{file}", get(media_file))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.address).await?;
        tracing::info!("http server listening on http://{}", self.address);

        let shutdown_token = self.shutdown_token;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
            })
            .await
    }
}

fn split_extension(file: &str) -> Option<(&str, &str)> {
    file.rsplit_once('.')
}

/// Live paths are not seekable; a Range request gets 406.
fn reject_range(headers: &HeaderMap) -> bool {
    headers.contains_key(header::RANGE)
}

async fn stream_or_manifest(
    State(state): State<HttpServerState>,
    Path((app, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some((stream_name, extension)) = split_extension(&file) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match extension {
        "flv" => {
            if reject_range(&headers) {
                return StatusCode::NOT_ACCEPTABLE.into_response();
            }
            serve_flv(state, &app, stream_name).await
        }
        "ts" => {
            if reject_range(&headers) {
                return StatusCode::NOT_ACCEPTABLE.into_response();
            }
            serve_ts(state, &app, stream_name).await
        }
        "m3u8" => {
            serve_storage_file(
                &state,
                &format!("{app}/{stream_name}.m3u8"),
                "application/vnd.apple.mpegurl",
            )
            .await
        }
        "mpd" => {
            serve_storage_file(
                &state,
                &format!("{app}/{stream_name}.mpd"),
                "application/dash+xml",
            )
            .await
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_flv(state: HttpServerState, app: &str, stream_name: &str) -> Response {
    let identifier = StreamIdentifier::with_default_vhost(app, stream_name);
    let (response_sender, response_receiver) = mpsc::channel(FLV_RESPONSE_CHANNEL_CAPACITY);

    let mut session =
        HttpFlvSession::new(identifier.clone(), state.event_producer, response_sender);
    let receiver = match session.subscribe().await {
        Ok(receiver) => receiver,
        Err(err) => {
            tracing::info!(identifier = %identifier, "http-flv rejected: {err}");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    tokio::spawn(async move {
        if let Err(err) = session.run(receiver).await {
            tracing::info!("http-flv session ended: {err}");
        }
    });

    live_response(response_receiver, "video/x-flv")
}

async fn serve_ts(state: HttpServerState, app: &str, stream_name: &str) -> Response {
    let identifier = StreamIdentifier::with_default_vhost(app, stream_name);
    let (response_sender, response_receiver) = mpsc::channel(FLV_RESPONSE_CHANNEL_CAPACITY);

    let mut session =
        match HttpTsSession::new(identifier.clone(), state.event_producer, response_sender) {
            Ok(session) => session,
            Err(err) => {
                tracing::error!("http-ts setup failed: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
    let receiver = match session.subscribe().await {
        Ok(receiver) => receiver,
        Err(err) => {
            tracing::info!(identifier = %identifier, "http-ts rejected: {err}");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    tokio::spawn(async move {
        if let Err(err) = session.run(receiver).await {
            tracing::info!("http-ts session ended: {err}");
        }
    });

    live_response(response_receiver, "video/MP2T")
}

fn live_response(
    receiver: mpsc::Receiver<Result<bytes::Bytes, std::io::Error>>,
    content_type: &str,
) -> Response {
    let body = Body::from_stream(ReceiverStream::new(receiver));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "close")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn media_file(
    State(state): State<HttpServerState>,
    Path((app, stream, file)): Path<(String, String, String)>,
) -> Response {
    let content_type = match split_extension(&file).map(|(_, extension)| extension) {
        Some("ts") => "video/MP2T",
        Some("mp4") => "video/mp4",
        Some("m4s") => "video/iso.segment",
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    serve_storage_file(&state, &format!("{app}/{stream}/{file}"), content_type).await
}

async fn serve_storage_file(
    state: &HttpServerState,
    key: &str,
    content_type: &str,
) -> Response {
    match state.storage.read(key).await {
        Ok(data) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from(data))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            tracing::error!(key, "storage read failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
