use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rill::{
    config::Config,
    dash::{DashConfig, DashRemuxer},
    hls::{CleanupConfig, HlsConfig, HlsRemuxer, SegmentManager},
    http::HttpServer,
    logging,
    relay::{pull::PullManager, push::ForwardManager, RetryPolicy},
    rtmp::rtmp::RtmpServer,
    storage::{file::FileStorage, SegmentStorage},
    streamhub::StreamsHub,
};

/// Grace period between shutdown signal and socket teardown.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())
        .map_err(|err| anyhow::anyhow!("config load failed: {err}"))?;

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config validation error: {error}");
        }
        anyhow::bail!("configuration validation failed with {} error(s)", errors.len());
    }

    logging::init_logging(&config.logging)?;
    info!("rill starting");
    info!("rtmp address: {}", config.server.rtmp_address);
    info!("http address: {}", config.server.http_address);

    let shutdown_token = CancellationToken::new();

    //the hub: one per process, every protocol front-end talks to it
    let mut stream_hub = StreamsHub::new(
        config.stream_hub.latest_wins,
        config.stream_hub.queue_length_secs * 1000,
    );
    let hub_event_sender = stream_hub.get_hub_event_sender();

    let storage: Arc<dyn SegmentStorage> = Arc::new(FileStorage::new(&config.storage.path));

    if config.hls.enabled || config.dash.enabled {
        let retention = Duration::from_secs(
            config.hls.window_secs + config.hls.cleanup_delay_secs,
        );
        let segment_manager = Arc::new(SegmentManager::new(
            storage.clone(),
            CleanupConfig {
                interval: Duration::from_secs(10),
                retention,
            },
        ));
        segment_manager.start_cleanup_task(shutdown_token.clone());
    }

    if config.hls.enabled {
        let mut hls_remuxer = HlsRemuxer::new(
            stream_hub.get_client_event_consumer(),
            hub_event_sender.clone(),
            storage.clone(),
            HlsConfig {
                fragment_ms: (config.hls.fragment_secs * 1000) as i64,
                window_ms: (config.hls.window_secs * 1000) as i64,
                endlist_on_unpublish: config.hls.endlist_on_unpublish,
                discontinuity_on_av_change: config.hls.discontinuity_on_av_change,
                gap_threshold_ms: (config.hls.fragment_secs * 1000) as i64,
                cleanup_delay: Duration::from_secs(config.hls.cleanup_delay_secs),
            },
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(err) = hls_remuxer.run().await {
                error!("hls remuxer exited: {err}");
            }
        });
    }

    if config.dash.enabled {
        let mut dash_remuxer = DashRemuxer::new(
            stream_hub.get_client_event_consumer(),
            hub_event_sender.clone(),
            storage.clone(),
            DashConfig {
                fragment_ms: (config.dash.fragment_secs * 1000) as i64,
                window_size: config.dash.window_size,
                update_period_secs: config.dash.update_period_secs,
                cleanup_delay: Duration::from_secs(config.dash.cleanup_delay_secs),
            },
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(err) = dash_remuxer.run().await {
                error!("dash remuxer exited: {err}");
            }
        });
    }

    if config.forward.enabled {
        let mut forwarder = ForwardManager::new(
            stream_hub.get_client_event_consumer(),
            hub_event_sender.clone(),
            config.forward.destinations.clone(),
            RetryPolicy::default(),
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            forwarder.run().await;
        });
    }

    let pull_notifier = if config.pull.enabled {
        let (pull_sender, pull_receiver) = mpsc::unbounded_channel();
        let mut pull_manager = PullManager::new(
            pull_receiver,
            hub_event_sender.clone(),
            config.pull.upstream.clone(),
            config.stream_hub.effective_gop_num(),
            config.stream_hub.atc_threshold_secs * 1000,
            RetryPolicy::default(),
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            pull_manager.run().await;
        });
        Some(pull_sender)
    } else {
        None
    };

    let http_server = HttpServer::new(
        config.server.http_address.clone(),
        hub_event_sender.clone(),
        storage.clone(),
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(err) = http_server.run().await {
            error!("http server exited: {err}");
        }
    });

    let mut rtmp_server = RtmpServer::new(
        config.server.rtmp_address.clone(),
        hub_event_sender,
        config.stream_hub.effective_gop_num(),
        config.stream_hub.atc_threshold_secs * 1000,
        Duration::from_secs(config.server.rtmp_read_timeout_secs),
        config.server.max_connections,
        None,
        pull_notifier,
    );
    tokio::spawn(async move {
        if let Err(err) = rtmp_server.run().await {
            error!("rtmp server exited: {err}");
        }
    });

    tokio::spawn(async move {
        stream_hub.run().await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining");
    shutdown_token.cancel();
    tokio::time::sleep(SHUTDOWN_DRAIN).await;
    info!("rill stopped");

    Ok(())
}
