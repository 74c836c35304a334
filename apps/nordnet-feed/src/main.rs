//! Nordnet Feed Binary
//!
//! Connects to the configured feeds, subscribes, and logs every message
//! until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin nordnet-feed
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `NORDNET_SESSION_KEY`: Session key from the REST login
//! - `NORDNET_PUBLIC_FEED_ADDR` and/or `NORDNET_PRIVATE_FEED_ADDR`: `host:port`
//!
//! ## Optional
//! - `NORDNET_SERVICE`: Service name (default: NEXTAPI)
//! - `NORDNET_FEED_TLS`: Use TLS (default: true)
//! - `NORDNET_FEED_CHANNEL_CAPACITY`: Channel capacity (default: 1024)
//! - `NORDNET_FEED_MAX_FRAME_BYTES`: Maximum frame size (default: 1048576)
//! - `NORDNET_SUBSCRIPTIONS`: e.g. `price:101:11,depth:101:11,news:2`
//! - `NORDNET_GET_STATE_DAYS`: Replay this many days of orders/trades on login
//! - `NORDNET_GET_STATE_DELETED_ORDERS`: Include deleted orders in the replay (default: false)
//! - `NORDNET_METRICS_PORT`: Prometheus port, 0 = no listener (default: 0)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: nordnet-feed)
//! - `RUST_LOG`: Log filter (default: nordnet_feed=info)

use std::fmt::Debug;

use anyhow::Context;
use nordnet_feed::infrastructure::telemetry;
use nordnet_feed::{
    FeedChannels, FeedClientConfig, FeedError, FeedMessage, PrivateFeed, PublicFeed, init_metrics,
};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Nordnet feed client");

    let config = FeedClientConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let metrics_handle = init_metrics(config.metrics_port).context("failed to install metrics")?;

    let shutdown_token = CancellationToken::new();
    let mut consumers = Vec::new();

    let private_feed = match config.private_feed() {
        Some(feed_config) => {
            let (feed, channels) = PrivateFeed::connect(&feed_config, &config.private_login())
                .await
                .context("failed to open private feed")?;
            consumers.push(spawn_consumer(channels, shutdown_token.clone()));
            Some(feed)
        }
        None => None,
    };

    let public_feed = match config.public_feed() {
        Some(feed_config) => {
            let (feed, channels) = PublicFeed::connect(&feed_config, &config.public_login())
                .await
                .context("failed to open public feed")?;
            consumers.push(spawn_consumer(channels, shutdown_token.clone()));

            for subscription in &config.subscriptions {
                feed.subscribe(subscription.clone())
                    .await
                    .with_context(|| format!("failed to subscribe to {subscription}"))?;
            }
            Some(feed)
        }
        None => None,
    };

    tracing::info!("Feed client ready");

    await_shutdown(&shutdown_token).await;

    if let Some(feed) = &private_feed
        && let Err(e) = feed.close().await
    {
        tracing::warn!(error = %e, "Error closing private feed");
    }
    if let Some(feed) = &public_feed
        && let Err(e) = feed.close().await
    {
        tracing::warn!(error = %e, "Error closing public feed");
    }

    for consumer in consumers {
        if let Err(e) = consumer.await {
            tracing::error!(error = %e, "Consumer task failed");
        }
    }

    if let Some(handle) = metrics_handle {
        tracing::debug!(metrics = %handle.render(), "Final metrics");
    }

    tracing::info!("Feed client stopped");
    Ok(())
}

/// Log every message and error of one feed until its channels close.
///
/// A terminal error triggers shutdown of the whole client.
fn spawn_consumer<M>(mut channels: FeedChannels<M>, shutdown: CancellationToken) -> JoinHandle<()>
where
    M: FeedMessage + Debug,
{
    tokio::spawn(async move {
        let mut errors_open = true;
        loop {
            tokio::select! {
                message = channels.messages.recv() => match message {
                    Some(message) => {
                        tracing::info!(
                            feed = M::FEED,
                            message_type = message.message_type(),
                            message = ?message,
                            "Message"
                        );
                    }
                    None => break,
                },
                error = channels.errors.recv(), if errors_open => match error {
                    Some(error) => report_error::<M>(&error, &shutdown),
                    None => errors_open = false,
                },
            }
        }

        // Pick up a terminal error sent just before the message channel closed.
        while let Ok(error) = channels.errors.try_recv() {
            report_error::<M>(&error, &shutdown);
        }
        tracing::info!(feed = M::FEED, "Feed stream ended");
    })
}

fn report_error<M: FeedMessage>(error: &FeedError, shutdown: &CancellationToken) {
    if error.is_terminal() {
        tracing::error!(feed = M::FEED, error = %error, "Feed connection lost");
        shutdown.cancel();
    } else {
        tracing::warn!(feed = M::FEED, error = %error, "Dropped malformed frame");
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedClientConfig) {
    tracing::info!(
        service = config.credentials.service(),
        public_feed = config.public_address.as_deref().unwrap_or("-"),
        private_feed = config.private_address.as_deref().unwrap_or("-"),
        mode = %config.connection.mode,
        subscriptions = config.subscriptions.len(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT) or a lost feed.
async fn await_shutdown(shutdown_token: &CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Feed lost, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
