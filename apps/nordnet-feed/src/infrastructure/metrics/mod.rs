//! Prometheus Metrics Module
//!
//! Exposes feed metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Frames**: Messages received per feed and message type, decode errors
//! - **Commands**: Commands written per feed and command kind
//! - **Feeds**: Number of running dispatch loops, terminal connection errors
//! - **Latency**: Time from frame read to channel delivery
//!
//! # Integration
//!
//! With a non-zero port the exporter serves `/metrics` over HTTP. With port
//! `0` only the recorder is installed and metrics are rendered on demand.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::message::MessageKind;

// =============================================================================
// Initialization
// =============================================================================

/// Install the Prometheus recorder.
///
/// Returns the render handle when `port` is `0`. Otherwise an HTTP listener
/// is started on `0.0.0.0:port` and `None` is returned. Must be called from
/// within a tokio runtime when `port` is non-zero.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed or the
/// listener cannot be bound.
pub fn init_metrics(port: u16) -> Result<Option<PrometheusHandle>, BuildError> {
    let builder = PrometheusBuilder::new();

    let handle = if port == 0 {
        Some(builder.install_recorder()?)
    } else {
        builder
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
            .install()?;
        None
    };

    register_metrics();
    Ok(handle)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "nordnet_feed_frames_received_total",
        "Total frames decoded from the feeds"
    );
    describe_counter!(
        "nordnet_feed_decode_errors_total",
        "Total frames that failed to decode"
    );
    describe_counter!(
        "nordnet_feed_commands_sent_total",
        "Total commands written to the feeds"
    );
    describe_counter!(
        "nordnet_feed_connection_errors_total",
        "Total terminal connection errors by type"
    );
    describe_gauge!(
        "nordnet_feed_active_feeds",
        "Number of feeds with a running dispatch loop"
    );
    describe_histogram!(
        "nordnet_feed_dispatch_seconds",
        "Time from frame read to delivery on the message channel"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Label for a message type. Discriminators outside the known set share the
/// `unknown` label.
#[must_use]
pub fn message_type_label(message_type: &str) -> &'static str {
    MessageKind::parse(message_type).map_or("unknown", MessageKind::as_str)
}

/// Record a frame decoded from a feed.
pub fn record_frame_received(feed: &'static str, message_type: &str) {
    counter!(
        "nordnet_feed_frames_received_total",
        "feed" => feed,
        "message_type" => message_type_label(message_type)
    )
    .increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error(feed: &'static str) {
    counter!("nordnet_feed_decode_errors_total", "feed" => feed).increment(1);
}

/// Record a command written to a feed.
pub fn record_command_sent(feed: &'static str, command: &'static str) {
    counter!(
        "nordnet_feed_commands_sent_total",
        "feed" => feed,
        "command" => command
    )
    .increment(1);
}

/// Record a terminal connection error.
pub fn record_connection_error(feed: &'static str, error_type: &'static str) {
    counter!(
        "nordnet_feed_connection_errors_total",
        "feed" => feed,
        "error_type" => error_type
    )
    .increment(1);
}

/// A dispatch loop started.
pub fn feed_started(feed: &'static str) {
    gauge!("nordnet_feed_active_feeds", "feed" => feed).increment(1.0);
}

/// A dispatch loop exited.
pub fn feed_stopped(feed: &'static str) {
    gauge!("nordnet_feed_active_feeds", "feed" => feed).decrement(1.0);
}

/// Record time spent delivering one message.
pub fn record_dispatch_duration(feed: &'static str, duration: Duration) {
    histogram!("nordnet_feed_dispatch_seconds", "feed" => feed).record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("heartbeat", "heartbeat")]
    #[test_case("price", "price")]
    #[test_case("trading_status", "trading_status")]
    #[test_case("order", "order")]
    #[test_case("unknown_future_type", "unknown")]
    #[test_case("", "unknown")]
    fn message_type_labels(message_type: &str, expected: &str) {
        assert_eq!(message_type_label(message_type), expected);
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_frame_received("public", "price");
        record_decode_error("public");
        record_command_sent("public", "subscribe");
        record_connection_error("private", "closed");
        feed_started("private");
        feed_stopped("private");
        record_dispatch_duration("public", Duration::from_micros(5));
    }
}
