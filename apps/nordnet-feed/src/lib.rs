#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Nordnet Feed - NEXT API Real-time Feed Client
//!
//! A client for the private (account) and public (market data) push feeds:
//! a long-lived TLS connection carrying newline-delimited JSON, with login,
//! subscribe and unsubscribe commands going out and typed messages coming in.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Wire protocol types
//!   - `command`: Login and subscription commands
//!   - `message`: Private and public message unions
//!
//! - **Application**: Port definitions
//!   - `ports`: The `Connection` the feed runs over
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `nordnet`: Transport, framing and the feed dispatch loop
//!   - `config`: Environment configuration
//!   - `metrics`: Prometheus counters
//!   - `telemetry`: Logging and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//!             ┌──────────────┐  frames   ┌──────────────┐  M   ┌──────────┐
//! TLS stream ─┤ FrameReader  ├──────────►│ dispatch<M>  ├─────►│ messages │
//!             └──────────────┘           └──────┬───────┘      └──────────┘
//!                                               │ FeedError    ┌──────────┐
//!                                               └─────────────►│  errors  │
//!             ┌──────────────┐  Command                        └──────────┘
//! TLS stream ◄┤ FrameWriter  │◄── login / subscribe / unsubscribe
//!             └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use nordnet_feed::{FeedConfig, LoginArgs, PublicFeed, Subscription};
//!
//! # async fn run() -> Result<(), nordnet_feed::FeedError> {
//! let config = FeedConfig::new("pub.api.test.nordnet.se:443");
//! let (feed, mut channels) =
//!     PublicFeed::connect(&config, &LoginArgs::new("session-key", "NEXTAPI")).await?;
//! feed.subscribe(Subscription::price("101", 11)).await?;
//!
//! while let Some(message) = channels.messages.recv().await {
//!     println!("{message:?}");
//! }
//! feed.close().await
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Wire protocol types with no I/O.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Commands
pub use domain::command::{
    Command, GetState, IndicatorArgs, InstrumentArgs, LoginArgs, NewsArgs, Subscription,
    SubscriptionParseError,
};

// Messages
pub use domain::message::{
    ActivationCondition, Amount, DecodeError, DepthLevel, FeedMessage, MessageKind,
    PrivateMessage, PrivateOrder, PrivateTrade, PublicDepth, PublicIndicator, PublicMessage,
    PublicNews, PublicPrice, PublicTrade, PublicTradingStatus, TradableId, Validity,
};

// Ports
pub use application::ports::{BoxedConnection, Connection};

// Feed client
pub use infrastructure::nordnet::{
    CodecError, Feed, FeedChannels, FeedConfig, FeedError, FeedState, PrivateFeed, PublicFeed,
    TransportError, TransportMode,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, ConnectionSettings, FeedClientConfig, SessionCredentials,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
