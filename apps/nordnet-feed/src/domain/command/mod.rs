//! Feed Command Types
//!
//! Outbound control messages written to a feed connection.
//!
//! # Wire Format
//!
//! Every command is a single JSON object followed by a newline:
//!
//! ```json
//! {"cmd":"login","args":{"session_key":"ABC123","service":"NEXTAPI"}}
//! {"cmd":"subscribe","args":{"t":"price","i":"1869","m":30}}
//! {"cmd":"unsubscribe","args":{"t":"news","s":2}}
//! ```
//!
//! Subscription arguments are keyed by their `t` field. Indicator
//! subscriptions carry the market as a *name* (`"m":"SIX"`) while all
//! instrument subscriptions carry a numeric market id (`"m":30`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Command Envelope
// =============================================================================

/// A command sent to the feed server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "args", rename_all = "lowercase")]
pub enum Command {
    /// Authenticate the connection. Must be the first command written.
    Login(LoginArgs),
    /// Start receiving updates for a topic.
    Subscribe(Subscription),
    /// Stop receiving updates for a topic.
    Unsubscribe(Subscription),
}

impl Command {
    /// Command name as written in the `cmd` field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
        }
    }
}

// =============================================================================
// Login
// =============================================================================

/// Arguments of the `login` command.
///
/// The `Debug` implementation redacts the session key for safe logging.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginArgs {
    /// Session key returned by the REST login call.
    pub session_key: String,

    /// Service name the session was opened for (e.g. `NEXTAPI`).
    pub service: String,

    /// Request the current orders and trades right after login (private feed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_state: Option<GetState>,
}

impl LoginArgs {
    /// Create login arguments without a state request.
    #[must_use]
    pub fn new(session_key: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            session_key: session_key.into(),
            service: service.into(),
            get_state: None,
        }
    }

    /// Ask the server to replay the current orders and trades after login.
    #[must_use]
    pub fn with_state(mut self, state: GetState) -> Self {
        self.get_state = Some(state);
        self
    }
}

impl fmt::Debug for LoginArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginArgs")
            .field("session_key", &"[REDACTED]")
            .field("service", &self.service)
            .field("get_state", &self.get_state)
            .finish()
    }
}

/// Replay request attached to a private feed login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetState {
    /// Include deleted orders in the replay.
    pub deleted_orders: bool,

    /// Number of days of history to replay; server default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// Arguments of a `subscribe` / `unsubscribe` command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum Subscription {
    /// Price updates for an instrument.
    Price(InstrumentArgs),
    /// Public trades for an instrument.
    Trade(InstrumentArgs),
    /// Order book depth for an instrument.
    Depth(InstrumentArgs),
    /// Trading status changes for an instrument.
    TradingStatus(InstrumentArgs),
    /// Index/indicator values.
    Indicator(IndicatorArgs),
    /// News items from a source.
    News(NewsArgs),
}

/// Instrument identifier on a numeric market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentArgs {
    /// Instrument identifier.
    #[serde(rename = "i")]
    pub identifier: String,

    /// Market id.
    #[serde(rename = "m")]
    pub market_id: i64,
}

/// Indicator identifier on a named market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorArgs {
    /// Indicator identifier (e.g. `SIX-IDX-DJI`).
    #[serde(rename = "i")]
    pub identifier: String,

    /// Market name (e.g. `SIX`), not a numeric id.
    #[serde(rename = "m")]
    pub market: String,
}

/// News source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewsArgs {
    /// News source id.
    #[serde(rename = "s")]
    pub source_id: i64,

    /// Receive delayed news; omitted from the wire when false.
    #[serde(default, skip_serializing_if = "is_false")]
    pub delay: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

impl Subscription {
    /// Price updates for `identifier` on `market_id`.
    #[must_use]
    pub fn price(identifier: impl Into<String>, market_id: i64) -> Self {
        Self::Price(InstrumentArgs::new(identifier, market_id))
    }

    /// Public trades for `identifier` on `market_id`.
    #[must_use]
    pub fn trade(identifier: impl Into<String>, market_id: i64) -> Self {
        Self::Trade(InstrumentArgs::new(identifier, market_id))
    }

    /// Order book depth for `identifier` on `market_id`.
    #[must_use]
    pub fn depth(identifier: impl Into<String>, market_id: i64) -> Self {
        Self::Depth(InstrumentArgs::new(identifier, market_id))
    }

    /// Trading status for `identifier` on `market_id`.
    #[must_use]
    pub fn trading_status(identifier: impl Into<String>, market_id: i64) -> Self {
        Self::TradingStatus(InstrumentArgs::new(identifier, market_id))
    }

    /// Indicator `identifier` on the market named `market`.
    #[must_use]
    pub fn indicator(identifier: impl Into<String>, market: impl Into<String>) -> Self {
        Self::Indicator(IndicatorArgs {
            identifier: identifier.into(),
            market: market.into(),
        })
    }

    /// News from `source_id`.
    #[must_use]
    pub const fn news(source_id: i64, delay: bool) -> Self {
        Self::News(NewsArgs { source_id, delay })
    }

    /// Topic name as written in the `t` field.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::Price(_) => "price",
            Self::Trade(_) => "trade",
            Self::Depth(_) => "depth",
            Self::TradingStatus(_) => "trading_status",
            Self::Indicator(_) => "indicator",
            Self::News(_) => "news",
        }
    }
}

impl InstrumentArgs {
    /// Create instrument arguments.
    #[must_use]
    pub fn new(identifier: impl Into<String>, market_id: i64) -> Self {
        Self {
            identifier: identifier.into(),
            market_id,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Price(a) | Self::Trade(a) | Self::Depth(a) | Self::TradingStatus(a) => {
                write!(f, "{}:{}:{}", self.topic(), a.identifier, a.market_id)
            }
            Self::Indicator(a) => write!(f, "indicator:{}:{}", a.identifier, a.market),
            Self::News(a) if a.delay => write!(f, "news:{}:delay", a.source_id),
            Self::News(a) => write!(f, "news:{}", a.source_id),
        }
    }
}

/// Error parsing a textual subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionParseError {
    /// Topic is not one of the known subscription topics.
    #[error("unknown subscription topic: {0}")]
    UnknownTopic(String),

    /// Wrong number of `:`-separated parts for the topic.
    #[error("malformed subscription '{0}': expected topic:id:market or news:source[:delay]")]
    Malformed(String),

    /// A numeric part failed to parse.
    #[error("invalid number '{value}' in subscription '{input}'")]
    InvalidNumber {
        /// Full input.
        input: String,
        /// Offending part.
        value: String,
    },
}

impl FromStr for Subscription {
    type Err = SubscriptionParseError;

    /// Parse the `Display` form: `price:101:11`, `indicator:SIX-IDX-DJI:SIX`,
    /// `news:2` or `news:2:delay`.
    ///
    /// The market is the part after the last `:`, so identifiers may contain
    /// `:` themselves. Indicator market names may not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let malformed = || SubscriptionParseError::Malformed(input.to_string());
        let number = |value: &str| {
            value
                .parse::<i64>()
                .map_err(|_| SubscriptionParseError::InvalidNumber {
                    input: input.to_string(),
                    value: value.to_string(),
                })
        };

        let (topic, rest) = input.split_once(':').unwrap_or((input, ""));
        match topic {
            "price" | "trade" | "depth" | "trading_status" => {
                let (id, market) = rest.rsplit_once(':').ok_or_else(malformed)?;
                let args = InstrumentArgs::new(id, number(market)?);
                Ok(match topic {
                    "price" => Self::Price(args),
                    "trade" => Self::Trade(args),
                    "depth" => Self::Depth(args),
                    _ => Self::TradingStatus(args),
                })
            }
            "indicator" => {
                let (id, market) = rest.rsplit_once(':').ok_or_else(malformed)?;
                Ok(Self::indicator(id, market))
            }
            "news" => match rest.split(':').collect::<Vec<_>>().as_slice() {
                [source] => Ok(Self::news(number(*source)?, false)),
                [source, "delay"] => Ok(Self::news(number(*source)?, true)),
                _ => Err(malformed()),
            },
            _ => Err(SubscriptionParseError::UnknownTopic(topic.to_string())),
        }
    }
}
