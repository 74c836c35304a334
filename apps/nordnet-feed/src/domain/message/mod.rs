//! Feed Message Types
//!
//! Wire format types for messages pushed by the private and public feeds.
//!
//! # Envelope
//!
//! Every inbound frame is a JSON object with a string discriminator and a
//! payload whose shape depends on it:
//!
//! ```json
//! {"type": "heartbeat", "data": {}}
//! {"type": "price", "data": {"i": "101", "m": 11, "bid": 65.0}}
//! ```
//!
//! Decoding happens in two steps: the envelope is parsed with `data` left
//! as a raw value, then `type` is looked up in the [`MessageKind`] table and
//! `data` is re-decoded into the matching payload struct. Types missing from
//! the table decode to an `Unknown` message that keeps the discriminator.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

pub mod common;
pub mod private;
pub mod public;
pub mod serde_utils;

pub use common::{ActivationCondition, Amount, TradableId, Validity, millis_to_datetime};
pub use private::{PrivateMessage, PrivateOrder, PrivateTrade};
pub use public::{
    DepthLevel, PublicDepth, PublicIndicator, PublicMessage, PublicNews, PublicPrice,
    PublicTrade, PublicTradingStatus,
};

// =============================================================================
// Discriminators
// =============================================================================

/// Message discriminators known to either feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Keep-alive, no payload.
    Heartbeat,
    /// Private order update.
    Order,
    /// Private or public trade.
    Trade,
    /// Public price update.
    Price,
    /// Public order book depth.
    Depth,
    /// Public trading status change.
    TradingStatus,
    /// Public indicator update.
    Indicator,
    /// Public news item.
    News,
}

const KINDS: [(&str, MessageKind); 8] = [
    ("heartbeat", MessageKind::Heartbeat),
    ("order", MessageKind::Order),
    ("trade", MessageKind::Trade),
    ("price", MessageKind::Price),
    ("depth", MessageKind::Depth),
    ("trading_status", MessageKind::TradingStatus),
    ("indicator", MessageKind::Indicator),
    ("news", MessageKind::News),
];

impl MessageKind {
    /// Look up a wire discriminator. Returns `None` for unknown types.
    #[must_use]
    pub fn parse(message_type: &str) -> Option<Self> {
        KINDS
            .iter()
            .find(|(name, _)| *name == message_type)
            .map(|(_, kind)| *kind)
    }

    /// Wire discriminator for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Order => "order",
            Self::Trade => "trade",
            Self::Price => "price",
            Self::Depth => "depth",
            Self::TradingStatus => "trading_status",
            Self::Indicator => "indicator",
            Self::News => "news",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// A single frame could not be decoded into a message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a JSON object with a string `type`.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The payload of a recognized type failed to decode.
    #[error("malformed {message_type} payload: {source}")]
    Payload {
        /// Discriminator of the frame.
        message_type: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Envelope with the payload left undecoded.
#[derive(Debug, Deserialize)]
pub struct RawEnvelope {
    /// Discriminator.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Payload; `Null` when the frame carries no `data` field.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RawEnvelope {
    /// Parse the envelope of one frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Envelope`] if the frame is not valid JSON or
    /// has no string `type` field.
    pub fn parse(frame: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(frame).map_err(DecodeError::Envelope)
    }

    /// Decode `data` into the payload struct registered for `kind`.
    ///
    /// Members sent as `null` decode to their zero value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Payload`] if the payload does not match.
    pub fn payload<T: DeserializeOwned>(self, kind: MessageKind) -> Result<T, DecodeError> {
        let mut data = self.data;
        serde_utils::strip_nulls(&mut data);
        serde_json::from_value(data).map_err(|source| DecodeError::Payload {
            message_type: kind.as_str(),
            source,
        })
    }
}

/// A message type one feed can decode.
///
/// Implemented by [`PrivateMessage`] and [`PublicMessage`]; the feed
/// dispatch loop is generic over it.
pub trait FeedMessage: Serialize + fmt::Debug + Send + Sized + 'static {
    /// Feed name used in logs and metric labels.
    const FEED: &'static str;

    /// Decode one frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed frames. Unknown discriminators
    /// are not an error.
    fn decode(frame: &[u8]) -> Result<Self, DecodeError>;

    /// Wire discriminator of this message.
    fn message_type(&self) -> &str;
}

// =============================================================================
// Encoding
// =============================================================================

/// Payload of heartbeats and unknown message types. Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Write `{"type": message_type, "data": data}`.
pub(crate) fn serialize_envelope<S, T>(
    serializer: S,
    message_type: &str,
    data: &T,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize + ?Sized,
{
    let mut state = serializer.serialize_struct("Envelope", 2)?;
    state.serialize_field("type", message_type)?;
    state.serialize_field("data", data)?;
    state.end()
}
