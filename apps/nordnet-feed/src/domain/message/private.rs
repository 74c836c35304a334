//! Private feed messages: order and trade events for the logged-in accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::common::{ActivationCondition, Amount, TradableId, Validity, millis_to_datetime};
use super::serde_utils::u64_from_str_or_num;
use super::{DecodeError, Empty, FeedMessage, MessageKind, RawEnvelope, serialize_envelope};

/// Order update.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "accno": 123, "order_id": 123,
///   "price": {"value": 1.1, "currency": "SEK"}, "volume": 10,
///   "tradable": {"identifier": "101", "market_id": 11},
///   "open_volume": 10, "traded_volume": 0, "side": "BUY",
///   "modified": 1700000000000, "reference": "ref",
///   "activation_condition": {"type": "NONE", "trailing_value": 0,
///                            "trigger_value": 0, "trigger_condition": ""},
///   "price_condition": "LIMIT", "volume_condition": "NORMAL",
///   "validity": {"type": "DAY", "valid_until": 0},
///   "action_state": "INS_PEND", "order_state": "LOCAL"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateOrder {
    /// Account number.
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub accno: u64,
    /// Order id.
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub order_id: u64,
    /// Limit price.
    pub price: Amount,
    /// Order volume.
    pub volume: f64,
    /// Instrument the order is for.
    pub tradable: TradableId,
    /// Volume still open.
    pub open_volume: f64,
    /// Volume already traded.
    pub traded_volume: f64,
    /// `BUY` or `SELL`.
    pub side: String,
    /// Last modification, epoch milliseconds.
    pub modified: i64,
    /// Free-text reference.
    pub reference: String,
    /// Stop/trailing activation.
    pub activation_condition: ActivationCondition,
    /// Price condition (e.g. `LIMIT`).
    pub price_condition: String,
    /// Volume condition (e.g. `NORMAL`).
    pub volume_condition: String,
    /// Validity.
    pub validity: Validity,
    /// Pending action state.
    pub action_state: String,
    /// Order state.
    pub order_state: String,
}

impl PrivateOrder {
    /// Last modification time.
    #[must_use]
    pub fn modified_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.modified)
    }
}

/// Trade (fill) on one of the account's orders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateTrade {
    /// Account number.
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub accno: u64,
    /// Order the trade belongs to.
    #[serde(deserialize_with = "u64_from_str_or_num")]
    pub order_id: u64,
    /// Trade id.
    pub trade_id: String,
    /// Traded instrument.
    pub tradable: TradableId,
    /// Trade price.
    pub price: Amount,
    /// Traded volume.
    pub volume: f64,
    /// `BUY` or `SELL`.
    pub side: String,
    /// Counterparty broker.
    pub counterparty: String,
    /// Trade time, epoch milliseconds.
    pub tradetime: i64,
}

impl PrivateTrade {
    /// Trade time.
    #[must_use]
    pub fn trade_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.tradetime)
    }
}

/// Message received on the private feed.
#[derive(Debug, Clone, PartialEq)]
pub enum PrivateMessage {
    /// Keep-alive.
    Heartbeat,
    /// Order update.
    Order(Box<PrivateOrder>),
    /// Trade on an own order.
    Trade(PrivateTrade),
    /// Discriminator this client does not know; payload discarded.
    Unknown(String),
}

impl FeedMessage for PrivateMessage {
    const FEED: &'static str = "private";

    fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let envelope = RawEnvelope::parse(frame)?;

        Ok(match MessageKind::parse(&envelope.message_type) {
            Some(MessageKind::Heartbeat) => Self::Heartbeat,
            Some(kind @ MessageKind::Order) => Self::Order(Box::new(envelope.payload(kind)?)),
            Some(kind @ MessageKind::Trade) => Self::Trade(envelope.payload(kind)?),
            // Public-only kinds are unknown on this feed.
            Some(_) | None => Self::Unknown(envelope.message_type),
        })
    }

    fn message_type(&self) -> &str {
        match self {
            Self::Heartbeat => MessageKind::Heartbeat.as_str(),
            Self::Order(_) => MessageKind::Order.as_str(),
            Self::Trade(_) => MessageKind::Trade.as_str(),
            Self::Unknown(message_type) => message_type,
        }
    }
}

impl Serialize for PrivateMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let message_type = self.message_type();
        match self {
            Self::Heartbeat | Self::Unknown(_) => {
                serialize_envelope(serializer, message_type, &Empty {})
            }
            Self::Order(order) => serialize_envelope(serializer, message_type, order.as_ref()),
            Self::Trade(trade) => serialize_envelope(serializer, message_type, trade),
        }
    }
}
