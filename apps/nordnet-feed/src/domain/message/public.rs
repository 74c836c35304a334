//! Public feed messages: market data for subscribed instruments.
//!
//! Instruments are addressed by `i` (identifier) and `m` (market id); the
//! Rust fields carry the long names. Prices and volumes are `f64` as sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::common::millis_to_datetime;
use super::serde_utils::string_from_scalar;
use super::{DecodeError, Empty, FeedMessage, MessageKind, RawEnvelope, serialize_envelope};

/// Price update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicPrice {
    /// Instrument identifier.
    #[serde(rename = "i")]
    pub identifier: String,
    /// Market id.
    #[serde(rename = "m")]
    pub market_id: i64,
    /// Time of the last trade, epoch milliseconds.
    pub trade_timestamp: i64,
    /// Time of this tick, epoch milliseconds.
    pub tick_timestamp: i64,
    /// Best bid.
    pub bid: f64,
    /// Volume at best bid.
    pub bid_volume: f64,
    /// Best ask.
    pub ask: f64,
    /// Volume at best ask.
    pub ask_volume: f64,
    /// Previous close.
    pub close: f64,
    /// Session high.
    pub high: f64,
    /// Last traded price.
    pub last: f64,
    /// Last traded volume.
    pub last_volume: f64,
    /// Session low.
    pub low: f64,
    /// Session open.
    pub open: f64,
    /// Turnover.
    pub turnover: f64,
    /// Turnover volume.
    pub turnover_volume: f64,
    /// Equilibrium price during auctions.
    pub ep: f64,
    /// Paired volume during auctions.
    pub paired: f64,
    /// Imbalance during auctions.
    pub imbalance: f64,
}

impl PublicPrice {
    /// Time of this tick.
    #[must_use]
    pub fn tick_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.tick_timestamp)
    }
}

/// Public trade print.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicTrade {
    /// Instrument identifier.
    #[serde(rename = "i")]
    pub identifier: String,
    /// Market id.
    #[serde(rename = "m")]
    pub market_id: i64,
    /// Trade time, epoch milliseconds.
    pub trade_timestamp: i64,
    /// Trade price.
    pub price: f64,
    /// Trade volume.
    pub volume: f64,
    /// Buying broker.
    pub broker_buying: String,
    /// Selling broker.
    pub broker_selling: String,
    /// Trade id.
    pub trade_id: String,
    /// Trade type.
    pub trade_type: String,
}

impl PublicTrade {
    /// Trade time.
    #[must_use]
    pub fn trade_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.trade_timestamp)
    }
}

/// One level of the order book.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthLevel {
    /// Bid price.
    pub bid: f64,
    /// Bid volume.
    pub bid_volume: f64,
    /// Ask price.
    pub ask: f64,
    /// Ask volume.
    pub ask_volume: f64,
}

/// Five-level order book snapshot.
///
/// The wire format flattens the levels into numbered keys (`bid1`,
/// `bid_volume1`, ..., `ask_volume5`); use [`PublicDepth::levels`] for an
/// indexed view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct PublicDepth {
    /// Instrument identifier.
    #[serde(rename = "i")]
    pub identifier: String,
    /// Market id.
    #[serde(rename = "m")]
    pub market_id: i64,
    /// Time of this tick, epoch milliseconds.
    pub tick_timestamp: i64,
    pub bid1: f64,
    pub bid_volume1: f64,
    pub ask1: f64,
    pub ask_volume1: f64,
    pub bid2: f64,
    pub bid_volume2: f64,
    pub ask2: f64,
    pub ask_volume2: f64,
    pub bid3: f64,
    pub bid_volume3: f64,
    pub ask3: f64,
    pub ask_volume3: f64,
    pub bid4: f64,
    pub bid_volume4: f64,
    pub ask4: f64,
    pub ask_volume4: f64,
    pub bid5: f64,
    pub bid_volume5: f64,
    pub ask5: f64,
    pub ask_volume5: f64,
}

impl PublicDepth {
    /// Levels 1 through 5, best first.
    #[must_use]
    pub const fn levels(&self) -> [DepthLevel; 5] {
        [
            DepthLevel {
                bid: self.bid1,
                bid_volume: self.bid_volume1,
                ask: self.ask1,
                ask_volume: self.ask_volume1,
            },
            DepthLevel {
                bid: self.bid2,
                bid_volume: self.bid_volume2,
                ask: self.ask2,
                ask_volume: self.ask_volume2,
            },
            DepthLevel {
                bid: self.bid3,
                bid_volume: self.bid_volume3,
                ask: self.ask3,
                ask_volume: self.ask_volume3,
            },
            DepthLevel {
                bid: self.bid4,
                bid_volume: self.bid_volume4,
                ask: self.ask4,
                ask_volume: self.ask_volume4,
            },
            DepthLevel {
                bid: self.bid5,
                bid_volume: self.bid_volume5,
                ask: self.ask5,
                ask_volume: self.ask_volume5,
            },
        ]
    }
}

/// Trading status change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicTradingStatus {
    /// Instrument identifier.
    #[serde(rename = "i")]
    pub identifier: String,
    /// Market id.
    #[serde(rename = "m")]
    pub market_id: i64,
    /// Time of this tick, epoch milliseconds.
    pub tick_timestamp: i64,
    /// Normalized status.
    pub status: String,
    /// Status as reported by the exchange.
    pub source_status: String,
    /// Halt flag. Sent as a string or a bool depending on the market.
    #[serde(deserialize_with = "string_from_scalar")]
    pub halted: String,
}

/// Indicator (index) update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicIndicator {
    /// Indicator identifier.
    #[serde(rename = "i")]
    pub identifier: String,
    /// Market name.
    #[serde(rename = "m", deserialize_with = "string_from_scalar")]
    pub market: String,
    /// Time of this tick, epoch milliseconds.
    pub tick_timestamp: i64,
    /// Session high.
    pub high: f64,
    /// Session low.
    pub low: f64,
    /// Last value.
    pub last: f64,
    /// Previous close.
    pub close: f64,
}

/// News item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicNews {
    /// News item id.
    #[serde(rename = "itemid", deserialize_with = "string_from_scalar")]
    pub item_id: String,
    /// Language code.
    pub lang: String,
    /// Publication time as sent by the source.
    pub datetime: String,
    /// News source id.
    #[serde(rename = "sourceid", deserialize_with = "string_from_scalar")]
    pub source_id: String,
    /// Headline.
    pub headline: String,
    /// Instruments the item relates to.
    pub instruments: Vec<String>,
}

/// Message received on the public feed.
#[derive(Debug, Clone, PartialEq)]
pub enum PublicMessage {
    /// Keep-alive.
    Heartbeat,
    /// Price update.
    Price(PublicPrice),
    /// Trade print.
    Trade(PublicTrade),
    /// Order book depth.
    Depth(Box<PublicDepth>),
    /// Trading status change.
    TradingStatus(PublicTradingStatus),
    /// Indicator update.
    Indicator(PublicIndicator),
    /// News item.
    News(PublicNews),
    /// Discriminator this client does not know; payload discarded.
    Unknown(String),
}

impl FeedMessage for PublicMessage {
    const FEED: &'static str = "public";

    fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let envelope = RawEnvelope::parse(frame)?;

        let Some(kind) = MessageKind::parse(&envelope.message_type) else {
            return Ok(Self::Unknown(envelope.message_type));
        };

        Ok(match kind {
            MessageKind::Heartbeat => Self::Heartbeat,
            MessageKind::Price => Self::Price(envelope.payload(kind)?),
            MessageKind::Trade => Self::Trade(envelope.payload(kind)?),
            MessageKind::Depth => Self::Depth(Box::new(envelope.payload(kind)?)),
            MessageKind::TradingStatus => Self::TradingStatus(envelope.payload(kind)?),
            MessageKind::Indicator => Self::Indicator(envelope.payload(kind)?),
            MessageKind::News => Self::News(envelope.payload(kind)?),
            MessageKind::Order => Self::Unknown(envelope.message_type),
        })
    }

    fn message_type(&self) -> &str {
        match self {
            Self::Heartbeat => MessageKind::Heartbeat.as_str(),
            Self::Price(_) => MessageKind::Price.as_str(),
            Self::Trade(_) => MessageKind::Trade.as_str(),
            Self::Depth(_) => MessageKind::Depth.as_str(),
            Self::TradingStatus(_) => MessageKind::TradingStatus.as_str(),
            Self::Indicator(_) => MessageKind::Indicator.as_str(),
            Self::News(_) => MessageKind::News.as_str(),
            Self::Unknown(message_type) => message_type,
        }
    }
}

impl Serialize for PublicMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let message_type = self.message_type();
        match self {
            Self::Heartbeat | Self::Unknown(_) => {
                serialize_envelope(serializer, message_type, &Empty {})
            }
            Self::Price(price) => serialize_envelope(serializer, message_type, price),
            Self::Trade(trade) => serialize_envelope(serializer, message_type, trade),
            Self::Depth(depth) => serialize_envelope(serializer, message_type, depth.as_ref()),
            Self::TradingStatus(status) => serialize_envelope(serializer, message_type, status),
            Self::Indicator(indicator) => serialize_envelope(serializer, message_type, indicator),
            Self::News(news) => serialize_envelope(serializer, message_type, news),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> PublicMessage {
        PublicMessage::decode(json.as_bytes()).unwrap()
    }

    #[test]
    fn decode_heartbeat() {
        assert_eq!(
            decode(r#"{"type":"heartbeat","data":{}}"#),
            PublicMessage::Heartbeat
        );
    }

    #[test]
    fn decode_price() {
        let msg = decode(
            r#"{
                "type": "price",
                "data": {
                    "i": "101", "m": 11,
                    "trade_timestamp": 1700000000000, "tick_timestamp": 1700000000500,
                    "bid": 65.0, "bid_volume": 100, "ask": 65.5, "ask_volume": 200,
                    "close": 64.0, "high": 66.0, "last": 65.25, "last_volume": 10,
                    "low": 63.5, "open": 64.5, "turnover": 1000000.5,
                    "turnover_volume": 15000, "ep": 1.1, "paired": 2.2, "imbalance": 3.3
                }
            }"#,
        );

        let expected = PublicPrice {
            identifier: "101".to_string(),
            market_id: 11,
            trade_timestamp: 1_700_000_000_000,
            tick_timestamp: 1_700_000_000_500,
            bid: 65.0,
            bid_volume: 100.0,
            ask: 65.5,
            ask_volume: 200.0,
            close: 64.0,
            high: 66.0,
            last: 65.25,
            last_volume: 10.0,
            low: 63.5,
            open: 64.5,
            turnover: 1_000_000.5,
            turnover_volume: 15_000.0,
            ep: 1.1,
            paired: 2.2,
            imbalance: 3.3,
        };
        assert_eq!(msg, PublicMessage::Price(expected));
        assert_eq!(msg.message_type(), "price");
    }

    #[test]
    fn decode_trade() {
        let msg = decode(
            r#"{"type":"trade","data":{
                "i":"101","m":11,"trade_timestamp":1700000000000,
                "price":65.25,"volume":300,
                "broker_buying":"AVA","broker_selling":"NON",
                "trade_id":"X1","trade_type":"AUTO"
            }}"#,
        );
        let PublicMessage::Trade(trade) = &msg else {
            panic!("expected trade, got {msg:?}");
        };
        assert_eq!(trade.identifier, "101");
        assert!((trade.price - 65.25).abs() < f64::EPSILON);
        assert_eq!(trade.broker_buying, "AVA");
        assert_eq!(trade.trade_type, "AUTO");
        assert!(trade.trade_time().is_some());
    }

    #[test]
    fn decode_depth_keeps_levels_apart() {
        let mut fields = vec![r#""i":"101","m":11,"tick_timestamp":5"#.to_string()];
        for n in 1..=5 {
            let base = f64::from(n) * 10.0;
            fields.push(format!(
                r#""bid{n}":{},"bid_volume{n}":{},"ask{n}":{},"ask_volume{n}":{}"#,
                base + 1.0,
                base + 2.0,
                base + 3.0,
                base + 4.0
            ));
        }
        let json = format!(r#"{{"type":"depth","data":{{{}}}}}"#, fields.join(","));

        let PublicMessage::Depth(depth) = decode(&json) else {
            panic!("expected depth");
        };
        for (index, level) in depth.levels().iter().enumerate() {
            let base = f64::from(u8::try_from(index + 1).unwrap()) * 10.0;
            assert_eq!(
                *level,
                DepthLevel {
                    bid: base + 1.0,
                    bid_volume: base + 2.0,
                    ask: base + 3.0,
                    ask_volume: base + 4.0,
                },
                "level {}",
                index + 1
            );
        }
    }

    #[test]
    fn decode_trading_status() {
        let msg = decode(
            r#"{"type":"trading_status","data":{
                "i":"101","m":11,"tick_timestamp":1,
                "status":"C","source_status":"CONT","halted":"N"
            }}"#,
        );
        assert_eq!(
            msg,
            PublicMessage::TradingStatus(PublicTradingStatus {
                identifier: "101".to_string(),
                market_id: 11,
                tick_timestamp: 1,
                status: "C".to_string(),
                source_status: "CONT".to_string(),
                halted: "N".to_string(),
            })
        );
    }

    #[test]
    fn trading_status_halted_accepts_bool() {
        let PublicMessage::TradingStatus(status) =
            decode(r#"{"type":"trading_status","data":{"halted":true}}"#)
        else {
            panic!("expected trading status");
        };
        assert_eq!(status.halted, "true");
    }

    #[test]
    fn decode_indicator_market_name() {
        let msg = decode(
            r#"{"type":"indicator","data":{
                "i":"OMXS30","m":"SSE","tick_timestamp":1,
                "high":2.0,"low":1.0,"last":1.5,"close":1.25
            }}"#,
        );
        let PublicMessage::Indicator(indicator) = msg else {
            panic!("expected indicator");
        };
        assert_eq!(indicator.identifier, "OMXS30");
        assert_eq!(indicator.market, "SSE");
        assert!((indicator.close - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn decode_news_with_numeric_ids() {
        let msg = decode(
            r#"{"type":"news","data":{
                "itemid":12345,"lang":"sv","datetime":"2024-01-02 09:00:00",
                "sourceid":2,"headline":"Q4 report","instruments":["101","102"]
            }}"#,
        );
        assert_eq!(
            msg,
            PublicMessage::News(PublicNews {
                item_id: "12345".to_string(),
                lang: "sv".to_string(),
                datetime: "2024-01-02 09:00:00".to_string(),
                source_id: "2".to_string(),
                headline: "Q4 report".to_string(),
                instruments: vec!["101".to_string(), "102".to_string()],
            })
        );
    }

    #[test]
    fn null_fields_decode_to_defaults() {
        let msg = decode(
            r#"{"type":"news","data":{
                "itemid":1,"lang":null,"sourceid":null,"headline":"x","instruments":null
            }}"#,
        );
        let PublicMessage::News(news) = msg else {
            panic!("expected news, got {msg:?}");
        };
        assert_eq!(news.item_id, "1");
        assert_eq!(news.lang, "");
        assert_eq!(news.source_id, "");
        assert!(news.instruments.is_empty());

        let msg = decode(r#"{"type":"price","data":{"i":"101","m":11,"bid":null,"ask":65.5}}"#);
        let PublicMessage::Price(price) = msg else {
            panic!("expected price, got {msg:?}");
        };
        assert_eq!(price.bid, 0.0);
        assert_eq!(price.ask, 65.5);
    }

    #[test]
    fn unknown_future_type() {
        let msg = decode(r#"{"type":"unknown_future_type","data":{"anything":[1,2,3]}}"#);
        assert_eq!(msg, PublicMessage::Unknown("unknown_future_type".to_string()));
        assert_eq!(msg.message_type(), "unknown_future_type");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"type":"unknown_future_type","data":{}}"#
        );
    }

    #[test]
    fn private_order_is_unknown_here() {
        assert_eq!(
            decode(r#"{"type":"order","data":{}}"#),
            PublicMessage::Unknown("order".to_string())
        );
    }

    #[test]
    fn null_payload_for_known_type_is_error() {
        let err = PublicMessage::decode(br#"{"type":"price","data":null}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Payload {
                message_type: "price",
                ..
            }
        ));
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let messages = [
            PublicMessage::Heartbeat,
            PublicMessage::Price(PublicPrice {
                identifier: "101".to_string(),
                market_id: 11,
                bid: 65.0,
                ask: 65.5,
                ..PublicPrice::default()
            }),
            PublicMessage::Trade(PublicTrade {
                identifier: "101".to_string(),
                market_id: 11,
                price: 65.25,
                volume: 10.0,
                trade_id: "X1".to_string(),
                ..PublicTrade::default()
            }),
            PublicMessage::Depth(Box::new(PublicDepth {
                identifier: "101".to_string(),
                market_id: 11,
                bid1: 1.0,
                ask5: 5.0,
                ..PublicDepth::default()
            })),
            PublicMessage::TradingStatus(PublicTradingStatus {
                status: "C".to_string(),
                halted: "N".to_string(),
                ..PublicTradingStatus::default()
            }),
            PublicMessage::Indicator(PublicIndicator {
                identifier: "OMXS30".to_string(),
                market: "SSE".to_string(),
                last: 2000.5,
                ..PublicIndicator::default()
            }),
            PublicMessage::News(PublicNews {
                item_id: "1".to_string(),
                headline: "h".to_string(),
                instruments: vec!["101".to_string()],
                ..PublicNews::default()
            }),
        ];

        for msg in messages {
            let bytes = serde_json::to_vec(&msg).unwrap();
            assert_eq!(PublicMessage::decode(&bytes).unwrap(), msg);
        }
    }
}
