//! Value types shared by private feed payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Converts a millisecond epoch timestamp into a UTC date-time.
///
/// Returns `None` for zero (field absent) and out-of-range values.
#[must_use]
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Monetary amount with its currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Amount {
    /// Amount value.
    pub value: Decimal,
    /// ISO currency code.
    pub currency: String,
}

/// Instrument identifier on a market (a "tradable").
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TradableId {
    /// Instrument identifier.
    pub identifier: String,
    /// Market id.
    pub market_id: i64,
}

/// Condition that activates a stop or trailing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationCondition {
    /// Activation type (e.g. `NONE`, `STOP_ACTPRICE_PERC`).
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Trailing value.
    pub trailing_value: f64,
    /// Trigger value.
    pub trigger_value: f64,
    /// Trigger condition (e.g. `<=`).
    pub trigger_condition: String,
}

/// How long an order remains valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validity {
    /// Validity type (e.g. `DAY`, `UNTIL_DATE`).
    #[serde(rename = "type")]
    pub validity_type: String,
    /// Expiry in epoch milliseconds.
    pub valid_until: i64,
}

impl Validity {
    /// Expiry as a date-time, if one is set.
    #[must_use]
    pub fn valid_until_time(&self) -> Option<DateTime<Utc>> {
        millis_to_datetime(self.valid_until)
    }
}
