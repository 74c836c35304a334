//! Lenient field decoders for values the server encodes inconsistently.
//!
//! Some revisions of the feed send account numbers and order ids as JSON
//! strings, others as numbers. These helpers accept both without routing
//! integers through `f64`. Fields sent as `null` are treated like missing
//! ones and keep their zero value.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum U64OrString {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

/// Deserializes a `u64` from a JSON number or a numeric string.
///
/// An empty string decodes as `0`.
///
/// # Errors
///
/// Returns an error if the string is not a valid unsigned integer.
pub fn u64_from_str_or_num<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match U64OrString::deserialize(deserializer)? {
        U64OrString::Number(n) => Ok(n),
        U64OrString::Text(s) if s.trim().is_empty() => Ok(0),
        U64OrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Deserializes a `String` from any JSON scalar (string, number or bool).
///
/// # Errors
///
/// Returns an error if the value is an array, object or null.
pub fn string_from_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Bool(b) => b.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
    })
}

/// Removes `null` members from every object inside `value`.
///
/// Payload structs use `#[serde(default)]`, so a removed member decodes to
/// its zero value. A top-level `null` is left alone.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, member| !member.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
