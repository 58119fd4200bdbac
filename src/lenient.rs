//! Serde helpers for flexible deserialization.
//!
//! Callers often send flags and numbers as strings (`"true"`, `"42"`). These
//! helpers accept both forms.

use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::str::FromStr;

/// Deserialize an optional scalar that can be the value itself, a string
/// containing it, or null. Empty strings count as absent.
pub fn option_scalar_or_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrScalar<T> {
        Scalar(T),
        Str(String),
        Null,
    }

    match Option::<StringOrScalar<T>>::deserialize(deserializer)? {
        Some(StringOrScalar::Scalar(v)) => Ok(Some(v)),
        Some(StringOrScalar::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(StringOrScalar::Str(s)) => s
            .trim()
            .to_ascii_lowercase()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(StringOrScalar::Null) | None => Ok(None),
    }
}

/// Deserialize a structured value that may also arrive JSON-encoded inside a
/// string (e.g. `"options": "{\"caseSensitive\": true}"`).
pub fn object_or_json_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(T::default()),
        Some(serde_json::Value::String(s)) => {
            serde_json::from_str(&s).map_err(serde::de::Error::custom)
        }
        Some(other) => serde_json::from_value(other).map_err(serde::de::Error::custom),
    }
}
