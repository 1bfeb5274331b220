//! The unified response envelope.
//!
//! Every error rendered by the gateway, and every successful reply expected
//! from the auth service, has the same JSON shape:
//!
//! ```json
//! { "code": 200, "msg": "ok", "data": "42", "timestamp": 1718000000000 }
//! ```
//!
//! Business status travels in `code` only. Clients must branch on `code`,
//! not on the HTTP status, for business outcomes.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Envelope code for a successful business outcome.
pub const SUCCESS_CODE: i32 = 200;

/// Unified `{code, msg, data, timestamp}` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Business status code (authoritative for business outcomes)
    pub code: i32,
    /// Human-readable message (`null` and non-string values are tolerated)
    #[serde(rename = "msg", default, deserialize_with = "lenient_message")]
    pub message: String,
    /// Optional payload
    #[serde(default)]
    pub data: Option<T>,
    /// Creation time in epoch milliseconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
}

/// Read `msg` as text: `null` becomes empty, scalars are stringified.
fn lenient_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> Envelope<T> {
    /// Build an envelope stamped with the current time.
    pub fn new(code: i32, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self::new(SUCCESS_CODE, "ok", Some(data))
    }

    /// Whether the business code signals success.
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

impl Envelope<()> {
    /// Error envelope without payload.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self::new(code, message, None)
    }
}
