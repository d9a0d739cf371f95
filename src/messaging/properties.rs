//! Scheduling property normalization.
//!
//! Task headers carry scheduling metadata as loose JSON. Transports fill
//! absent values with placeholders (`null`, `[null, null]` for the time-limit
//! pair) that must read as "unset" rather than as a value.

use crate::constants::headers;
use crate::models::{TaskOptions, TimeLimit};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// Extract the scheduling subset of `properties` as typed options.
///
/// Unknown keys are ignored. A value of the wrong shape is logged and treated
/// as unset so one bad property cannot reject the whole envelope.
pub fn normalize_properties(properties: &Map<String, Value>) -> TaskOptions {
    let timelimit = property::<TimeLimit>(properties, headers::TIMELIMIT).filter(|t| !t.is_unset());

    TaskOptions {
        queue: property(properties, headers::QUEUE),
        eta: timestamp(properties, headers::ETA),
        expires: timestamp(properties, headers::EXPIRES),
        countdown: property(properties, headers::COUNTDOWN),
        retries: property(properties, headers::RETRIES),
        timelimit,
        correlation_id: property(properties, headers::CORRELATION_ID),
        reply_to: property(properties, headers::REPLY_TO),
        parent_id: None,
        root_id: None,
    }
}

fn property<T: DeserializeOwned>(properties: &Map<String, Value>, key: &str) -> Option<T> {
    match properties.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(property = key, value = %value, error = %e, "Ignoring malformed header property");
                None
            }
        },
    }
}

/// RFC 3339 string or epoch seconds
fn timestamp(properties: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    match properties.get(key)? {
        Value::Number(seconds) => seconds
            .as_f64()
            .and_then(|s| DateTime::from_timestamp_millis((s * 1000.0) as i64)),
        _ => property::<DateTime<Utc>>(properties, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_placeholders_read_as_unset() {
        let options = normalize_properties(&props(json!({
            "eta": null,
            "expires": null,
            "timelimit": [null, null],
            "retries": 0,
            "lang": "py"
        })));
        assert_eq!(
            options,
            TaskOptions {
                retries: Some(0),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_partial_timelimit_is_kept() {
        let options = normalize_properties(&props(json!({"timelimit": [null, 120]})));
        assert_eq!(options.timelimit, Some(TimeLimit(None, Some(120.0))));
    }

    #[test]
    fn test_timestamps_accept_rfc3339_and_epoch() {
        let options = normalize_properties(&props(json!({
            "eta": "2026-01-02T03:04:05Z",
            "expires": 1767323045
        })));
        assert_eq!(options.eta.unwrap().to_rfc3339(), "2026-01-02T03:04:05+00:00");
        assert_eq!(options.expires.unwrap().timestamp(), 1_767_323_045);
    }

    #[test]
    fn test_malformed_value_is_ignored() {
        let options = normalize_properties(&props(json!({
            "retries": "three",
            "queue": "exports"
        })));
        assert_eq!(options.retries, None);
        assert_eq!(options.queue.as_deref(), Some("exports"));
    }
}
