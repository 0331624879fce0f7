//! Leg ingestion: payload decoding, wire shapes and validation.
//!
//! A payload is either a bare JSON array of legs or the acquisition API
//! envelope `{ "mode", "day", "date", "segments": [...] }`. Elements that do
//! not deserialize are counted and skipped, never fatal.

mod leg;
mod raw;
mod time;

pub use leg::{DropReason, Headcount, Leg, LegPassengers, StationId};
pub use raw::{RawEndpoint, RawEvents, RawHeadcount, RawLeg, RawValue};
pub use time::{MAX_EPOCH_MS, to_epoch_ms};

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

/// Decoded payload, before validation.
#[derive(Debug, Default)]
pub struct Payload {
    pub legs: Vec<RawLeg>,
    /// Array elements that were not leg objects.
    pub unparseable: usize,
    /// Service day announced by the envelope, if any.
    pub day: Option<NaiveDate>,
}

/// Decodes payload bytes into raw legs.
///
/// # Errors
///
/// Returns an error if the bytes are not JSON, or the JSON holds neither a
/// leg array nor an envelope with a `segments` array.
pub fn parse_payload(bytes: &[u8]) -> Result<Payload> {
    let json: Value = serde_json::from_slice(bytes)?;

    let (items, day) = match json {
        Value::Array(items) => (items, None),
        Value::Object(mut obj) => {
            let day = envelope_day(&obj);
            match obj.remove("segments") {
                Some(Value::Array(items)) => (items, day),
                _ => bail!("payload object has no `segments` array"),
            }
        }
        _ => bail!("payload must be a JSON array or an object with `segments`"),
    };

    let mut payload = Payload {
        legs: Vec::with_capacity(items.len()),
        unparseable: 0,
        day,
    };
    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawLeg>(item) {
            Ok(leg) => payload.legs.push(leg),
            Err(e) => {
                debug!(index = i, error = %e, "Skipping unparseable leg");
                payload.unparseable += 1;
            }
        }
    }

    Ok(payload)
}

fn envelope_day(obj: &serde_json::Map<String, Value>) -> Option<NaiveDate> {
    let from_date = obj
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
    from_date.or_else(|| {
        let day = match obj.get("day")? {
            Value::Number(n) => n.as_i64()?.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        NaiveDate::parse_from_str(&day, "%Y%m%d").ok()
    })
}
