//! Wire shapes of a leg as the acquisition layer delivers it.
//!
//! Every field is optional and loosely typed; [`super::Leg::from_raw`] decides
//! what is usable. Any JSON object decodes; fields of the wrong shape are
//! simply absent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A JSON scalar that may carry an id, a count, a flag or a timestamp.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl RawValue {
    /// Identifier text; numbers are rendered without a trailing `.0`.
    pub fn as_id(&self) -> Option<String> {
        match self {
            RawValue::Int(n) => Some(n.to_string()),
            RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                Some(format!("{}", *f as i64))
            }
            RawValue::Float(f) if f.is_finite() => Some(f.to_string()),
            RawValue::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            _ => None,
        }
    }

    /// Integer value, truncating floats and parsing numeric text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Int(n) => Some(*n),
            RawValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            RawValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        }
    }

    /// Headcount; anything negative or unreadable counts as nobody.
    pub fn as_count(&self) -> u32 {
        self.as_i64()
            .map(|n| n.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(0)
    }

    /// Wheelchair bay occupancy, always 0 or 1.
    pub fn as_flag(&self) -> u8 {
        let on = match self {
            RawValue::Bool(b) => *b,
            RawValue::Int(n) => *n == 1,
            RawValue::Float(f) => *f == 1.0,
            RawValue::Text(s) => {
                let s = s.trim().to_ascii_lowercase();
                matches!(s.as_str(), "1" | "true" | "t" | "yes" | "y")
                    || s.parse::<f64>().map(|f| f == 1.0).unwrap_or(false)
            }
        };
        u8::from(on)
    }
}

type Object = Map<String, Value>;

/// First of `names` present in `object` that reads as a `T`. A value of the
/// wrong shape counts as absent, so one bad field never loses the whole leg.
fn pick<T: DeserializeOwned>(object: &Object, names: &[&str]) -> Option<T> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find_map(|value| T::deserialize(value).ok())
}

/// Deserializes any JSON object through `build`; only non-objects fail.
fn from_object<'de, D, T>(deserializer: D, build: fn(&Object) -> T) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let object = Object::deserialize(deserializer)?;
    Ok(build(&object))
}

/// One leg as received. Field names follow the acquisition API.
#[derive(Debug, Clone, Default)]
pub struct RawLeg {
    pub operation_id: Option<RawValue>,
    pub vehicle_id: Option<RawValue>,
    pub sequence: Option<RawValue>,

    pub origin_station_id: Option<RawValue>,
    pub dest_station_id: Option<RawValue>,

    pub origin_ms: Option<RawValue>,
    pub dest_ms: Option<RawValue>,
    pub origin_time: Option<RawValue>,
    pub dest_time: Option<RawValue>,

    pub polyline: Option<Vec<Vec<f64>>>,

    pub vehicle_type: Option<RawValue>,

    // Route id has no single agreed name upstream.
    pub route_id_upper: Option<RawValue>,
    pub route_id_camel: Option<RawValue>,
    pub route_id_snake: Option<RawValue>,
    pub route_code: Option<RawValue>,
    pub route: Option<RawValue>,

    pub events: Option<RawEvents>,
}

impl RawLeg {
    fn from_object(o: &Object) -> Self {
        Self {
            operation_id: pick(o, &["operationID", "operationId", "operation_id"]),
            vehicle_id: pick(o, &["vehicleID", "vehicleId", "vehicle_id"]),
            sequence: pick(o, &["routeInfo", "legSequence", "leg_sequence"]),
            origin_station_id: pick(o, &["originStationID", "originStationId", "origin_station_id"]),
            dest_station_id: pick(o, &["destStationID", "destStationId", "dest_station_id"]),
            origin_ms: pick(o, &["originMs"]),
            dest_ms: pick(o, &["destMs"]),
            origin_time: pick(o, &["originDeptTime"]),
            dest_time: pick(o, &["destDeptTime"]),
            polyline: pick(o, &["polyline"]),
            vehicle_type: pick(o, &["vehicleType", "vehicle_type"]),
            route_id_upper: pick(o, &["routeID"]),
            route_id_camel: pick(o, &["routeId"]),
            route_id_snake: pick(o, &["route_id"]),
            route_code: pick(o, &["routeCode"]),
            route: pick(o, &["route"]),
            events: pick(o, &["events"]),
        }
    }

    /// Route id candidates in priority order.
    pub fn route_candidates(&self) -> impl Iterator<Item = &RawValue> {
        [
            &self.route_id_upper,
            &self.route_id_camel,
            &self.route_id_snake,
            &self.route_code,
            &self.route,
        ]
        .into_iter()
        .flatten()
    }
}

impl<'de> Deserialize<'de> for RawLeg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        from_object(deserializer, Self::from_object)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawEvents {
    pub origin: Option<RawEndpoint>,
    pub dest: Option<RawEndpoint>,
}

impl<'de> Deserialize<'de> for RawEvents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        from_object(deserializer, |o| Self {
            origin: pick(o, &["origin"]),
            dest: pick(o, &["dest"]),
        })
    }
}

/// Passenger data at one end of a leg, in either the totals layout or the
/// board/alight layout.
#[derive(Debug, Clone, Default)]
pub struct RawEndpoint {
    pub pickup_total: Option<RawValue>,
    pub pickup_wheelchair: Option<RawValue>,
    pub dropoff_total: Option<RawValue>,
    pub dropoff_wheelchair: Option<RawValue>,
    pub board: Option<RawHeadcount>,
    pub alight: Option<RawHeadcount>,
}

impl<'de> Deserialize<'de> for RawEndpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        from_object(deserializer, |o| Self {
            pickup_total: pick(o, &["pickup_total"]),
            pickup_wheelchair: pick(o, &["pickup_wheelchair"]),
            dropoff_total: pick(o, &["dropoff_total"]),
            dropoff_wheelchair: pick(o, &["dropoff_wheelchair"]),
            board: pick(o, &["board"]),
            alight: pick(o, &["alight"]),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawHeadcount {
    pub passenger: Option<RawValue>,
    pub wheelchair: Option<RawValue>,
}

impl<'de> Deserialize<'de> for RawHeadcount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        from_object(deserializer, |o| Self {
            passenger: pick(o, &["passenger"]),
            wheelchair: pick(o, &["wheelchair"]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_id_from_number_and_text() {
        assert_eq!(RawValue::Int(42).as_id().as_deref(), Some("42"));
        assert_eq!(RawValue::Float(42.0).as_id().as_deref(), Some("42"));
        assert_eq!(RawValue::Text("  OP-7 ".into()).as_id().as_deref(), Some("OP-7"));
        assert_eq!(RawValue::Text("   ".into()).as_id(), None);
        assert_eq!(RawValue::Bool(true).as_id(), None);
    }

    #[test]
    fn test_as_i64_parses_text() {
        assert_eq!(RawValue::Text("12".into()).as_i64(), Some(12));
        assert_eq!(RawValue::Text("12.9".into()).as_i64(), Some(12));
        assert_eq!(RawValue::Text("abc".into()).as_i64(), None);
    }

    #[test]
    fn test_as_count_clamps_negative() {
        assert_eq!(RawValue::Int(-3).as_count(), 0);
        assert_eq!(RawValue::Text("4".into()).as_count(), 4);
    }

    #[test]
    fn test_as_flag_truthy_values() {
        for v in [
            RawValue::Int(1),
            RawValue::Bool(true),
            RawValue::Text("1".into()),
            RawValue::Text("TRUE".into()),
            RawValue::Text("y".into()),
        ] {
            assert_eq!(v.as_flag(), 1, "{v:?}");
        }
        for v in [
            RawValue::Int(0),
            RawValue::Int(2),
            RawValue::Bool(false),
            RawValue::Text("no".into()),
        ] {
            assert_eq!(v.as_flag(), 0, "{v:?}");
        }
    }

    #[test]
    fn test_deserialize_api_field_names() {
        let leg: RawLeg = serde_json::from_str(
            r#"{
                "operationID": "OP1",
                "vehicleID": 501,
                "routeInfo": "3",
                "originStationID": "S101",
                "destStationID": "S102",
                "originMs": 1000,
                "destMs": 61000,
                "polyline": [[127.0, 37.0], [127.01, 37.0]],
                "routeID": "R9",
                "route_id": "R10"
            }"#,
        )
        .unwrap();

        assert_eq!(leg.operation_id.unwrap().as_id().as_deref(), Some("OP1"));
        assert_eq!(leg.vehicle_id.unwrap().as_id().as_deref(), Some("501"));
        assert_eq!(leg.sequence.unwrap().as_i64(), Some(3));
        assert_eq!(leg.polyline.unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_shapes_read_as_absent() {
        let leg: RawLeg = serde_json::from_str(
            r#"{
                "operationID": {"id": 1},
                "operationId": "OP1",
                "routeInfo": [1],
                "legSequence": 2,
                "vehicleType": {},
                "polyline": "bad",
                "events": {"origin": {"board": 5, "pickup_total": "3"}, "dest": []}
            }"#,
        )
        .unwrap();

        assert_eq!(leg.operation_id.unwrap().as_id().as_deref(), Some("OP1"));
        assert_eq!(leg.sequence.unwrap().as_i64(), Some(2));
        assert!(leg.vehicle_type.is_none());
        assert!(leg.polyline.is_none());
        let events = leg.events.unwrap();
        let origin = events.origin.unwrap();
        assert!(origin.board.is_none());
        assert_eq!(origin.pickup_total.unwrap().as_count(), 3);
        assert!(events.dest.is_none());
    }

    #[test]
    fn test_only_objects_decode() {
        assert!(serde_json::from_str::<RawLeg>("17").is_err());
        assert!(serde_json::from_str::<RawLeg>(r#""leg""#).is_err());
        assert!(serde_json::from_str::<RawLeg>("{}").is_ok());
    }

    #[test]
    fn test_route_candidates_order() {
        let leg = RawLeg {
            route_code: Some(RawValue::Text("C".into())),
            route_id_upper: Some(RawValue::Text("A".into())),
            ..Default::default()
        };
        let ids: Vec<_> = leg.route_candidates().filter_map(RawValue::as_id).collect();
        assert_eq!(ids, vec!["A".to_string(), "C".to_string()]);
    }
}
