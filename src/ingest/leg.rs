use std::fmt;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use super::raw::{RawEndpoint, RawEvents, RawHeadcount, RawLeg, RawValue};
use super::time::{MAX_EPOCH_MS, to_epoch_ms};
use crate::geometry::Coord;

/// A station identifier in canonical form.
///
/// Upper-cased, with a single leading non-numeric prefix character removed,
/// so `"s101"`, `"S101"` and `"101"` all name the same station.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(String);

impl StationId {
    pub fn normalize(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_uppercase();
        let mut chars = upper.chars();
        let stripped = match chars.next() {
            Some(c) if !c.is_ascii_digit() && !chars.as_str().is_empty() => chars.as_str(),
            _ => upper.as_str(),
        };
        (!stripped.is_empty()).then(|| Self(stripped.to_string()))
    }

    fn from_raw(value: Option<&RawValue>) -> Option<Self> {
        value.and_then(RawValue::as_id).and_then(|s| Self::normalize(&s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Passengers crossing a vehicle door at one stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Headcount {
    pub total: u32,
    /// Single wheelchair bay, so 0 or 1.
    pub wheelchair: u8,
}

impl Headcount {
    fn new(total: Option<&RawValue>, wheelchair: Option<&RawValue>) -> Self {
        Self {
            total: total.map(RawValue::as_count).unwrap_or(0),
            wheelchair: wheelchair.map(RawValue::as_flag).unwrap_or(0),
        }
    }

    fn from_raw(raw: Option<&RawHeadcount>) -> Self {
        match raw {
            Some(h) => Self::new(h.passenger.as_ref(), h.wheelchair.as_ref()),
            None => Self::default(),
        }
    }
}

/// Canonical passenger data of a leg: who boards at the origin and who
/// alights at the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegPassengers {
    pub pickup: Headcount,
    pub dropoff: Headcount,
}

/// The two layouts upstream uses for passenger data.
enum EventShape<'a> {
    Totals {
        origin: Option<&'a RawEndpoint>,
        dest: Option<&'a RawEndpoint>,
    },
    BoardAlight {
        board: Option<&'a RawHeadcount>,
        alight: Option<&'a RawHeadcount>,
    },
}

impl<'a> EventShape<'a> {
    fn classify(events: &'a RawEvents) -> Self {
        let origin = events.origin.as_ref();
        let dest = events.dest.as_ref();
        let has_board_alight = [origin, dest]
            .into_iter()
            .flatten()
            .any(|e| e.board.is_some() || e.alight.is_some());

        if has_board_alight {
            EventShape::BoardAlight {
                board: origin.and_then(|o| o.board.as_ref()),
                alight: dest.and_then(|d| d.alight.as_ref()),
            }
        } else {
            EventShape::Totals { origin, dest }
        }
    }

    fn normalize(self) -> LegPassengers {
        match self {
            EventShape::Totals { origin, dest } => LegPassengers {
                pickup: origin
                    .map(|o| Headcount::new(o.pickup_total.as_ref(), o.pickup_wheelchair.as_ref()))
                    .unwrap_or_default(),
                dropoff: dest
                    .map(|d| {
                        Headcount::new(d.dropoff_total.as_ref(), d.dropoff_wheelchair.as_ref())
                    })
                    .unwrap_or_default(),
            },
            EventShape::BoardAlight { board, alight } => LegPassengers {
                pickup: Headcount::from_raw(board),
                dropoff: Headcount::from_raw(alight),
            },
        }
    }
}

impl LegPassengers {
    pub fn from_raw(events: Option<&RawEvents>) -> Self {
        events
            .map(|e| EventShape::classify(e).normalize())
            .unwrap_or_default()
    }
}

/// Why a raw leg was left out of reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    Unparseable,
    MissingIdentity,
    InvalidTiming,
    DegeneratePolyline,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Unparseable => "unparseable",
            DropReason::MissingIdentity => "missing_identity",
            DropReason::InvalidTiming => "invalid_timing",
            DropReason::DegeneratePolyline => "degenerate_polyline",
        }
    }
}

/// A leg that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub operation_id: String,
    pub vehicle_id: String,
    pub sequence: i64,
    pub origin_ms: i64,
    pub dest_ms: i64,
    /// At least two finite `[lon, lat]` points.
    pub polyline: Vec<Coord>,
    pub origin_station: Option<StationId>,
    pub dest_station: Option<StationId>,
    pub passengers: LegPassengers,
    pub vehicle_type: Option<String>,
    pub route_candidates: Vec<String>,
}

impl Leg {
    /// Validates a raw leg. `offset` interprets wall-clock departure strings
    /// when epoch milliseconds are missing.
    pub fn from_raw(raw: &RawLeg, offset: &FixedOffset) -> Result<Self, DropReason> {
        let operation_id = raw.operation_id.as_ref().and_then(RawValue::as_id);
        let vehicle_id = raw.vehicle_id.as_ref().and_then(RawValue::as_id);
        let (Some(operation_id), Some(vehicle_id)) = (operation_id, vehicle_id) else {
            return Err(DropReason::MissingIdentity);
        };

        let origin_ms = leg_time(raw.origin_ms.as_ref(), raw.origin_time.as_ref(), offset);
        let dest_ms = leg_time(raw.dest_ms.as_ref(), raw.dest_time.as_ref(), offset);
        let (Some(origin_ms), Some(dest_ms)) = (origin_ms, dest_ms) else {
            return Err(DropReason::InvalidTiming);
        };
        if dest_ms <= origin_ms {
            return Err(DropReason::InvalidTiming);
        }

        let polyline = raw
            .polyline
            .as_deref()
            .and_then(to_coords)
            .ok_or(DropReason::DegeneratePolyline)?;

        Ok(Self {
            operation_id,
            vehicle_id,
            sequence: raw.sequence.as_ref().and_then(RawValue::as_i64).unwrap_or(0),
            origin_ms,
            dest_ms,
            polyline,
            origin_station: StationId::from_raw(raw.origin_station_id.as_ref()),
            dest_station: StationId::from_raw(raw.dest_station_id.as_ref()),
            passengers: LegPassengers::from_raw(raw.events.as_ref()),
            vehicle_type: raw.vehicle_type.as_ref().and_then(RawValue::as_id),
            route_candidates: raw.route_candidates().filter_map(RawValue::as_id).collect(),
        })
    }
}

/// Epoch milliseconds, falling back to the wall-clock field. Values outside
/// `±MAX_EPOCH_MS` count as missing.
fn leg_time(ms: Option<&RawValue>, wall: Option<&RawValue>, offset: &FixedOffset) -> Option<i64> {
    ms.and_then(RawValue::as_i64)
        .or_else(|| wall.and_then(|w| to_epoch_ms(w, offset)))
        .filter(|ms| (-MAX_EPOCH_MS..MAX_EPOCH_MS).contains(ms))
}

fn to_coords(points: &[Vec<f64>]) -> Option<Vec<Coord>> {
    if points.len() < 2 {
        return None;
    }
    points
        .iter()
        .map(|p| match p.as_slice() {
            [lon, lat, ..] if lon.is_finite() && lat.is_finite() => Some([*lon, *lat]),
            _ => None,
        })
        .collect()
}
