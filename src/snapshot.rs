//! What a renderer reads off a [`TimelineRecord`] at a fractional second.
//!
//! Positions are interpolated between the two samples around `t`. A missing
//! later sample falls back to the earlier one, never the other way round, so
//! a vehicle does not show up before it actually departs.

use serde::Serialize;

use crate::geometry::Coord;
use crate::ingest::StationId;
use crate::stations::StationLookup;
use crate::timeline::TimelineRecord;
use crate::timeline::window::MS_PER_SEC;

/// Most recent valid sample at or before `index`.
fn last_valid_at_or_before(positions: &[Option<Coord>], index: usize) -> Option<Coord> {
    if positions.is_empty() {
        return None;
    }
    positions[..=index.min(positions.len() - 1)]
        .iter()
        .rev()
        .find_map(|p| *p)
}

/// Display position at fractional second `t` since the window start.
pub fn position_at(positions: &[Option<Coord>], t: f64) -> Option<Coord> {
    if positions.is_empty() || !t.is_finite() || t < 0.0 {
        return None;
    }
    let idx = t.floor() as usize;
    let frac = (t - t.floor()).clamp(0.0, 1.0);

    let last = positions.len() - 1;
    if idx >= last {
        return last_valid_at_or_before(positions, last);
    }

    let (current, next) = (positions[idx], positions[idx + 1]);
    if current.is_none() && next.is_none() {
        return None;
    }
    let p1 = current.or_else(|| last_valid_at_or_before(positions, idx))?;
    let p2 = next.unwrap_or(p1);
    Some([p1[0] + (p2[0] - p1[0]) * frac, p1[1] + (p2[1] - p1[1]) * frac])
}

/// Onboard passengers split the way the vehicle info box shows them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Onboard {
    pub general: u32,
    pub wheelchair: u8,
}

impl Onboard {
    pub fn total(&self) -> u32 {
        self.general + u32::from(self.wheelchair)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopMarker {
    pub station_id: StationId,
    pub position: Coord,
}

/// Everything needed to draw one vehicle at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    pub operation_id: String,
    pub vehicle_id: String,
    pub vehicle_type: String,
    pub position: Coord,
    pub onboard: Onboard,
    /// Travelled path, ending at `position`.
    pub past_path: Vec<Coord>,
    /// Remaining path, starting at `position`.
    pub future_path: Vec<Coord>,
    /// Intermediate stops that still have a door event ahead.
    pub upcoming_stops: Vec<StopMarker>,
}

impl TimelineRecord {
    pub fn position_at(&self, t: f64) -> Option<Coord> {
        position_at(&self.positions, t)
    }

    pub fn onboard_at(&self, t: f64) -> Onboard {
        let Some(last) = self.onboard_total.len().checked_sub(1) else {
            return Onboard::default();
        };
        let idx = if t.is_finite() && t > 0.0 {
            (t.floor() as usize).min(last)
        } else {
            0
        };
        let total = self.onboard_total[idx];
        let wheelchair = self.onboard_wheelchair.get(idx).copied().unwrap_or(0).min(1);
        Onboard {
            general: total.saturating_sub(u32::from(wheelchair)),
            wheelchair,
        }
    }

    /// Stops with at least one event at or after `now_ms`, resolved through
    /// `stations`. Stops the lookup does not know are left out.
    pub fn upcoming_stops<S: StationLookup + ?Sized>(
        &self,
        now_ms: i64,
        stations: &S,
    ) -> Vec<StopMarker> {
        self.stops
            .iter()
            .filter(|stop| {
                self.events.iter().any(|e| {
                    e.timestamp_ms >= now_ms && e.station_id.as_ref() == Some(*stop)
                })
            })
            .filter_map(|stop| {
                stations.coord(stop).map(|position| StopMarker {
                    station_id: stop.clone(),
                    position,
                })
            })
            .collect()
    }
}

fn compact(positions: &[Option<Coord>]) -> Vec<Coord> {
    positions.iter().flatten().copied().collect()
}

/// Snapshot of `record` at `t`, or `None` when the vehicle is not on screen.
pub fn snapshot<S: StationLookup + ?Sized>(
    record: &TimelineRecord,
    t: f64,
    stations: &S,
) -> Option<VehicleSnapshot> {
    if record.positions.len() < 2 || !t.is_finite() || t < 0.0 {
        return None;
    }
    if t >= record.positions.len() as f64 {
        return None;
    }
    let position = record.position_at(t)?;

    let pi = t.floor() as usize;
    let mut past_path = compact(&record.positions[..=pi]);
    if past_path.last() != Some(&position) {
        past_path.push(position);
    }
    let mut future_path = compact(&record.positions[pi..]);
    if future_path.first() != Some(&position) {
        future_path.insert(0, position);
    }

    let now_ms = record.base_ms.saturating_add(pi as i64 * MS_PER_SEC);

    Some(VehicleSnapshot {
        operation_id: record.operation_id.clone(),
        vehicle_id: record.vehicle_id.clone(),
        vehicle_type: record.vehicle_type.clone(),
        position,
        onboard: record.onboard_at(t),
        past_path,
        future_path,
        upcoming_stops: record.upcoming_stops(now_ms, stations),
    })
}

/// Snapshots of every record visible at `t`.
pub fn snapshot_all<S: StationLookup + ?Sized>(
    records: &[TimelineRecord],
    t: f64,
    stations: &S,
) -> Vec<VehicleSnapshot> {
    records
        .iter()
        .filter_map(|record| snapshot(record, t, stations))
        .collect()
}
