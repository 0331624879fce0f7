//! Reconstruction of per-second vehicle timelines from raw legs.
//!
//! Legs are validated, grouped into runs by `(operation_id, vehicle_id)`,
//! split into contiguous trips, and every trip becomes one
//! [`TimelineRecord`]. Trips share no state, so they are built in parallel.
//!
//! The transform is pure: identical inputs give identical, identically
//! ordered output.

pub mod passengers;
pub mod positions;
pub mod record;
pub mod runs;
pub mod window;

pub use passengers::{OnboardCounts, PassengerEvent, Phase};
pub use record::TimelineRecord;
pub use runs::{RunKey, Trip};
pub use window::{DEFAULT_WINDOW_MS, Window};

use chrono::{FixedOffset, Offset, Utc};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::ingest::{Leg, RawLeg};
use crate::stats::ReconstructionStats;

/// Longest stop between two legs that still counts as one trip.
pub const DEFAULT_MAX_CONTIGUOUS_GAP_MS: i64 = 5 * 60 * 1000;
pub const DEFAULT_VEHICLE_TYPE: &str = "car";

/// Policy knobs of the reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    /// Maximum arrival-to-departure gap for two legs to stay in one trip.
    pub max_contiguous_gap_ms: i64,
    /// Ignore route id values equal to the operation id.
    pub reject_operation_route_ids: bool,
    /// Vehicle type for trips whose first leg has none.
    pub default_vehicle_type: String,
    /// Offset used to read wall-clock timestamps on legs without epoch times.
    pub utc_offset: FixedOffset,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            max_contiguous_gap_ms: DEFAULT_MAX_CONTIGUOUS_GAP_MS,
            reject_operation_route_ids: true,
            default_vehicle_type: DEFAULT_VEHICLE_TYPE.to_string(),
            utc_offset: Utc.fix(),
        }
    }
}

/// Output of one reconstruction pass.
#[derive(Debug)]
pub struct Reconstruction {
    pub records: Vec<TimelineRecord>,
    pub stats: ReconstructionStats,
}

/// Rebuilds every trip timeline found in `raw_legs`.
///
/// # Errors
///
/// Only call-level problems are errors; see [`Window::new`]. Malformed legs
/// are dropped and show up in [`Reconstruction::stats`].
pub fn reconstruct(
    raw_legs: &[RawLeg],
    window: &Window,
    options: &ReconstructOptions,
) -> Result<Vec<TimelineRecord>, EngineError> {
    reconstruct_with_stats(raw_legs, window, options).map(|r| r.records)
}

#[tracing::instrument(skip(raw_legs, options), fields(legs = raw_legs.len(), start_ms = window.start_ms()))]
pub fn reconstruct_with_stats(
    raw_legs: &[RawLeg],
    window: &Window,
    options: &ReconstructOptions,
) -> Result<Reconstruction, EngineError> {
    if options.max_contiguous_gap_ms < 0 {
        return Err(EngineError::NegativeGap {
            gap_ms: options.max_contiguous_gap_ms,
        });
    }

    let mut stats = ReconstructionStats {
        legs_in: raw_legs.len(),
        ..Default::default()
    };

    let mut legs: Vec<Leg> = Vec::with_capacity(raw_legs.len());
    for (i, raw) in raw_legs.iter().enumerate() {
        match Leg::from_raw(raw, &options.utc_offset) {
            Ok(leg) => legs.push(leg),
            Err(reason) => {
                debug!(index = i, reason = reason.as_str(), "Dropping leg");
                stats.record_drop(reason);
            }
        }
    }
    stats.legs_accepted = legs.len();

    let runs = runs::group_runs(&legs);
    stats.runs = runs.len();

    let mut trips: Vec<Trip<'_>> = Vec::new();
    for run in &runs {
        let windowed = runs::windowed_legs(run, window);
        stats.legs_outside_window += run.legs.len() - windowed.len();
        let run_trips = runs::split_trips(&run.key, &windowed, options.max_contiguous_gap_ms);
        if run_trips.is_empty() {
            stats.runs_without_trips += 1;
            debug!(
                operation_id = %run.key.operation_id,
                vehicle_id = %run.key.vehicle_id,
                "Run has no legs inside the window"
            );
        }
        trips.extend(run_trips);
    }

    let records: Vec<TimelineRecord> = trips
        .par_iter()
        .map(|trip| record::assemble(trip, window, options))
        .collect();

    stats.trips = records.len();
    for record in &records {
        stats.covered_seconds += record.covered_seconds();
        stats.events += record.events.len();
    }

    info!(
        legs_in = stats.legs_in,
        legs_accepted = stats.legs_accepted,
        legs_dropped = stats.legs_dropped(),
        runs = stats.runs,
        trips = stats.trips,
        "Reconstruction finished"
    );

    Ok(Reconstruction { records, stats })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: i64 = 60_000;

    #[test]
    fn test_empty_input() {
        let window = Window::day(0).unwrap();
        let records = reconstruct(&[], &window, &ReconstructOptions::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_run_outside_window_contributes_nothing() {
        let window = Window::new(0, 60 * MIN).unwrap();
        let legs = vec![raw("OP", Some("V"), 1, "S1", "S2", 120 * MIN, 130 * MIN)];
        let out = reconstruct_with_stats(&legs, &window, &ReconstructOptions::default()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.stats.runs, 1);
        assert_eq!(out.stats.runs_without_trips, 1);
        assert_eq!(out.stats.legs_outside_window, 1);
    }

    #[test]
    fn test_splits_run_into_trips() {
        let window = Window::new(0, 120 * MIN).unwrap();
        let legs = vec![
            raw("OP", Some("V"), 1, "S1", "S2", MIN, 10 * MIN),
            raw("OP", Some("V"), 2, "S2", "S3", 13 * MIN, 20 * MIN),
            raw("OP", Some("V"), 4, "S3", "S4", 21 * MIN, 30 * MIN),
        ];
        let records = reconstruct(&legs, &window, &ReconstructOptions::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].events.len(), 4);
        assert_eq!(records[1].events.len(), 2);
    }

    #[test]
    fn test_dropped_leg_does_not_change_trips() {
        let window = Window::new(0, 120 * MIN).unwrap();
        let legs = vec![
            raw("OP", Some("V"), 1, "S1", "S2", MIN, 10 * MIN),
            raw("OP", None, 2, "S2", "S9", 11 * MIN, 12 * MIN),
            raw("OP", Some("V"), 2, "S2", "S3", 13 * MIN, 20 * MIN),
        ];
        let out = reconstruct_with_stats(&legs, &window, &ReconstructOptions::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].events.len(), 4);
        assert!(out.records[0].stops.iter().all(|s| s.as_str() != "9"));
        assert_eq!(out.stats.dropped_missing_identity, 1);
    }

    #[test]
    fn test_tighter_gap_policy_splits_more() {
        let window = Window::new(0, 120 * MIN).unwrap();
        let legs = vec![
            raw("OP", Some("V"), 1, "S1", "S2", MIN, 10 * MIN),
            raw("OP", Some("V"), 2, "S2", "S3", 13 * MIN, 20 * MIN),
        ];
        let options = ReconstructOptions {
            max_contiguous_gap_ms: 2 * MIN,
            ..Default::default()
        };
        let records = reconstruct(&legs, &window, &options).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_malformed_events_keep_leg_in_trip() {
        let window = Window::new(0, 120 * MIN).unwrap();
        let mut middle = json_leg("OP", "V", 2, "B", "C", 11 * MIN, 20 * MIN);
        middle["events"] = serde_json::json!({"origin": {"board": 5}});
        let legs: Vec<RawLeg> = vec![
            json_leg("OP", "V", 1, "A", "B", MIN, 10 * MIN),
            middle,
            json_leg("OP", "V", 3, "C", "D", 21 * MIN, 30 * MIN),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect();

        let out = reconstruct_with_stats(&legs, &window, &ReconstructOptions::default()).unwrap();
        assert_eq!(out.stats.legs_accepted, 3);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].events.len(), 6);
    }

    #[test]
    fn test_extreme_epoch_leg_is_dropped() {
        let window = Window::new(0, MIN).unwrap();
        let mut extreme = json_leg("OP", "V", 1, "A", "B", 0, 1000);
        extreme["originMs"] = serde_json::json!(i64::MIN);
        let legs = vec![
            serde_json::from_value(extreme).unwrap(),
            raw("OP", Some("V"), 2, "B", "C", 2000, 3000),
        ];

        let out = reconstruct_with_stats(&legs, &window, &ReconstructOptions::default()).unwrap();
        assert_eq!(out.stats.dropped_invalid_timing, 1);
        assert_eq!(out.records.len(), 1);
    }

    #[test]
    fn test_negative_gap_policy_rejected() {
        let window = Window::day(0).unwrap();
        let options = ReconstructOptions {
            max_contiguous_gap_ms: -1,
            ..Default::default()
        };
        assert!(reconstruct(&[], &window, &options).is_err());
    }

    fn raw(
        op: &str,
        vehicle: Option<&str>,
        seq: i64,
        from: &str,
        to: &str,
        origin: i64,
        dest: i64,
    ) -> RawLeg {
        let mut json = json_leg(op, "", seq, from, to, origin, dest);
        json["vehicleID"] = serde_json::json!(vehicle);
        serde_json::from_value(json).unwrap()
    }

    fn json_leg(
        op: &str,
        vehicle: &str,
        seq: i64,
        from: &str,
        to: &str,
        origin: i64,
        dest: i64,
    ) -> serde_json::Value {
        serde_json::json!({
            "operationID": op,
            "vehicleID": vehicle,
            "routeInfo": seq,
            "originStationID": from,
            "destStationID": to,
            "originMs": origin,
            "destMs": dest,
            "polyline": [[127.0, 37.0], [127.01, 37.0]],
        })
    }
}
