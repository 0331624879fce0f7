//! The per-trip output record handed to the rendering layer.

use serde::{Deserialize, Serialize};

use super::ReconstructOptions;
use super::passengers::{PassengerEvent, onboard_counts, trip_events};
use super::positions::{forward_fill, sample_trip};
use super::runs::{Trip, pick_route_id};
use super::window::Window;
use crate::geometry::Coord;
use crate::ingest::StationId;

/// Dense per-second state of one trip.
///
/// All per-second arrays have `window.sample_count()` entries; index `i`
/// is `base_ms + i * 1000`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub operation_id: String,
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub vehicle_type: String,
    pub base_ms: i64,
    pub positions: Vec<Option<Coord>>,
    pub covered: Vec<bool>,
    /// Intermediate stations, in first-visit order.
    pub stops: Vec<StationId>,
    pub events: Vec<PassengerEvent>,
    pub onboard_total: Vec<u32>,
    pub onboard_wheelchair: Vec<u8>,
}

impl TimelineRecord {
    pub fn covered_seconds(&self) -> usize {
        self.covered.iter().filter(|c| **c).count()
    }

    pub fn first_covered(&self) -> Option<usize> {
        self.covered.iter().position(|c| *c)
    }

    pub fn last_covered(&self) -> Option<usize> {
        self.covered.iter().rposition(|c| *c)
    }
}

/// Stations touched by the trip other than its very first origin and very
/// last destination.
pub fn intermediate_stops(trip: &Trip<'_>) -> Vec<StationId> {
    let first_origin = trip.first().origin_station.as_ref();
    let last_dest = trip.last().dest_station.as_ref();

    let mut stops: Vec<StationId> = Vec::new();
    for leg in &trip.legs {
        let candidates = [
            leg.origin_station.as_ref().filter(|s| Some(*s) != first_origin),
            leg.dest_station.as_ref().filter(|s| Some(*s) != last_dest),
        ];
        for station in candidates.into_iter().flatten() {
            if !stops.contains(station) {
                stops.push(station.clone());
            }
        }
    }
    stops
}

/// Builds the record for one trip. Positions and passenger counts are two
/// independent passes over the same coverage mask.
pub fn assemble(trip: &Trip<'_>, window: &Window, options: &ReconstructOptions) -> TimelineRecord {
    let coverage = sample_trip(trip, window, options.max_contiguous_gap_ms);
    let positions = forward_fill(&coverage.samples, &coverage.covered);

    let events = trip_events(trip);
    let onboard = onboard_counts(&events, &coverage.covered, window);

    let vehicle_type = trip
        .first()
        .vehicle_type
        .clone()
        .unwrap_or_else(|| options.default_vehicle_type.clone());

    TimelineRecord {
        operation_id: trip.key.operation_id.clone(),
        vehicle_id: trip.key.vehicle_id.clone(),
        route_id: pick_route_id(trip, options.reject_operation_route_ids),
        vehicle_type,
        base_ms: window.start_ms(),
        positions,
        covered: coverage.covered,
        stops: intermediate_stops(trip),
        events,
        onboard_total: onboard.total,
        onboard_wheelchair: onboard.wheelchair,
    }
}
