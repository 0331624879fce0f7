//! Passenger event log and per-second onboard counts of a trip.

use serde::{Deserialize, Serialize};

use super::runs::Trip;
use super::window::Window;
use crate::ingest::StationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Depart,
    Arrive,
}

/// A door event. Departures only carry pickups, arrivals only dropoffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerEvent {
    pub timestamp_ms: i64,
    pub station_id: Option<StationId>,
    pub phase: Phase,
    pub pickup_total: u32,
    pub pickup_wheelchair: u8,
    pub dropoff_total: u32,
    pub dropoff_wheelchair: u8,
}

impl PassengerEvent {
    /// Signed change in total passengers.
    pub fn total_delta(&self) -> i64 {
        i64::from(self.pickup_total) - i64::from(self.dropoff_total)
    }

    /// Signed change in wheelchair bay occupancy.
    pub fn wheelchair_delta(&self) -> i64 {
        i64::from(self.pickup_wheelchair.min(1)) - i64::from(self.dropoff_wheelchair.min(1))
    }
}

/// One departure and one arrival per leg, sorted by time. Ties keep leg order.
pub fn trip_events(trip: &Trip<'_>) -> Vec<PassengerEvent> {
    let mut events = Vec::with_capacity(trip.legs.len() * 2);
    for leg in &trip.legs {
        let pickup = leg.passengers.pickup;
        let dropoff = leg.passengers.dropoff;
        events.push(PassengerEvent {
            timestamp_ms: leg.origin_ms,
            station_id: leg.origin_station.clone(),
            phase: Phase::Depart,
            pickup_total: pickup.total,
            pickup_wheelchair: pickup.wheelchair.min(1),
            dropoff_total: 0,
            dropoff_wheelchair: 0,
        });
        events.push(PassengerEvent {
            timestamp_ms: leg.dest_ms,
            station_id: leg.dest_station.clone(),
            phase: Phase::Arrive,
            pickup_total: 0,
            pickup_wheelchair: 0,
            dropoff_total: dropoff.total,
            dropoff_wheelchair: dropoff.wheelchair.min(1),
        });
    }
    events.sort_by_key(|e| e.timestamp_ms);
    events
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardCounts {
    pub total: Vec<u32>,
    pub wheelchair: Vec<u8>,
}

/// Running onboard counts, one value per second of the window.
///
/// Events land on `floor` of their second, so an alighting shows at the very
/// second it happens. Deltas of one second are summed, then the running total
/// is clamped at zero and the wheelchair flag to `[0, 1]`. Uncovered seconds
/// read 0 while the running values carry on underneath.
pub fn onboard_counts(events: &[PassengerEvent], covered: &[bool], window: &Window) -> OnboardCounts {
    let n = covered.len();
    let mut deltas: Vec<Option<(i64, i64)>> = vec![None; n];
    for event in events {
        let Some(i) = window.sample_index(event.timestamp_ms).filter(|&i| i < n) else {
            continue;
        };
        let (total, wheelchair) = deltas[i].get_or_insert((0, 0));
        *total += event.total_delta();
        *wheelchair += event.wheelchair_delta();
    }

    let mut running_total: i64 = 0;
    let mut running_wheelchair: i64 = 0;
    let mut total = Vec::with_capacity(n);
    let mut wheelchair = Vec::with_capacity(n);
    for (delta, &is_covered) in deltas.iter().zip(covered) {
        if let Some((d_total, d_wheelchair)) = delta {
            running_total = (running_total + d_total).max(0);
            running_wheelchair = (running_wheelchair + d_wheelchair).clamp(0, 1);
        }
        if is_covered {
            total.push(running_total.min(i64::from(u32::MAX)) as u32);
            wheelchair.push(running_wheelchair as u8);
        } else {
            total.push(0);
            wheelchair.push(0);
        }
    }

    OnboardCounts { total, wheelchair }
}
