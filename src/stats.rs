use serde::Serialize;

use crate::ingest::DropReason;
use crate::timeline::TimelineRecord;

/// Counters collected over one reconstruction pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconstructionStats {
    pub legs_in: usize,
    pub legs_accepted: usize,

    // dropped legs, by reason
    pub dropped_unparseable: usize,
    pub dropped_missing_identity: usize,
    pub dropped_invalid_timing: usize,
    pub dropped_degenerate_polyline: usize,

    pub legs_outside_window: usize,
    pub runs: usize,
    pub runs_without_trips: usize,
    pub trips: usize,
    pub events: usize,
    pub covered_seconds: usize,
}

impl ReconstructionStats {
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Unparseable => self.dropped_unparseable += 1,
            DropReason::MissingIdentity => self.dropped_missing_identity += 1,
            DropReason::InvalidTiming => self.dropped_invalid_timing += 1,
            DropReason::DegeneratePolyline => self.dropped_degenerate_polyline += 1,
        }
    }

    /// Folds in elements the payload decoder already threw away.
    pub fn with_unparseable(mut self, count: usize) -> Self {
        self.legs_in += count;
        self.dropped_unparseable += count;
        self
    }

    pub fn legs_dropped(&self) -> usize {
        self.dropped_unparseable
            + self.dropped_missing_identity
            + self.dropped_invalid_timing
            + self.dropped_degenerate_polyline
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn accepted_pct(&self) -> f64 {
        Self::pct(self.legs_accepted, self.legs_in)
    }
}

/// One CSV row per reconstructed trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub operation_id: String,
    pub vehicle_id: String,
    pub route_id: Option<String>,
    pub vehicle_type: String,
    pub base_ms: i64,
    pub first_covered_sec: Option<usize>,
    pub last_covered_sec: Option<usize>,
    pub covered_seconds: usize,
    pub stops: usize,
    pub events: usize,
    pub boarded: u64,
    pub alighted: u64,
    pub peak_onboard: u32,
    pub wheelchair_seconds: usize,
}

impl TripSummary {
    pub fn from_record(record: &TimelineRecord) -> Self {
        let boarded = record.events.iter().map(|e| u64::from(e.pickup_total)).sum();
        let alighted = record.events.iter().map(|e| u64::from(e.dropoff_total)).sum();

        TripSummary {
            operation_id: record.operation_id.clone(),
            vehicle_id: record.vehicle_id.clone(),
            route_id: record.route_id.clone(),
            vehicle_type: record.vehicle_type.clone(),
            base_ms: record.base_ms,
            first_covered_sec: record.first_covered(),
            last_covered_sec: record.last_covered(),
            covered_seconds: record.covered_seconds(),
            stops: record.stops.len(),
            events: record.events.len(),
            boarded,
            alighted,
            peak_onboard: record.onboard_total.iter().copied().max().unwrap_or(0),
            wheelchair_seconds: record.onboard_wheelchair.iter().filter(|w| **w > 0).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{PassengerEvent, Phase};

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(ReconstructionStats::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(ReconstructionStats::pct(50, 100), 50.0);
        assert_eq!(ReconstructionStats::pct(1, 4), 25.0);
    }

    #[test]
    fn test_record_drop_counts_by_reason() {
        let mut stats = ReconstructionStats::default();
        stats.record_drop(DropReason::MissingIdentity);
        stats.record_drop(DropReason::MissingIdentity);
        stats.record_drop(DropReason::DegeneratePolyline);

        assert_eq!(stats.dropped_missing_identity, 2);
        assert_eq!(stats.dropped_degenerate_polyline, 1);
        assert_eq!(stats.legs_dropped(), 3);
    }

    #[test]
    fn test_with_unparseable() {
        let stats = ReconstructionStats {
            legs_in: 8,
            legs_accepted: 6,
            ..Default::default()
        }
        .with_unparseable(2);

        assert_eq!(stats.legs_in, 10);
        assert_eq!(stats.dropped_unparseable, 2);
        assert_eq!(stats.accepted_pct(), 60.0);
    }

    #[test]
    fn test_trip_summary_from_record() {
        let record = TimelineRecord {
            operation_id: "OP".into(),
            vehicle_id: "V".into(),
            route_id: None,
            vehicle_type: "car".into(),
            base_ms: 0,
            positions: vec![None, Some([1.0, 1.0]), Some([1.0, 1.0]), None],
            covered: vec![false, true, true, false],
            stops: Vec::new(),
            events: vec![
                PassengerEvent {
                    timestamp_ms: 1000,
                    station_id: None,
                    phase: Phase::Depart,
                    pickup_total: 3,
                    pickup_wheelchair: 1,
                    dropoff_total: 0,
                    dropoff_wheelchair: 0,
                },
                PassengerEvent {
                    timestamp_ms: 2000,
                    station_id: None,
                    phase: Phase::Arrive,
                    pickup_total: 0,
                    pickup_wheelchair: 0,
                    dropoff_total: 3,
                    dropoff_wheelchair: 1,
                },
            ],
            onboard_total: vec![0, 3, 0, 0],
            onboard_wheelchair: vec![0, 1, 0, 0],
        };

        let summary = TripSummary::from_record(&record);
        assert_eq!(summary.first_covered_sec, Some(1));
        assert_eq!(summary.last_covered_sec, Some(2));
        assert_eq!(summary.covered_seconds, 2);
        assert_eq!(summary.boarded, 3);
        assert_eq!(summary.alighted, 3);
        assert_eq!(summary.peak_onboard, 3);
        assert_eq!(summary.wheelchair_seconds, 1);
    }
}
