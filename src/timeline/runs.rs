//! Grouping legs into vehicle runs and splitting runs into contiguous trips.

use std::collections::HashMap;

use super::window::Window;
use crate::ingest::Leg;

/// Identity of a physical vehicle run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub operation_id: String,
    pub vehicle_id: String,
}

impl RunKey {
    fn of(leg: &Leg) -> Self {
        Self {
            operation_id: leg.operation_id.clone(),
            vehicle_id: leg.vehicle_id.clone(),
        }
    }
}

/// All legs of one run, in input order.
#[derive(Debug)]
pub struct Run<'a> {
    pub key: RunKey,
    pub legs: Vec<&'a Leg>,
}

/// A maximal contiguous stretch of a run. Never empty.
#[derive(Debug, Clone)]
pub struct Trip<'a> {
    pub key: RunKey,
    pub(crate) legs: Vec<&'a Leg>,
}

impl<'a> Trip<'a> {
    /// `None` for an empty leg list.
    pub fn new(key: RunKey, legs: Vec<&'a Leg>) -> Option<Self> {
        (!legs.is_empty()).then_some(Self { key, legs })
    }

    pub fn legs(&self) -> &[&'a Leg] {
        &self.legs
    }

    pub fn first(&self) -> &'a Leg {
        self.legs[0]
    }

    pub fn last(&self) -> &'a Leg {
        self.legs[self.legs.len() - 1]
    }
}

/// Groups legs by `(operation_id, vehicle_id)`, runs in first-appearance order.
pub fn group_runs(legs: &[Leg]) -> Vec<Run<'_>> {
    let mut index: HashMap<RunKey, usize> = HashMap::new();
    let mut runs: Vec<Run<'_>> = Vec::new();

    for leg in legs {
        let key = RunKey::of(leg);
        match index.get(&key) {
            Some(&i) => runs[i].legs.push(leg),
            None => {
                index.insert(key.clone(), runs.len());
                runs.push(Run {
                    key,
                    legs: vec![leg],
                });
            }
        }
    }

    runs
}

/// Legs of `run` overlapping the window, sorted by sequence, then origin
/// time, then destination time. Sequence leads because upstream timestamps
/// are noisier than sequence numbers.
pub fn windowed_legs<'a>(run: &Run<'a>, window: &Window) -> Vec<&'a Leg> {
    let mut legs: Vec<&'a Leg> = run
        .legs
        .iter()
        .copied()
        .filter(|leg| window.overlaps(leg.origin_ms, leg.dest_ms))
        .collect();
    legs.sort_by_key(|leg| (leg.sequence, leg.origin_ms, leg.dest_ms));
    legs
}

/// `next` continues `prev` without the vehicle leaving service: consecutive
/// sequence numbers, same hand-off station, and at most `max_gap_ms` between
/// arrival and departure.
pub fn is_contiguous(prev: &Leg, next: &Leg, max_gap_ms: i64) -> bool {
    let same_station = match (&prev.dest_station, &next.origin_station) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    next.sequence == prev.sequence.saturating_add(1)
        && same_station
        && next.origin_ms.saturating_sub(prev.dest_ms) <= max_gap_ms
}

/// Splits sorted legs into trips at every contiguity break.
pub fn split_trips<'a>(key: &RunKey, legs: &[&'a Leg], max_gap_ms: i64) -> Vec<Trip<'a>> {
    let mut trips = Vec::new();
    let Some((&first, rest)) = legs.split_first() else {
        return trips;
    };

    let mut current = vec![first];
    let mut prev = first;
    for &next in rest {
        if is_contiguous(prev, next, max_gap_ms) {
            current.push(next);
        } else {
            trips.push(Trip {
                key: key.clone(),
                legs: std::mem::replace(&mut current, vec![next]),
            });
        }
        prev = next;
    }
    trips.push(Trip {
        key: key.clone(),
        legs: current,
    });

    trips
}

/// First route id candidate across the trip's legs, in order.
///
/// Upstream sometimes fills the route field with the operation id; with
/// `reject_operation_id` such values are skipped.
pub fn pick_route_id(trip: &Trip<'_>, reject_operation_id: bool) -> Option<String> {
    trip.legs
        .iter()
        .flat_map(|leg| leg.route_candidates.iter())
        .find(|candidate| !(reject_operation_id && **candidate == trip.key.operation_id))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{LegPassengers, StationId};

    const MIN: i64 = 60_000;

    #[test]
    fn test_group_runs_keeps_first_appearance_order() {
        let legs = vec![
            leg("OP2", "V1", 1, "A", "B", 0, MIN),
            leg("OP1", "V1", 1, "A", "B", 0, MIN),
            leg("OP2", "V1", 2, "B", "C", 2 * MIN, 3 * MIN),
            leg("OP1", "V2", 1, "A", "B", 0, MIN),
        ];
        let runs = group_runs(&legs);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].key.operation_id, "OP2");
        assert_eq!(runs[0].legs.len(), 2);
        assert_eq!(runs[1].key.operation_id, "OP1");
        assert_eq!(runs[2].key.vehicle_id, "V2");
    }

    #[test]
    fn test_windowed_legs_sorts_by_sequence_first() {
        let legs = vec![
            leg("OP", "V", 2, "B", "C", 0, MIN),
            leg("OP", "V", 1, "A", "B", 5 * MIN, 6 * MIN),
            leg("OP", "V", 3, "C", "D", 100 * MIN, 101 * MIN),
        ];
        let runs = group_runs(&legs);
        let window = Window::new(0, 60 * MIN).unwrap();
        let sorted = windowed_legs(&runs[0], &window);
        let seqs: Vec<_> = sorted.iter().map(|l| l.sequence).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_split_on_sequence_gap() {
        let legs = vec![
            leg("OP", "V", 1, "A", "B", 0, 10 * MIN),
            leg("OP", "V", 2, "B", "C", 13 * MIN, 20 * MIN),
            leg("OP", "V", 4, "C", "D", 21 * MIN, 30 * MIN),
        ];
        let refs: Vec<&Leg> = legs.iter().collect();
        let trips = split_trips(&RunKey::of(&legs[0]), &refs, 5 * MIN);

        assert_eq!(trips.len(), 2);
        let seqs: Vec<Vec<i64>> = trips
            .iter()
            .map(|t| t.legs.iter().map(|l| l.sequence).collect())
            .collect();
        assert_eq!(seqs, vec![vec![1, 2], vec![4]]);
    }

    #[test]
    fn test_trip_new_rejects_empty() {
        let key = RunKey {
            operation_id: "OP".into(),
            vehicle_id: "V".into(),
        };
        assert!(Trip::new(key.clone(), Vec::new()).is_none());

        let legs = vec![leg("OP", "V", 1, "A", "B", 0, MIN)];
        let trip = Trip::new(key, legs.iter().collect()).unwrap();
        assert_eq!(trip.legs().len(), 1);
        assert_eq!(trip.first().sequence, 1);
        assert_eq!(trip.last().sequence, 1);
    }

    #[test]
    fn test_contiguity_with_extreme_times() {
        let legs = vec![
            leg("OP", "V", 1, "A", "B", i64::MIN, i64::MIN + 1),
            leg("OP", "V", 2, "B", "C", i64::MAX - 1, i64::MAX),
        ];
        assert!(!is_contiguous(&legs[0], &legs[1], 5 * MIN));

        let backwards = vec![
            leg("OP", "V", 1, "A", "B", i64::MAX - 1, i64::MAX),
            leg("OP", "V", 2, "B", "C", i64::MIN, i64::MIN + 1),
        ];
        assert!(is_contiguous(&backwards[0], &backwards[1], 5 * MIN));
    }

    #[test]
    fn test_split_on_station_mismatch_and_long_gap() {
        let legs = vec![
            leg("OP", "V", 1, "A", "B", 0, 10 * MIN),
            leg("OP", "V", 2, "X", "C", 11 * MIN, 20 * MIN),
            leg("OP", "V", 3, "C", "D", 26 * MIN, 30 * MIN),
        ];
        let refs: Vec<&Leg> = legs.iter().collect();
        let trips = split_trips(&RunKey::of(&legs[0]), &refs, 5 * MIN);
        assert_eq!(trips.len(), 3);
    }

    #[test]
    fn test_station_prefix_does_not_break_contiguity() {
        let legs = vec![
            leg("OP", "V", 1, "A", "S12", 0, 10 * MIN),
            leg("OP", "V", 2, "s12", "C", 11 * MIN, 20 * MIN),
        ];
        assert!(is_contiguous(&legs[0], &legs[1], 5 * MIN));
    }

    #[test]
    fn test_gap_exactly_at_threshold_is_contiguous() {
        let legs = vec![
            leg("OP", "V", 1, "A", "B", 0, 10 * MIN),
            leg("OP", "V", 2, "B", "C", 15 * MIN, 20 * MIN),
        ];
        assert!(is_contiguous(&legs[0], &legs[1], 5 * MIN));
        assert!(!is_contiguous(&legs[0], &legs[1], 5 * MIN - 1));
    }

    #[test]
    fn test_split_empty() {
        let key = RunKey {
            operation_id: "OP".into(),
            vehicle_id: "V".into(),
        };
        assert!(split_trips(&key, &[], 5 * MIN).is_empty());
    }

    #[test]
    fn test_pick_route_id_skips_operation_id() {
        let mut a = leg("OP", "V", 1, "A", "B", 0, MIN);
        a.route_candidates = vec!["OP".into()];
        let mut b = leg("OP", "V", 2, "B", "C", MIN, 2 * MIN);
        b.route_candidates = vec!["OP".into(), "R7".into()];
        let trip = Trip {
            key: RunKey::of(&a),
            legs: vec![&a, &b],
        };

        assert_eq!(pick_route_id(&trip, true).as_deref(), Some("R7"));
        assert_eq!(pick_route_id(&trip, false).as_deref(), Some("OP"));
    }

    #[test]
    fn test_pick_route_id_none() {
        let a = leg("OP", "V", 1, "A", "B", 0, MIN);
        let trip = Trip {
            key: RunKey::of(&a),
            legs: vec![&a],
        };
        assert_eq!(pick_route_id(&trip, true), None);
    }

    fn leg(op: &str, veh: &str, seq: i64, from: &str, to: &str, origin: i64, dest: i64) -> Leg {
        Leg {
            operation_id: op.into(),
            vehicle_id: veh.into(),
            sequence: seq,
            origin_ms: origin,
            dest_ms: dest,
            polyline: vec![[127.0, 37.0], [127.01, 37.0]],
            origin_station: StationId::normalize(from),
            dest_station: StationId::normalize(to),
            passengers: LegPassengers::default(),
            vehicle_type: None,
            route_candidates: Vec::new(),
        }
    }
}
