//! Per-second position samples and the coverage mask of a trip.

use super::runs::{Trip, is_contiguous};
use super::window::Window;
use crate::geometry::{Coord, MeasuredPolyline};

/// Raw position samples and coverage before forward-filling.
#[derive(Debug, Clone, PartialEq)]
pub struct Coverage {
    pub samples: Vec<Option<Coord>>,
    pub covered: Vec<bool>,
}

/// Samples every second the trip is on a leg or in a short layover.
///
/// A leg covers `[ceil(origin), floor(min(dest, window end))]`. Seconds
/// already written by an earlier leg keep their value. A layover between
/// two contiguous legs at the same station is covered and parked at the
/// arriving leg's final point.
pub fn sample_trip(trip: &Trip<'_>, window: &Window, max_gap_ms: i64) -> Coverage {
    let n = window.sample_count();
    let mut samples: Vec<Option<Coord>> = vec![None; n];
    let mut covered = vec![false; n];
    let last_index = n as i64 - 1;

    for (i, leg) in trip.legs.iter().enumerate() {
        let seg_start = leg.origin_ms;
        let seg_end = leg.dest_ms.min(window.end_ms());
        if seg_end <= window.start_ms() || seg_end <= seg_start {
            continue;
        }

        let i0 = window.ceil_index(seg_start).max(0);
        let i1 = window.floor_index(seg_end).min(last_index);
        if i1 < i0 {
            continue;
        }

        let polyline = MeasuredPolyline::new(&leg.polyline);
        let duration = leg.dest_ms.saturating_sub(leg.origin_ms).max(1) as f64;
        for t in i0 as usize..=i1 as usize {
            covered[t] = true;
            if samples[t].is_some() {
                continue;
            }
            let p = window.second_ms(t).saturating_sub(leg.origin_ms) as f64 / duration;
            samples[t] = polyline.point_at_fraction(p);
        }

        let Some(next) = trip.legs.get(i + 1) else {
            continue;
        };
        let gap_ms = next.origin_ms.saturating_sub(leg.dest_ms);
        if gap_ms <= 0 || !is_contiguous(leg, next, max_gap_ms) {
            continue;
        }
        let park_from = i1 + 1;
        let park_until = window
            .ceil_index(next.origin_ms.max(window.start_ms()))
            .min(last_index + 1);
        let parked_at = polyline.last_point();
        for t in park_from.max(0)..park_until {
            let t = t as usize;
            covered[t] = true;
            if samples[t].is_none() {
                samples[t] = parked_at;
            }
        }
    }

    Coverage { samples, covered }
}

/// Carries the last covered position into later covered seconds that have
/// none. An uncovered second drops the carried value, so a position never
/// bridges an out-of-service gap and uncovered seconds stay empty.
pub fn forward_fill(samples: &[Option<Coord>], covered: &[bool]) -> Vec<Option<Coord>> {
    let mut carried: Option<Coord> = None;
    samples
        .iter()
        .zip(covered)
        .map(|(sample, &is_covered)| {
            if !is_covered {
                carried = None;
                return None;
            }
            if sample.is_some() {
                carried = *sample;
            }
            carried
        })
        .collect()
}
