//! Great-circle distance helpers and distance-parameterized interpolation
//! along leg polylines.

/// A `[longitude, latitude]` pair in degrees.
pub type Coord = [f64; 2];

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Floor for a segment length so duplicate vertices never divide by zero.
const MIN_SEGMENT_M: f64 = 1e-9;

/// Great-circle distance in meters between two `[lon, lat]` points.
pub fn haversine(a: Coord, b: Coord) -> f64 {
    let d_lat = (b[1] - a[1]).to_radians();
    let d_lon = (b[0] - a[0]).to_radians();
    let x = (d_lat / 2.0).sin().powi(2)
        + a[1].to_radians().cos() * b[1].to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * x.sqrt().asin()
}

/// Running distance along `polyline`, same length as the input, starting at 0.
pub fn cumulative_distances(polyline: &[Coord]) -> Vec<f64> {
    let mut cum = Vec::with_capacity(polyline.len());
    if polyline.is_empty() {
        return cum;
    }

    let mut total = 0.0;
    cum.push(total);
    for pair in polyline.windows(2) {
        total += haversine(pair[0], pair[1]);
        cum.push(total);
    }
    cum
}

/// Point `target` meters along `polyline`.
///
/// Clamps to the first point at or below zero and to the last point at or
/// beyond the total length. Returns `None` only for an empty polyline.
pub fn interpolate_along(polyline: &[Coord], cum: &[f64], target: f64) -> Option<Coord> {
    let n = polyline.len().min(cum.len());
    if n == 0 {
        return None;
    }
    let total = cum[n - 1];
    if target <= 0.0 {
        return Some(polyline[0]);
    }
    if target >= total {
        return Some(polyline[n - 1]);
    }

    // First vertex at or past the target; cum[0] == 0 < target so this is >= 1.
    let i = cum[..n].partition_point(|d| *d < target).clamp(1, n - 1);
    let i0 = i - 1;
    let seg_len = (cum[i] - cum[i0]).max(MIN_SEGMENT_M);
    let t = (target - cum[i0]) / seg_len;
    let (a, b) = (polyline[i0], polyline[i]);
    Some([a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t])
}

/// A polyline with its cumulative distances computed once.
#[derive(Debug, Clone)]
pub struct MeasuredPolyline<'a> {
    points: &'a [Coord],
    cum: Vec<f64>,
}

impl<'a> MeasuredPolyline<'a> {
    pub fn new(points: &'a [Coord]) -> Self {
        Self {
            points,
            cum: cumulative_distances(points),
        }
    }

    pub fn total_length(&self) -> f64 {
        self.cum.last().copied().unwrap_or(0.0)
    }

    /// Point at fraction `p` of the total length, `p` clamped to `[0, 1]`.
    pub fn point_at_fraction(&self, p: f64) -> Option<Coord> {
        let p = p.clamp(0.0, 1.0);
        interpolate_along(self.points, &self.cum, self.total_length() * p)
    }

    pub fn last_point(&self) -> Option<Coord> {
        self.points.last().copied()
    }
}
