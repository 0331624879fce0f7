use chrono::{FixedOffset, NaiveDate, TimeZone};

use crate::error::EngineError;
use crate::ingest::MAX_EPOCH_MS;

pub const MS_PER_SEC: i64 = 1000;
pub const DEFAULT_WINDOW_MS: i64 = 24 * 3600 * MS_PER_SEC;
/// Longest window accepted; every per-second array is allocated up front.
pub const MAX_WINDOW_MS: i64 = 7 * DEFAULT_WINDOW_MS;

/// The reconstructed time span, sampled once per second.
///
/// Sample `i` sits at `start_ms + i * 1000`; there are `total_secs() + 1`
/// samples so the window end itself is addressable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    start_ms: i64,
    length_ms: i64,
}

impl Window {
    pub fn new(start_ms: i64, length_ms: i64) -> Result<Self, EngineError> {
        if length_ms <= 0 {
            return Err(EngineError::NonPositiveWindow { length_ms });
        }
        if length_ms > MAX_WINDOW_MS {
            return Err(EngineError::WindowTooLong {
                length_ms,
                max_ms: MAX_WINDOW_MS,
            });
        }
        if !(-MAX_EPOCH_MS..MAX_EPOCH_MS).contains(&start_ms) {
            return Err(EngineError::WindowOverflow {
                start_ms,
                length_ms,
            });
        }
        Ok(Self {
            start_ms,
            length_ms,
        })
    }

    /// A 24-hour window starting at `start_ms`.
    pub fn day(start_ms: i64) -> Result<Self, EngineError> {
        Self::new(start_ms, DEFAULT_WINDOW_MS)
    }

    /// For callers holding JSON-style floating point milliseconds.
    pub fn from_f64(start_ms: f64, length_ms: f64) -> Result<Self, EngineError> {
        if !start_ms.is_finite() || !length_ms.is_finite() {
            return Err(EngineError::NonFiniteWindow);
        }
        if start_ms.abs() >= i64::MAX as f64 || length_ms.abs() >= i64::MAX as f64 {
            return Err(EngineError::NonFiniteWindow);
        }
        Self::new(start_ms.round() as i64, length_ms.round() as i64)
    }

    /// Window starting at local midnight of `date` in `offset`.
    pub fn local_midnight(
        date: NaiveDate,
        offset: &FixedOffset,
        length_ms: i64,
    ) -> Result<Self, EngineError> {
        let start = date
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| offset.from_local_datetime(&midnight).single())
            .ok_or_else(|| EngineError::InvalidDate(date.to_string()))?;
        Self::new(start.timestamp_millis(), length_ms)
    }

    pub fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> i64 {
        self.start_ms + self.length_ms
    }

    pub fn length_ms(&self) -> i64 {
        self.length_ms
    }

    /// Whole seconds in the window, rounded to nearest.
    pub fn total_secs(&self) -> usize {
        ((self.length_ms + MS_PER_SEC / 2) / MS_PER_SEC) as usize
    }

    /// Length of every per-second array.
    pub fn sample_count(&self) -> usize {
        self.total_secs() + 1
    }

    pub fn second_ms(&self, index: usize) -> i64 {
        self.start_ms + index as i64 * MS_PER_SEC
    }

    /// Index of the last sample at or before `ms`; may be out of range.
    pub fn floor_index(&self, ms: i64) -> i64 {
        ms.saturating_sub(self.start_ms).div_euclid(MS_PER_SEC)
    }

    /// Index of the first sample at or after `ms`; may be out of range.
    pub fn ceil_index(&self, ms: i64) -> i64 {
        -self.start_ms.saturating_sub(ms).div_euclid(MS_PER_SEC)
    }

    /// `floor_index` when it lands on an existing sample.
    pub fn sample_index(&self, ms: i64) -> Option<usize> {
        let i = self.floor_index(ms);
        (0..self.sample_count() as i64)
            .contains(&i)
            .then_some(i as usize)
    }

    /// Whether `[from_ms, to_ms]` touches the window at all.
    pub fn overlaps(&self, from_ms: i64, to_ms: i64) -> bool {
        from_ms <= self.end_ms() && to_ms >= self.start_ms
    }
}
