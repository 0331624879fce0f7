//! Call-level errors raised by the reconstruction engine.
//!
//! Individual legs never produce an error: malformed input is dropped and
//! counted. Only parameters that make the output impossible to shape end up here.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("window length must be positive, got {length_ms} ms")]
    NonPositiveWindow { length_ms: i64 },
    #[error("window of {length_ms} ms exceeds the {max_ms} ms limit")]
    WindowTooLong { length_ms: i64, max_ms: i64 },
    #[error("window start/length must be finite numbers")]
    NonFiniteWindow,
    #[error("window start is outside the supported epoch range (start {start_ms} ms, length {length_ms} ms)")]
    WindowOverflow { start_ms: i64, length_ms: i64 },
    #[error("contiguity gap must not be negative, got {gap_ms} ms")]
    NegativeGap { gap_ms: i64 },
    #[error("no local midnight exists for {0}")]
    InvalidDate(String),
}
