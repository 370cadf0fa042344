//! Blends elapsed-time and source-reported progress into one gauge.
//!
//! Only one of the two discovery mechanisms reports real progress, and
//! it may be silent, erratic, or regress. The blend keeps a floor
//! derived from elapsed time — `min(elapsed / total, 0.95)` — and
//! combines it with the last reported value as `max(floor, reported)`.
//! The published value never decreases within one scan; `complete()`
//! forces it to 1.0 at finalize.

use std::time::Duration;

/// Elapsed time alone never claims more than this; the final 5% is
/// reserved for actual completion.
const ELAPSED_CEILING: f64 = 0.95;

/// Monotonic progress gauge for one scan session.
#[derive(Debug, Clone)]
pub struct ProgressBlend {
    total: Duration,
    floor: f64,
    reported: f64,
    combined: f64,
}

impl ProgressBlend {
    /// `total` is the scan duration the elapsed floor is measured
    /// against (the longest source timeout).
    pub fn new(total: Duration) -> Self {
        Self {
            total,
            floor: 0.0,
            reported: 0.0,
            combined: 0.0,
        }
    }

    /// Recomputes the elapsed-time floor. Returns the combined value.
    pub fn on_tick(&mut self, elapsed: Duration) -> f64 {
        let ratio = if self.total.is_zero() {
            ELAPSED_CEILING
        } else {
            (elapsed.as_secs_f64() / self.total.as_secs_f64()).min(ELAPSED_CEILING)
        };
        // The floor never moves backwards, whatever elapsed we are fed.
        self.floor = self.floor.max(ratio);
        self.recombine()
    }

    /// Folds in a source-reported value in [0, 1]. Returns the
    /// combined value.
    pub fn on_report(&mut self, value: f64) -> f64 {
        self.reported = value.clamp(0.0, 1.0);
        self.recombine()
    }

    /// Forces the gauge to 1.0.
    pub fn complete(&mut self) -> f64 {
        self.combined = 1.0;
        self.combined
    }

    /// The current combined value.
    pub fn value(&self) -> f64 {
        self.combined
    }

    fn recombine(&mut self) -> f64 {
        self.combined = self.combined.max(self.floor.max(self.reported));
        self.combined
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
