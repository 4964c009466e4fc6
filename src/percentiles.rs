//! Percentile latency tracking using HDR Histogram.
//!
//! Latencies are stored in microseconds, from 1μs up to one hour, with three
//! significant digits. Slow chat completions routinely take minutes, so the
//! upper bound is far above the default response-time limit.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use tracing::warn;

const MIN_LATENCY_US: u64 = 1;
const MAX_LATENCY_US: u64 = 3_600_000_000;

/// Percentile statistics for a set of latency measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileStats {
    /// Number of samples
    pub count: u64,

    /// Minimum value (microseconds)
    pub min: u64,

    /// Maximum value (microseconds)
    pub max: u64,

    /// Mean value (microseconds)
    pub mean: f64,

    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub p99_9: u64,
}

impl PercentileStats {
    /// Format statistics as a human-readable string, in milliseconds.
    pub fn format(&self) -> String {
        format!(
            "count={}, min={:.0}ms, max={:.0}ms, mean={:.0}ms, p50={:.0}ms, p90={:.0}ms, p95={:.0}ms, p99={:.0}ms, p99.9={:.0}ms",
            self.count,
            us_to_ms(self.min),
            us_to_ms(self.max),
            self.mean / 1000.0,
            us_to_ms(self.p50),
            us_to_ms(self.p90),
            us_to_ms(self.p95),
            us_to_ms(self.p99),
            us_to_ms(self.p99_9),
        )
    }
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

/// Thread-safe latency histogram.
pub struct PercentileTracker {
    histogram: Mutex<Histogram<u64>>,
}

impl PercentileTracker {
    pub fn new() -> Self {
        // Bounds are constants that satisfy hdrhistogram's constraints (low >= 1, high >= 2 * low).
        let histogram = Histogram::new_with_bounds(MIN_LATENCY_US, MAX_LATENCY_US, 3)
            .expect("histogram bounds are valid");

        Self {
            histogram: Mutex::new(histogram),
        }
    }

    /// Record one latency. Values outside the tracked range are clamped.
    pub fn record(&self, latency: Duration) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        let clamped = latency_us.clamp(MIN_LATENCY_US, MAX_LATENCY_US);

        let mut hist = match self.histogram.lock() {
            Ok(hist) => hist,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = hist.record(clamped) {
            warn!(
                latency_us = latency_us,
                error = %e,
                "Failed to record latency in histogram"
            );
        }
    }

    /// Current statistics, or None if nothing has been recorded.
    pub fn stats(&self) -> Option<PercentileStats> {
        let hist = match self.histogram.lock() {
            Ok(hist) => hist,
            Err(poisoned) => poisoned.into_inner(),
        };

        if hist.is_empty() {
            return None;
        }

        Some(PercentileStats {
            count: hist.len(),
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p90: hist.value_at_quantile(0.90),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            p99_9: hist.value_at_quantile(0.999),
        })
    }
}

impl Default for PercentileTracker {
    fn default() -> Self {
        Self::new()
    }
}
