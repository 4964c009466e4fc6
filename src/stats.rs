//! Run-level aggregation of tracked outcomes.
//!
//! One [`StatsRecorder`] is shared by all actors. Every tracked call lands
//! here exactly once and is mirrored into the Prometheus metrics; untracked
//! cleanup calls never reach it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::metrics::{REQUESTS_TOTAL, REQUEST_DURATION_SECONDS, REQUEST_FAILURES_TOTAL};
use crate::outcome::OutcomeRecord;
use crate::percentiles::{PercentileStats, PercentileTracker};

#[derive(Default)]
struct RequestEntry {
    num_requests: u64,
    num_failures: u64,
    total_time: Duration,
    failures: BTreeMap<String, u64>,
    latencies: PercentileTracker,
}

/// Point-in-time copy of the stats for one request name.
#[derive(Debug, Clone)]
pub struct RequestStats {
    pub request: String,
    pub num_requests: u64,
    pub num_failures: u64,
    pub avg_time_ms: f64,
    /// Requests per second since the recorder was created
    pub rps: f64,
    /// Failure reason text → occurrences
    pub failures: BTreeMap<String, u64>,
    pub percentiles: Option<PercentileStats>,
}

impl RequestStats {
    pub fn failure_ratio(&self) -> f64 {
        if self.num_requests == 0 {
            0.0
        } else {
            self.num_failures as f64 / self.num_requests as f64
        }
    }

    /// Format as a table row of the request report.
    pub fn format_table_row(&self) -> String {
        let (p50, p95, p99, max) = match &self.percentiles {
            Some(p) => (
                p.p50 as f64 / 1000.0,
                p.p95 as f64 / 1000.0,
                p.p99 as f64 / 1000.0,
                p.max as f64 / 1000.0,
            ),
            None => (0.0, 0.0, 0.0, 0.0),
        };
        format!(
            "{:<32} {:>8} {:>8} {:>7.2}% {:>10.0} {:>10.0} {:>10.0} {:>10.0} {:>10.0} {:>8.2}",
            self.request,
            self.num_requests,
            self.num_failures,
            self.failure_ratio() * 100.0,
            self.avg_time_ms,
            p50,
            p95,
            p99,
            max,
            self.rps,
        )
    }
}

/// Thread-safe recorder of tracked outcomes.
pub struct StatsRecorder {
    start_time: Instant,
    entries: Mutex<HashMap<&'static str, Arc<Mutex<RequestEntry>>>>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record one tracked outcome.
    pub fn record(&self, outcome: &OutcomeRecord) {
        let outcome_label = if outcome.success() { "success" } else { "failure" };
        REQUESTS_TOTAL
            .with_label_values(&[outcome.request, outcome_label])
            .inc();
        REQUEST_DURATION_SECONDS
            .with_label_values(&[outcome.request])
            .observe(outcome.elapsed.as_secs_f64());
        if let Some(reason) = outcome.failure_reason() {
            REQUEST_FAILURES_TOTAL
                .with_label_values(&[outcome.request, reason.category().label()])
                .inc();
        }

        let entry = {
            let mut entries = lock(&self.entries);
            entries.entry(outcome.request).or_default().clone()
        };

        let mut entry = lock(&entry);
        entry.num_requests += 1;
        entry.total_time += outcome.elapsed;
        entry.latencies.record(outcome.elapsed);
        if let Some(reason) = outcome.failure_reason() {
            entry.num_failures += 1;
            *entry.failures.entry(reason.to_string()).or_insert(0) += 1;
        }

        debug!(
            request = outcome.request,
            status_code = ?outcome.status_code,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            success = outcome.success(),
            "Recorded outcome"
        );
    }

    /// Stats for one request name.
    pub fn stats(&self, request: &str) -> Option<RequestStats> {
        let entry = lock(&self.entries).get(request).cloned()?;
        let entry = lock(&entry);
        Some(self.snapshot(request, &entry))
    }

    /// Stats for every request name, sorted by name.
    pub fn all_stats(&self) -> Vec<RequestStats> {
        let entries: Vec<(&'static str, Arc<Mutex<RequestEntry>>)> = lock(&self.entries)
            .iter()
            .map(|(name, entry)| (*name, entry.clone()))
            .collect();

        let mut stats: Vec<RequestStats> = entries
            .iter()
            .map(|(name, entry)| self.snapshot(name, &lock(entry)))
            .collect();
        stats.sort_by(|a, b| a.request.cmp(&b.request));
        stats
    }

    /// Total tracked requests across all names.
    pub fn total_requests(&self) -> u64 {
        self.all_stats().iter().map(|s| s.num_requests).sum()
    }

    fn snapshot(&self, request: &str, entry: &RequestEntry) -> RequestStats {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        RequestStats {
            request: request.to_string(),
            num_requests: entry.num_requests,
            num_failures: entry.num_failures,
            avg_time_ms: if entry.num_requests > 0 {
                entry.total_time.as_secs_f64() * 1000.0 / entry.num_requests as f64
            } else {
                0.0
            },
            rps: if elapsed > 0.0 {
                entry.num_requests as f64 / elapsed
            } else {
                0.0
            },
            failures: entry.failures.clone(),
            percentiles: entry.latencies.stats(),
        }
    }

    /// Renders the request table and the failure table.
    pub fn format_report(&self) -> String {
        let stats = self.all_stats();
        let mut out = String::new();

        out.push_str(&format!(
            "{:<32} {:>8} {:>8} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}\n",
            "Request", "# reqs", "# fails", "fail %", "avg (ms)", "p50 (ms)", "p95 (ms)", "p99 (ms)", "max (ms)", "req/s"
        ));
        out.push_str(&format!("{}\n", "-".repeat(128)));
        for s in &stats {
            out.push_str(&s.format_table_row());
            out.push('\n');
        }

        let latencies: Vec<(&str, &PercentileStats)> = stats
            .iter()
            .filter_map(|s| s.percentiles.as_ref().map(|p| (s.request.as_str(), p)))
            .collect();
        if !latencies.is_empty() {
            out.push_str("\nLatency percentiles:\n");
            for (request, percentiles) in latencies {
                out.push_str(&format!("  {:<32} {}\n", request, percentiles.format()));
            }
        }

        let failures: Vec<(&str, &String, u64)> = stats
            .iter()
            .flat_map(|s| {
                s.failures
                    .iter()
                    .map(move |(reason, count)| (s.request.as_str(), reason, *count))
            })
            .collect();

        if !failures.is_empty() {
            out.push_str("\nFailures:\n");
            out.push_str(&format!("{:>8}  {:<32} {}\n", "# occ", "Request", "Reason"));
            out.push_str(&format!("{}\n", "-".repeat(80)));
            for (request, reason, count) in failures {
                out.push_str(&format!("{:>8}  {:<32} {}\n", count, request, reason));
            }
        }

        out
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureReason;

    fn outcome(request: &'static str, ms: u64, result: Result<(), FailureReason>) -> OutcomeRecord {
        OutcomeRecord {
            request,
            elapsed: Duration::from_millis(ms),
            status_code: Some(200),
            result,
        }
    }

    #[test]
    fn test_counts_successes_and_failures() {
        let recorder = StatsRecorder::new();
        recorder.record(&outcome("POST /a", 10, Ok(())));
        recorder.record(&outcome("POST /a", 30, Err(FailureReason::Status(500))));
        recorder.record(&outcome("POST /a", 20, Err(FailureReason::Status(500))));

        let stats = recorder.stats("POST /a").unwrap();
        assert_eq!(stats.num_requests, 3);
        assert_eq!(stats.num_failures, 2);
        assert_eq!(stats.failures.get("Status: 500"), Some(&2));
        assert!((stats.avg_time_ms - 20.0).abs() < 0.01);
        assert_eq!(stats.percentiles.unwrap().count, 3);
    }

    #[test]
    fn test_unknown_request_has_no_stats() {
        assert!(StatsRecorder::new().stats("GET /nothing").is_none());
    }

    #[test]
    fn test_all_stats_sorted_and_totalled() {
        let recorder = StatsRecorder::new();
        recorder.record(&outcome("POST /b", 5, Ok(())));
        recorder.record(&outcome("POST /a", 5, Ok(())));
        recorder.record(&outcome("POST /a", 5, Ok(())));

        let names: Vec<String> = recorder.all_stats().into_iter().map(|s| s.request).collect();
        assert_eq!(names, vec!["POST /a".to_string(), "POST /b".to_string()]);
        assert_eq!(recorder.total_requests(), 3);
    }

    #[test]
    fn test_report_lists_failure_reasons() {
        let recorder = StatsRecorder::new();
        recorder.record(&outcome("POST /api/v1/files/", 5, Err(FailureReason::MissingFileId)));

        let report = recorder.format_report();
        assert!(report.contains("POST /api/v1/files/"), "{}", report);
        assert!(report.contains("No file_id in response"), "{}", report);
    }

    #[test]
    fn test_report_lists_all_percentiles() {
        let recorder = StatsRecorder::new();
        for ms in [100, 200, 300] {
            recorder.record(&outcome("POST /api/chat/completions", ms, Ok(())));
        }

        let report = recorder.format_report();
        assert!(report.contains("Latency percentiles:"), "{}", report);
        for label in ["p50=", "p90=", "p95=", "p99=", "p99.9=", "max="] {
            assert!(report.contains(label), "missing {} in {}", label, report);
        }
    }

    #[test]
    fn test_empty_report_has_no_percentile_section() {
        let report = StatsRecorder::new().format_report();
        assert!(!report.contains("Latency percentiles:"), "{}", report);
    }

    #[test]
    fn test_failure_ratio() {
        let recorder = StatsRecorder::new();
        recorder.record(&outcome("POST /a", 5, Ok(())));
        recorder.record(&outcome("POST /a", 5, Err(FailureReason::MissingFileId)));
        let stats = recorder.stats("POST /a").unwrap();
        assert!((stats.failure_ratio() - 0.5).abs() < f64::EPSILON);
    }
}
