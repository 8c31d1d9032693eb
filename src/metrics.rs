use crate::model::{Sample, Slo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whole-run aggregate, computed once after every caller has exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// failed / total, in 0..=1. Zero when no samples were recorded.
    pub error_rate: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Requests per second over the configured run duration.
    pub throughput_rps: f64,
    pub status_counts: BTreeMap<String, u64>,
}

/// Pass/fail per threshold plus the combined result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub p95_ok: bool,
    pub err_ok: bool,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.p95_ok && self.err_ok
    }
}

/// Nearest-rank percentile: `sorted[ceil(q/100 * n) - 1]`.
///
/// No interpolation; the result is always an observed latency. Returns 0 for
/// an empty slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((q / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Aggregate the full sample set. Deterministic for a fixed input.
pub fn aggregate(samples: &[Sample], duration_s: u64) -> RunMetrics {
    let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let total = samples.len() as u64;
    let failed = samples.iter().filter(|s| !s.success).count() as u64;

    let mut status_counts = BTreeMap::new();
    for sample in samples {
        *status_counts.entry(sample.status.clone()).or_insert(0) += 1;
    }

    let sum: f64 = latencies.iter().sum();
    RunMetrics {
        total_requests: total,
        successful_requests: total - failed,
        failed_requests: failed,
        error_rate: if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64
        },
        min_ms: latencies.first().copied().unwrap_or(0.0),
        max_ms: latencies.last().copied().unwrap_or(0.0),
        mean_ms: if total == 0 { 0.0 } else { sum / total as f64 },
        p50_ms: percentile(&latencies, 50.0),
        p90_ms: percentile(&latencies, 90.0),
        p95_ms: percentile(&latencies, 95.0),
        p99_ms: percentile(&latencies, 99.0),
        throughput_rps: if duration_s == 0 {
            0.0
        } else {
            total as f64 / duration_s as f64
        },
        status_counts,
    }
}

/// Strict-less-than comparison against both ceilings; a breach is a verdict,
/// not an error.
pub fn evaluate(metrics: &RunMetrics, slo: &Slo) -> Verdict {
    Verdict {
        p95_ok: metrics.p95_ms < slo.p95_ms,
        err_ok: metrics.error_rate < slo.error_rate,
    }
}
