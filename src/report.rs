use crate::metrics::{RunMetrics, Verdict};
use crate::model::{Config, Slo};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Results land here unless overridden; overwritten on every run.
pub const DEFAULT_RESULTS_PATH: &str = "results/perf-summary.json";

/// Full raw dump written at the end of a run, for downstream inspection
/// and for `gate` re-evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub config: Config,
    pub metrics: RunMetrics,
    pub verdict: Verdict,
}

/// The one line a quiet run prints to stdout. Format is load-bearing:
/// downstream pipelines parse it.
pub fn summary_line(metrics: &RunMetrics, slo: &Slo) -> String {
    format!(
        "Perf summary: p95={:.0}ms errors={:.2}% (SLO: p95<{:.0}ms, err<{:.0}%)",
        metrics.p95_ms,
        metrics.error_rate * 100.0,
        slo.p95_ms,
        slo.error_rate * 100.0,
    )
}

/// Write the record as pretty JSON, creating the parent directory as needed.
/// Failure here is fatal for the run: without the file there is no evidence.
pub fn write_results(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating results directory {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(record).context("serializing run record")?;
    fs::write(path, json).with_context(|| format!("writing results file {}", path.display()))
}

pub fn read_results(path: &Path) -> Result<RunRecord> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading results file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing results file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate;
    use crate::model::Sample;
    use chrono::Utc;

    fn metrics_with(p95_source_ms: f64, failures: usize, total: usize) -> RunMetrics {
        let samples: Vec<Sample> = (0..total)
            .map(|i| Sample {
                at: Utc::now(),
                latency_ms: p95_source_ms,
                success: i >= failures,
                status: "200".to_string(),
            })
            .collect();
        aggregate(&samples, 60)
    }

    #[test]
    fn summary_line_is_byte_stable() {
        let metrics = metrics_with(123.0, 5, 100);
        let slo = Slo {
            p95_ms: 2000.0,
            error_rate: 0.02,
        };
        assert_eq!(
            summary_line(&metrics, &slo),
            "Perf summary: p95=123ms errors=5.00% (SLO: p95<2000ms, err<2%)"
        );
    }

    #[test]
    fn summary_line_rounds_p95_to_nearest_ms() {
        let metrics = metrics_with(123.6, 0, 10);
        let slo = Slo {
            p95_ms: 1500.0,
            error_rate: 0.05,
        };
        assert_eq!(
            summary_line(&metrics, &slo),
            "Perf summary: p95=124ms errors=0.00% (SLO: p95<1500ms, err<5%)"
        );
    }

    fn record() -> RunRecord {
        RunRecord {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            config: Config {
                target: "http://localhost:8080/".to_string(),
                expected_status: 200,
                duration_s: 60,
                vus: 1,
                timeout_ms: 4000,
                sleep_ms: 1000,
                slo: Slo {
                    p95_ms: 2000.0,
                    error_rate: 0.02,
                },
            },
            metrics: metrics_with(100.0, 0, 10),
            verdict: Verdict {
                p95_ok: true,
                err_ok: true,
            },
        }
    }

    #[test]
    fn results_file_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("perf-summary.json");

        write_results(&path, &record()).unwrap();
        let first = read_results(&path).unwrap();
        assert_eq!(first.metrics.total_requests, 10);
        assert!(first.verdict.passed());

        let mut second = record();
        second.metrics = metrics_with(300.0, 10, 10);
        write_results(&path, &second).unwrap();
        let reread = read_results(&path).unwrap();
        assert_eq!(reread.metrics.error_rate, 1.0);
    }

    #[test]
    fn unwritable_results_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let path = blocker.join("perf-summary.json");
        assert!(write_results(&path, &record()).is_err());
    }
}
