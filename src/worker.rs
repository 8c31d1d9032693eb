use crate::model::{Config, Sample};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// HTTP client for probe traffic. One per caller so callers share nothing,
/// not even a connection pool.
pub fn probe_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("perfsmoke/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// One virtual caller: GET, record, sleep, until the shared deadline.
///
/// Transport failures become failed samples, never errors; the run always
/// continues. A timeout records the configured timeout as its latency, since
/// the probe provably took at least that long.
pub async fn worker(
    rank: usize,
    client: reqwest::Client,
    config: Config,
    deadline: Instant,
    tx: mpsc::Sender<Sample>,
) {
    while Instant::now() < deadline {
        let started = Instant::now();
        let result = client
            .get(&config.target)
            .timeout(config.timeout())
            .send()
            .await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let sample = match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                Sample {
                    at: Utc::now(),
                    latency_ms: elapsed_ms,
                    success: status == config.expected_status,
                    status: status.to_string(),
                }
            }
            Err(err) if err.is_timeout() => {
                debug!(caller = rank, timeout_ms = config.timeout_ms, "probe timed out");
                Sample {
                    at: Utc::now(),
                    latency_ms: config.timeout_ms as f64,
                    success: false,
                    status: "TIMEOUT".to_string(),
                }
            }
            Err(err) => {
                debug!(caller = rank, error = %err, "probe failed");
                Sample {
                    at: Utc::now(),
                    latency_ms: elapsed_ms,
                    success: false,
                    status: "ERROR".to_string(),
                }
            }
        };

        // Collector gone means the run is being torn down.
        if tx.send(sample).await.is_err() {
            break;
        }

        tokio::time::sleep(config.sleep()).await;
    }
}
