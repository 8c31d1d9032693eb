use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use perfsmoke::metrics::{aggregate, evaluate};
use perfsmoke::model::{Config, Slo};
use perfsmoke::report::{self, RunRecord, DEFAULT_RESULTS_PATH};
use perfsmoke::worker;

#[derive(Parser, Debug)]
#[command(name = "perfsmoke")]
#[command(author, version, about = "Micro latency/availability smoke check", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the target and gate the run against its SLOs
    Run(RunArgs),
    /// Re-evaluate a previously written results file
    Gate(GateArgs),
}

#[derive(Args, Debug)]
struct SloArgs {
    /// p95 latency ceiling in milliseconds
    #[arg(long = "p95-ms", env = "PERF_P95_MS", default_value_t = 2000.0)]
    p95_ms: f64,

    /// Error-rate ceiling as a fraction (0..=1)
    #[arg(long = "err-rate", env = "PERF_ERR_RATE", default_value_t = 0.02)]
    err_rate: f64,
}

impl SloArgs {
    fn to_slo(&self) -> Slo {
        Slo {
            p95_ms: self.p95_ms,
            error_rate: self.err_rate,
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Target URL, probed once per iteration
    #[arg(
        long,
        env = "PERF_TARGET",
        default_value = "https://jsonplaceholder.typicode.com/posts/1"
    )]
    target: String,

    /// Wall-clock duration of the run in seconds
    #[arg(short, long, env = "PERF_DURATION_S", default_value_t = 60)]
    duration: u64,

    /// Number of virtual callers
    #[arg(short = 'u', long, env = "PERF_VUS", default_value_t = 1)]
    vus: usize,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "PERF_TIMEOUT_MS", default_value_t = 4000)]
    timeout_ms: u64,

    /// Pacing sleep between iterations in milliseconds
    #[arg(long, env = "PERF_SLEEP_MS", default_value_t = 1000)]
    sleep_ms: u64,

    /// HTTP status counted as success
    #[arg(long, env = "PERF_EXPECT_STATUS", default_value_t = 200)]
    expect_status: u16,

    #[command(flatten)]
    slo: SloArgs,

    /// Where to write the structured results dump
    #[arg(long, env = "PERF_RESULTS", default_value = DEFAULT_RESULTS_PATH)]
    results: PathBuf,

    /// Suppress progress output; stdout carries only the summary line
    #[arg(short, long, env = "PERF_QUIET")]
    quiet: bool,
}

#[derive(Args, Debug)]
struct GateArgs {
    /// Results file to evaluate
    #[arg(long, env = "PERF_RESULTS", default_value = DEFAULT_RESULTS_PATH)]
    results: PathBuf,

    #[command(flatten)]
    slo: SloArgs,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let code = match cli.command {
        Command::Run(args) => run(args).await?,
        Command::Gate(args) => gate(args)?,
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<i32> {
    let config = Config {
        target: args.target,
        expected_status: args.expect_status,
        duration_s: args.duration,
        vus: args.vus,
        timeout_ms: args.timeout_ms,
        sleep_ms: args.sleep_ms,
        slo: args.slo.to_slo(),
    };
    config.validate().context("invalid configuration")?;

    let (tx, mut rx) = mpsc::channel(100);
    let deadline = Instant::now() + config.duration();

    let mut set = JoinSet::new();
    for rank in 0..config.vus {
        let client = worker::probe_client().context("building HTTP client")?;
        set.spawn(worker::worker(
            rank,
            client,
            config.clone(),
            deadline,
            tx.clone(),
        ));
    }
    drop(tx);

    let progress = if args.quiet {
        None
    } else {
        let sty = ProgressStyle::with_template("{spinner} {elapsed_precise} {msg}").unwrap();
        let pb = ProgressBar::new_spinner();
        pb.set_style(sty);
        Some(pb)
    };

    // Collector ends when every caller has dropped its sender; awaiting it
    // after the JoinSet drains is the whole-run aggregation barrier.
    let collector = tokio::spawn(async move {
        let mut samples = Vec::new();
        let mut failures = 0u64;
        while let Some(sample) = rx.recv().await {
            if !sample.success {
                failures += 1;
            }
            samples.push(sample);
            if let Some(pb) = &progress {
                pb.set_message(format!("{} samples, {} failed", samples.len(), failures));
                pb.tick();
            }
        }
        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        samples
    });

    while set.join_next().await.is_some() {}
    let samples = collector.await.context("sample collector failed")?;

    let metrics = aggregate(&samples, config.duration_s);
    let verdict = evaluate(&metrics, &config.slo);

    let record = RunRecord {
        timestamp: Utc::now().to_rfc3339(),
        config: config.clone(),
        metrics: metrics.clone(),
        verdict,
    };
    report::write_results(&args.results, &record)?;

    println!("{}", report::summary_line(&metrics, &config.slo));
    Ok(if verdict.passed() { 0 } else { 1 })
}

fn gate(args: GateArgs) -> Result<i32> {
    if !args.results.exists() {
        // Non-blocking when the perf job never ran; the gate only judges
        // evidence that exists.
        eprintln!(
            "warning: no results file at {}, skipping gate",
            args.results.display()
        );
        return Ok(0);
    }

    let record = report::read_results(&args.results)?;
    let slo = args.slo.to_slo();
    let verdict = evaluate(&record.metrics, &slo);

    println!("{}", report::summary_line(&record.metrics, &slo));
    println!("gate p95: {}", if verdict.p95_ok { "PASS" } else { "FAIL" });
    println!("gate err: {}", if verdict.err_ok { "PASS" } else { "FAIL" });
    Ok(if verdict.passed() { 0 } else { 1 })
}
