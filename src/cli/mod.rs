//! Driftwatch CLI Module
//!
//! Command-line interface for one-shot drift checks and for watching the
//! serving layer's prediction logs.

use clap::{Parser, Subcommand};
use colored::*;
use parking_lot::Mutex;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::MonitorConfig;
use crate::drift::{DriftMonitor, DriftReport, FeatureSchema, FeatureVector, RetrainDecision};
use crate::monitoring::{DriftAuditLog, DriftMetrics};
use crate::scheduler::spawn_evaluation_loop;
use crate::utils::data_loader::{parse_prediction_line, DataLoader, PredictionLogReader};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(240, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Feature drift monitoring and retraining triggers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a batch of observations against a reference dataset
    Evaluate {
        /// Reference data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        reference: PathBuf,

        /// Observations (CSV, JSON, Parquet, or a JSONL prediction log)
        #[arg(short, long)]
        observations: PathBuf,

        /// Monitored features, comma separated (default: numeric reference columns)
        #[arg(short, long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// Monitor configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Tail daily prediction logs and evaluate drift on a schedule
    Watch {
        /// Reference data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        reference: PathBuf,

        /// Directory holding predictions_YYYYMMDD.jsonl files
        #[arg(short, long)]
        log_dir: PathBuf,

        /// Monitored features, comma separated (default: numeric reference columns)
        #[arg(short, long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// Monitor configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Prometheus textfile updated after every evaluation
        #[arg(long)]
        metrics_file: Option<PathBuf>,

        /// Directory for the drift audit log (default: the log directory)
        #[arg(long)]
        audit_dir: Option<PathBuf>,

        /// Seconds between log polls
        #[arg(long, default_value = "5")]
        poll_secs: u64,
    },

    /// Print the effective monitor configuration
    Config {
        /// Monitor configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─── Shared setup ──────────────────────────────────────────────────────────────

/// Load the monitor configuration: a JSON file when given, otherwise the
/// environment.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<MonitorConfig> {
    let config = match path {
        Some(p) => MonitorConfig::from_json_file(p)?,
        None => MonitorConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Resolve the monitored features from the flag or the reference columns
fn resolve_schema(df: &DataFrame, features: Option<&[String]>) -> anyhow::Result<FeatureSchema> {
    let names: Vec<String> = match features {
        Some(f) => f.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        None => df
            .get_columns()
            .iter()
            .filter(|c| is_numeric(c.dtype()))
            .map(|c| c.name().to_string())
            .collect(),
    };
    Ok(FeatureSchema::new(names)?)
}

/// Build a monitor with its reference loaded
fn build_monitor(
    reference: &Path,
    features: Option<&[String]>,
    config: MonitorConfig,
) -> anyhow::Result<DriftMonitor> {
    let loader = DataLoader::new();

    step_run("Loading reference");
    let start = Instant::now();
    let df = loader.load_frame(reference)?;
    let schema = resolve_schema(&df, features)?;
    let dataset = DataLoader::reference_from_frame(&df, &schema)?;
    step_done(&format!(
        "{} rows × {} features in {:?}",
        dataset.n_rows(),
        schema.len(),
        start.elapsed()
    ));

    Ok(DriftMonitor::with_reference(config, schema, dataset)?)
}

/// Read observations from a tabular file or a JSONL prediction log
fn load_observations(path: &Path, schema: &FeatureSchema) -> anyhow::Result<Vec<FeatureVector>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("jsonl") {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);
        let mut vectors = Vec::new();
        let mut malformed = 0usize;
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            match parse_prediction_line(line, schema) {
                Some(v) => vectors.push(v),
                None => malformed += 1,
            }
        }
        if malformed > 0 {
            tracing::warn!(malformed, path = %path.display(), "Skipped malformed log lines");
        }
        return Ok(vectors);
    }

    let dataset = DataLoader::new().load_reference(path, schema)?;
    Ok((0..dataset.n_rows()).filter_map(|i| dataset.row(i)).collect())
}

fn write_metrics_file(path: &Path, metrics: &DriftMetrics) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    // Write then rename so scrapers never see a partial file
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, metrics.render_prometheus())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn print_report(report: &DriftReport) {
    println!();
    println!(
        "  {:<24} {:>10} {:>10} {:>8}",
        muted("Feature"),
        muted("Score"),
        muted("Threshold"),
        muted("Status")
    );
    println!("  {}", dim(&"─".repeat(56)));

    for f in &report.features {
        let status = if f.drifted { alert("drift") } else { ok("ok") };
        println!("  {:<24} {:>10.4} {:>10.4} {:>8}", f.feature, f.score, f.threshold, status);
    }

    println!("  {}", dim(&"─".repeat(56)));
    println!();
    println!("  {:<16} {}", muted("Overall"), format!("{:.4}", report.overall_score).white().bold());
    println!("  {:<16} {}", muted("Mean"), format!("{:.4}", report.mean_score).white());
    println!("  {:<16} {:.4}", muted("Threshold"), report.threshold);
    println!("  {:<16} {}", muted("Window"), report.window_size);
    let verdict = if report.drift_detected {
        alert("drift detected").bold()
    } else {
        ok("no drift")
    };
    println!("  {:<16} {}", muted("Verdict"), verdict);
}

fn print_decision(decision: &RetrainDecision) {
    if decision.should_retrain() {
        let reasons: Vec<String> = decision.reasons().iter().map(|r| r.to_string()).collect();
        println!(
            "  {} {} {}",
            alert("!"),
            "retraining recommended".white().bold(),
            dim(&format!("({})", reasons.join(", ")))
        );
    } else {
        println!("  {} {}", ok("✓"), "no retraining needed");
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_evaluate(
    reference: &Path,
    observations: &Path,
    features: Option<&[String]>,
    config_path: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    if !json {
        section("Evaluate");
    }

    let monitor = build_monitor(reference, features, config)?;

    if !json {
        step_run("Observing");
    }
    let vectors = load_observations(observations, monitor.schema())?;
    let (accepted, rejected) = monitor.observe_all(&vectors);
    if !json {
        step_done(&format!("{} accepted, {} rejected", accepted, rejected));
    }

    let report = monitor.evaluate()?;
    let decision = monitor.retrain_decision();

    if json {
        println!("{}", serde_json::to_string_pretty(report.as_ref())?);
        return Ok(());
    }

    print_report(&report);
    println!();
    print_decision(&decision);
    println!();
    Ok(())
}

pub async fn cmd_watch(
    reference: &Path,
    log_dir: &Path,
    features: Option<&[String]>,
    config_path: Option<&Path>,
    metrics_file: Option<&Path>,
    audit_dir: Option<&Path>,
    poll_secs: u64,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let interval = config.evaluation_interval;

    section("Watch");
    let monitor = Arc::new(build_monitor(reference, features, config)?);
    let audit = Arc::new(DriftAuditLog::in_dir(audit_dir.unwrap_or(log_dir))?);

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "driftwatch".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Logs    ", &log_dir.display().to_string()));
    line_box(&kv("Audit   ", &audit.path().display().to_string()));
    line_box(&kv("Interval", &format!("{}s", interval.as_secs_f64())));
    if let Some(path) = metrics_file {
        line_box(&kv("Metrics ", &path.display().to_string()));
    }
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let handle = spawn_evaluation_loop(Arc::clone(&monitor), interval, Some(Arc::clone(&audit)));
    let mut decisions = handle.decisions();
    let reader = Arc::new(Mutex::new(PredictionLogReader::new(log_dir, monitor.schema().clone())));
    let mut poll = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = poll.tick() => {
                let (reader, monitor) = (Arc::clone(&reader), Arc::clone(&monitor));
                let ingest = tokio::task::spawn_blocking(move || -> crate::Result<(usize, usize)> {
                    let vectors = reader.lock().read_new()?;
                    Ok(monitor.observe_all(&vectors))
                })
                .await;
                match ingest {
                    Ok(Ok((0, 0))) => {}
                    Ok(Ok((accepted, rejected))) => {
                        tracing::debug!(accepted, rejected, "Ingested prediction log entries");
                    }
                    Ok(Err(e)) => tracing::warn!(error = %e, "Failed to read prediction log"),
                    Err(e) => tracing::error!(error = %e, "Prediction log task panicked"),
                }
            }
            changed = decisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let decision = decisions.borrow_and_update().clone();
                if let Some(path) = metrics_file {
                    if let Err(e) = write_metrics_file(path, &monitor.metrics()) {
                        tracing::warn!(error = %e, path = %path.display(), "Failed to write metrics file");
                    }
                }
                if let Some(decision) = decision {
                    if let Some(report) = monitor.latest_report() {
                        println!(
                            "  {} {} {}",
                            accent("›"),
                            report.timestamp.format("%H:%M:%S"),
                            dim(&format!(
                                "score {:.4} · {} drifted · window {}",
                                report.overall_score,
                                report.n_drifted(),
                                report.window_size
                            ))
                        );
                    }
                    if decision.should_retrain() {
                        print_decision(&decision);
                    }
                }
            }
        }
    }

    println!();
    println!("  {}", dim("stopping"));
    handle.shutdown().await;
    let malformed = reader.lock().malformed_lines();
    if malformed > 0 {
        println!("  {:<16} {}", muted("Malformed"), malformed);
    }
    println!();
    Ok(())
}

pub fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
