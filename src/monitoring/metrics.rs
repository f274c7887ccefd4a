//! Drift Metrics
//!
//! Gauges and counters exported by a drift monitor. Gauges that change
//! together on evaluation share one lock; hot-path counters are atomics so
//! `observe` never contends with a scrape.

use crate::drift::DriftReport;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Gauges replaced as a unit at the end of each evaluation
#[derive(Debug, Default)]
struct GaugeState {
    feature_scores: BTreeMap<String, f64>,
    overall_score: f64,
    drifted_features: usize,
    drift_detected: bool,
    last_evaluation_secs: f64,
}

/// Metrics owned by one monitor and shared with whatever exports them
#[derive(Debug, Default)]
pub struct DriftMetrics {
    gauges: RwLock<GaugeState>,

    // Lock-free counters
    drift_events_total: AtomicU64,
    observations_total: AtomicU64,
    observations_rejected_total: AtomicU64,
    evaluations_total: AtomicU64,
    evaluation_failures_total: AtomicU64,
    window_size: AtomicU64,
}

impl DriftMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted observation and the resulting window size
    pub fn record_observation(&self, window_size: usize) {
        self.observations_total.fetch_add(1, Ordering::Relaxed);
        self.window_size.store(window_size as u64, Ordering::Relaxed);
    }

    /// Record a rejected observation
    pub fn record_rejection(&self) {
        self.observations_rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish a completed evaluation.
    ///
    /// Returns `true` when this report starts a new drift event, i.e. the
    /// previous verdict was "no drift". The event counter only moves on that
    /// transition, so sustained drift counts once.
    pub fn record_report(&self, report: &DriftReport, elapsed: Duration) -> bool {
        let mut gauges = self.gauges.write();
        let new_event = report.drift_detected && !gauges.drift_detected;

        gauges.feature_scores = report
            .features
            .iter()
            .map(|f| (f.feature.clone(), f.score))
            .collect();
        gauges.overall_score = report.overall_score;
        gauges.drifted_features = report.n_drifted();
        gauges.drift_detected = report.drift_detected;
        gauges.last_evaluation_secs = elapsed.as_secs_f64();

        if new_event {
            self.drift_events_total.fetch_add(1, Ordering::Relaxed);
        }
        self.evaluations_total.fetch_add(1, Ordering::Relaxed);
        new_event
    }

    /// Record an evaluation that produced no report. Gauges keep their
    /// last-known-good values.
    pub fn record_evaluation_failure(&self) {
        self.evaluation_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Forget the current verdict after a reference reset
    pub fn clear_verdict(&self) {
        let mut gauges = self.gauges.write();
        gauges.feature_scores.clear();
        gauges.overall_score = 0.0;
        gauges.drifted_features = 0;
        gauges.drift_detected = false;
        self.window_size.store(0, Ordering::Relaxed);
    }

    pub fn drift_events_total(&self) -> u64 {
        self.drift_events_total.load(Ordering::Relaxed)
    }

    pub fn observations_total(&self) -> u64 {
        self.observations_total.load(Ordering::Relaxed)
    }

    pub fn observations_rejected_total(&self) -> u64 {
        self.observations_rejected_total.load(Ordering::Relaxed)
    }

    pub fn evaluations_total(&self) -> u64 {
        self.evaluations_total.load(Ordering::Relaxed)
    }

    pub fn evaluation_failures_total(&self) -> u64 {
        self.evaluation_failures_total.load(Ordering::Relaxed)
    }

    pub fn drift_detected(&self) -> bool {
        self.gauges.read().drift_detected
    }

    pub fn drifted_features(&self) -> usize {
        self.gauges.read().drifted_features
    }

    pub fn feature_score(&self, feature: &str) -> Option<f64> {
        self.gauges.read().feature_scores.get(feature).copied()
    }

    /// Point-in-time copy of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let gauges = self.gauges.read();
        MetricsSnapshot {
            feature_scores: gauges.feature_scores.clone(),
            overall_score: gauges.overall_score,
            drifted_features: gauges.drifted_features,
            drift_detected: gauges.drift_detected,
            last_evaluation_secs: gauges.last_evaluation_secs,
            drift_events_total: self.drift_events_total(),
            observations_total: self.observations_total(),
            observations_rejected_total: self.observations_rejected_total(),
            evaluations_total: self.evaluations_total(),
            evaluation_failures_total: self.evaluation_failures_total(),
            window_size: self.window_size.load(Ordering::Relaxed),
        }
    }

    /// Render Prometheus text-format metrics.
    pub fn render_prometheus(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::new();

        out.push_str(
            "# HELP drift_feature_score Distance between live and reference distribution per feature.\n\
             # TYPE drift_feature_score gauge\n",
        );
        for (feature, score) in &snap.feature_scores {
            let _ = writeln!(
                out,
                "drift_feature_score{{feature=\"{}\"}} {}",
                escape_label(feature),
                score
            );
        }

        let drift_detected = if snap.drift_detected { 1 } else { 0 };
        let _ = write!(
            out,
            "# HELP drift_overall_score Maximum per-feature drift score.\n\
             # TYPE drift_overall_score gauge\n\
             drift_overall_score {overall}\n\
             # HELP drift_features_drifted Number of features above their threshold.\n\
             # TYPE drift_features_drifted gauge\n\
             drift_features_drifted {drifted}\n\
             # HELP drift_detected Whether the last evaluation detected drift.\n\
             # TYPE drift_detected gauge\n\
             drift_detected {drift_detected}\n\
             # HELP drift_events_total Transitions from no drift to drift.\n\
             # TYPE drift_events_total counter\n\
             drift_events_total {events}\n\
             # HELP drift_observations_total Observations accepted into the window.\n\
             # TYPE drift_observations_total counter\n\
             drift_observations_total {observations}\n\
             # HELP drift_observations_rejected_total Observations rejected by validation.\n\
             # TYPE drift_observations_rejected_total counter\n\
             drift_observations_rejected_total {rejected}\n\
             # HELP drift_evaluations_total Completed drift evaluations.\n\
             # TYPE drift_evaluations_total counter\n\
             drift_evaluations_total {evaluations}\n\
             # HELP drift_evaluation_failures_total Evaluations aborted without a report.\n\
             # TYPE drift_evaluation_failures_total counter\n\
             drift_evaluation_failures_total {failures}\n\
             # HELP drift_window_size Observations currently in the window.\n\
             # TYPE drift_window_size gauge\n\
             drift_window_size {window}\n\
             # HELP drift_last_evaluation_seconds Duration of the last evaluation.\n\
             # TYPE drift_last_evaluation_seconds gauge\n\
             drift_last_evaluation_seconds {elapsed:.6}\n",
            overall = snap.overall_score,
            drifted = snap.drifted_features,
            drift_detected = drift_detected,
            events = snap.drift_events_total,
            observations = snap.observations_total,
            rejected = snap.observations_rejected_total,
            evaluations = snap.evaluations_total,
            failures = snap.evaluation_failures_total,
            window = snap.window_size,
            elapsed = snap.last_evaluation_secs,
        );

        out
    }
}

/// Serializable copy of [`DriftMetrics`]
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub feature_scores: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub drifted_features: usize,
    pub drift_detected: bool,
    pub last_evaluation_secs: f64,
    pub drift_events_total: u64,
    pub observations_total: u64,
    pub observations_rejected_total: u64,
    pub evaluations_total: u64,
    pub evaluation_failures_total: u64,
    pub window_size: u64,
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
