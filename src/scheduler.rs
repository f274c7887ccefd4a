//! Periodic drift evaluation
//!
//! A tokio task that evaluates a shared [`DriftMonitor`] on a fixed interval
//! (or on demand), records drifted reports in the audit log, and publishes the
//! resulting retraining decision on a watch channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::drift::{DriftMonitor, DriftReport, RetrainDecision};
use crate::error::{DriftError, Result};
use crate::monitoring::DriftAuditLog;

/// Handle to a running evaluation loop
pub struct EvaluationLoopHandle {
    shutdown_tx: watch::Sender<bool>,
    decisions_rx: watch::Receiver<Option<RetrainDecision>>,
    trigger: Arc<Notify>,
    ticks: Arc<AtomicU64>,
    join: JoinHandle<()>,
}

impl EvaluationLoopHandle {
    /// Receiver of the retraining decision computed after every tick
    pub fn decisions(&self) -> watch::Receiver<Option<RetrainDecision>> {
        self.decisions_rx.clone()
    }

    /// Run an evaluation now instead of waiting for the next tick
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Completed ticks since the loop started
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Stop the loop and wait for it to exit. An evaluation already in
    /// progress runs to completion first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "Evaluation loop terminated abnormally");
        }
    }
}

/// Spawn the background evaluation loop
pub fn spawn_evaluation_loop(
    monitor: Arc<DriftMonitor>,
    interval: Duration,
    audit: Option<Arc<DriftAuditLog>>,
) -> EvaluationLoopHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (decisions_tx, decisions_rx) = watch::channel(None);
    let trigger = Arc::new(Notify::new());
    let ticks = Arc::new(AtomicU64::new(0));

    let join = tokio::spawn(evaluation_loop(
        monitor,
        interval,
        audit,
        shutdown_rx,
        decisions_tx,
        Arc::clone(&trigger),
        Arc::clone(&ticks),
    ));

    EvaluationLoopHandle {
        shutdown_tx,
        decisions_rx,
        trigger,
        ticks,
        join,
    }
}

async fn evaluation_loop(
    monitor: Arc<DriftMonitor>,
    interval: Duration,
    audit: Option<Arc<DriftAuditLog>>,
    mut shutdown_rx: watch::Receiver<bool>,
    decisions_tx: watch::Sender<Option<RetrainDecision>>,
    trigger: Arc<Notify>,
    ticks: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; wait a full interval instead.
    ticker.tick().await;

    info!(interval_secs = interval.as_secs_f64(), "Evaluation loop started");

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
            _ = trigger.notified() => {}
        }

        let decision = run_tick(&monitor, audit.as_ref()).await;
        if decision.should_retrain() {
            warn!(
                reasons = ?decision.reasons(),
                observations = decision.observations_since_reset,
                reference_age_secs = decision.reference_age_secs,
                "Retraining recommended"
            );
        }
        decisions_tx.send_replace(Some(decision));
        ticks.fetch_add(1, Ordering::Relaxed);
    }

    info!(ticks = ticks.load(Ordering::Relaxed), "Evaluation loop stopped");
}

/// One evaluation cycle. CPU-bound work and the audit write run on a
/// blocking thread.
async fn run_tick(
    monitor: &Arc<DriftMonitor>,
    audit: Option<&Arc<DriftAuditLog>>,
) -> RetrainDecision {
    let m = Arc::clone(monitor);
    let log = audit.cloned();
    let result = tokio::task::spawn_blocking(move || -> Result<Arc<DriftReport>> {
        let report = m.evaluate()?;
        if let Some(log) = log {
            if let Err(e) = log.record(&report) {
                warn!(error = %e, path = %log.path().display(), "Failed to write drift audit entry");
            }
        }
        Ok(report)
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            info!(
                drift_detected = report.drift_detected,
                score = report.overall_score,
                drifted_features = report.n_drifted(),
                window_size = report.window_size,
                "Drift check complete"
            );
        }
        Ok(Err(e @ DriftError::InsufficientData { .. })) => {
            debug!(error = %e, "Skipping drift check");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Drift check failed");
        }
        Err(e) => {
            error!(error = %e, "Drift check task panicked");
        }
    }

    monitor.retrain_decision()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::drift::{FeatureSchema, FeatureVector, ReferenceDataset};

    fn monitor() -> Arc<DriftMonitor> {
        let schema = FeatureSchema::new(["x"]).unwrap();
        let vectors: Vec<FeatureVector> =
            (0..50).map(|i| FeatureVector::from([("x", i as f64)])).collect();
        let reference = ReferenceDataset::from_vectors(&schema, &vectors).unwrap();
        let config = MonitorConfig::default().with_min_samples(10);
        Arc::new(DriftMonitor::with_reference(config, schema, reference).unwrap())
    }

    #[tokio::test]
    async fn test_loop_evaluates_and_publishes_decisions() {
        let monitor = monitor();
        for i in 0..20 {
            monitor
                .observe(&FeatureVector::from([("x", 100.0 + i as f64)]))
                .unwrap();
        }

        let handle = spawn_evaluation_loop(Arc::clone(&monitor), Duration::from_millis(20), None);
        let mut decisions = handle.decisions();
        tokio::time::timeout(Duration::from_secs(5), decisions.changed())
            .await
            .expect("no decision published")
            .unwrap();

        let decision = decisions.borrow().clone().unwrap();
        assert!(decision.drift);
        assert!(monitor.latest_report().unwrap().drift_detected);
        assert!(handle.ticks() >= 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_trigger_now_and_shutdown() {
        let monitor = monitor();
        let handle = spawn_evaluation_loop(Arc::clone(&monitor), Duration::from_secs(3600), None);
        let mut decisions = handle.decisions();

        handle.trigger_now();
        tokio::time::timeout(Duration::from_secs(5), decisions.changed())
            .await
            .expect("manual trigger ignored")
            .unwrap();

        // Not enough data: the tick still publishes a decision
        assert!(monitor.latest_report().is_none());
        assert_eq!(monitor.metrics().evaluation_failures_total(), 1);
        assert!(!decisions.borrow().clone().unwrap().should_retrain());

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("loop did not stop");
    }
}
