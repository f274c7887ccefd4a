//! Drift monitor: rolling window, evaluation, and retraining triggers

use crate::config::MonitorConfig;
use crate::drift::reference::{sorted, ReferenceDataset};
use crate::drift::report::{DriftReport, FeatureDriftScore};
use crate::drift::schema::{FeatureSchema, FeatureVector};
use crate::drift::wasserstein::WassersteinDistance;
use crate::drift::window::ObservationWindow;
use crate::drift::FeatureDistance;
use crate::error::{DriftError, Result};
use crate::monitoring::DriftMetrics;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// No reference loaded yet
    Uninitialized,
    /// Reference loaded, accepting observations
    Ready,
    /// An evaluation is running
    Evaluating,
}

/// Why retraining was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainReason {
    /// The last evaluation detected drift
    Drift,
    /// Enough new observations since the last reset
    Volume,
    /// The reference is older than the staleness interval
    Staleness,
}

impl fmt::Display for RetrainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrainReason::Drift => write!(f, "drift"),
            RetrainReason::Volume => write!(f, "volume"),
            RetrainReason::Staleness => write!(f, "staleness"),
        }
    }
}

/// The three retraining triggers, each evaluated on its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainDecision {
    pub drift: bool,
    pub volume: bool,
    pub staleness: bool,
    pub observations_since_reset: u64,
    pub reference_age_secs: f64,
}

impl RetrainDecision {
    /// Any trigger fired
    pub fn should_retrain(&self) -> bool {
        self.drift || self.volume || self.staleness
    }

    /// Triggers that fired
    pub fn reasons(&self) -> Vec<RetrainReason> {
        let mut reasons = Vec::new();
        if self.drift {
            reasons.push(RetrainReason::Drift);
        }
        if self.volume {
            reasons.push(RetrainReason::Volume);
        }
        if self.staleness {
            reasons.push(RetrainReason::Staleness);
        }
        reasons
    }
}

/// State mutated by `observe` and swapped by `reset_after_retrain`
struct Inner {
    reference: Option<Arc<ReferenceDataset>>,
    window: ObservationWindow,
    observations_since_reset: u64,
    last_reset: Instant,
}

/// Clears the evaluating flag even if the computation panics
struct EvaluatingGuard<'a>(&'a AtomicBool);

impl<'a> EvaluatingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for EvaluatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Detects drift of live feature vectors against a reference dataset and
/// decides when the model should be retrained.
///
/// `observe` is safe to call from many threads at once. `evaluate` copies the
/// window under the state lock and computes distances outside it, so ingestion
/// is never blocked for the length of an evaluation. Concurrent evaluations
/// are serialized.
pub struct DriftMonitor {
    config: MonitorConfig,
    schema: FeatureSchema,
    distance: Box<dyn FeatureDistance>,
    inner: RwLock<Inner>,
    evaluation_lock: Mutex<()>,
    evaluating: AtomicBool,
    latest_report: RwLock<Option<Arc<DriftReport>>>,
    metrics: Arc<DriftMetrics>,
}

impl DriftMonitor {
    /// Create a monitor using the Wasserstein distance. No reference is
    /// loaded yet.
    pub fn new(config: MonitorConfig, schema: FeatureSchema) -> Result<Self> {
        Self::with_distance(config, schema, Box::new(WassersteinDistance::new()))
    }

    /// Create a monitor with a custom distance.
    ///
    /// Fails if the configuration is invalid or the distance does not pass a
    /// basic capability check: zero on identical samples, positive on shifted
    /// ones.
    pub fn with_distance(
        config: MonitorConfig,
        schema: FeatureSchema,
        distance: Box<dyn FeatureDistance>,
    ) -> Result<Self> {
        config.validate()?;
        for feature in config.per_feature_thresholds.keys() {
            if !schema.contains(feature) {
                return Err(DriftError::ConfigError(format!(
                    "threshold override for unknown feature '{}'",
                    feature
                )));
            }
        }
        check_distance(distance.as_ref())?;

        let window = ObservationWindow::new(config.window_capacity, schema.len());
        info!(
            features = schema.len(),
            window_capacity = config.window_capacity,
            threshold = config.global_drift_threshold,
            metric = distance.name(),
            "Drift monitor created"
        );

        Ok(Self {
            config,
            schema,
            distance,
            inner: RwLock::new(Inner {
                reference: None,
                window,
                observations_since_reset: 0,
                last_reset: Instant::now(),
            }),
            evaluation_lock: Mutex::new(()),
            evaluating: AtomicBool::new(false),
            latest_report: RwLock::new(None),
            metrics: Arc::new(DriftMetrics::new()),
        })
    }

    /// Create a monitor and load its initial reference in one step
    pub fn with_reference(
        config: MonitorConfig,
        schema: FeatureSchema,
        reference: ReferenceDataset,
    ) -> Result<Self> {
        let monitor = Self::new(config, schema)?;
        monitor.load_reference(reference)?;
        Ok(monitor)
    }

    /// Load the initial reference (Uninitialized -> Ready).
    ///
    /// Once a reference is loaded it can only be replaced through
    /// [`reset_after_retrain`](Self::reset_after_retrain).
    pub fn load_reference(&self, reference: ReferenceDataset) -> Result<()> {
        let aligned = self.prepare_reference(&reference)?;
        let _eval = self.evaluation_lock.lock();
        let mut inner = self.inner.write();
        if inner.reference.is_some() {
            return Err(DriftError::ConfigError(
                "reference already loaded; use reset_after_retrain to replace it".to_string(),
            ));
        }
        inner.reference = Some(Arc::new(aligned));
        inner.last_reset = Instant::now();
        info!(rows = reference.n_rows(), "Reference dataset loaded");
        Ok(())
    }

    /// Record one live feature vector.
    ///
    /// Rejected vectors are dropped without touching the window.
    pub fn observe(&self, vector: &FeatureVector) -> Result<()> {
        let row = match self.schema.project(vector) {
            Ok(row) => row,
            Err(e) => {
                self.metrics.record_rejection();
                return Err(e);
            }
        };

        let mut inner = self.inner.write();
        if inner.reference.is_none() {
            drop(inner);
            self.metrics.record_rejection();
            return Err(DriftError::UninitializedReference);
        }
        inner.window.push(row);
        inner.observations_since_reset += 1;
        // Published under the state lock so a concurrent reset cannot be
        // overwritten by a stale length
        self.metrics.record_observation(inner.window.len());
        Ok(())
    }

    /// Observe many vectors, returning (accepted, rejected)
    pub fn observe_all<'a, I>(&self, vectors: I) -> (usize, usize)
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let (mut accepted, mut rejected) = (0, 0);
        for vector in vectors {
            match self.observe(vector) {
                Ok(()) => accepted += 1,
                Err(e) => {
                    debug!(error = %e, "Observation rejected");
                    rejected += 1;
                }
            }
        }
        (accepted, rejected)
    }

    /// Compare the current window against the reference.
    ///
    /// On failure the previous report stays the latest one and the exported
    /// gauges keep their values.
    pub fn evaluate(&self) -> Result<Arc<DriftReport>> {
        let _eval = self.evaluation_lock.lock();
        let _state = EvaluatingGuard::enter(&self.evaluating);
        let started = Instant::now();

        let report = match self.compute_report() {
            Ok(report) => Arc::new(report),
            Err(e) => {
                self.metrics.record_evaluation_failure();
                debug!(error = %e, "Drift evaluation aborted");
                return Err(e);
            }
        };

        let elapsed = started.elapsed();
        let new_event = self.metrics.record_report(&report, elapsed);
        *self.latest_report.write() = Some(Arc::clone(&report));

        if new_event {
            warn!(
                score = report.overall_score,
                threshold = report.threshold,
                drifted = ?report.drifted_features,
                "Drift detected"
            );
        } else {
            debug!(
                score = report.overall_score,
                drift_detected = report.drift_detected,
                window_size = report.window_size,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "Drift evaluation complete"
            );
        }

        Ok(report)
    }

    /// Whether any retraining trigger fired
    pub fn should_retrain(&self) -> bool {
        self.retrain_decision().should_retrain()
    }

    /// Evaluate the drift, volume, and staleness triggers separately
    pub fn retrain_decision(&self) -> RetrainDecision {
        let drift = self
            .latest_report
            .read()
            .as_ref()
            .map(|r| r.drift_detected)
            .unwrap_or(false);
        let (observations_since_reset, reference_age) = {
            let inner = self.inner.read();
            (inner.observations_since_reset, inner.last_reset.elapsed())
        };

        RetrainDecision {
            drift,
            volume: observations_since_reset >= self.config.volume_trigger_count,
            staleness: reference_age >= self.config.staleness_interval,
            observations_since_reset,
            reference_age_secs: reference_age.as_secs_f64(),
        }
    }

    /// Swap in a freshly trained reference.
    ///
    /// Clears the window, the observation counter, the staleness clock, and
    /// the latest report. Waits for a running evaluation to finish. On error
    /// nothing changes.
    pub fn reset_after_retrain(&self, new_reference: ReferenceDataset) -> Result<()> {
        let aligned = self.prepare_reference(&new_reference)?;

        let _eval = self.evaluation_lock.lock();
        let dropped = {
            let mut inner = self.inner.write();
            let dropped = inner.window.len();
            inner.reference = Some(Arc::new(aligned));
            inner.window.clear();
            inner.observations_since_reset = 0;
            inner.last_reset = Instant::now();
            self.metrics.clear_verdict();
            dropped
        };
        *self.latest_report.write() = None;

        info!(
            rows = new_reference.n_rows(),
            dropped_observations = dropped,
            "Reference reset after retraining"
        );
        Ok(())
    }

    pub fn state(&self) -> MonitorState {
        if self.evaluating.load(Ordering::SeqCst) {
            MonitorState::Evaluating
        } else if self.inner.read().reference.is_some() {
            MonitorState::Ready
        } else {
            MonitorState::Uninitialized
        }
    }

    /// Number of observations currently in the window
    pub fn window_len(&self) -> usize {
        self.inner.read().window.len()
    }

    /// The most recently accepted observation
    pub fn latest_observation(&self) -> Option<FeatureVector> {
        let inner = self.inner.read();
        inner.window.latest().map(|row| self.schema.to_vector(row))
    }

    /// Accepted observations since the last reference reset
    pub fn observations_since_reset(&self) -> u64 {
        self.inner.read().observations_since_reset
    }

    /// Time since the reference was loaded or last reset
    pub fn reference_age(&self) -> Duration {
        self.inner.read().last_reset.elapsed()
    }

    /// Report of the last successful evaluation
    pub fn latest_report(&self) -> Option<Arc<DriftReport>> {
        self.latest_report.read().clone()
    }

    /// Metrics handle for exporters
    pub fn metrics(&self) -> Arc<DriftMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    fn prepare_reference(&self, reference: &ReferenceDataset) -> Result<ReferenceDataset> {
        if reference.is_empty() {
            return Err(DriftError::ConfigError(
                "reference dataset is empty".to_string(),
            ));
        }
        reference.aligned_to(&self.schema)
    }

    /// Snapshot under the lock, compute outside it
    fn compute_report(&self) -> Result<DriftReport> {
        let (reference, window) = {
            let inner = self.inner.read();
            let reference = inner
                .reference
                .clone()
                .ok_or(DriftError::UninitializedReference)?;
            if reference.is_empty() {
                return Err(DriftError::ConfigError(
                    "reference dataset is empty".to_string(),
                ));
            }
            let available = inner.window.len();
            if available < self.config.min_samples_for_evaluation {
                return Err(DriftError::InsufficientData {
                    required: self.config.min_samples_for_evaluation,
                    available,
                });
            }
            (reference, inner.window.snapshot())
        };

        let features = self
            .schema
            .names()
            .par_iter()
            .enumerate()
            .map(|(idx, name)| {
                let current = sorted(window.column(idx));
                let score = self.distance.distance(reference.sorted_column(idx), &current)?;
                if !score.is_finite() || score < 0.0 {
                    return Err(DriftError::DataError(format!(
                        "{} produced invalid score {} for '{}'",
                        self.distance.name(),
                        score,
                        name
                    )));
                }
                Ok(FeatureDriftScore::new(
                    name.clone(),
                    score,
                    self.config.threshold_for(name),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DriftReport::from_scores(
            features,
            self.config.global_drift_threshold,
            self.distance.name(),
            reference.n_rows(),
            window.nrows(),
        ))
    }
}

/// Reject distances that cannot tell identical samples from shifted ones
fn check_distance(distance: &dyn FeatureDistance) -> Result<()> {
    let base = [0.0, 1.0, 2.0, 3.0];
    let shifted = [1.0, 2.0, 3.0, 4.0];

    let failed = |detail: String| {
        DriftError::ConfigError(format!(
            "distance '{}' failed capability check: {}",
            distance.name(),
            detail
        ))
    };

    let same = distance
        .distance(&base, &base)
        .map_err(|e| failed(e.to_string()))?;
    let moved = distance
        .distance(&base, &shifted)
        .map_err(|e| failed(e.to_string()))?;

    if !same.is_finite() || same.abs() > 1e-9 {
        return Err(failed(format!("identical samples scored {}", same)));
    }
    if !moved.is_finite() || moved <= 0.0 {
        return Err(failed(format!("shifted samples scored {}", moved)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(["vibration", "temperature"]).unwrap()
    }

    fn vector(i: usize) -> FeatureVector {
        FeatureVector::from([
            ("vibration", (i % 10) as f64),
            ("temperature", 70.0 + (i % 5) as f64),
        ])
    }

    fn reference(n: usize) -> ReferenceDataset {
        let vectors: Vec<FeatureVector> = (0..n).map(vector).collect();
        ReferenceDataset::from_vectors(&schema(), &vectors).unwrap()
    }

    fn monitor(config: MonitorConfig) -> DriftMonitor {
        DriftMonitor::with_reference(config, schema(), reference(100)).unwrap()
    }

    struct Constant(f64);

    impl FeatureDistance for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn distance(&self, _: &[f64], _: &[f64]) -> Result<f64> {
            Ok(self.0)
        }
    }

    /// Wasserstein until told to fail
    struct Flaky(Arc<AtomicBool>);

    impl FeatureDistance for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn distance(&self, reference: &[f64], current: &[f64]) -> Result<f64> {
            if self.0.load(Ordering::SeqCst) {
                return Err(DriftError::DataError("distance backend unavailable".to_string()));
            }
            WassersteinDistance.distance(reference, current)
        }
    }

    #[test]
    fn test_state_transitions() {
        let m = DriftMonitor::new(MonitorConfig::default(), schema()).unwrap();
        assert_eq!(m.state(), MonitorState::Uninitialized);
        assert!(matches!(
            m.observe(&vector(0)),
            Err(DriftError::UninitializedReference)
        ));
        assert!(matches!(m.evaluate(), Err(DriftError::UninitializedReference)));

        m.load_reference(reference(10)).unwrap();
        assert_eq!(m.state(), MonitorState::Ready);
        assert!(m.load_reference(reference(10)).is_err());
    }

    #[test]
    fn test_capability_check_fails_fast() {
        let always_zero = DriftMonitor::with_distance(
            MonitorConfig::default(),
            schema(),
            Box::new(Constant(0.0)),
        );
        assert!(matches!(always_zero, Err(DriftError::ConfigError(_))));

        let nan = DriftMonitor::with_distance(
            MonitorConfig::default(),
            schema(),
            Box::new(Constant(f64::NAN)),
        );
        assert!(nan.is_err());
    }

    #[test]
    fn test_threshold_override_for_unknown_feature_rejected() {
        let config = MonitorConfig::default().with_feature_threshold("pressure", 0.1);
        assert!(DriftMonitor::new(config, schema()).is_err());
    }

    #[test]
    fn test_huge_window_capacity_does_not_preallocate() {
        let config = MonitorConfig::default().with_window_capacity(1 << 40);
        let m = DriftMonitor::with_reference(config, schema(), reference(100)).unwrap();
        m.observe(&vector(1)).unwrap();
        assert_eq!(m.window_len(), 1);
    }

    #[test]
    fn test_observe_updates_window_and_counter() {
        let m = monitor(MonitorConfig::default().with_window_capacity(5).with_min_samples(5));
        for i in 0..8 {
            m.observe(&vector(i)).unwrap();
            assert_eq!(m.latest_observation(), Some(vector(i)));
            assert_eq!(m.window_len(), (i + 1).min(5));
        }
        assert_eq!(m.observations_since_reset(), 8);
        assert_eq!(m.metrics().observations_total(), 8);
    }

    #[test]
    fn test_rejected_observation_leaves_window_alone() {
        let m = monitor(MonitorConfig::default());
        m.observe(&vector(1)).unwrap();

        let mut bad = vector(2);
        bad.remove("temperature");
        assert!(matches!(m.observe(&bad), Err(DriftError::SchemaMismatch { .. })));

        let nan = vector(3).with("vibration", f64::NAN);
        assert!(matches!(m.observe(&nan), Err(DriftError::InvalidValue { .. })));

        assert_eq!(m.window_len(), 1);
        assert_eq!(m.observations_since_reset(), 1);
        assert_eq!(m.metrics().observations_rejected_total(), 2);
    }

    #[test]
    fn test_evaluate_failure_keeps_previous_report() {
        let fail = Arc::new(AtomicBool::new(false));
        let m = DriftMonitor::with_distance(
            MonitorConfig::default(),
            schema(),
            Box::new(Flaky(Arc::clone(&fail))),
        )
        .unwrap();
        m.load_reference(reference(100)).unwrap();
        for i in 0..100 {
            m.observe(&vector(i)).unwrap();
        }
        let first = m.evaluate().unwrap();
        assert_eq!(first.overall_score, 0.0);

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(m.evaluate(), Err(DriftError::DataError(_))));

        let latest = m.latest_report().unwrap();
        assert!(Arc::ptr_eq(&first, &latest));
        assert_eq!(m.metrics().evaluation_failures_total(), 1);
        assert_eq!(m.metrics().evaluations_total(), 1);
        assert_eq!(m.metrics().feature_score("vibration"), Some(0.0));
        assert_eq!(m.state(), MonitorState::Ready);
    }

    #[test]
    fn test_reset_clears_latest_report() {
        let m = monitor(MonitorConfig::default());
        for i in 0..50 {
            m.observe(&vector(i)).unwrap();
        }
        m.evaluate().unwrap();
        assert!(m.latest_report().is_some());

        m.reset_after_retrain(reference(100)).unwrap();
        assert!(m.latest_report().is_none());
        assert_eq!(m.window_len(), 0);
        assert_eq!(m.observations_since_reset(), 0);
        assert!(m.reference_age() < Duration::from_secs(5));
    }

    #[test]
    fn test_window_gauge_matches_window_after_concurrent_resets() {
        let config = MonitorConfig::default()
            .with_window_capacity(64)
            .with_min_samples(1);
        let m = Arc::new(monitor(config));

        let observers: Vec<_> = (0..4)
            .map(|t| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        m.observe(&vector(t * 500 + i)).unwrap();
                    }
                })
            })
            .collect();
        for _ in 0..20 {
            m.reset_after_retrain(reference(100)).unwrap();
        }
        for handle in observers {
            handle.join().unwrap();
        }

        assert_eq!(m.metrics().snapshot().window_size, m.window_len() as u64);
    }

    #[test]
    fn test_extreme_finite_values_evaluate() {
        let low = FeatureVector::from([("vibration", -1e308), ("temperature", -1e308)]);
        let high = FeatureVector::from([("vibration", 1e308), ("temperature", 1e308)]);
        let reference = ReferenceDataset::from_vectors(&schema(), &[low]).unwrap();
        let m = DriftMonitor::with_reference(
            MonitorConfig::default().with_min_samples(1),
            schema(),
            reference,
        )
        .unwrap();
        m.observe(&high).unwrap();

        let report = m.evaluate().unwrap();
        assert_eq!(report.overall_score, f64::MAX);
        assert!(report.drift_detected);
        assert!(report.mean_score.is_finite());
    }

    #[test]
    fn test_reset_with_empty_reference_keeps_state() {
        let m = monitor(MonitorConfig::default());
        for i in 0..10 {
            m.observe(&vector(i)).unwrap();
        }
        let empty = ReferenceDataset::from_vectors(&schema(), &[]).unwrap();
        assert!(matches!(
            m.reset_after_retrain(empty),
            Err(DriftError::ConfigError(_))
        ));
        assert_eq!(m.window_len(), 10);
        assert_eq!(m.observations_since_reset(), 10);
        assert_eq!(m.state(), MonitorState::Ready);
    }

    #[test]
    fn test_retrain_decision_reasons() {
        let m = monitor(MonitorConfig::default().with_volume_trigger(3));
        assert!(!m.should_retrain());
        for i in 0..3 {
            m.observe(&vector(i)).unwrap();
        }
        let decision = m.retrain_decision();
        assert!(decision.volume);
        assert!(!decision.drift);
        assert!(!decision.staleness);
        assert_eq!(decision.reasons(), vec![RetrainReason::Volume]);
    }
}
