//! Drift detection module
//!
//! Compares a rolling window of live feature vectors against a reference
//! dataset and turns the result into a drift verdict and a retraining
//! decision.

mod monitor;
mod reference;
mod report;
mod schema;
mod wasserstein;
mod window;

pub use monitor::{DriftMonitor, MonitorState, RetrainDecision, RetrainReason};
pub use reference::ReferenceDataset;
pub use report::{DriftReport, FeatureDriftScore};
pub use schema::{FeatureSchema, FeatureVector};
pub use wasserstein::WassersteinDistance;
pub use window::ObservationWindow;

use crate::error::Result;

/// One-dimensional two-sample distance used to score a feature
pub trait FeatureDistance: Send + Sync {
    /// Short name reported alongside scores
    fn name(&self) -> &str;

    /// Distance between two samples. Both are sorted ascending and
    /// non-empty. Must return a finite, non-negative value.
    fn distance(&self, reference: &[f64], current: &[f64]) -> Result<f64>;
}
