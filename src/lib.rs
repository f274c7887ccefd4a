//! Driftwatch - feature drift monitoring for deployed models
//!
//! Keeps a rolling window of live feature vectors, compares it against the
//! reference dataset a model was trained on, and decides when the model
//! should be retrained.
//!
//! # Modules
//!
//! - [`drift`] - Observation window, Wasserstein scoring, and the [`DriftMonitor`](drift::DriftMonitor)
//! - [`monitoring`] - Exported drift metrics and the drift audit log
//! - [`scheduler`] - Periodic evaluation on a tokio task
//! - [`config`] - Monitor configuration (defaults, environment, JSON file)
//! - [`utils`] - Reference and prediction log loading
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;
pub mod drift;
pub mod monitoring;
pub mod scheduler;
pub mod utils;
pub mod cli;

pub use error::{DriftError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::MonitorConfig;
    pub use crate::drift::{
        DriftMonitor, DriftReport, FeatureDistance, FeatureDriftScore, FeatureSchema,
        FeatureVector, MonitorState, ReferenceDataset, RetrainDecision, RetrainReason,
        WassersteinDistance,
    };
    pub use crate::error::{DriftError, Result};
    pub use crate::monitoring::{DriftAuditLog, DriftMetrics};
    pub use crate::scheduler::{spawn_evaluation_loop, EvaluationLoopHandle};
    pub use crate::utils::{DataLoader, PredictionLogReader};
}
