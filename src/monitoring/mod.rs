//! Monitoring Module
//!
//! Exported drift metrics and the drift audit log.

mod metrics;
pub mod audit;

pub use metrics::{DriftMetrics, MetricsSnapshot};
pub use audit::{AuditEntry, DriftAuditLog};
