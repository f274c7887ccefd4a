//! Drift reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drift score of a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDriftScore {
    /// Feature name
    pub feature: String,
    /// Distance between the window and the reference (non-negative)
    pub score: f64,
    /// Threshold that applied to this feature
    pub threshold: f64,
    /// Whether `score > threshold`
    pub drifted: bool,
}

impl FeatureDriftScore {
    pub fn new(feature: impl Into<String>, score: f64, threshold: f64) -> Self {
        Self {
            feature: feature.into(),
            score,
            threshold,
            drifted: score > threshold,
        }
    }
}

/// Result of one evaluation cycle. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Per-feature scores, in schema order
    pub features: Vec<FeatureDriftScore>,
    /// Max of the per-feature scores; drives the verdict
    pub overall_score: f64,
    /// Mean of the per-feature scores (diagnostic only)
    pub mean_score: f64,
    /// Features whose score exceeds their own threshold
    pub drifted_features: Vec<String>,
    /// Whether `overall_score > threshold`
    pub drift_detected: bool,
    /// Global drift threshold
    pub threshold: f64,
    /// Distance metric used
    pub metric: String,
    /// When the report was produced
    pub timestamp: DateTime<Utc>,
    /// Reference data size
    pub reference_size: usize,
    /// Window size at snapshot time
    pub window_size: usize,
}

impl DriftReport {
    /// Aggregate per-feature scores into a report.
    ///
    /// The overall score is the maximum so that one badly drifted feature is
    /// never diluted by many stable ones.
    pub fn from_scores(
        features: Vec<FeatureDriftScore>,
        threshold: f64,
        metric: impl Into<String>,
        reference_size: usize,
        window_size: usize,
    ) -> Self {
        let overall_score = features.iter().map(|f| f.score).fold(0.0, f64::max);
        let mean_score = if features.is_empty() {
            0.0
        } else {
            let n = features.len() as f64;
            features.iter().map(|f| f.score / n).sum::<f64>()
        };
        let drifted_features = features
            .iter()
            .filter(|f| f.drifted)
            .map(|f| f.feature.clone())
            .collect();

        Self {
            features,
            overall_score,
            mean_score,
            drifted_features,
            drift_detected: overall_score > threshold,
            threshold,
            metric: metric.into(),
            timestamp: Utc::now(),
            reference_size,
            window_size,
        }
    }

    /// Score of a single feature
    pub fn score(&self, feature: &str) -> Option<f64> {
        self.features
            .iter()
            .find(|f| f.feature == feature)
            .map(|f| f.score)
    }

    /// Number of drifted features
    pub fn n_drifted(&self) -> usize {
        self.drifted_features.len()
    }

    /// Generate summary string
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("Drift Report\n");
        s.push_str("============\n");
        s.push_str(&format!("Timestamp: {}\n", self.timestamp.to_rfc3339()));
        s.push_str(&format!("Metric: {}\n", self.metric));
        s.push_str(&format!("Reference size: {}\n", self.reference_size));
        s.push_str(&format!("Window size: {}\n", self.window_size));
        s.push_str(&format!(
            "Overall score: {:.4} (threshold {:.4})\n",
            self.overall_score, self.threshold
        ));
        s.push_str(&format!("Mean score: {:.4}\n", self.mean_score));
        s.push_str(&format!("Drifted features: {}\n", self.n_drifted()));
        s.push_str(&format!("Drift detected: {}\n\n", self.drift_detected));

        s.push_str("Features:\n");
        for f in &self.features {
            let marker = if f.drifted { "DRIFT" } else { "ok" };
            s.push_str(&format!(
                "  - {} {:.4} / {:.4} [{}]\n",
                f.feature, f.score, f.threshold, marker
            ));
        }

        s
    }
}
