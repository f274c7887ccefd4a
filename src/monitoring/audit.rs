//! Append-only drift audit log
//!
//! One JSON line per report in which drift was detected. The monitor never
//! writes here itself; the evaluation loop does, off the serving path.

use crate::drift::DriftReport;
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// A single entry of the drift audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub drift_score: f64,
    pub feature_drifts: BTreeMap<String, f64>,
    pub drifted_features: Vec<String>,
    pub threshold: f64,
    pub window_size: usize,
}

impl From<&DriftReport> for AuditEntry {
    fn from(report: &DriftReport) -> Self {
        Self {
            timestamp: report.timestamp,
            drift_score: report.overall_score,
            feature_drifts: report
                .features
                .iter()
                .map(|f| (f.feature.clone(), f.score))
                .collect(),
            drifted_features: report.drifted_features.clone(),
            threshold: report.threshold,
            window_size: report.window_size,
        }
    }
}

/// JSONL file of drift alerts
#[derive(Debug)]
pub struct DriftAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DriftAuditLog {
    /// Default file name inside a log directory
    pub const FILE_NAME: &'static str = "drift_alerts.jsonl";

    /// Open (or create) the log at `path`, creating parent directories
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Open `drift_alerts.jsonl` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a report. Reports without drift are skipped; returns whether a
    /// line was written.
    pub fn record(&self, report: &DriftReport) -> Result<bool> {
        if !report.drift_detected {
            return Ok(false);
        }

        let mut line = serde_json::to_string(&AuditEntry::from(report))?;
        line.push('\n');

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(true)
    }

    /// Read every entry back, skipping lines that do not parse
    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::FeatureDriftScore;

    fn report(score: f64) -> DriftReport {
        DriftReport::from_scores(
            vec![
                FeatureDriftScore::new("vibration", score, 0.3),
                FeatureDriftScore::new("temperature", 0.01, 0.3),
            ],
            0.3,
            "wasserstein",
            1000,
            100,
        )
    }

    #[test]
    fn test_only_drifted_reports_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log = DriftAuditLog::in_dir(dir.path().join("audit")).unwrap();

        assert!(!log.record(&report(0.1)).unwrap());
        assert!(log.record(&report(0.8)).unwrap());
        assert!(log.record(&report(1.2)).unwrap());

        let entries = log.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].drift_score, 0.8);
        assert_eq!(entries[1].drifted_features, vec!["vibration".to_string()]);
        assert_eq!(entries[1].feature_drifts["temperature"], 0.01);
    }
}
