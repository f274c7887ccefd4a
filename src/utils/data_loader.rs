//! Data loading utilities
//!
//! Reference datasets come from tabular files (CSV, Parquet, JSON) read with
//! polars. Live observations come from the serving layer's JSONL prediction
//! logs (`predictions_YYYYMMDD.jsonl`, one `{"input": {...}}` object per
//! line).

use crate::drift::{FeatureSchema, FeatureVector, ReferenceDataset};
use crate::error::{DriftError, Result};
use chrono::{NaiveDate, Utc};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tabular formats accepted for reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Parquet,
    Json,
}

impl FileFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "parquet" | "pq" => Ok(FileFormat::Parquet),
            "json" => Ok(FileFormat::Json),
            _ => Err(DriftError::DataError(format!(
                "Unsupported file format for {}. Use CSV, JSON, or Parquet.",
                path.display()
            ))),
        }
    }
}

/// Loader for reference datasets
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows used by the CSV reader to infer column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    /// Set the number of rows used for CSV type inference
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = n.max(1);
        self
    }

    /// Load a file into a DataFrame
    pub fn load_frame(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let file = File::open(path)?;

        let df = match format {
            FileFormat::Csv => CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(self.infer_schema_length))
                .into_reader_with_file_handle(file)
                .finish()?,
            FileFormat::Parquet => ParquetReader::new(file).finish()?,
            FileFormat::Json => JsonReader::new(file).finish()?,
        };

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded data frame");
        Ok(df)
    }

    /// Load a reference dataset holding exactly the schema's features.
    ///
    /// Other columns (ids, timestamps) are ignored. Missing columns, nulls,
    /// and non-numeric or non-finite values are configuration errors.
    pub fn load_reference(
        &self,
        path: impl AsRef<Path>,
        schema: &FeatureSchema,
    ) -> Result<ReferenceDataset> {
        let path = path.as_ref();
        let df = self.load_frame(path)?;
        let reference = Self::reference_from_frame(&df, schema)?;
        info!(path = %path.display(), rows = reference.n_rows(), "Loaded reference dataset");
        Ok(reference)
    }

    /// Build a reference dataset from an in-memory DataFrame
    pub fn reference_from_frame(df: &DataFrame, schema: &FeatureSchema) -> Result<ReferenceDataset> {
        let n_rows = df.height();
        let mut data = Array2::zeros((n_rows, schema.len()));

        for (col_idx, name) in schema.names().iter().enumerate() {
            let column = df.column(name).map_err(|_| {
                DriftError::ConfigError(format!("reference is missing feature '{}'", name))
            })?;
            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .map_err(|e| DriftError::ConfigError(format!("feature '{}': {}", name, e)))?;
            let ca = series.f64()?;

            for (row_idx, value) in ca.into_iter().enumerate() {
                data[[row_idx, col_idx]] = value.ok_or_else(|| {
                    DriftError::ConfigError(format!(
                        "feature '{}' has a null or non-numeric value at row {}",
                        name, row_idx
                    ))
                })?;
            }
        }

        ReferenceDataset::from_array(schema.names().to_vec(), data)
    }
}

/// Extract the schema's features from one prediction log line.
///
/// Accepts either `{"input": {...}}` or a flat feature object. Keys outside
/// the schema are dropped; schema keys holding non-numeric values become NaN
/// so that `observe` rejects them. Returns `None` for unparsable lines.
pub fn parse_prediction_line(line: &str, schema: &FeatureSchema) -> Option<FeatureVector> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let input = value.get("input").unwrap_or(&value).as_object()?;

    Some(
        input
            .iter()
            .filter(|(key, _)| schema.contains(key))
            .map(|(key, v)| (key.clone(), v.as_f64().unwrap_or(f64::NAN)))
            .collect(),
    )
}

/// Path of the prediction log for `date` inside `log_dir`
pub fn prediction_log_path(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("predictions_{}.jsonl", date.format("%Y%m%d")))
}

/// Incremental reader over the daily prediction logs.
///
/// Remembers how far into the current file it has read. When the date rolls,
/// the rest of the previous file is read before switching. A file that
/// shrinks is read again from the start.
#[derive(Debug)]
pub struct PredictionLogReader {
    log_dir: PathBuf,
    schema: FeatureSchema,
    current: Option<PathBuf>,
    offset: u64,
    malformed_lines: u64,
}

impl PredictionLogReader {
    pub fn new(log_dir: impl Into<PathBuf>, schema: FeatureSchema) -> Self {
        Self {
            log_dir: log_dir.into(),
            schema,
            current: None,
            offset: 0,
            malformed_lines: 0,
        }
    }

    /// Lines skipped because they were not UTF-8 JSON objects
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }

    /// Read new entries from today's log
    pub fn read_new(&mut self) -> Result<Vec<FeatureVector>> {
        let path = prediction_log_path(&self.log_dir, Utc::now().date_naive());
        self.read_new_from(&path)
    }

    /// Read entries appended to `path` since the last call
    pub fn read_new_from(&mut self, path: &Path) -> Result<Vec<FeatureVector>> {
        let mut vectors = Vec::new();

        if self.current.as_deref() != Some(path) {
            if let Some(previous) = self.current.take() {
                if let Err(e) = self.drain(&previous, &mut vectors) {
                    warn!(error = %e, path = %previous.display(), "Failed to finish previous prediction log");
                }
            }
            self.current = Some(path.to_path_buf());
            self.offset = 0;
        }

        match self.drain(path, &mut vectors) {
            Ok(()) => Ok(vectors),
            Err(e) if !vectors.is_empty() => {
                warn!(error = %e, path = %path.display(), "Failed to read prediction log");
                Ok(vectors)
            }
            Err(e) => Err(e),
        }
    }

    /// Parse complete lines from `self.offset` to the end of `path`
    fn drain(&mut self, path: &Path, vectors: &mut Vec<FeatureVector>) -> Result<()> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No prediction log yet");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata()?.len();
        if len < self.offset {
            self.offset = 0;
        }
        file.seek(SeekFrom::Start(self.offset))?;

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = match reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Prediction log read interrupted");
                    break;
                }
            };
            // Stop at EOF or at a partially written trailing line
            if n == 0 || buf.last() != Some(&b'\n') {
                break;
            }
            self.offset += n as u64;

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(_) => {
                    self.malformed_lines += 1;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match parse_prediction_line(line, &self.schema) {
                Some(vector) => vectors.push(vector),
                None => self.malformed_lines += 1,
            }
        }

        Ok(())
    }
}
