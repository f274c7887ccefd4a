//! Reference (baseline) dataset

use crate::drift::schema::{FeatureSchema, FeatureVector};
use crate::error::{DriftError, Result};
use ndarray::{Array2, ArrayView1};
use std::cmp::Ordering;

/// Immutable baseline distribution that live data is compared against.
///
/// Rows are observations and columns are features. Each column is also kept
/// sorted, since every distance computation starts from sorted samples.
#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    feature_names: Vec<String>,
    data: Array2<f64>,
    sorted_columns: Vec<Vec<f64>>,
}

impl ReferenceDataset {
    /// Build from a row-major matrix whose columns follow `feature_names`
    pub fn from_array(feature_names: Vec<String>, data: Array2<f64>) -> Result<Self> {
        if data.ncols() != feature_names.len() {
            return Err(DriftError::ConfigError(format!(
                "Expected {} features, got {}",
                feature_names.len(),
                data.ncols()
            )));
        }

        for (col_idx, name) in feature_names.iter().enumerate() {
            if let Some(&bad) = data.column(col_idx).iter().find(|v| !v.is_finite()) {
                return Err(DriftError::ConfigError(format!(
                    "reference feature '{}' contains non-finite value {}",
                    name, bad
                )));
            }
        }

        let sorted_columns = (0..data.ncols())
            .map(|col_idx| sorted(data.column(col_idx)))
            .collect();

        Ok(Self {
            feature_names,
            data,
            sorted_columns,
        })
    }

    /// Build from feature vectors, each of which must match `schema` exactly
    pub fn from_vectors(schema: &FeatureSchema, vectors: &[FeatureVector]) -> Result<Self> {
        let mut flat = Vec::with_capacity(vectors.len() * schema.len());
        for vector in vectors {
            flat.extend(schema.project(vector)?);
        }
        let data = Array2::from_shape_vec((vectors.len(), schema.len()), flat)?;
        Self::from_array(schema.names().to_vec(), data)
    }

    /// Restrict to the schema's features, in schema order.
    ///
    /// Extra reference columns are dropped; a schema feature missing from the
    /// reference is a configuration error.
    pub fn aligned_to(&self, schema: &FeatureSchema) -> Result<Self> {
        let missing: Vec<&str> = schema
            .names()
            .iter()
            .filter(|name| self.position(name).is_none())
            .map(|name| name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(DriftError::ConfigError(format!(
                "reference dataset is missing features {:?}",
                missing
            )));
        }

        if self.feature_names == schema.names() {
            return Ok(self.clone());
        }

        let mut data = Array2::zeros((self.n_rows(), schema.len()));
        let mut sorted_columns = Vec::with_capacity(schema.len());
        for (dst, name) in schema.names().iter().enumerate() {
            let src = self.position(name).unwrap_or_default();
            data.column_mut(dst).assign(&self.data.column(src));
            sorted_columns.push(self.sorted_columns[src].clone());
        }

        Ok(Self {
            feature_names: schema.names().to_vec(),
            data,
            sorted_columns,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of observations
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// The underlying row-major matrix
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Ascending values of one feature
    pub fn sorted_column(&self, col_idx: usize) -> &[f64] {
        &self.sorted_columns[col_idx]
    }

    /// Rebuild one observation as a feature vector
    pub fn row(&self, row_idx: usize) -> Option<FeatureVector> {
        if row_idx >= self.n_rows() {
            return None;
        }
        Some(
            self.feature_names
                .iter()
                .zip(self.data.row(row_idx).iter())
                .map(|(name, &value)| (name.clone(), value))
                .collect(),
        )
    }

    fn position(&self, feature: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == feature)
    }
}

/// Copy a column into an ascending vector
pub(crate) fn sorted(values: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().collect();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    out
}
