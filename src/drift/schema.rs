//! Feature schema and feature vectors

use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A single observation: feature name to numeric value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: BTreeMap<String, f64>,
}

impl FeatureVector {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a feature value
    pub fn with(mut self, feature: impl Into<String>, value: f64) -> Self {
        self.values.insert(feature.into(), value);
        self
    }

    /// Set a feature value, returning the previous one if any
    pub fn insert(&mut self, feature: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(feature.into(), value)
    }

    /// Get a feature value
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.values.get(feature).copied()
    }

    /// Remove a feature
    pub fn remove(&mut self, feature: &str) -> Option<f64> {
        self.values.remove(feature)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (feature, value) pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for FeatureVector {
    fn from(pairs: [(K, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// The ordered set of feature names a monitor accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Create a schema. Names must be non-empty and unique.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DriftError::ConfigError(
                "feature schema must contain at least one feature".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(DriftError::ConfigError(format!(
                    "duplicate feature '{}' in schema",
                    name
                )));
            }
        }

        Ok(Self { names, index })
    }

    /// Feature names in schema order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature in schema order
    pub fn position(&self, feature: &str) -> Option<usize> {
        self.index.get(feature).copied()
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.index.contains_key(feature)
    }

    /// Validate a vector and lay its values out in schema order.
    ///
    /// Fails with `SchemaMismatch` unless the key sets are identical, and with
    /// `InvalidValue` on the first non-finite value.
    pub fn project(&self, vector: &FeatureVector) -> Result<Vec<f64>> {
        let unexpected: Vec<String> = vector
            .iter()
            .filter(|(name, _)| !self.contains(name))
            .map(|(name, _)| name.to_string())
            .collect();
        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|name| vector.get(name).is_none())
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(DriftError::SchemaMismatch { missing, unexpected });
        }

        self.names
            .iter()
            .map(|name| {
                let value = vector.get(name).unwrap_or(f64::NAN);
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(DriftError::InvalidValue {
                        feature: name.clone(),
                        value,
                    })
                }
            })
            .collect()
    }

    /// Rebuild a vector from a row laid out in schema order
    pub fn to_vector(&self, row: &[f64]) -> FeatureVector {
        self.names
            .iter()
            .zip(row.iter())
            .map(|(name, &value)| (name.clone(), value))
            .collect()
    }
}
