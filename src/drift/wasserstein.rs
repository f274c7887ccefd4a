//! Wasserstein (earth mover's) distance between empirical samples

use crate::drift::FeatureDistance;
use crate::error::{DriftError, Result};
use serde::{Deserialize, Serialize};

/// First Wasserstein distance between two one-dimensional samples.
///
/// Computed as the integral of `|F_ref(x) - F_cur(x)|` over the merged
/// support, where `F` are the empirical CDFs. The result is in the units of
/// the feature; nothing is normalized.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WassersteinDistance;

impl WassersteinDistance {
    pub fn new() -> Self {
        Self
    }

    /// Distance between two ascending samples. Both must be non-empty.
    ///
    /// Finite inputs always give a finite result. A distance wider than
    /// `f64::MAX` saturates to `f64::MAX`.
    pub fn between_sorted(reference: &[f64], current: &[f64]) -> f64 {
        let (n_ref, n_cur) = (reference.len() as f64, current.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut prev = match (reference.first(), current.first()) {
            (Some(&a), Some(&b)) => a.min(b),
            _ => return 0.0,
        };
        // Accumulated at half scale so a step spanning the whole f64 range
        // cannot overflow
        let mut half_total = 0.0;

        while i < reference.len() || j < current.len() {
            let next = match (reference.get(i), current.get(j)) {
                (Some(&a), Some(&b)) => a.min(b),
                (Some(&a), None) => a,
                (None, Some(&b)) => b,
                (None, None) => break,
            };

            // CDFs are constant on [prev, next)
            let cdf_ref = i as f64 / n_ref;
            let cdf_cur = j as f64 / n_cur;
            half_total += (cdf_ref - cdf_cur).abs() * (next * 0.5 - prev * 0.5);
            prev = next;

            while i < reference.len() && reference[i] <= next {
                i += 1;
            }
            while j < current.len() && current[j] <= next {
                j += 1;
            }
        }

        if half_total > f64::MAX * 0.5 {
            f64::MAX
        } else {
            half_total * 2.0
        }
    }
}

impl FeatureDistance for WassersteinDistance {
    fn name(&self) -> &str {
        "wasserstein"
    }

    fn distance(&self, reference: &[f64], current: &[f64]) -> Result<f64> {
        if reference.is_empty() || current.is_empty() {
            return Err(DriftError::DataError(
                "Empty samples provided".to_string(),
            ));
        }
        Ok(Self::between_sorted(reference, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_samples_score_zero() {
        let data: Vec<f64> = (0..100).map(|i| (i % 17) as f64 * 0.5).collect();
        let mut sorted = data.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let d = WassersteinDistance.distance(&sorted, &sorted).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_constant_shift_equals_shift() {
        let reference: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let shifted: Vec<f64> = reference.iter().map(|v| v + 7.5).collect();

        let d = WassersteinDistance.distance(&reference, &shifted).unwrap();
        assert!((d - 7.5).abs() < 1e-9, "got {}", d);
    }

    #[test]
    fn test_point_masses() {
        assert!((WassersteinDistance::between_sorted(&[0.0], &[1.0]) - 1.0).abs() < 1e-12);
        // Half the mass moves from 0 to 2
        let d = WassersteinDistance::between_sorted(&[0.0, 0.0], &[0.0, 2.0]);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unequal_sample_sizes() {
        let reference = [1.0, 2.0, 3.0, 4.0];
        let current = [1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0];
        let mut current = current.to_vec();
        current.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let d = WassersteinDistance.distance(&reference, &current).unwrap();
        assert!(d.abs() < 1e-12);
    }

    #[test]
    fn test_symmetric() {
        let a = [0.0, 1.0, 5.0];
        let b = [2.0, 2.5];
        let ab = WassersteinDistance::between_sorted(&a, &b);
        let ba = WassersteinDistance::between_sorted(&b, &a);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_extreme_finite_inputs_saturate() {
        let d = WassersteinDistance::between_sorted(&[-1e308], &[1e308]);
        assert_eq!(d, f64::MAX);

        let d = WassersteinDistance::between_sorted(&[-f64::MAX, 0.0], &[0.0, f64::MAX]);
        assert!(d.is_finite() && d > 0.0);

        // Half the range still fits and stays exact
        let d = WassersteinDistance::between_sorted(&[-4e307], &[4e307]);
        assert_eq!(d, 8e307);
    }

    #[test]
    fn test_empty_samples_rejected() {
        assert!(WassersteinDistance.distance(&[], &[1.0]).is_err());
    }
}
