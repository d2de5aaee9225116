//! Smoothed target-mean encoding for high-cardinality columns.
//!
//! Each category is replaced by a blend of its mean label and the global
//! prior, weighted by a sigmoid of its observation count:
//!
//! ```text
//! s     = 1 / (1 + exp(-(count - min_samples_leaf) / smoothing))
//! value = prior * (1 - s) + mean * s
//! ```
//!
//! Categories observed only once encode to the prior. Missing and unseen
//! values encode to the prior too, tagged with the reason.

use crate::error::{PipelineError, Result};
use crate::outcome::{DefaultReason, Outcome};
use crate::preprocessing::traits::FittedTransformer;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Supervised encoder; fitted with [`TargetEncoder::fit`] against the labels.
#[derive(Clone, Debug)]
pub struct TargetEncoder {
    min_samples_leaf: usize,
    smoothing: f64,
}

impl Default for TargetEncoder {
    fn default() -> Self {
        Self {
            min_samples_leaf: 20,
            smoothing: 1.0,
        }
    }
}

impl TargetEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Learn per-category encodings of `values` against `target`.
    pub fn fit(&self, values: &[Option<String>], target: &[f64]) -> Result<FittedTargetEncoder> {
        if values.is_empty() {
            return Err(PipelineError::EmptyData(
                "Cannot fit TargetEncoder on empty data".to_string(),
            ));
        }
        if values.len() != target.len() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} targets", values.len()),
                got: format!("{} targets", target.len()),
            });
        }
        if self.smoothing <= 0.0 {
            return Err(PipelineError::InvalidParameter(format!(
                "smoothing must be positive, got {}",
                self.smoothing
            )));
        }

        let prior = target.iter().sum::<f64>() / target.len() as f64;
        let mut stats: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for (value, &y) in values.iter().zip(target) {
            if let Some(v) = value {
                let entry = stats.entry(v.as_str()).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += y;
            }
        }

        let mapping = stats
            .into_iter()
            .map(|(category, (count, sum))| {
                let encoded = if count == 1 {
                    prior
                } else {
                    let mean = sum / count as f64;
                    let s = 1.0
                        / (1.0
                            + (-(count as f64 - self.min_samples_leaf as f64) / self.smoothing)
                                .exp());
                    prior * (1.0 - s) + mean * s
                };
                (category.to_string(), encoded)
            })
            .collect();

        Ok(FittedTargetEncoder { mapping, prior })
    }
}

/// Serializable parameters for a fitted TargetEncoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetEncoderParams {
    pub mapping: BTreeMap<String, f64>,
    pub prior: f64,
}

/// Fitted TargetEncoder ready for inference.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedTargetEncoder {
    mapping: BTreeMap<String, f64>,
    prior: f64,
}

impl FittedTargetEncoder {
    /// Global label mean.
    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn mapping(&self) -> &BTreeMap<String, f64> {
        &self.mapping
    }

    /// Encode one value of `column`.
    pub fn encode(&self, column: &str, value: Option<&str>) -> Outcome<f64> {
        match value {
            None => Outcome::defaulted(
                self.prior,
                DefaultReason::MissingInput {
                    field: column.to_string(),
                },
            ),
            Some(v) => match self.mapping.get(v) {
                Some(&encoded) => Outcome::Computed(encoded),
                None => Outcome::defaulted(
                    self.prior,
                    DefaultReason::UnseenTargetCategory {
                        column: column.to_string(),
                        value: v.to_string(),
                    },
                ),
            },
        }
    }
}

impl FittedTransformer for FittedTargetEncoder {
    type Input = Vec<Option<String>>;
    type Output = Array2<f64>;
    type Params = TargetEncoderParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        let encoded: Vec<f64> = data
            .iter()
            .map(|v| self.encode("", v.as_deref()).into_value())
            .collect();
        Array2::from_shape_vec((encoded.len(), 1), encoded).map_err(|e| {
            PipelineError::InvalidShape {
                expected: "(n, 1)".to_string(),
                got: e.to_string(),
            }
        })
    }

    fn inverse_transform(&self, _data: &Self::Output) -> Result<Self::Input> {
        Err(PipelineError::InvalidParameter(
            "TargetEncoder does not support inverse_transform".to_string(),
        ))
    }

    fn extract_params(&self) -> Self::Params {
        TargetEncoderParams {
            mapping: self.mapping.clone(),
            prior: self.prior,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        if !params.prior.is_finite() {
            return Err(PipelineError::InvalidParameter(
                "TargetEncoder prior is not finite".to_string(),
            ));
        }
        Ok(Self {
            mapping: params.mapping,
            prior: params.prior,
        })
    }

    fn n_features_in(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blend(prior: f64, mean: f64, count: f64) -> f64 {
        let s = 1.0 / (1.0 + (-(count - 20.0)).exp());
        prior * (1.0 - s) + mean * s
    }

    #[test]
    fn test_smoothed_means() {
        // 25 rows of "a" (20 positive), 4 rows of "b" (all negative), 1 "c"
        let mut values = Vec::new();
        let mut target = Vec::new();
        for i in 0..25 {
            values.push(Some("a".to_string()));
            target.push(if i < 20 { 1.0 } else { 0.0 });
        }
        for _ in 0..4 {
            values.push(Some("b".to_string()));
            target.push(0.0);
        }
        values.push(Some("c".to_string()));
        target.push(1.0);

        let fitted = TargetEncoder::new().fit(&values, &target).unwrap();
        let prior = 21.0 / 30.0;
        assert!((fitted.prior() - prior).abs() < 1e-12);

        let a = *fitted.encode("Locality", Some("a")).value();
        assert!((a - blend(prior, 0.8, 25.0)).abs() < 1e-12);
        // few observations stay close to the prior
        let b = *fitted.encode("Locality", Some("b")).value();
        assert!((b - blend(prior, 0.0, 4.0)).abs() < 1e-12);
        assert!((b - prior).abs() < 1e-6);
        assert_eq!(*fitted.encode("Locality", Some("c")).value(), prior);
    }

    #[test]
    fn test_unseen_and_missing_use_prior() {
        let values = vec![Some("a".to_string()), Some("a".to_string()), None];
        let fitted = TargetEncoder::new().fit(&values, &[1.0, 0.0, 1.0]).unwrap();
        let prior = 2.0 / 3.0;

        let unseen = fitted.encode("Locality", Some("Locality_999"));
        assert_eq!(*unseen.value(), prior);
        assert!(matches!(
            unseen.reason(),
            Some(DefaultReason::UnseenTargetCategory { value, .. }) if value == "Locality_999"
        ));

        let missing = fitted.encode("Locality", None);
        assert_eq!(*missing.value(), prior);
        assert!(matches!(missing.reason(), Some(DefaultReason::MissingInput { .. })));
    }

    #[test]
    fn test_transform_column() {
        let values = vec![Some("a".to_string()), Some("b".to_string())];
        let fitted = TargetEncoder::new().fit(&values, &[1.0, 0.0]).unwrap();
        let out = fitted.transform(&values).unwrap();
        assert_eq!(out.dim(), (2, 1));
        assert!(out.iter().all(|&v| v == 0.5));
        assert!(fitted.inverse_transform(&out).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let values = vec![Some("a".to_string())];
        assert!(matches!(
            TargetEncoder::new().fit(&values, &[1.0, 0.0]),
            Err(PipelineError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_params_round_trip() {
        let values = vec![Some("a".to_string()), Some("a".to_string())];
        let fitted = TargetEncoder::new().fit(&values, &[1.0, 1.0]).unwrap();
        let restored = FittedTargetEncoder::from_params(fitted.extract_params()).unwrap();
        assert_eq!(restored, fitted);
    }
}
