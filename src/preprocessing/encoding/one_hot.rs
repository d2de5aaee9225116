//! One-hot encoding of integer category codes.
//!
//! Each input column holds codes produced by an [`super::IndexEncoder`]. The
//! encoder learns the distinct codes per column and emits one indicator column
//! per code, in ascending code order.

use crate::error::{PipelineError, Result};
use crate::preprocessing::encoding::HandleUnknown;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder for code columns.
///
/// # Example
/// ```ignore
/// use estate_advisor::preprocessing::{OneHotEncoder, Transformer, FittedTransformer};
///
/// let codes = array![[0.0], [1.0], [2.0]];
/// let fitted = OneHotEncoder::new().fit(&codes)?;
/// // [[1,0,0], [0,1,0], [0,0,1]]
/// let encoded = fitted.transform(&codes)?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct OneHotEncoder {
    handle_unknown: HandleUnknown,
}

impl OneHotEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy for handling unknown codes.
    pub fn with_handle_unknown(mut self, strategy: HandleUnknown) -> Self {
        self.handle_unknown = strategy;
        self
    }
}

/// Serializable parameters for a fitted OneHotEncoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoderParams {
    /// Sorted codes seen for each input column.
    pub categories: Vec<Vec<usize>>,
    pub n_features_out: usize,
    pub n_features_in: usize,
    pub handle_unknown: HandleUnknown,
}

/// Fitted OneHotEncoder ready for inference.
#[derive(Clone, Debug)]
pub struct FittedOneHotEncoder {
    categories: Vec<Vec<usize>>,
    n_features_out: usize,
    n_features_in: usize,
    handle_unknown: HandleUnknown,
}

impl FittedOneHotEncoder {
    /// Codes learned for each input column.
    pub fn categories(&self) -> &[Vec<usize>] {
        &self.categories
    }

    pub fn n_features_out(&self) -> usize {
        self.n_features_out
    }

    fn offsets(&self) -> Vec<usize> {
        self.categories
            .iter()
            .scan(0, |acc, cats| {
                let start = *acc;
                *acc += cats.len();
                Some(start)
            })
            .collect()
    }
}

fn as_code(value: f64) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as usize)
    } else {
        None
    }
}

impl Transformer for OneHotEncoder {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = OneHotEncoderParams;
    type Fitted = FittedOneHotEncoder;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted> {
        let (rows, cols) = data.dim();
        if rows == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit OneHotEncoder on empty data".to_string(),
            ));
        }

        let mut categories = Vec::with_capacity(cols);
        for (col, column) in data.columns().into_iter().enumerate() {
            let mut seen = BTreeSet::new();
            for (row, &value) in column.iter().enumerate() {
                let code = as_code(value).ok_or_else(|| {
                    PipelineError::InvalidParameter(format!(
                        "OneHotEncoder expects non-negative integer codes, got {} at ({}, {})",
                        value, row, col
                    ))
                })?;
                seen.insert(code);
            }
            categories.push(seen.into_iter().collect::<Vec<_>>());
        }

        let n_features_out = categories.iter().map(Vec::len).sum();
        Ok(FittedOneHotEncoder {
            categories,
            n_features_out,
            n_features_in: cols,
            handle_unknown: self.handle_unknown,
        })
    }
}

impl FittedTransformer for FittedOneHotEncoder {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = OneHotEncoderParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        let (rows, cols) = data.dim();
        if cols != self.n_features_in {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features_in,
                got_features: cols,
            });
        }

        let offsets = self.offsets();
        let mut out = Array2::<f64>::zeros((rows, self.n_features_out));
        for row in 0..rows {
            for col in 0..cols {
                let value = data[[row, col]];
                let idx = as_code(value)
                    .and_then(|code| self.categories[col].binary_search(&code).ok());
                match idx {
                    Some(idx) => out[[row, offsets[col] + idx]] = 1.0,
                    None if self.handle_unknown == HandleUnknown::Error => {
                        return Err(PipelineError::InvalidParameter(format!(
                            "Unknown category {} in column {}",
                            value, col
                        )));
                    }
                    // Ignore leaves the block at zero
                    None => {}
                }
            }
        }
        Ok(out)
    }

    fn inverse_transform(&self, data: &Self::Output) -> Result<Self::Input> {
        let (rows, out_cols) = data.dim();
        if out_cols != self.n_features_out {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features_out,
                got_features: out_cols,
            });
        }

        let offsets = self.offsets();
        let mut out = Array2::<f64>::from_elem((rows, self.n_features_in), f64::NAN);
        for row in 0..rows {
            for (col, cats) in self.categories.iter().enumerate() {
                if let Some(i) = (0..cats.len()).find(|&i| data[[row, offsets[col] + i]] > 0.5) {
                    out[[row, col]] = cats[i] as f64;
                }
            }
        }
        Ok(out)
    }

    fn extract_params(&self) -> Self::Params {
        OneHotEncoderParams {
            categories: self.categories.clone(),
            n_features_out: self.n_features_out,
            n_features_in: self.n_features_in,
            handle_unknown: self.handle_unknown,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        if params.categories.len() != params.n_features_in {
            return Err(PipelineError::InvalidParameter(
                "OneHotEncoder categories do not match n_features_in".to_string(),
            ));
        }
        Ok(FittedOneHotEncoder {
            n_features_out: params.categories.iter().map(Vec::len).sum(),
            categories: params.categories,
            n_features_in: params.n_features_in,
            handle_unknown: params.handle_unknown,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_one_hot_encoder_single_column() {
        let data = array![[0.0], [1.0], [2.0]];
        let fitted = OneHotEncoder::new().fit(&data).unwrap();

        assert_eq!(fitted.n_features_in(), 1);
        assert_eq!(fitted.n_features_out(), 3);
        assert_eq!(fitted.categories()[0], vec![0, 1, 2]);

        let out = fitted.transform(&data).unwrap();
        assert_eq!(
            out,
            array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_one_hot_encoder_gap_in_codes() {
        let data = array![[0.0], [2.0]];
        let fitted = OneHotEncoder::new().fit(&data).unwrap();
        assert_eq!(fitted.categories()[0], vec![0, 2]);
        assert_eq!(fitted.transform(&data).unwrap(), array![[1.0, 0.0], [0.0, 1.0]]);
    }

    #[test]
    fn test_one_hot_encoder_multiple_columns() {
        let data = array![[0.0, 1.0], [1.0, 0.0]];
        let fitted = OneHotEncoder::new().fit(&data).unwrap();
        assert_eq!(fitted.n_features_out(), 4);
        assert_eq!(
            fitted.transform(&data).unwrap(),
            array![[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 1.0, 0.0]]
        );
    }

    #[test]
    fn test_one_hot_encoder_unknown_error() {
        let fitted = OneHotEncoder::new().fit(&array![[0.0], [1.0]]).unwrap();
        assert!(fitted.transform(&array![[2.0]]).is_err());
    }

    #[test]
    fn test_one_hot_encoder_unknown_ignore() {
        let fitted = OneHotEncoder::new()
            .with_handle_unknown(HandleUnknown::Ignore)
            .fit(&array![[0.0], [1.0]])
            .unwrap();
        assert_eq!(fitted.transform(&array![[2.0]]).unwrap(), array![[0.0, 0.0]]);
        assert_eq!(
            fitted.transform(&array![[f64::NAN]]).unwrap(),
            array![[0.0, 0.0]]
        );
    }

    #[test]
    fn test_one_hot_encoder_inverse() {
        let data = array![[0.0], [1.0], [2.0]];
        let fitted = OneHotEncoder::new().fit(&data).unwrap();
        let encoded = fitted.transform(&data).unwrap();
        assert_eq!(fitted.inverse_transform(&encoded).unwrap(), data);
    }

    #[test]
    fn test_one_hot_encoder_serialization() {
        let fitted = OneHotEncoder::new()
            .fit(&array![[0.0], [1.0], [2.0]])
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onehot.bin");
        fitted.save_to_file(&path).unwrap();

        let loaded = FittedOneHotEncoder::load_from_file(&path).unwrap();
        assert_eq!(loaded.n_features_in(), fitted.n_features_in());
        assert_eq!(loaded.n_features_out(), fitted.n_features_out());
        assert_eq!(loaded.categories(), fitted.categories());
    }

    #[test]
    fn test_one_hot_encoder_rejects_non_codes() {
        assert!(OneHotEncoder::new().fit(&array![[0.5]]).is_err());
        assert!(OneHotEncoder::new().fit(&Array2::zeros((0, 2))).is_err());
    }

    #[test]
    fn test_one_hot_encoder_feature_mismatch() {
        let fitted = OneHotEncoder::new()
            .fit(&array![[0.0, 1.0], [2.0, 3.0]])
            .unwrap();
        assert!(matches!(
            fitted.transform(&array![[0.0, 1.0, 2.0]]),
            Err(PipelineError::FeatureMismatch { .. })
        ));
    }
}
