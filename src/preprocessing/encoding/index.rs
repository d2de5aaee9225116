//! Category → integer code encoding for one categorical column.
//!
//! Missing values are replaced by a constant token before lookup, so the
//! token becomes an ordinary category when it occurs at fit time.

use crate::error::{PipelineError, Result};
use crate::outcome::Outcome;
use crate::preprocessing::encoding::vocabulary::{SessionVocabulary, Vocabulary};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Index encoder for a single categorical column.
#[derive(Clone, Debug)]
pub struct IndexEncoder {
    missing_token: String,
}

impl IndexEncoder {
    pub fn new(missing_token: impl Into<String>) -> Self {
        Self {
            missing_token: missing_token.into(),
        }
    }
}

impl Default for IndexEncoder {
    fn default() -> Self {
        Self::new("missing")
    }
}

/// Serializable parameters for a fitted IndexEncoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEncoderParams {
    pub vocabulary: Vocabulary,
    pub missing_token: String,
}

/// Fitted IndexEncoder ready for inference.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedIndexEncoder {
    vocabulary: Vocabulary,
    missing_token: String,
}

impl FittedIndexEncoder {
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn missing_token(&self) -> &str {
        &self.missing_token
    }

    /// Start a session for `column` whose unseen categories extend this vocabulary.
    pub fn session(&self, column: impl Into<String>) -> SessionVocabulary<'_> {
        SessionVocabulary::new(column, &self.vocabulary)
    }

    /// Code of `value` within `session`; missing values use the constant token.
    pub fn code(&self, value: Option<&str>, session: &mut SessionVocabulary<'_>) -> Outcome<usize> {
        session.code(value.unwrap_or(&self.missing_token))
    }
}

impl Transformer for IndexEncoder {
    type Input = Vec<Option<String>>;
    type Output = Array2<f64>;
    type Params = IndexEncoderParams;
    type Fitted = FittedIndexEncoder;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted> {
        if data.is_empty() {
            return Err(PipelineError::EmptyData(
                "Cannot fit IndexEncoder on empty data".to_string(),
            ));
        }
        let vocabulary = Vocabulary::from_values(
            data.iter()
                .map(|v| v.as_deref().unwrap_or(&self.missing_token)),
        );
        Ok(FittedIndexEncoder {
            vocabulary,
            missing_token: self.missing_token.clone(),
        })
    }
}

impl FittedTransformer for FittedIndexEncoder {
    type Input = Vec<Option<String>>;
    type Output = Array2<f64>;
    type Params = IndexEncoderParams;

    /// Codes as an `n × 1` matrix. Unseen values get session-local codes
    /// past the end of the vocabulary.
    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        let mut session = self.session("");
        let codes: Vec<f64> = data
            .iter()
            .map(|v| *self.code(v.as_deref(), &mut session).value() as f64)
            .collect();
        Array2::from_shape_vec((codes.len(), 1), codes).map_err(|e| PipelineError::InvalidShape {
            expected: "(n, 1)".to_string(),
            got: e.to_string(),
        })
    }

    /// Codes back to categories. Codes outside the vocabulary give `None`.
    fn inverse_transform(&self, data: &Self::Output) -> Result<Self::Input> {
        if data.ncols() != 1 {
            return Err(PipelineError::FeatureMismatch {
                expected_features: 1,
                got_features: data.ncols(),
            });
        }
        Ok(data
            .column(0)
            .iter()
            .map(|&code| {
                if code.is_finite() && code >= 0.0 {
                    self.vocabulary.category(code as usize).map(str::to_string)
                } else {
                    None
                }
            })
            .collect())
    }

    fn extract_params(&self) -> Self::Params {
        IndexEncoderParams {
            vocabulary: self.vocabulary.clone(),
            missing_token: self.missing_token.clone(),
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        Ok(Self {
            vocabulary: params.vocabulary,
            missing_token: params.missing_token,
        })
    }

    fn n_features_in(&self) -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn values(v: &[Option<&str>]) -> Vec<Option<String>> {
        v.iter().map(|s| s.map(str::to_string)).collect()
    }

    #[test]
    fn test_codes_follow_sorted_vocabulary() {
        let data = values(&[Some("No"), Some("Yes"), Some("No")]);
        let fitted = IndexEncoder::default().fit(&data).unwrap();
        assert_eq!(fitted.vocabulary().categories(), &["No", "Yes"]);
        assert_eq!(fitted.transform(&data).unwrap(), array![[0.0], [1.0], [0.0]]);
    }

    #[test]
    fn test_missing_token_is_a_category() {
        let data = values(&[Some("East"), None]);
        let fitted = IndexEncoder::default().fit(&data).unwrap();
        assert_eq!(fitted.vocabulary().categories(), &["East", "missing"]);
        let mut session = fitted.session("Facing");
        assert_eq!(fitted.code(None, &mut session), Outcome::Computed(1));
    }

    #[test]
    fn test_unseen_values_extend_per_call() {
        let fitted = IndexEncoder::default()
            .fit(&values(&[Some("a"), Some("b")]))
            .unwrap();
        let out = fitted
            .transform(&values(&[Some("z"), Some("a"), Some("y"), Some("z")]))
            .unwrap();
        assert_eq!(out, array![[2.0], [0.0], [3.0], [2.0]]);
        // the next call starts over
        assert_eq!(
            fitted.transform(&values(&[Some("y")])).unwrap(),
            array![[2.0]]
        );
        assert_eq!(fitted.vocabulary().len(), 2);
    }

    #[test]
    fn test_inverse_transform() {
        let fitted = IndexEncoder::default()
            .fit(&values(&[Some("a"), Some("b")]))
            .unwrap();
        let back = fitted.inverse_transform(&array![[1.0], [0.0], [7.0]]).unwrap();
        assert_eq!(back, values(&[Some("b"), Some("a"), None]));
    }

    #[test]
    fn test_params_round_trip() {
        let fitted = IndexEncoder::new("NA")
            .fit(&values(&[Some("x"), None]))
            .unwrap();
        let restored = FittedIndexEncoder::from_params(fitted.extract_params()).unwrap();
        assert_eq!(restored, fitted);
        assert_eq!(restored.missing_token(), "NA");
    }

    #[test]
    fn test_empty_fit_fails() {
        assert!(IndexEncoder::default().fit(&Vec::new()).is_err());
    }
}
