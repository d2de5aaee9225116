//! Per-column categorical encoders fitted on the training corpus.

use crate::config::FeatureConfig;
use crate::dataset::{Column, Frame};
use crate::error::{PipelineError, Result};
use crate::outcome::Outcome;
use crate::preprocessing::encoding::index::{FittedIndexEncoder, IndexEncoder, IndexEncoderParams};
use crate::preprocessing::encoding::target::{
    FittedTargetEncoder, TargetEncoder, TargetEncoderParams,
};
use crate::preprocessing::encoding::vocabulary::SessionVocabulary;
use crate::preprocessing::schema::InputKind;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use crate::serialization::{load_bincode, save_bincode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Split `columns` of `frame` into (low, high) cardinality lists.
///
/// A column is high-cardinality when it has more than `threshold` distinct
/// non-missing values.
pub fn split_by_cardinality(
    frame: &Frame,
    columns: &[String],
    threshold: usize,
) -> (Vec<String>, Vec<String>) {
    columns
        .iter()
        .cloned()
        .partition(|c| frame.column(c).map_or(0, Column::n_unique) <= threshold)
}

/// Fitted encoder of one categorical column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnEncoder {
    Index(FittedIndexEncoder),
    TargetMean(FittedTargetEncoder),
}

impl ColumnEncoder {
    pub fn kind(&self) -> InputKind {
        match self {
            ColumnEncoder::Index(_) => InputKind::LowCardinality,
            ColumnEncoder::TargetMean(_) => InputKind::HighCardinality,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum ColumnEncoderParams {
    Index(IndexEncoderParams),
    TargetMean(TargetEncoderParams),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EncoderStateParams {
    format_version: u32,
    columns: Vec<(String, ColumnEncoderParams)>,
}

/// The fitted encoders, keyed by column name.
///
/// Immutable after fitting. Inference-time vocabulary growth happens in an
/// [`EncodingSession`] and is discarded with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncoderState {
    columns: BTreeMap<String, ColumnEncoder>,
}

impl EncoderState {
    pub const FORMAT_VERSION: u32 = 1;

    /// State with no encoders; every categorical lookup fails.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fit index encoders on `low` and target encoders on `high` against `target`.
    pub fn fit(
        frame: &Frame,
        low: &[String],
        high: &[String],
        target: &[f64],
        config: &FeatureConfig,
    ) -> Result<Self> {
        let mut columns = BTreeMap::new();
        let index = IndexEncoder::new(config.missing_token.clone());
        for name in low {
            let values = categorical(frame, name)?;
            columns.insert(name.clone(), ColumnEncoder::Index(index.fit(&values)?));
        }
        let target_encoder = TargetEncoder::new();
        for name in high {
            let values = categorical(frame, name)?;
            columns.insert(
                name.clone(),
                ColumnEncoder::TargetMean(target_encoder.fit(&values, target)?),
            );
        }
        Ok(Self { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&ColumnEncoder> {
        self.columns.get(column)
    }

    pub fn kind(&self, column: &str) -> Option<InputKind> {
        self.columns.get(column).map(ColumnEncoder::kind)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnEncoder)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Start an encoding call. Unseen categories extend the session only.
    pub fn session(&self) -> EncodingSession<'_> {
        EncodingSession {
            state: self,
            vocabularies: HashMap::new(),
        }
    }

    /// Replace every encoded column present in `frame` with its numeric encoding.
    pub fn encode_frame(&self, frame: &mut Frame) -> Result<()> {
        let mut session = self.session();
        for name in self.columns.keys() {
            let Some(column) = frame.column(name) else {
                continue;
            };
            let values = column.to_categorical();
            let encoded = values
                .iter()
                .map(|v| session.encode(name, v.as_deref()).map(Outcome::into_value))
                .collect::<Result<Vec<f64>>>()?;
            frame.insert(name, Column::Numeric(encoded))?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let params = EncoderStateParams {
            format_version: Self::FORMAT_VERSION,
            columns: self
                .columns
                .iter()
                .map(|(name, encoder)| {
                    let params = match encoder {
                        ColumnEncoder::Index(e) => ColumnEncoderParams::Index(e.extract_params()),
                        ColumnEncoder::TargetMean(e) => {
                            ColumnEncoderParams::TargetMean(e.extract_params())
                        }
                    };
                    (name.clone(), params)
                })
                .collect(),
        };
        save_bincode(&params, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let params: EncoderStateParams = load_bincode(path)?;
        if params.format_version != Self::FORMAT_VERSION {
            return Err(PipelineError::CorruptArtifact {
                path: path.to_path_buf(),
                reason: format!(
                    "encoder format version {} (expected {})",
                    params.format_version,
                    Self::FORMAT_VERSION
                ),
            });
        }
        let mut columns = BTreeMap::new();
        for (name, params) in params.columns {
            let encoder = match params {
                ColumnEncoderParams::Index(p) => {
                    ColumnEncoder::Index(FittedIndexEncoder::from_params(p)?)
                }
                ColumnEncoderParams::TargetMean(p) => {
                    ColumnEncoder::TargetMean(FittedTargetEncoder::from_params(p)?)
                }
            };
            columns.insert(name, encoder);
        }
        Ok(Self { columns })
    }
}

fn categorical(frame: &Frame, name: &str) -> Result<Vec<Option<String>>> {
    frame
        .column(name)
        .map(Column::to_categorical)
        .ok_or_else(|| PipelineError::UnknownColumn(name.to_string()))
}

/// One encoding call over an [`EncoderState`].
pub struct EncodingSession<'a> {
    state: &'a EncoderState,
    vocabularies: HashMap<&'a str, SessionVocabulary<'a>>,
}

impl<'a> EncodingSession<'a> {
    /// Encode one value of `column`.
    ///
    /// Fails only when no encoder was fitted for `column`; unseen and
    /// missing values are defaulted and tagged.
    pub fn encode(&mut self, column: &str, value: Option<&str>) -> Result<Outcome<f64>> {
        let state = self.state;
        let (name, encoder) = state
            .columns
            .get_key_value(column)
            .ok_or_else(|| PipelineError::UnknownColumn(column.to_string()))?;
        match encoder {
            ColumnEncoder::Index(enc) => {
                let vocabulary = self
                    .vocabularies
                    .entry(name.as_str())
                    .or_insert_with(|| enc.session(name.clone()));
                Ok(enc.code(value, vocabulary).map(|code| code as f64))
            }
            ColumnEncoder::TargetMean(enc) => Ok(enc.encode(column, value)),
        }
    }

    /// Categories appended to `column` during this session.
    pub fn unseen(&self, column: &str) -> &[String] {
        self.vocabularies
            .get(column)
            .map(SessionVocabulary::overlay)
            .unwrap_or(&[])
    }
}
