//! The end-to-end feature pipeline.
//!
//! Stage order is fixed:
//!
//! 1. outlier flags on every numeric feature column
//! 2. price-per-area, then property age
//! 3. target encoding of high-cardinality columns (fitted against the label)
//! 4. index encoding of low-cardinality columns
//! 5. column routing: numeric and target-encoded columns through
//!    `IterativeImputer → StandardScaler`, index codes through a one-hot
//!    expansion. Everything else, the outlier flags included, is dropped.
//!
//! The fitted result persists as three artifacts: `preprocessor.bin`,
//! `encoders.bin` and `feature_columns.json`.

use crate::cancel::CancelFlag;
use crate::config::{ArtifactPaths, FeatureConfig, ImputerConfig};
use crate::dataset::{fields, Frame};
use crate::error::{PipelineError, Result};
use crate::features::{add_price_per_area, add_property_age, OutlierFlagger};
use crate::preprocessing::column_transformer::{
    ColumnTransformer, ColumnTransformerParams, FittedColumnTransformer,
};
use crate::preprocessing::encoding::{
    split_by_cardinality, ColumnEncoder, EncoderState, HandleUnknown, OneHotEncoder,
};
use crate::preprocessing::imputation::IterativeImputer;
use crate::preprocessing::pipeline::Pipeline;
use crate::preprocessing::scaling::StandardScaler;
use crate::preprocessing::schema::{FeatureSchema, InputKind, SchemaInput};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use crate::serialization::{load_bincode, load_json, save_bincode, save_json};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Unfitted feature pipeline.
#[derive(Clone, Debug, Default)]
pub struct FeaturePipeline {
    features: FeatureConfig,
    imputer: ImputerConfig,
    cancel: Option<CancelFlag>,
}

impl FeaturePipeline {
    pub fn new(features: FeatureConfig, imputer: ImputerConfig) -> Self {
        Self {
            features,
            imputer,
            cancel: None,
        }
    }

    /// Check `flag` between imputation rounds.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Fit every stage on `frame` against the binary `target`.
    pub fn fit(&self, frame: &Frame, target: &[f64]) -> Result<FittedFeaturePipeline> {
        if frame.n_rows() == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit the feature pipeline on an empty corpus".to_string(),
            ));
        }
        if target.len() != frame.n_rows() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} labels", frame.n_rows()),
                got: format!("{} labels", target.len()),
            });
        }
        let cfg = &self.features;
        let mut work = frame.clone();

        let flagged: Vec<String> = work
            .iter()
            .filter(|(name, column)| {
                column.is_numeric() && !cfg.is_excluded(name) && !fields::is_outlier_flag(name)
            })
            .map(|(name, _)| name.to_string())
            .collect();
        let flagger = OutlierFlagger::new(flagged, cfg.outlier_threshold);
        derive(&flagger, cfg, &mut work)?;

        let candidates: Vec<(String, bool)> = work
            .iter()
            .filter(|(name, _)| !cfg.is_excluded(name) && !fields::is_outlier_flag(name))
            .map(|(name, column)| (name.to_string(), column.is_numeric()))
            .collect();
        let categorical: Vec<String> = candidates
            .iter()
            .filter(|(_, numeric)| !numeric)
            .map(|(name, _)| name.clone())
            .collect();
        let (low, high) = split_by_cardinality(&work, &categorical, cfg.high_cardinality_threshold);
        debug!(
            n_numeric = candidates.len() - categorical.len(),
            n_low = low.len(),
            n_high = high.len(),
            "split feature columns"
        );

        let encoders = EncoderState::fit(&work, &low, &high, target, cfg)?;
        encoders.encode_frame(&mut work)?;

        let inputs: Vec<SchemaInput> = candidates
            .into_iter()
            .map(|(name, numeric)| {
                let kind = if numeric {
                    InputKind::Numeric
                } else {
                    encoders.kind(&name).unwrap_or(InputKind::LowCardinality)
                };
                SchemaInput { name, kind }
            })
            .collect();

        let (numeric_idx, low_idx): (Vec<usize>, Vec<usize>) = (0..inputs.len())
            .partition(|&i| inputs[i].kind != InputKind::LowCardinality);

        let mut imputer = IterativeImputer::new(self.imputer.clone());
        if let Some(flag) = &self.cancel {
            imputer = imputer.with_cancel(flag.clone());
        }
        let router = ColumnTransformer::new()
            .add_pipeline(
                Pipeline::new()
                    .add_iterative_imputer(imputer)
                    .add_standard_scaler(StandardScaler::new()),
                numeric_idx.clone(),
            )
            .add_one_hot_encoder(
                OneHotEncoder::new().with_handle_unknown(HandleUnknown::Ignore),
                low_idx.clone(),
            );

        let names: Vec<&str> = inputs.iter().map(|i| i.name.as_str()).collect();
        let matrix = work.numeric_matrix(&names)?;
        let router = router.fit(&matrix)?;

        let mut outputs: Vec<String> = numeric_idx.iter().map(|&i| inputs[i].name.clone()).collect();
        if let Some(one_hot) = router.one_hot() {
            for (&i, codes) in low_idx.iter().zip(one_hot.categories()) {
                let name = &inputs[i].name;
                let vocabulary = match encoders.get(name) {
                    Some(ColumnEncoder::Index(e)) => Some(e.vocabulary()),
                    _ => None,
                };
                for &code in codes {
                    let category = vocabulary
                        .and_then(|v| v.category(code))
                        .map(str::to_string)
                        .unwrap_or_else(|| code.to_string());
                    outputs.push(format!("{}_{}", name, category));
                }
            }
        }
        if outputs.len() != router.n_features_out() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} output names", router.n_features_out()),
                got: format!("{} output names", outputs.len()),
            });
        }

        info!(
            n_inputs = inputs.len(),
            n_outputs = outputs.len(),
            "fitted feature pipeline"
        );

        Ok(FittedFeaturePipeline {
            config: self.features.clone(),
            flagger,
            encoders,
            router,
            schema: FeatureSchema::new(inputs, outputs),
        })
    }

    /// Fit, then transform the same frame.
    pub fn fit_transform(
        &self,
        frame: &Frame,
        target: &[f64],
    ) -> Result<(FittedFeaturePipeline, Array2<f64>)> {
        let fitted = self.fit(frame, target)?;
        let out = fitted.transform(frame)?;
        Ok((fitted, out))
    }
}

fn derive(flagger: &OutlierFlagger, config: &FeatureConfig, frame: &mut Frame) -> Result<()> {
    flagger.apply(frame)?;
    add_price_per_area(frame, config)?;
    add_property_age(frame, config)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PreprocessorParams {
    format_version: u32,
    config: FeatureConfig,
    flagged_columns: Vec<String>,
    router: ColumnTransformerParams,
    schema: FeatureSchema,
}

/// A fitted feature pipeline. Immutable; `Send + Sync`.
#[derive(Clone, Debug)]
pub struct FittedFeaturePipeline {
    config: FeatureConfig,
    flagger: OutlierFlagger,
    encoders: EncoderState,
    router: FittedColumnTransformer,
    schema: FeatureSchema,
}

impl FittedFeaturePipeline {
    pub const FORMAT_VERSION: u32 = 1;

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encoders(&self) -> &EncoderState {
        &self.encoders
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn n_features_out(&self) -> usize {
        self.router.n_features_out()
    }

    /// Add outlier flags and recompute price-per-area and age in place.
    pub fn derive(&self, frame: &mut Frame) -> Result<()> {
        derive(&self.flagger, &self.config, frame)
    }

    /// Transform a raw batch. Every schema input must be present after derivation.
    pub fn transform(&self, frame: &Frame) -> Result<Array2<f64>> {
        let mut work = frame.clone();
        self.derive(&mut work)?;
        self.encoders.encode_frame(&mut work)?;
        let names: Vec<&str> = self.schema.input_names().collect();
        self.route(&work.numeric_matrix(&names)?)
    }

    /// Route already-encoded rows laid out in schema input order.
    pub fn route(&self, encoded: &Array2<f64>) -> Result<Array2<f64>> {
        self.router.transform(encoded)
    }

    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        let params = PreprocessorParams {
            format_version: Self::FORMAT_VERSION,
            config: self.config.clone(),
            flagged_columns: self.flagger.columns().to_vec(),
            router: self.router.extract_params(),
            schema: self.schema.clone(),
        };
        save_bincode(&params, &paths.preprocessor_file())?;
        self.encoders.save(&paths.encoders_file())?;
        save_json(&self.schema, &paths.features_file())?;
        debug!(dir = %paths.model_dir.display(), "saved feature pipeline artifacts");
        Ok(())
    }

    /// Load the three artifacts.
    ///
    /// A missing or corrupt preprocessor, or missing encoders, is fatal. Corrupt
    /// encoders fall back to an empty state and a missing or unusable schema
    /// file falls back to the schema embedded in the preprocessor; both are
    /// reported in the returned warnings.
    pub fn load(paths: &ArtifactPaths) -> Result<(Self, Vec<String>)> {
        let path = paths.preprocessor_file();
        let params: PreprocessorParams = load_bincode(&path)?;
        if params.format_version != Self::FORMAT_VERSION {
            return Err(PipelineError::CorruptArtifact {
                path,
                reason: format!(
                    "preprocessor format version {} (expected {})",
                    params.format_version,
                    Self::FORMAT_VERSION
                ),
            });
        }
        let router = FittedColumnTransformer::from_params(params.router)?;
        let mut warnings = Vec::new();

        let encoders = match EncoderState::load(&paths.encoders_file()) {
            Ok(state) => state,
            Err(e @ PipelineError::MissingArtifact(_)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "encoder state unreadable, continuing without encoders");
                warnings.push(format!("encoders unavailable: {}", e));
                EncoderState::empty()
            }
        };

        let schema = match load_json::<FeatureSchema>(&paths.features_file()) {
            Ok(schema) if schema == params.schema => schema,
            Ok(_) => {
                warn!("feature list disagrees with the preprocessor, using the embedded schema");
                warnings.push("feature list disagrees with the preprocessor".to_string());
                params.schema
            }
            Err(e) => {
                warn!(error = %e, "feature list unavailable, using the embedded schema");
                warnings.push(format!("feature list unavailable: {}", e));
                params.schema
            }
        };

        Ok((
            Self {
                flagger: OutlierFlagger::new(params.flagged_columns, params.config.outlier_threshold),
                config: params.config,
                encoders,
                router,
                schema,
            },
            warnings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    /// 60 listings over three cities and 25 localities.
    fn corpus() -> (Frame, Vec<f64>) {
        let n = 60;
        let mut frame = Frame::with_rows(n);
        let cities = ["Chennai", "Pune", "Delhi"];
        frame
            .insert(
                fields::ID,
                Column::Numeric((0..n).map(|i| i as f64).collect()),
            )
            .unwrap();
        frame
            .insert(
                fields::CITY,
                Column::Categorical((0..n).map(|i| Some(cities[i % 3].to_string())).collect()),
            )
            .unwrap();
        frame
            .insert(
                fields::LOCALITY,
                Column::Categorical(
                    (0..n)
                        .map(|i| Some(format!("Locality_{}", i % 25)))
                        .collect(),
                ),
            )
            .unwrap();
        frame
            .insert(
                fields::PARKING,
                Column::Categorical(
                    (0..n)
                        .map(|i| match i % 4 {
                            0 => None,
                            1 => Some("Yes".to_string()),
                            _ => Some("No".to_string()),
                        })
                        .collect(),
                ),
            )
            .unwrap();
        frame
            .insert(
                fields::SIZE,
                Column::Numeric((0..n).map(|i| 500.0 + 37.0 * i as f64).collect()),
            )
            .unwrap();
        frame
            .insert(
                fields::PRICE,
                Column::Numeric(
                    (0..n)
                        .map(|i| if i == 7 { f64::NAN } else { 50.0 + 3.0 * (i % 17) as f64 })
                        .collect(),
                ),
            )
            .unwrap();
        frame
            .insert(
                fields::YEAR_BUILT,
                Column::Numeric((0..n).map(|i| 1990.0 + (i % 30) as f64).collect()),
            )
            .unwrap();
        let labels = (0..n).map(|i| (i % 2) as f64).collect();
        (frame, labels)
    }

    fn fitted() -> FittedFeaturePipeline {
        let (frame, labels) = corpus();
        FeaturePipeline::default().fit(&frame, &labels).unwrap()
    }

    #[test]
    fn test_schema_kinds_and_exclusions() {
        let fitted = fitted();
        let schema = fitted.schema();
        assert!(!schema.requires(fields::ID));
        assert_eq!(schema.kind_of(fields::CITY), Some(InputKind::LowCardinality));
        assert_eq!(schema.kind_of(fields::LOCALITY), Some(InputKind::HighCardinality));
        assert_eq!(schema.kind_of(fields::PRICE_PER_AREA), Some(InputKind::Numeric));
        assert_eq!(schema.kind_of(fields::PROPERTY_AGE), Some(InputKind::Numeric));
        assert!(schema.input_names().all(|n| !fields::is_outlier_flag(n)));
    }

    #[test]
    fn test_output_names_and_width() {
        let fitted = fitted();
        let outputs = &fitted.schema().outputs;
        assert!(outputs.contains(&"City_Chennai".to_string()));
        assert!(outputs.contains(&"Parking_Space_missing".to_string()));
        assert!(outputs.contains(&fields::LOCALITY.to_string()));
        assert_eq!(outputs.len(), fitted.n_features_out());

        let (frame, _) = corpus();
        let out = fitted.transform(&frame).unwrap();
        assert_eq!(out.dim(), (60, outputs.len()));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (frame, labels) = corpus();
        let a = FeaturePipeline::default().fit_transform(&frame, &labels).unwrap();
        let b = FeaturePipeline::default().fit_transform(&frame, &labels).unwrap();
        assert_eq!(a.0.schema(), b.0.schema());
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_label_length_mismatch() {
        let (frame, _) = corpus();
        assert!(FeaturePipeline::default().fit(&frame, &[1.0]).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        let fitted = fitted();
        fitted.save(&paths).unwrap();

        let (loaded, warnings) = FittedFeaturePipeline::load(&paths).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(loaded.schema(), fitted.schema());
        let (frame, _) = corpus();
        assert_eq!(
            loaded.transform(&frame).unwrap(),
            fitted.transform(&frame).unwrap()
        );
    }

    #[test]
    fn test_load_recovers_from_bad_schema_and_encoders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        fitted().save(&paths).unwrap();
        std::fs::write(paths.features_file(), "not json").unwrap();
        std::fs::write(paths.encoders_file(), b"\x01").unwrap();

        let (loaded, warnings) = FittedFeaturePipeline::load(&paths).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(loaded.encoders().is_empty());
        assert_eq!(loaded.schema(), fitted().schema());
    }

    #[test]
    fn test_load_requires_preprocessor_and_encoders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        assert!(matches!(
            FittedFeaturePipeline::load(&paths),
            Err(PipelineError::MissingArtifact(_))
        ));

        fitted().save(&paths).unwrap();
        std::fs::remove_file(paths.encoders_file()).unwrap();
        assert!(matches!(
            FittedFeaturePipeline::load(&paths),
            Err(PipelineError::MissingArtifact(_))
        ));
    }
}
