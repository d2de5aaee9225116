//! Configuration for derivation, encoding, imputation, the classifier and artifact locations.
//!
//! Every constant the pipeline depends on (reference year, unit conversion,
//! outlier threshold, cardinality split, score weights) lives here and is passed
//! into components at construction. Nothing reads module-level globals.
//!
//! All sections deserialize with `#[serde(default)]`, so a TOML file only needs
//! the keys it overrides:
//!
//! ```toml
//! [features]
//! reference_year = 2026
//!
//! [forest]
//! n_trees = 50
//! ```

use crate::error::Result;
use crate::preprocessing::ImputeStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Weights of the four investment-score signals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub cheapness: f64,
    pub age: f64,
    pub amenities: f64,
    pub transit: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cheapness: 0.4,
            age: 0.2,
            amenities: 0.2,
            transit: 0.2,
        }
    }
}

/// Constants used by the derived-feature calculator and the encoders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Year property age is measured against. Never wall-clock time.
    pub reference_year: i32,
    /// Multiplier turning the listed price unit into the per-area currency unit (lakhs → rupees).
    pub unit_conversion: f64,
    /// Outlier threshold in standard deviations.
    pub outlier_threshold: f64,
    /// Categorical columns with more distinct values than this are target-encoded.
    pub high_cardinality_threshold: usize,
    /// Constant standing in for a missing categorical value.
    pub missing_token: String,
    /// A listing is labeled a good investment below `City_Median * undervalued_ratio`.
    pub undervalued_ratio: f64,
    /// Annual growth rate used for price projection.
    pub growth_rate: f64,
    /// Horizon of the price projection, in years.
    pub projection_years: u32,
    /// Columns never used as model features.
    pub excluded_columns: Vec<String>,
    pub score_weights: ScoreWeights,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            reference_year: 2025,
            unit_conversion: 100_000.0,
            outlier_threshold: 3.0,
            high_cardinality_threshold: 20,
            missing_token: "missing".to_string(),
            undervalued_ratio: 0.90,
            growth_rate: 0.05,
            projection_years: 5,
            excluded_columns: vec![
                "ID".to_string(),
                "Good_Investment".to_string(),
                "Future_Price_5yrs".to_string(),
            ],
            score_weights: ScoreWeights::default(),
        }
    }
}

impl FeatureConfig {
    /// Whether `name` is excluded from the feature set.
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_columns.iter().any(|c| c == name)
    }
}

/// Iterative imputer hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputerConfig {
    /// Fill used before the first regression round.
    pub initial_strategy: ImputeStrategy,
    pub max_iter: usize,
    /// Early-stop tolerance relative to the largest absolute observed value.
    pub tol: f64,
    /// Ridge penalty of the per-column regressions.
    pub ridge_alpha: f64,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        Self {
            initial_strategy: ImputeStrategy::Mean,
            max_iter: 10,
            tol: 1e-3,
            ridge_alpha: 1e-3,
        }
    }
}

/// Number of features examined at each split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    Sqrt,
    Log2,
    All,
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete feature count for `n_features` columns (at least 1).
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().round() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => *k,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Random forest hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub seed: u64,
    /// Held-out fraction for evaluation.
    pub test_fraction: f64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
            test_fraction: 0.2,
        }
    }
}

/// Locations of the corpus, the fitted artifacts and the tracking tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub training_data: PathBuf,
    pub model_dir: PathBuf,
    pub tracking_dir: PathBuf,
    pub experiment: String,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            training_data: PathBuf::from("data/india_housing_prices.csv"),
            model_dir: PathBuf::from("models"),
            tracking_dir: PathBuf::from("mlruns"),
            experiment: "real_estate_investment_model".to_string(),
        }
    }
}

impl ArtifactPaths {
    pub const MODEL_FILE: &'static str = "rf_investment_model.bin";
    pub const MODEL_ARTIFACT: &'static str = "rf_investment_model";
    pub const PREPROCESSOR_FILE: &'static str = "preprocessor.bin";
    pub const ENCODERS_FILE: &'static str = "encoders.bin";
    pub const FEATURES_FILE: &'static str = "feature_columns.json";

    /// Paths rooted at `root` (`root/models`, `root/mlruns`, `root/data/...`).
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        Self {
            training_data: root.join(&defaults.training_data),
            model_dir: root.join(&defaults.model_dir),
            tracking_dir: root.join(&defaults.tracking_dir),
            experiment: defaults.experiment,
        }
    }

    pub fn model_file(&self) -> PathBuf {
        self.model_dir.join(Self::MODEL_FILE)
    }

    pub fn preprocessor_file(&self) -> PathBuf {
        self.model_dir.join(Self::PREPROCESSOR_FILE)
    }

    pub fn encoders_file(&self) -> PathBuf {
        self.model_dir.join(Self::ENCODERS_FILE)
    }

    pub fn features_file(&self) -> PathBuf {
        self.model_dir.join(Self::FEATURES_FILE)
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub features: FeatureConfig,
    pub imputer: ImputerConfig,
    pub forest: ForestConfig,
    pub paths: ArtifactPaths,
}

impl AdvisorConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
