//! # estate-advisor
//!
//! Real-estate investment classification: derived listing features,
//! categorical encoding, iterative imputation and scaling composed into one
//! fitted pipeline, a random-forest classifier, and an inference path that
//! completes partial records against the fitted schema.
//!
//! ```ignore
//! use estate_advisor::{AdvisorConfig, Predictor};
//! use estate_advisor::dataset::Record;
//!
//! let predictor = Predictor::load(&AdvisorConfig::default())?;
//! let record = Record::from_json_str(r#"{"City": "Chennai", "Price_in_Lakhs": 489.76}"#)?;
//! let result = predictor.predict(&record)?;
//! ```

pub mod cancel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod model;
pub mod outcome;
pub mod predict;
pub mod preprocessing;
pub mod reconcile;
pub mod serialization;
pub mod stats;
pub mod train;

pub use cancel::CancelFlag;
pub use config::{AdvisorConfig, ArtifactPaths, FeatureConfig, ForestConfig, ImputerConfig};
pub use error::{PipelineError, Result};
pub use outcome::{DefaultReason, Outcome};
pub use predict::{PredictionResult, Predictor};
pub use reconcile::{CityReference, ReconciledRow, SchemaReconciler};
pub use train::{train, TrainingReport};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_fitted_artifacts_are_shareable() {
        assert_send_sync::<preprocessing::FittedFeaturePipeline>();
        assert_send_sync::<model::FittedForest>();
        assert_send_sync::<Predictor>();
        assert_send_sync::<CancelFlag>();
    }
}
