//! Preprocessing transformers and the composed feature pipeline.
//!
//! All transformers follow a two-phase design:
//! 1. an unfitted transformer carries hyperparameters and is fitted on data;
//! 2. the fitted transformer transforms new data and serializes its parameters.
//!
//! # Example
//! ```ignore
//! use estate_advisor::preprocessing::{FittedTransformer, StandardScaler, Transformer};
//!
//! let fitted = StandardScaler::new().fit(&train)?;
//! let scaled = fitted.transform(&test)?;
//! ```
//!
//! [`FeaturePipeline`] chains derivation, encoding, imputation and scaling
//! into the fixed-order pipeline that training and inference share.

pub mod column_transformer;
pub mod composer;
pub mod encoding;
pub mod imputation;
pub mod pipeline;
pub mod scaling;
pub mod schema;
pub mod traits;

pub use column_transformer::{ColumnTransformer, FittedColumnTransformer};
pub use composer::{FeaturePipeline, FittedFeaturePipeline};
pub use encoding::{
    ColumnEncoder, EncoderState, EncodingSession, FittedIndexEncoder, FittedOneHotEncoder,
    FittedTargetEncoder, HandleUnknown, IndexEncoder, OneHotEncoder, SessionVocabulary,
    TargetEncoder, Vocabulary,
};
pub use imputation::{FittedIterativeImputer, FittedSimpleImputer, ImputeStrategy, IterativeImputer, SimpleImputer};
pub use pipeline::{FittedPipeline, Pipeline};
pub use scaling::{FittedStandardScaler, StandardScaler};
pub use schema::{FeatureSchema, InputKind, SchemaInput};
pub use traits::{FittedTransformer, Transformer};
