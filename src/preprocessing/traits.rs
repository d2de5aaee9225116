//! Core traits for preprocessing transformers.
//!
//! - [`Transformer`]: unfitted, carries hyperparameters, learns from data.
//! - [`FittedTransformer`]: fitted, ready for inference and serialization.

use crate::error::Result;
use crate::serialization::{load_bincode, save_bincode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// An unfitted transformer: hyperparameters only.
///
/// `Input` is a numeric matrix for scalers, imputers and routers, and a
/// categorical column (`Vec<Option<String>>`) for the index encoder.
pub trait Transformer: Clone {
    type Input;
    type Output;
    /// Learned state in its persisted form.
    type Params: Serialize + DeserializeOwned;
    /// The fitted transformer type ready for inference.
    type Fitted: FittedTransformer<Params = Self::Params, Input = Self::Input, Output = Self::Output>;

    /// Learn parameters from `data`. Empty input is an error.
    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted>;

    /// Fit the transformer and transform the data in one step.
    fn fit_transform(&self, data: &Self::Input) -> Result<Self::Output> {
        let fitted = self.fit(data)?;
        fitted.transform(data)
    }
}

/// A fitted transformer. Immutable; `extract_params` and `from_params`
/// round-trip exactly.
pub trait FittedTransformer: Clone {
    type Input;
    type Output;
    type Params: Serialize + DeserializeOwned;

    /// Apply the learned parameters. A width other than
    /// [`FittedTransformer::n_features_in`] is a `FeatureMismatch`.
    fn transform(&self, data: &Self::Input) -> Result<Self::Output>;

    /// Reverse the transformation, where supported.
    fn inverse_transform(&self, data: &Self::Output) -> Result<Self::Input>;

    fn extract_params(&self) -> Self::Params;

    fn from_params(params: Self::Params) -> Result<Self>
    where
        Self: Sized;

    /// Write the parameters as a bincode artifact.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_bincode(&self.extract_params(), path.as_ref())
    }

    /// Read an artifact written by [`FittedTransformer::save_to_file`].
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self>
    where
        Self: Sized,
    {
        Self::from_params(load_bincode(path.as_ref())?)
    }

    fn n_features_in(&self) -> usize;
}
