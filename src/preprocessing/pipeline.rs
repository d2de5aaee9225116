//! Pipeline for chaining numeric transformers.
//!
//! The output of one step becomes the input to the next. The numeric branch of
//! the feature pipeline is `IterativeImputer → StandardScaler`.
//!
//! # Example
//! ```ignore
//! use estate_advisor::preprocessing::{IterativeImputer, Pipeline, StandardScaler, Transformer};
//!
//! let pipeline = Pipeline::new()
//!     .add_iterative_imputer(IterativeImputer::default())
//!     .add_standard_scaler(StandardScaler::new());
//!
//! let fitted = pipeline.fit(&data)?;
//! let transformed = fitted.transform(&data)?;
//! ```

use crate::error::{PipelineError, Result};
use crate::preprocessing::imputation::{
    FittedIterativeImputer, IterativeImputer, IterativeImputerParams,
};
use crate::preprocessing::scaling::{FittedStandardScaler, StandardScaler, StandardScalerParams};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A fitted transformer that can be part of a pipeline.
pub trait PipelineStep: Clone {
    fn transform_step(&self, data: &Array2<f64>) -> Result<Array2<f64>>;
    fn inverse_transform_step(&self, data: &Array2<f64>) -> Result<Array2<f64>>;
}

/// A fitted step.
#[derive(Clone, Debug)]
pub enum PipelineStepEnum {
    IterativeImputer(FittedIterativeImputer),
    StandardScaler(FittedStandardScaler),
}

/// Serializable form of a fitted step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PipelineStepParams {
    IterativeImputer(IterativeImputerParams),
    StandardScaler(StandardScalerParams),
}

impl PipelineStep for PipelineStepEnum {
    fn transform_step(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            PipelineStepEnum::IterativeImputer(t) => t.transform(data),
            PipelineStepEnum::StandardScaler(t) => t.transform(data),
        }
    }

    fn inverse_transform_step(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            PipelineStepEnum::IterativeImputer(t) => t.inverse_transform(data),
            PipelineStepEnum::StandardScaler(t) => t.inverse_transform(data),
        }
    }
}

impl PipelineStepEnum {
    fn extract_params(&self) -> PipelineStepParams {
        match self {
            PipelineStepEnum::IterativeImputer(t) => {
                PipelineStepParams::IterativeImputer(t.extract_params())
            }
            PipelineStepEnum::StandardScaler(t) => {
                PipelineStepParams::StandardScaler(t.extract_params())
            }
        }
    }

    fn from_params(params: PipelineStepParams) -> Result<Self> {
        Ok(match params {
            PipelineStepParams::IterativeImputer(p) => {
                PipelineStepEnum::IterativeImputer(FittedIterativeImputer::from_params(p)?)
            }
            PipelineStepParams::StandardScaler(p) => {
                PipelineStepEnum::StandardScaler(FittedStandardScaler::from_params(p)?)
            }
        })
    }
}

/// A step in the unfitted pipeline.
#[derive(Clone, Debug)]
pub enum UnfittedStepEnum {
    IterativeImputer(IterativeImputer),
    StandardScaler(StandardScaler),
}

impl UnfittedStepEnum {
    fn fit(&self, data: &Array2<f64>) -> Result<PipelineStepEnum> {
        match self {
            UnfittedStepEnum::IterativeImputer(t) => {
                t.fit(data).map(PipelineStepEnum::IterativeImputer)
            }
            UnfittedStepEnum::StandardScaler(t) => t.fit(data).map(PipelineStepEnum::StandardScaler),
        }
    }
}

/// Serializable representation of a fitted pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineParams {
    pub steps: Vec<PipelineStepParams>,
    pub n_features: usize,
}

/// Pipeline transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    steps: Vec<UnfittedStepEnum>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_iterative_imputer(mut self, imputer: IterativeImputer) -> Self {
        self.steps.push(UnfittedStepEnum::IterativeImputer(imputer));
        self
    }

    pub fn add_standard_scaler(mut self, scaler: StandardScaler) -> Self {
        self.steps.push(UnfittedStepEnum::StandardScaler(scaler));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transformer for Pipeline {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = PipelineParams;
    type Fitted = FittedPipeline;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted> {
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidParameter(
                "Cannot fit an empty pipeline".to_string(),
            ));
        }
        let (rows, cols) = data.dim();
        if rows == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit pipeline on empty data".to_string(),
            ));
        }

        let mut fitted_steps = Vec::with_capacity(self.steps.len());
        let mut current = data.clone();
        for step in &self.steps {
            let fitted = step.fit(&current)?;
            current = fitted.transform_step(&current)?;
            fitted_steps.push(fitted);
        }

        Ok(FittedPipeline {
            steps: fitted_steps,
            n_features: cols,
        })
    }
}

/// Fitted Pipeline ready for inference.
#[derive(Clone, Debug)]
pub struct FittedPipeline {
    steps: Vec<PipelineStepEnum>,
    n_features: usize,
}

impl FittedPipeline {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FittedTransformer for FittedPipeline {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = PipelineParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        if data.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features,
                got_features: data.ncols(),
            });
        }
        let mut result = data.clone();
        for step in &self.steps {
            result = step.transform_step(&result)?;
        }
        Ok(result)
    }

    fn inverse_transform(&self, data: &Self::Output) -> Result<Self::Input> {
        if data.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features,
                got_features: data.ncols(),
            });
        }
        let mut result = data.clone();
        for step in self.steps.iter().rev() {
            result = step.inverse_transform_step(&result)?;
        }
        Ok(result)
    }

    fn extract_params(&self) -> Self::Params {
        PipelineParams {
            steps: self.steps.iter().map(PipelineStepEnum::extract_params).collect(),
            n_features: self.n_features,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        let steps = params
            .steps
            .into_iter()
            .map(PipelineStepEnum::from_params)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            steps,
            n_features: params.n_features,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }
}
