//! Applies different transformers to different column subsets and
//! concatenates the results. Columns claimed by no step are dropped.

use crate::error::{PipelineError, Result};
use crate::preprocessing::encoding::{FittedOneHotEncoder, OneHotEncoder, OneHotEncoderParams};
use crate::preprocessing::pipeline::{FittedPipeline, Pipeline, PipelineParams};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Unfitted transformers that can be used in a ColumnTransformer.
#[derive(Clone, Debug)]
pub enum ColumnTransformerStep {
    Pipeline(Pipeline),
    OneHotEncoder(OneHotEncoder),
}

/// Fitted transformers of a ColumnTransformer.
#[derive(Clone, Debug)]
pub enum FittedColumnTransformerStep {
    Pipeline(FittedPipeline),
    OneHotEncoder(FittedOneHotEncoder),
}

/// Serializable form of a fitted step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StepKindParams {
    Pipeline(PipelineParams),
    OneHotEncoder(OneHotEncoderParams),
}

impl FittedColumnTransformerStep {
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            FittedColumnTransformerStep::Pipeline(t) => t.transform(data),
            FittedColumnTransformerStep::OneHotEncoder(t) => t.transform(data),
        }
    }

    fn n_features_out(&self) -> usize {
        match self {
            FittedColumnTransformerStep::Pipeline(t) => t.n_features_in(),
            FittedColumnTransformerStep::OneHotEncoder(t) => t.n_features_out(),
        }
    }

    fn extract_params(&self) -> StepKindParams {
        match self {
            FittedColumnTransformerStep::Pipeline(t) => StepKindParams::Pipeline(t.extract_params()),
            FittedColumnTransformerStep::OneHotEncoder(t) => {
                StepKindParams::OneHotEncoder(t.extract_params())
            }
        }
    }

    fn from_params(params: StepKindParams) -> Result<Self> {
        Ok(match params {
            StepKindParams::Pipeline(p) => {
                FittedColumnTransformerStep::Pipeline(FittedPipeline::from_params(p)?)
            }
            StepKindParams::OneHotEncoder(p) => {
                FittedColumnTransformerStep::OneHotEncoder(FittedOneHotEncoder::from_params(p)?)
            }
        })
    }
}

fn fit_step(step: &ColumnTransformerStep, data: &Array2<f64>) -> Result<FittedColumnTransformerStep> {
    match step {
        ColumnTransformerStep::Pipeline(t) => t.fit(data).map(FittedColumnTransformerStep::Pipeline),
        ColumnTransformerStep::OneHotEncoder(t) => {
            t.fit(data).map(FittedColumnTransformerStep::OneHotEncoder)
        }
    }
}

fn extract_columns(data: &Array2<f64>, columns: &[usize]) -> Array2<f64> {
    data.select(Axis(1), columns)
}

/// ColumnTransformer applies different transformers to different columns.
///
/// # Example
/// ```ignore
/// // Columns: [size, price, parking_code]
/// let ct = ColumnTransformer::new()
///     .add_pipeline(numeric_branch, vec![0, 1])
///     .add_one_hot_encoder(OneHotEncoder::new(), vec![2]);
///
/// let fitted = ct.fit(&data)?;
/// let transformed = fitted.transform(&data)?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct ColumnTransformer {
    steps: Vec<(Vec<usize>, ColumnTransformerStep)>,
}

impl ColumnTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pipeline(mut self, pipeline: Pipeline, columns: Vec<usize>) -> Self {
        self.steps.push((columns, ColumnTransformerStep::Pipeline(pipeline)));
        self
    }

    pub fn add_one_hot_encoder(mut self, encoder: OneHotEncoder, columns: Vec<usize>) -> Self {
        self.steps
            .push((columns, ColumnTransformerStep::OneHotEncoder(encoder)));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Serializable parameters for a fitted step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    /// Column indices this step was applied to.
    pub columns: Vec<usize>,
    pub step: StepKindParams,
}

/// Serializable parameters for a fitted ColumnTransformer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformerParams {
    pub n_features_in: usize,
    pub n_features_out: usize,
    pub steps: Vec<StepParams>,
}

/// Fitted ColumnTransformer ready for inference.
#[derive(Clone, Debug)]
pub struct FittedColumnTransformer {
    fitted_steps: Vec<(Vec<usize>, FittedColumnTransformerStep)>,
    n_features_in: usize,
    n_features_out: usize,
}

impl FittedColumnTransformer {
    pub fn n_features_out(&self) -> usize {
        self.n_features_out
    }

    /// The fitted one-hot encoder of the first one-hot step, if any.
    pub fn one_hot(&self) -> Option<&FittedOneHotEncoder> {
        self.fitted_steps.iter().find_map(|(_, step)| match step {
            FittedColumnTransformerStep::OneHotEncoder(e) => Some(e),
            _ => None,
        })
    }
}

impl Transformer for ColumnTransformer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = ColumnTransformerParams;
    type Fitted = FittedColumnTransformer;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted> {
        let (rows, cols) = data.dim();
        if rows == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit ColumnTransformer on empty data".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidParameter(
                "Cannot fit empty ColumnTransformer".to_string(),
            ));
        }

        let mut fitted_steps = Vec::with_capacity(self.steps.len());
        let mut n_features_out = 0;
        for (columns, step) in &self.steps {
            if let Some(&col) = columns.iter().find(|&&c| c >= cols) {
                return Err(PipelineError::InvalidParameter(format!(
                    "Column index {} out of bounds for {} columns",
                    col, cols
                )));
            }
            if columns.is_empty() {
                debug!(?step, "skipping step with no columns");
                continue;
            }
            let fitted = fit_step(step, &extract_columns(data, columns))?;
            n_features_out += fitted.n_features_out();
            fitted_steps.push((columns.clone(), fitted));
        }

        Ok(FittedColumnTransformer {
            fitted_steps,
            n_features_in: cols,
            n_features_out,
        })
    }
}

impl FittedTransformer for FittedColumnTransformer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = ColumnTransformerParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        let (rows, cols) = data.dim();
        if cols != self.n_features_in {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features_in,
                got_features: cols,
            });
        }
        if rows == 0 || self.fitted_steps.is_empty() {
            return Ok(Array2::zeros((rows, self.n_features_out)));
        }

        let outputs = self
            .fitted_steps
            .iter()
            .map(|(columns, step)| step.transform(&extract_columns(data, columns)))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<ArrayView2<f64>> = outputs.iter().map(|o| o.view()).collect();
        concatenate(Axis(1), &views).map_err(|e| PipelineError::InvalidShape {
            expected: format!("({}, {})", rows, self.n_features_out),
            got: e.to_string(),
        })
    }

    fn inverse_transform(&self, _data: &Self::Output) -> Result<Self::Input> {
        Err(PipelineError::InvalidParameter(
            "ColumnTransformer does not support inverse_transform".to_string(),
        ))
    }

    fn extract_params(&self) -> Self::Params {
        ColumnTransformerParams {
            n_features_in: self.n_features_in,
            n_features_out: self.n_features_out,
            steps: self
                .fitted_steps
                .iter()
                .map(|(columns, step)| StepParams {
                    columns: columns.clone(),
                    step: step.extract_params(),
                })
                .collect(),
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        let fitted_steps = params
            .steps
            .into_iter()
            .map(|s| Ok((s.columns, FittedColumnTransformerStep::from_params(s.step)?)))
            .collect::<Result<Vec<_>>>()?;
        let n_features_out: usize = fitted_steps.iter().map(|(_, s)| s.n_features_out()).sum();
        if n_features_out != params.n_features_out {
            return Err(PipelineError::InvalidParameter(format!(
                "ColumnTransformer steps produce {} features, params say {}",
                n_features_out, params.n_features_out
            )));
        }
        Ok(Self {
            fitted_steps,
            n_features_in: params.n_features_in,
            n_features_out,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features_in
    }
}
