//! Simple Imputer.
//!
//! Fills missing (NaN) values column-wise with a fixed statistic. Also used
//! as the starting point of [`super::IterativeImputer`].

use crate::error::{PipelineError, Result};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use crate::stats;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for imputing missing values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Replace missing values with the mean of each column.
    #[default]
    Mean,
    /// Replace missing values with the median of each column.
    Median,
    /// Replace missing values with the most frequent value of each column.
    MostFrequent,
    /// Replace missing values with a constant value.
    Constant(f64),
}

/// Serializable parameters for a fitted SimpleImputer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleImputerParams {
    pub strategy: ImputeStrategy,
    /// Fill value of each feature.
    pub statistics: Vec<f64>,
    pub n_features: usize,
}

/// SimpleImputer transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct SimpleImputer {
    strategy: ImputeStrategy,
}

impl SimpleImputer {
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self { strategy }
    }
}

/// Fill value of one column. A column with no observed values fills with 0
/// unless the strategy is a constant.
fn column_statistic(column: &[f64], strategy: &ImputeStrategy) -> f64 {
    if let ImputeStrategy::Constant(v) = strategy {
        return *v;
    }
    let mut present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    let stat = match strategy {
        ImputeStrategy::Mean => stats::mean(&present),
        ImputeStrategy::Median => stats::median(&mut present),
        ImputeStrategy::MostFrequent => {
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for &v in &present {
                *counts.entry(v.to_bits()).or_insert(0) += 1;
            }
            // ties resolve to the smallest value
            counts
                .into_iter()
                .map(|(bits, count)| (f64::from_bits(bits), count))
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
                .map(|(v, _)| v)
        }
        ImputeStrategy::Constant(v) => Some(*v),
    };
    stat.unwrap_or(0.0)
}

impl Transformer for SimpleImputer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = SimpleImputerParams;
    type Fitted = FittedSimpleImputer;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted> {
        if data.nrows() == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit SimpleImputer on empty data".to_string(),
            ));
        }
        let statistics = data
            .axis_iter(Axis(1))
            .map(|col| column_statistic(&col.to_vec(), &self.strategy))
            .collect();
        Ok(FittedSimpleImputer {
            strategy: self.strategy.clone(),
            statistics,
            n_features: data.ncols(),
        })
    }
}

/// Fitted SimpleImputer ready for inference.
#[derive(Clone, Debug)]
pub struct FittedSimpleImputer {
    strategy: ImputeStrategy,
    statistics: Vec<f64>,
    n_features: usize,
}

impl FittedSimpleImputer {
    /// Fill value of each feature.
    pub fn statistics(&self) -> &[f64] {
        &self.statistics
    }
}

impl FittedTransformer for FittedSimpleImputer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = SimpleImputerParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        if data.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features,
                got_features: data.ncols(),
            });
        }
        let mut out = data.clone();
        for (mut col, &fill) in out.axis_iter_mut(Axis(1)).zip(&self.statistics) {
            col.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        Ok(out)
    }

    fn inverse_transform(&self, _data: &Self::Output) -> Result<Self::Input> {
        Err(PipelineError::InvalidParameter(
            "SimpleImputer does not support inverse_transform (missing value information is lost)"
                .to_string(),
        ))
    }

    fn extract_params(&self) -> Self::Params {
        SimpleImputerParams {
            strategy: self.strategy.clone(),
            statistics: self.statistics.clone(),
            n_features: self.n_features,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        Ok(Self {
            strategy: params.strategy,
            statistics: params.statistics,
            n_features: params.n_features,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }
}
