//! Iterative (round-robin regression) imputer.
//!
//! Missing values are first filled with a [`SimpleImputer`] statistic. Then,
//! for up to `max_iter` rounds, every column that had missing values at fit
//! time is regressed (centered ridge) on all other columns and its missing
//! cells are replaced by the predictions. Fitting stops early once the
//! largest change of an imputed cell falls under `tol * max|observed|`.
//!
//! Every round's regressions are kept, and `transform` replays them in order
//! on new data.

use crate::cancel::CancelFlag;
use crate::config::ImputerConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::imputation::simple::{
    FittedSimpleImputer, SimpleImputer, SimpleImputerParams,
};
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ridge regression of one column on the others, fitted on centered data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnRegression {
    pub target: usize,
    pub predictors: Vec<usize>,
    pub x_mean: Vec<f64>,
    pub y_mean: f64,
    pub coef: Vec<f64>,
}

impl ColumnRegression {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        self.predictors
            .iter()
            .zip(self.x_mean.iter().zip(&self.coef))
            .fold(self.y_mean, |acc, (&k, (&m, &b))| acc + b * (row[k] - m))
    }
}

/// Serializable parameters for a fitted IterativeImputer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterativeImputerParams {
    pub initial: SimpleImputerParams,
    /// Regressions of each completed round, in application order.
    pub rounds: Vec<Vec<ColumnRegression>>,
    pub n_features: usize,
}

/// IterativeImputer transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct IterativeImputer {
    config: ImputerConfig,
    cancel: Option<CancelFlag>,
}

impl IterativeImputer {
    pub fn new(config: ImputerConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Check `flag` before every round.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(PipelineError::NumericalError(format!(
                "singular system at column {}",
                col
            )));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

/// Fit a centered ridge regression of `target` on `predictors` over `rows`.
fn fit_column(
    x: &Array2<f64>,
    rows: &[usize],
    target: usize,
    predictors: Vec<usize>,
    alpha: f64,
) -> Result<ColumnRegression> {
    let design = x.select(Axis(0), rows).select(Axis(1), &predictors);
    let y: Array1<f64> = rows.iter().map(|&i| x[[i, target]]).collect();

    let x_mean = design
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(predictors.len()));
    let y_mean = y.mean().unwrap_or(0.0);
    let centered = &design - &x_mean;
    let yc = &y - y_mean;

    let mut gram = centered.t().dot(&centered);
    for k in 0..gram.nrows() {
        gram[[k, k]] += alpha;
    }
    let rhs = centered.t().dot(&yc);
    let coef = if predictors.is_empty() {
        Array1::zeros(0)
    } else {
        solve(gram, rhs)?
    };

    Ok(ColumnRegression {
        target,
        predictors,
        x_mean: x_mean.to_vec(),
        y_mean,
        coef: coef.to_vec(),
    })
}

impl Transformer for IterativeImputer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = IterativeImputerParams;
    type Fitted = FittedIterativeImputer;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted> {
        let (n_rows, n_features) = data.dim();
        if n_rows == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit IterativeImputer on empty data".to_string(),
            ));
        }

        let initial = SimpleImputer::new(self.config.initial_strategy.clone()).fit(data)?;
        let mut x = initial.transform(data)?;

        // columns with some, but not all, values missing
        let mut targets = Vec::new();
        let mut observed_rows = Vec::new();
        let mut missing_rows = Vec::new();
        for j in 0..n_features {
            let (obs, miss): (Vec<usize>, Vec<usize>) =
                (0..n_rows).partition(|&i| !data[[i, j]].is_nan());
            if !miss.is_empty() && !obs.is_empty() {
                targets.push(j);
                observed_rows.push(obs);
                missing_rows.push(miss);
            }
        }

        let scale = data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(0.0f64, |m, v| m.max(v.abs()));
        let threshold = self.config.tol * scale;

        let mut rounds = Vec::new();
        if !targets.is_empty() {
            for round in 0..self.config.max_iter {
                if let Some(flag) = &self.cancel {
                    flag.check()?;
                }
                let mut models = Vec::with_capacity(targets.len());
                let mut change = 0.0f64;
                for (t, &j) in targets.iter().enumerate() {
                    let predictors: Vec<usize> = (0..n_features).filter(|&k| k != j).collect();
                    let model =
                        fit_column(&x, &observed_rows[t], j, predictors, self.config.ridge_alpha)?;
                    for &i in &missing_rows[t] {
                        let value = model.predict(x.row(i));
                        change = change.max((value - x[[i, j]]).abs());
                        x[[i, j]] = value;
                    }
                    models.push(model);
                }
                rounds.push(models);
                debug!(round, change, threshold, "iterative imputation round");
                if change < threshold {
                    break;
                }
            }
        }

        Ok(FittedIterativeImputer {
            initial,
            rounds,
            n_features,
        })
    }
}

/// Fitted IterativeImputer ready for inference.
#[derive(Clone, Debug)]
pub struct FittedIterativeImputer {
    initial: FittedSimpleImputer,
    rounds: Vec<Vec<ColumnRegression>>,
    n_features: usize,
}

impl FittedIterativeImputer {
    /// Number of regression rounds replayed by `transform`.
    pub fn n_rounds(&self) -> usize {
        self.rounds.len()
    }
}

impl FittedTransformer for FittedIterativeImputer {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = IterativeImputerParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output> {
        let mut x = self.initial.transform(data)?;
        for round in &self.rounds {
            for model in round {
                for i in 0..data.nrows() {
                    if data[[i, model.target]].is_nan() {
                        x[[i, model.target]] = model.predict(x.row(i));
                    }
                }
            }
        }
        Ok(x)
    }

    fn inverse_transform(&self, _data: &Self::Output) -> Result<Self::Input> {
        Err(PipelineError::InvalidParameter(
            "IterativeImputer does not support inverse_transform".to_string(),
        ))
    }

    fn extract_params(&self) -> Self::Params {
        IterativeImputerParams {
            initial: self.initial.extract_params(),
            rounds: self.rounds.clone(),
            n_features: self.n_features,
        }
    }

    fn from_params(params: Self::Params) -> Result<Self> {
        Ok(Self {
            initial: FittedSimpleImputer::from_params(params.initial)?,
            rounds: params.rounds,
            n_features: params.n_features,
        })
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }
}
