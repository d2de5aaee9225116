//! Random forest of bootstrapped Gini trees.

use crate::cancel::CancelFlag;
use crate::config::ForestConfig;
use crate::error::{PipelineError, Result};
use crate::model::tree::{DecisionTree, TreeParams};
use crate::model::Classifier;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Unfitted forest: hyperparameters plus an optional cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct RandomForest {
    config: ForestConfig,
    cancel: CancelFlag,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            cancel: CancelFlag::default(),
        }
    }

    /// Check `flag` before growing each tree.
    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Fit on `x` with integer class labels `y`.
    ///
    /// Tree `t` draws its bootstrap sample and feature order from
    /// `StdRng::seed_from_u64(seed + t)`, so the fitted forest does not depend
    /// on how rayon schedules the trees.
    pub fn fit(&self, x: &Array2<f64>, y: &[usize]) -> Result<FittedForest> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(PipelineError::EmptyData(
                "Cannot fit a forest on empty data".to_string(),
            ));
        }
        if n_samples != y.len() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} labels", n_samples),
                got: format!("{} labels", y.len()),
            });
        }
        if self.config.n_trees == 0 {
            return Err(PipelineError::InvalidParameter(
                "n_trees must be at least 1".to_string(),
            ));
        }

        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let params = TreeParams {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split.max(2),
            min_samples_leaf: self.config.min_samples_leaf.max(1),
            max_features: self.config.max_features.resolve(n_features),
        };
        info!(
            n_trees = self.config.n_trees,
            n_samples,
            n_features,
            max_features = params.max_features,
            "fitting random forest"
        );

        let trees = (0..self.config.n_trees)
            .into_par_iter()
            .map(|t| {
                self.cancel.check()?;
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(t as u64));
                let samples: Vec<usize> = if self.config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let tree = DecisionTree::fit(x, y, &samples, n_classes, &params, &mut rng)?;
                debug!(tree = t, leaves = tree.n_leaves(), depth = tree.depth(), "grew tree");
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FittedForest {
            trees,
            n_features,
            n_classes,
        })
    }
}

/// A fitted forest. Probabilities are the mean of the trees' leaf distributions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

impl FittedForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Classifier for FittedForest {
    fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected_features: self.n_features,
                got_features: x.ncols(),
            });
        }
        if self.trees.is_empty() {
            return Err(PipelineError::InvalidParameter(
                "Forest has no trees".to_string(),
            ));
        }

        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for (row, mut out) in x.outer_iter().zip(proba.outer_iter_mut()) {
            for tree in &self.trees {
                for (o, p) in out.iter_mut().zip(tree.predict_row(row)) {
                    *o += p;
                }
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }
}
