//! The investment classifier and its persistence.
//!
//! A fitted model only carries inference parameters (tree arenas); the
//! hyperparameters and cancellation flag stay on the unfitted [`RandomForest`].

pub mod forest;
pub mod store;
pub mod tree;

pub use forest::{FittedForest, RandomForest};
pub use store::{load_model, save_local, ModelSource, TrackingRun};
pub use tree::{DecisionTree, Node, TreeParams};

use crate::error::Result;
use ndarray::Array2;

/// A fitted probabilistic classifier.
pub trait Classifier {
    fn n_features_in(&self) -> usize;

    fn n_classes(&self) -> usize;

    /// Class probabilities, one row per input row.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Most probable class per row. Ties go to the lower class index.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |(best, best_p), (class, &p)| {
                        if p > best_p {
                            (class, p)
                        } else {
                            (best, best_p)
                        }
                    })
                    .0
            })
            .collect())
    }
}
