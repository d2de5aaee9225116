//! CART decision tree with Gini splits.
//!
//! Nodes live in a flat arena; children are referenced by index. The tree is
//! grown breadth-unordered from an explicit work stack so depth is not bounded
//! by the call stack.

use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features evaluated per split.
    pub max_features: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }
}

/// A node of the arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { class_probs: Vec<f64> },
}

/// A fitted classification tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `samples`.
    ///
    /// `samples` may contain repeats (bootstrap draws); each occurrence counts
    /// once towards node sizes and leaf distributions.
    pub fn fit<R: Rng>(
        x: &Array2<f64>,
        y: &[usize],
        samples: &[usize],
        n_classes: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} labels", x.nrows()),
                got: format!("{} labels", y.len()),
            });
        }
        if samples.is_empty() {
            return Err(PipelineError::EmptyData(
                "Cannot grow a tree without samples".to_string(),
            ));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(PipelineError::InvalidParameter(format!(
                "Label {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let mut tree = Self {
            nodes: Vec::new(),
            n_features: x.ncols(),
            n_classes,
        };
        let mut features: Vec<usize> = (0..x.ncols()).collect();

        tree.nodes.push(Node::Leaf {
            class_probs: Vec::new(),
        });
        let mut stack = vec![(0usize, samples.to_vec(), 0usize)];

        while let Some((index, rows, depth)) = stack.pop() {
            let counts = class_counts(y, &rows, n_classes);
            let n = rows.len();

            let stop = n < params.min_samples_split
                || n < 2 * params.min_samples_leaf
                || params.max_depth.map_or(false, |d| depth >= d)
                || counts.iter().filter(|&&c| c > 0).count() <= 1;

            let split = if stop {
                None
            } else {
                features.shuffle(rng);
                best_split(x, y, &rows, &features, n_classes, params)
            };

            match split {
                Some(best) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .iter()
                        .partition(|&&r| x[[r, best.feature]] <= best.threshold);

                    let left = tree.nodes.len();
                    tree.nodes.push(Node::Leaf {
                        class_probs: Vec::new(),
                    });
                    let right = tree.nodes.len();
                    tree.nodes.push(Node::Leaf {
                        class_probs: Vec::new(),
                    });
                    tree.nodes[index] = Node::Split {
                        feature: best.feature,
                        threshold: best.threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                None => {
                    tree.nodes[index] = Node::Leaf {
                        class_probs: counts.iter().map(|&c| c as f64 / n as f64).collect(),
                    };
                }
            }
        }

        Ok(tree)
    }

    /// Leaf class distribution for one row.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { class_probs } => return class_probs,
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[index] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }
}

fn class_counts(y: &[usize], rows: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &r in rows {
        counts[y[r]] += 1;
    }
    counts
}

/// Best Gini split over the shuffled `features`.
///
/// Minimizing weighted Gini impurity is the same as maximizing
/// `Σ l_c² / n_l + Σ r_c² / n_r`, which can be updated incrementally while
/// sweeping a sorted column.
fn best_split(
    x: &Array2<f64>,
    y: &[usize],
    rows: &[usize],
    features: &[usize],
    n_classes: usize,
    params: &TreeParams,
) -> Option<BestSplit> {
    let n = rows.len();
    let total = class_counts(y, rows, n_classes);
    let mut best: Option<BestSplit> = None;
    let mut evaluated = 0;
    let mut column: Vec<(f64, usize)> = Vec::with_capacity(n);

    for &feature in features {
        if evaluated >= params.max_features {
            break;
        }
        column.clear();
        column.extend(rows.iter().map(|&r| (x[[r, feature]], y[r])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let (lo, hi) = (column[0].0, column[n - 1].0);
        if lo == hi || !lo.is_finite() && !hi.is_finite() {
            continue;
        }
        evaluated += 1;

        let mut left = vec![0usize; n_classes];
        let mut right = total.clone();
        let mut left_sq = 0.0;
        let mut right_sq: f64 = right.iter().map(|&c| (c * c) as f64).sum();

        for i in 0..n - 1 {
            let (value, class) = column[i];
            left_sq += (2 * left[class] + 1) as f64;
            right_sq -= (2 * right[class] - 1) as f64;
            left[class] += 1;
            right[class] -= 1;

            let next = column[i + 1].0;
            if value == next || next.is_nan() {
                continue;
            }
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                continue;
            }

            let score = left_sq / n_left as f64 + right_sq / n_right as f64;
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(BestSplit {
                    feature,
                    threshold: midpoint(value, next),
                    score,
                });
            }
        }
    }

    best
}

fn midpoint(a: f64, b: f64) -> f64 {
    let mid = a / 2.0 + b / 2.0;
    if mid >= b || !mid.is_finite() {
        a
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grow(x: &Array2<f64>, y: &[usize], params: &TreeParams) -> DecisionTree {
        let samples: Vec<usize> = (0..y.len()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        DecisionTree::fit(x, y, &samples, 2, params, &mut rng).unwrap()
    }

    #[test]
    fn test_separable_data_is_learned_exactly() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [10.0, 5.0], [11.0, 5.0], [12.0, 5.0]];
        let y = [0, 0, 0, 1, 1, 1];
        let tree = grow(&x, &y, &TreeParams::default());

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        match &tree.nodes()[0] {
            Node::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 6.5);
            }
            other => panic!("expected split, got {:?}", other),
        }
        assert_eq!(tree.predict_row(array![2.5, 0.0].view()), &[1.0, 0.0]);
        assert_eq!(tree.predict_row(array![6.6, 0.0].view()), &[0.0, 1.0]);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let tree = grow(&x, &[1, 1, 1], &TreeParams::default());
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_row(array![100.0].view()), &[0.0, 1.0]);
    }

    #[test]
    fn test_constant_features_give_leaf_distribution() {
        let x = array![[4.0], [4.0], [4.0], [4.0]];
        let tree = grow(&x, &[0, 1, 1, 1], &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(array![4.0].view()), &[0.25, 0.75]);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = [0, 1, 0, 1, 0, 1];
        let params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let tree = grow(&x, &y, &params);
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [1, 0, 0, 0, 0];
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = grow(&x, &y, &params);
        if let Node::Split { threshold, .. } = &tree.nodes()[0] {
            assert!(*threshold >= 2.0);
        }
    }

    #[test]
    fn test_repeated_samples_weight_leaves() {
        let x = array![[1.0], [9.0]];
        let y = [0, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &[0, 0, 0, 1], 2, &TreeParams {
            max_depth: Some(0),
            ..TreeParams::default()
        }, &mut rng)
        .unwrap();
        assert_eq!(tree.predict_row(array![1.0].view()), &[0.75, 0.25]);
    }

    #[test]
    fn test_label_out_of_range() {
        let x = array![[1.0], [2.0]];
        let mut rng = StdRng::seed_from_u64(0);
        let result = DecisionTree::fit(&x, &[0, 2], &[0, 1], 2, &TreeParams::default(), &mut rng);
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn test_midpoint_never_reaches_upper_value() {
        let a: f64 = 1.0;
        let b = f64::from_bits(a.to_bits() + 1);
        assert_eq!(midpoint(a, b), a);
        assert_eq!(midpoint(2.0, 4.0), 3.0);
    }
}
