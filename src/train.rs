//! Training orchestration: corpus → labels → feature pipeline → forest → artifacts.

use crate::cancel::CancelFlag;
use crate::config::AdvisorConfig;
use crate::dataset::Frame;
use crate::error::{PipelineError, Result};
use crate::features::{add_price_per_area, label_good_investment};
use crate::model::{save_local, Classifier, RandomForest, TrackingRun};
use crate::preprocessing::FeaturePipeline;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Held-out precision and recall for one class.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub support: usize,
}

/// Held-out evaluation of a fitted classifier.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
}

impl Evaluation {
    /// Compare predictions with the true labels. Undefined ratios are 0.
    pub fn compute(truth: &[usize], predicted: &[usize], n_classes: usize) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} predictions", truth.len()),
                got: format!("{} predictions", predicted.len()),
            });
        }
        if truth.is_empty() {
            return Err(PipelineError::EmptyData(
                "Cannot evaluate on an empty split".to_string(),
            ));
        }
        let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
        let per_class = (0..n_classes)
            .map(|class| {
                let tp = truth
                    .iter()
                    .zip(predicted)
                    .filter(|&(&t, &p)| t == class && p == class)
                    .count();
                let predicted_pos = predicted.iter().filter(|&&p| p == class).count();
                let support = truth.iter().filter(|&&t| t == class).count();
                ClassMetrics {
                    class,
                    precision: ratio(tp, predicted_pos),
                    recall: ratio(tp, support),
                    support,
                }
            })
            .collect();
        Ok(Self {
            accuracy: correct as f64 / truth.len() as f64,
            per_class,
        })
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Summary of a training run.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub label_counts: BTreeMap<usize, usize>,
    pub feature_columns: Vec<String>,
    pub evaluation: Evaluation,
    pub model_path: PathBuf,
    pub run_id: String,
}

/// Split row indices into `(train, test)`, preserving class proportions.
///
/// Each class with at least two rows contributes `round(n * test_fraction)`
/// rows to the test side, clamped to `[1, n - 1]`. Singleton classes stay in
/// training. Both sides are returned sorted.
pub fn stratified_split(labels: &[usize], test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidParameter(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for (_, mut rows) in by_class {
        rows.shuffle(&mut rng);
        let n = rows.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1)
        };
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Run the full training job described by `config`.
///
/// `cancel` is checked between imputer rounds and between forest trees.
pub fn train(config: &AdvisorConfig, cancel: CancelFlag) -> Result<TrainingReport> {
    let paths = &config.paths;
    let mut frame = Frame::from_csv_path(&paths.training_data)?;
    info!(
        path = %paths.training_data.display(),
        rows = frame.n_rows(),
        columns = frame.n_cols(),
        "loaded training corpus"
    );

    add_price_per_area(&mut frame, &config.features)?;
    let target = label_good_investment(&mut frame, &config.features)?;
    let labels: Vec<usize> = target.iter().map(|&v| v as usize).collect();
    let mut label_counts = BTreeMap::new();
    for &label in &labels {
        *label_counts.entry(label).or_insert(0usize) += 1;
    }
    info!(?label_counts, "labeled corpus");
    if label_counts.len() < 2 {
        return Err(PipelineError::Labeling(format!(
            "labeling produced {} class(es); the corpus needs both good and poor investments",
            label_counts.len()
        )));
    }

    let (pipeline, x) = FeaturePipeline::new(config.features.clone(), config.imputer.clone())
        .with_cancel(cancel.clone())
        .fit_transform(&frame, &target)?;

    let (train_idx, test_idx) = stratified_split(&labels, config.forest.test_fraction, config.forest.seed)?;
    let x_train = x.select(Axis(0), &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_train: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();
    info!(train = train_idx.len(), test = test_idx.len(), "split corpus");

    let forest = RandomForest::new(config.forest.clone())
        .with_cancel(cancel)
        .fit(&x_train, &y_train)?;
    let evaluation = Evaluation::compute(&y_test, &forest.predict(&x_test)?, forest.n_classes())?;
    info!(accuracy = evaluation.accuracy, "evaluated on held-out split");

    pipeline.save(paths)?;
    let model_path = save_local(&forest, paths)?;
    info!(path = %model_path.display(), "saved model");

    let run = TrackingRun::create(&paths.tracking_dir, &paths.experiment)?;
    run.log_model(&forest)?;
    run.log_json("metrics", &evaluation)?;

    Ok(TrainingReport {
        n_rows: frame.n_rows(),
        n_train: train_idx.len(),
        n_test: test_idx.len(),
        label_counts,
        feature_columns: pipeline.schema().outputs.clone(),
        evaluation,
        model_path,
        run_id: run.id().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stratified_split_keeps_proportions() {
        let labels: Vec<usize> = (0..50).map(|i| usize::from(i % 5 == 0)).collect();
        let (train, test) = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(train.len() + test.len(), 50);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 1).count(), 2);
        assert_eq!(test.iter().filter(|&&i| labels[i] == 0).count(), 8);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_stratified_split_is_seeded() {
        let labels: Vec<usize> = (0..30).map(|i| i % 2).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 7).unwrap(),
            stratified_split(&labels, 0.2, 7).unwrap()
        );
    }

    #[test]
    fn test_singleton_class_stays_in_training() {
        let (train, test) = stratified_split(&[0, 0, 0, 0, 1], 0.2, 1).unwrap();
        assert!(train.contains(&4));
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_invalid_test_fraction() {
        assert!(stratified_split(&[0, 1], 0.0, 1).is_err());
        assert!(stratified_split(&[0, 1], 1.0, 1).is_err());
    }

    #[test]
    fn test_evaluation_metrics() {
        let eval = Evaluation::compute(&[0, 0, 1, 1], &[0, 1, 1, 1], 2).unwrap();
        assert_eq!(eval.accuracy, 0.75);
        assert_eq!(eval.per_class[0].precision, 1.0);
        assert_eq!(eval.per_class[0].recall, 0.5);
        assert!((eval.per_class[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(eval.per_class[1].recall, 1.0);
        assert_eq!(eval.per_class[1].support, 2);
    }

    #[test]
    fn test_evaluation_on_empty_split() {
        assert!(Evaluation::compute(&[], &[], 2).is_err());
    }

    #[test]
    fn test_single_class_corpus_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("corpus.csv");
        std::fs::write(
            &csv,
            "City,Price_in_Lakhs,Size_in_SqFt\nPune,100,1000\nPune,100,1000\nPune,100,1000\n",
        )
        .unwrap();
        let mut config = AdvisorConfig::default();
        config.paths = crate::config::ArtifactPaths::rooted_at(dir.path());
        config.paths.training_data = csv;

        let result = train(&config, CancelFlag::new());
        assert!(matches!(result, Err(PipelineError::Labeling(_))));
    }
}
