//! Model persistence: a local file plus an experiment-tracking tree.
//!
//! Tracking layout:
//!
//! ```text
//! <tracking>/<experiment>/<run>/artifacts/rf_investment_model/MLmodel
//! <tracking>/<experiment>/<run>/artifacts/rf_investment_model/model.bin
//! <tracking>/<experiment>/<run>/metrics.json
//! ```
//!
//! Run identifiers are UTC timestamps, so sorting run directories by name in
//! descending order visits the newest run first.

use crate::config::ArtifactPaths;
use crate::error::{PipelineError, Result};
use crate::model::FittedForest;
use crate::serialization::{load_bincode, load_json, save_bincode, save_json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DESCRIPTOR_FILE: &str = "MLmodel";
const DATA_FILE: &str = "model.bin";
const FLAVOR: &str = "estate_advisor.forest";
const DESCRIPTOR_VERSION: u32 = 1;

/// Where a loaded model came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Tracked { run: String, path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct ModelDescriptor {
    flavor: String,
    format_version: u32,
    data: String,
    created: String,
}

/// Write the model to `<model_dir>/rf_investment_model.bin`.
pub fn save_local(forest: &FittedForest, paths: &ArtifactPaths) -> Result<PathBuf> {
    let path = paths.model_file();
    save_bincode(forest, &path)?;
    Ok(path)
}

/// One run directory of the tracking tree.
#[derive(Clone, Debug)]
pub struct TrackingRun {
    id: String,
    dir: PathBuf,
}

impl TrackingRun {
    /// Create `<tracking_dir>/<experiment>/<run id>`.
    pub fn create(tracking_dir: &Path, experiment: &str) -> Result<Self> {
        let experiment_dir = tracking_dir.join(experiment);
        let base = Utc::now().format("%Y%m%dT%H%M%S%6fZ").to_string();
        let mut id = base.clone();
        let mut attempt = 1;
        while experiment_dir.join(&id).exists() {
            id = format!("{}-{}", base, attempt);
            attempt += 1;
        }
        let dir = experiment_dir.join(&id);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { id, dir })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the model and its descriptor under `artifacts/rf_investment_model/`.
    pub fn log_model(&self, forest: &FittedForest) -> Result<PathBuf> {
        let artifact = self
            .dir
            .join("artifacts")
            .join(ArtifactPaths::MODEL_ARTIFACT);
        save_bincode(forest, &artifact.join(DATA_FILE))?;
        let descriptor = ModelDescriptor {
            flavor: FLAVOR.to_string(),
            format_version: DESCRIPTOR_VERSION,
            data: DATA_FILE.to_string(),
            created: Utc::now().to_rfc3339(),
        };
        save_json(&descriptor, &artifact.join(DESCRIPTOR_FILE))?;
        info!(run = %self.id, path = %artifact.display(), "logged model");
        Ok(artifact)
    }

    /// Write `value` as `<run>/<name>.json`.
    pub fn log_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        save_json(value, &self.dir.join(format!("{}.json", name)))
    }
}

/// Load the classifier.
///
/// The local model file wins when it exists; a local file that cannot be
/// decoded is an error. Otherwise every run of every experiment under the
/// tracking directory is tried, newest name first, through its `MLmodel`
/// descriptor and then as a raw blob at the artifact path. Candidates that
/// fail to load are skipped.
pub fn load_model(paths: &ArtifactPaths) -> Result<(FittedForest, ModelSource)> {
    let local = paths.model_file();
    if local.is_file() {
        let forest = load_bincode(&local)?;
        debug!(path = %local.display(), "loaded local model");
        return Ok((forest, ModelSource::Local(local)));
    }

    for experiment in sorted_dirs_desc(&paths.tracking_dir) {
        for run in sorted_dirs_desc(&experiment) {
            let candidate = run.join("artifacts").join(ArtifactPaths::MODEL_ARTIFACT);
            if !candidate.exists() {
                continue;
            }
            let run_id = run
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match load_tracked(&candidate) {
                Ok(forest) => {
                    info!(run = %run_id, "loaded tracked model");
                    return Ok((
                        forest,
                        ModelSource::Tracked {
                            run: run_id,
                            path: candidate,
                        },
                    ));
                }
                Err(e) => debug!(path = %candidate.display(), error = %e, "skipping model candidate"),
            }
        }
    }

    Err(PipelineError::ModelNotFound {
        local,
        tracking: paths.tracking_dir.clone(),
    })
}

fn load_tracked(candidate: &Path) -> Result<FittedForest> {
    let structured = load_json::<ModelDescriptor>(&candidate.join(DESCRIPTOR_FILE)).and_then(
        |descriptor| {
            if descriptor.flavor != FLAVOR || descriptor.format_version != DESCRIPTOR_VERSION {
                return Err(PipelineError::CorruptArtifact {
                    path: candidate.join(DESCRIPTOR_FILE),
                    reason: format!(
                        "unsupported model flavor {} v{}",
                        descriptor.flavor, descriptor.format_version
                    ),
                });
            }
            load_bincode(&candidate.join(&descriptor.data))
        },
    );
    match structured {
        Ok(forest) => Ok(forest),
        Err(e) if candidate.is_file() => {
            debug!(error = %e, "descriptor load failed, reading artifact as a raw blob");
            load_bincode(candidate)
        }
        Err(e) => Err(e),
    }
}

fn sorted_dirs_desc(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(_) => Vec::new(),
    };
    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use crate::model::{Classifier, RandomForest};
    use ndarray::array;

    fn tiny_forest(seed: u64) -> FittedForest {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        RandomForest::new(ForestConfig {
            n_trees: 2,
            seed,
            ..ForestConfig::default()
        })
        .fit(&x, &[0, 0, 1, 1])
        .unwrap()
    }

    #[test]
    fn test_local_model_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        let forest = tiny_forest(1);
        save_local(&forest, &paths).unwrap();
        TrackingRun::create(&paths.tracking_dir, &paths.experiment)
            .unwrap()
            .log_model(&tiny_forest(2))
            .unwrap();

        let (loaded, source) = load_model(&paths).unwrap();
        assert_eq!(loaded, forest);
        assert_eq!(source, ModelSource::Local(paths.model_file()));
    }

    #[test]
    fn test_newest_tracked_run_used() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        let older = TrackingRun::create(&paths.tracking_dir, &paths.experiment).unwrap();
        older.log_model(&tiny_forest(1)).unwrap();
        let newer = TrackingRun::create(&paths.tracking_dir, &paths.experiment).unwrap();
        let newest = tiny_forest(2);
        newer.log_model(&newest).unwrap();
        assert!(newer.id() > older.id());

        let (loaded, source) = load_model(&paths).unwrap();
        assert_eq!(loaded, newest);
        assert!(matches!(source, ModelSource::Tracked { ref run, .. } if run == newer.id()));
    }

    #[test]
    fn test_broken_run_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        let good = tiny_forest(3);
        TrackingRun::create(&paths.tracking_dir, &paths.experiment)
            .unwrap()
            .log_model(&good)
            .unwrap();
        let broken = paths
            .tracking_dir
            .join(&paths.experiment)
            .join("zzzz")
            .join("artifacts")
            .join(ArtifactPaths::MODEL_ARTIFACT);
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join(DESCRIPTOR_FILE), b"{").unwrap();

        let (loaded, _) = load_model(&paths).unwrap();
        assert_eq!(loaded, good);
    }

    #[test]
    fn test_raw_blob_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        let forest = tiny_forest(4);
        let artifact = paths
            .tracking_dir
            .join("0")
            .join("run")
            .join("artifacts")
            .join(ArtifactPaths::MODEL_ARTIFACT);
        save_bincode(&forest, &artifact).unwrap();

        let (loaded, _) = load_model(&paths).unwrap();
        assert_eq!(loaded.n_classes(), 2);
        assert_eq!(loaded, forest);
    }

    #[test]
    fn test_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        assert!(matches!(
            load_model(&paths),
            Err(PipelineError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_corrupt_local_model_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::rooted_at(dir.path());
        std::fs::create_dir_all(&paths.model_dir).unwrap();
        std::fs::write(paths.model_file(), b"garbage").unwrap();
        assert!(matches!(
            load_model(&paths),
            Err(PipelineError::CorruptArtifact { .. })
        ));
    }

    #[test]
    fn test_metrics_logged_next_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let run = TrackingRun::create(dir.path(), "exp").unwrap();
        run.log_json("metrics", &serde_json::json!({ "accuracy": 0.5 })).unwrap();
        assert!(run.dir().join("metrics.json").is_file());
    }
}
