//! Single-record inference.

use crate::config::AdvisorConfig;
use crate::dataset::{fields, Record};
use crate::error::{PipelineError, Result};
use crate::model::{load_model, Classifier, FittedForest, ModelSource};
use crate::preprocessing::FittedFeaturePipeline;
use crate::reconcile::{CityReference, ReconciledRow, SchemaReconciler};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of one prediction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionResult {
    /// 1 for a good investment, 0 otherwise.
    pub prediction: u8,
    /// `[P(0), P(1)]`, absent when the model is not binary.
    pub probability: Option<[f64; 2]>,
    pub input_features: ReconciledRow,
    /// Recovered artifact problems from loading.
    pub warnings: Vec<String>,
}

/// Fitted pipeline, classifier and city reference loaded once and reused.
#[derive(Clone, Debug)]
pub struct Predictor {
    pipeline: FittedFeaturePipeline,
    model: FittedForest,
    source: ModelSource,
    cities: CityReference,
    warnings: Vec<String>,
}

impl Predictor {
    /// Load every artifact named by `config.paths`.
    ///
    /// The training corpus is only read when the fitted schema uses
    /// `City_Median`.
    pub fn load(config: &AdvisorConfig) -> Result<Self> {
        let paths = &config.paths;
        let (model, source) = load_model(paths)?;
        let (pipeline, warnings) = FittedFeaturePipeline::load(paths)?;
        let cities = if pipeline.schema().requires(fields::CITY_MEDIAN) {
            CityReference::load(&paths.training_data, pipeline.config())
        } else {
            CityReference::Unavailable(format!("{} not used by the model", fields::CITY_MEDIAN))
        };
        info!(?source, warnings = warnings.len(), "loaded predictor");
        Self::from_parts(pipeline, model, source, cities, warnings)
    }

    /// Assemble a predictor from already loaded parts.
    pub fn from_parts(
        pipeline: FittedFeaturePipeline,
        model: FittedForest,
        source: ModelSource,
        cities: CityReference,
        warnings: Vec<String>,
    ) -> Result<Self> {
        if model.n_features_in() != pipeline.n_features_out() {
            return Err(PipelineError::FeatureMismatch {
                expected_features: pipeline.n_features_out(),
                got_features: model.n_features_in(),
            });
        }
        Ok(Self {
            pipeline,
            model,
            source,
            cities,
            warnings,
        })
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn pipeline(&self) -> &FittedFeaturePipeline {
        &self.pipeline
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Reconcile `record` against the schema and classify it.
    pub fn predict(&self, record: &Record) -> Result<PredictionResult> {
        let row = SchemaReconciler::new(&self.pipeline, &self.cities).reconcile(record);
        debug!(substitutions = row.substitutions().len(), "reconciled record");

        let proba = row
            .to_array()
            .and_then(|x| self.pipeline.route(&x))
            .and_then(|x| self.model.predict_proba(&x))
            .map_err(|e| PipelineError::PredictionFailed(e.to_string()))?;
        let p = proba.row(0);
        if p.len() < 2 || p.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::PredictionFailed(format!(
                "unusable class probabilities {:?}",
                p.to_vec()
            )));
        }
        // argmax with ties to the lower class, matching `Classifier::predict`
        let prediction = u8::from(p[1] > p[0]);
        let probability = (p.len() == 2).then(|| [p[0], p[1]]);

        Ok(PredictionResult {
            prediction,
            probability,
            input_features: row,
            warnings: self.warnings.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ForestConfig, ImputerConfig};
    use crate::dataset::Frame;
    use crate::features::{add_price_per_area, label_good_investment};
    use crate::model::RandomForest;
    use crate::outcome::DefaultReason;
    use crate::preprocessing::FeaturePipeline;
    use ndarray::Array2;

    const CORPUS: &str = "\
City,Price_in_Lakhs,Size_in_SqFt,Year_Built,Parking_Space
Pune,50,1000,2000,Yes
Pune,80,1000,2005,No
Pune,120,1000,1995,Yes
Pune,60,1200,2010,No
Delhi,200,1500,1990,Yes
Delhi,150,1500,2001,No
Delhi,300,1500,2015,Yes
Delhi,180,1400,1985,No
";

    fn fitted() -> (FittedFeaturePipeline, FittedForest, CityReference) {
        let config = crate::config::FeatureConfig::default();
        let mut frame = Frame::from_reader(CORPUS.as_bytes()).unwrap();
        let cities = CityReference::from_frame(&frame, &config).unwrap();
        add_price_per_area(&mut frame, &config).unwrap();
        let target = label_good_investment(&mut frame, &config).unwrap();
        let (pipeline, x) = FeaturePipeline::new(config, ImputerConfig::default())
            .fit_transform(&frame, &target)
            .unwrap();
        let y: Vec<usize> = target.iter().map(|&v| v as usize).collect();
        let forest = RandomForest::new(ForestConfig {
            n_trees: 5,
            ..ForestConfig::default()
        })
        .fit(&x, &y)
        .unwrap();
        (pipeline, forest, cities)
    }

    #[test]
    fn test_predict_partial_record() {
        let (pipeline, forest, cities) = fitted();
        let predictor = Predictor::from_parts(
            pipeline,
            forest,
            ModelSource::Local("model.bin".into()),
            cities,
            Vec::new(),
        )
        .unwrap();

        let record = Record::new()
            .with(fields::CITY, "Pune")
            .with(fields::PRICE, 40.0)
            .with(fields::SIZE, 1000.0);
        let result = predictor.predict(&record).unwrap();
        assert!(result.prediction <= 1);
        let [p0, p1] = result.probability.unwrap();
        assert!((p0 + p1 - 1.0).abs() < 1e-6);
        assert!(result.input_features.is_fully_numeric());
        assert!(result.input_features.was_defaulted(fields::PARKING));
    }

    #[test]
    fn test_unseen_parking_value_routes_to_zero_block() {
        let (pipeline, forest, cities) = fitted();
        let predictor = Predictor::from_parts(
            pipeline,
            forest,
            ModelSource::Local("model.bin".into()),
            cities,
            Vec::new(),
        )
        .unwrap();

        let record = Record::new()
            .with(fields::CITY, "Delhi")
            .with(fields::PARKING, "Valet")
            .with(fields::PRICE, 150.0)
            .with(fields::SIZE, 1500.0);
        let result = predictor.predict(&record).unwrap();
        assert!(result.prediction <= 1);
        assert!(result.input_features.substitutions().iter().any(|s| {
            s.column == fields::PARKING
                && matches!(s.reason, DefaultReason::UnseenCategory { .. })
        }));

        let routed = predictor
            .pipeline()
            .route(&result.input_features.to_array().unwrap())
            .unwrap();
        let outputs = &predictor.pipeline().schema().outputs;
        let parking: Vec<f64> = outputs
            .iter()
            .zip(routed.row(0))
            .filter(|(name, _)| name.starts_with("Parking_Space_"))
            .map(|(_, &v)| v)
            .collect();
        assert_eq!(parking, vec![0.0, 0.0]);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let (pipeline, _, cities) = fitted();
        let narrow = RandomForest::new(ForestConfig {
            n_trees: 1,
            ..ForestConfig::default()
        })
        .fit(&Array2::zeros((2, 1)), &[0, 1])
        .unwrap();
        let result = Predictor::from_parts(
            pipeline,
            narrow,
            ModelSource::Local("model.bin".into()),
            cities,
            Vec::new(),
        );
        assert!(matches!(result, Err(PipelineError::FeatureMismatch { .. })));
    }

    #[test]
    fn test_result_serializes_as_json() {
        let (pipeline, forest, cities) = fitted();
        let predictor = Predictor::from_parts(
            pipeline,
            forest,
            ModelSource::Local("model.bin".into()),
            cities,
            vec!["encoders unavailable".to_string()],
        )
        .unwrap();
        let result = predictor.predict(&Record::new()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["input_features"]["features"].is_object());
        assert_eq!(json["warnings"][0], "encoders unavailable");
    }
}
