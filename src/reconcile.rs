//! Inference-time schema reconciliation.
//!
//! Turns one partial, unordered record into the exact row the fitted pipeline
//! expects: derived fields are filled in, absent columns defaulted, categorical
//! values encoded, and every substitution recorded.

use crate::config::FeatureConfig;
use crate::dataset::{fields, Column, FieldValue, Frame, Record};
use crate::error::{PipelineError, Result};
use crate::features::{add_price_per_area, price_per_area_for_record, property_age_for_record};
use crate::outcome::{DefaultReason, Outcome};
use crate::preprocessing::{EncoderState, FeatureSchema, FittedFeaturePipeline, InputKind};
use ndarray::Array2;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Median price-per-area per city, taken from the training corpus.
#[derive(Clone, Debug, PartialEq)]
pub enum CityReference {
    Table(HashMap<String, f64>),
    /// The corpus could not be read; every lookup defaults to 0.
    Unavailable(String),
}

impl CityReference {
    /// Build the table from a corpus frame, deriving price-per-area first.
    pub fn from_frame(frame: &Frame, config: &FeatureConfig) -> Result<Self> {
        let mut frame = frame.clone();
        add_price_per_area(&mut frame, config)?;
        Ok(CityReference::Table(
            frame.group_median(fields::CITY, fields::PRICE_PER_AREA)?,
        ))
    }

    /// Read the corpus at `path`. Never fails; an unreadable corpus yields
    /// [`CityReference::Unavailable`].
    pub fn load(path: &Path, config: &FeatureConfig) -> Self {
        match Frame::from_csv_path(path).and_then(|f| Self::from_frame(&f, config)) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "city reference unavailable");
                CityReference::Unavailable(e.to_string())
            }
        }
    }

    pub fn lookup(&self, city: Option<&str>) -> Outcome<f64> {
        let table = match self {
            CityReference::Table(table) => table,
            CityReference::Unavailable(reason) => {
                return Outcome::defaulted(
                    0.0,
                    DefaultReason::CorpusUnavailable {
                        reason: reason.clone(),
                    },
                )
            }
        };
        let Some(city) = city else {
            return Outcome::defaulted(
                0.0,
                DefaultReason::MissingInput {
                    field: fields::CITY.to_string(),
                },
            );
        };
        match table.get(city) {
            Some(&median) => Outcome::Computed(median),
            None => Outcome::defaulted(
                0.0,
                DefaultReason::UnknownCity {
                    city: city.to_string(),
                },
            ),
        }
    }
}

/// One substituted value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Substitution {
    pub column: String,
    pub reason: DefaultReason,
}

/// A complete, ordered, fully numeric feature row plus its provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconciledRow {
    columns: Vec<String>,
    values: Vec<f64>,
    substitutions: Vec<Substitution>,
}

impl ReconciledRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    /// Whether `column` was substituted for any reason.
    pub fn was_defaulted(&self, column: &str) -> bool {
        self.substitutions.iter().any(|s| s.column == column)
    }

    pub fn is_fully_numeric(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The row as a `1 × n` matrix in schema order.
    pub fn to_array(&self) -> Result<Array2<f64>> {
        Array2::from_shape_vec((1, self.values.len()), self.values.clone()).map_err(|e| {
            PipelineError::InvalidShape {
                expected: format!("(1, {})", self.values.len()),
                got: e.to_string(),
            }
        })
    }

    /// The row as a single-row numeric frame.
    pub fn to_frame(&self) -> Result<Frame> {
        let mut frame = Frame::with_rows(1);
        for (name, &value) in self.columns.iter().zip(&self.values) {
            frame.insert(name, Column::Numeric(vec![value]))?;
        }
        Ok(frame)
    }
}

struct OrderedFeatures<'a>(&'a [String], &'a [f64]);

impl Serialize for OrderedFeatures<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0.iter().zip(self.1) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for ReconciledRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ReconciledRow", 2)?;
        state.serialize_field("features", &OrderedFeatures(&self.columns, &self.values))?;
        state.serialize_field("substitutions", &self.substitutions)?;
        state.end()
    }
}

/// Completes records against a fitted pipeline's schema and encoders.
#[derive(Clone, Copy, Debug)]
pub struct SchemaReconciler<'a> {
    schema: &'a FeatureSchema,
    encoders: &'a EncoderState,
    config: &'a FeatureConfig,
    cities: &'a CityReference,
}

impl<'a> SchemaReconciler<'a> {
    pub fn new(pipeline: &'a FittedFeaturePipeline, cities: &'a CityReference) -> Self {
        Self {
            schema: pipeline.schema(),
            encoders: pipeline.encoders(),
            config: pipeline.config(),
            cities,
        }
    }

    /// Reconcile one record. Never fails; every fallback is recorded in the
    /// row's substitutions.
    pub fn reconcile(&self, record: &Record) -> ReconciledRow {
        let mut record = record.clone();
        let mut substitutions = Vec::new();
        let mut note = |column: &str, reason: Option<DefaultReason>| {
            if let Some(reason) = reason {
                substitutions.push(Substitution {
                    column: column.to_string(),
                    reason,
                });
            }
        };

        if record.number(fields::PRICE_PER_AREA).is_none()
            && record.has(fields::PRICE)
            && record.has(fields::SIZE)
        {
            let (value, reason) = price_per_area_for_record(&record, self.config).into_parts();
            record.insert(fields::PRICE_PER_AREA, value);
            note(fields::PRICE_PER_AREA, reason);
        }

        if !record.has(fields::PROPERTY_AGE) && record.get(fields::YEAR_BUILT).is_some() {
            let (value, reason) = property_age_for_record(&record, self.config).into_parts();
            record.insert(fields::PROPERTY_AGE, value);
            note(fields::PROPERTY_AGE, reason);
        }

        if self.schema.requires(fields::CITY_MEDIAN) && !record.has(fields::CITY_MEDIAN) {
            let city = record.get(fields::CITY).and_then(FieldValue::as_text);
            let (value, reason) = self.cities.lookup(city.as_deref()).into_parts();
            record.insert(fields::CITY_MEDIAN, value);
            note(fields::CITY_MEDIAN, reason);
        }

        let table = Frame::from_record(&record);
        let mut session = self.encoders.session();
        let mut columns = Vec::with_capacity(self.schema.inputs.len());
        let mut values = Vec::with_capacity(self.schema.inputs.len());
        for input in &self.schema.inputs {
            let name = input.name.as_str();
            let present = table.cell(name, 0);
            if present.is_none() {
                note(name, Some(DefaultReason::AbsentColumn));
            }

            let value = match input.kind {
                InputKind::Numeric => match present {
                    None => 0.0,
                    Some(v) => match v.as_number() {
                        Some(n) => n,
                        None => {
                            note(
                                name,
                                Some(if v.is_missing() {
                                    DefaultReason::MissingInput {
                                        field: name.to_string(),
                                    }
                                } else {
                                    DefaultReason::NonNumeric {
                                        field: name.to_string(),
                                    }
                                }),
                            );
                            0.0
                        }
                    },
                },
                InputKind::LowCardinality | InputKind::HighCardinality => {
                    let text = match &present {
                        None => Some(self.config.missing_token.clone()),
                        Some(v) => v.as_text(),
                    };
                    match session.encode(name, text.as_deref()) {
                        Ok(outcome) => {
                            let (value, reason) = outcome.into_parts();
                            // an absent column is already tagged
                            if present.is_some() {
                                note(name, reason);
                            }
                            value
                        }
                        Err(e) => {
                            debug!(column = name, error = %e, "no encoder for column");
                            note(name, Some(DefaultReason::EncoderUnavailable));
                            0.0
                        }
                    }
                }
            };

            let value = if value.is_finite() {
                value
            } else {
                note(
                    name,
                    Some(DefaultReason::NonNumeric {
                        field: name.to_string(),
                    }),
                );
                0.0
            };
            columns.push(input.name.clone());
            values.push(value);
        }

        ReconciledRow {
            columns,
            values,
            substitutions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeaturePipeline;

    fn corpus() -> (Frame, Vec<f64>) {
        let csv = "City,Locality,Parking_Space,Size_in_SqFt,Price_in_Lakhs,Year_Built,City_Median\n\
                   Chennai,L1,Yes,1000,50,2000,5000\n\
                   Chennai,L2,No,1200,80,2005,5000\n\
                   Pune,L3,No,900,30,1995,4000\n\
                   Pune,L1,Yes,1500,90,2010,4000\n\
                   Delhi,L2,No,800,100,2015,9000\n\
                   Delhi,L3,Yes,1100,60,1990,9000\n";
        let frame = Frame::from_reader(csv.as_bytes()).unwrap();
        (frame, vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0])
    }

    fn pipeline() -> FittedFeaturePipeline {
        let (frame, labels) = corpus();
        let config = FeatureConfig {
            high_cardinality_threshold: 2,
            ..FeatureConfig::default()
        };
        FeaturePipeline::new(config, Default::default())
            .fit(&frame, &labels)
            .unwrap()
    }

    fn cities() -> CityReference {
        CityReference::from_frame(&corpus().0, &FeatureConfig::default()).unwrap()
    }

    #[test]
    fn test_city_reference_lookup() {
        let cities = cities();
        // Chennai: 5000 and 6666.67
        let chennai = cities.lookup(Some("Chennai"));
        assert!((chennai.value() - 5833.333).abs() < 1e-2);
        assert!(chennai.is_computed());
        assert!(matches!(
            cities.lookup(Some("Atlantis")).reason(),
            Some(DefaultReason::UnknownCity { .. })
        ));
        let unavailable = CityReference::Unavailable("gone".into()).lookup(Some("Chennai"));
        assert_eq!(*unavailable.value(), 0.0);
    }

    #[test]
    fn test_city_reference_load_never_fails() {
        let reference = CityReference::load(Path::new("/nonexistent/corpus.csv"), &FeatureConfig::default());
        assert!(matches!(reference, CityReference::Unavailable(_)));
    }

    #[test]
    fn test_complete_record_passes_through() {
        let pipeline = pipeline();
        let cities = cities();
        let reconciler = SchemaReconciler::new(&pipeline, &cities);
        let record = Record::new()
            .with("City", "Pune")
            .with("Locality", "L1")
            .with("Parking_Space", "No")
            .with("Size_in_SqFt", 1000.0)
            .with("Price_in_Lakhs", 40.0)
            .with("Year_Built", 2000.0)
            .with("City_Median", 4000.0)
            .with("Price_per_SqFt", 4000.0)
            .with("Age_of_Property", 25.0);

        let row = reconciler.reconcile(&record);
        assert!(row.substitutions().is_empty(), "{:?}", row.substitutions());
        assert_eq!(row.get("Size_in_SqFt"), Some(1000.0));
        assert_eq!(row.get("Price_per_SqFt"), Some(4000.0));
        assert_eq!(row.get("City_Median"), Some(4000.0));
        assert_eq!(row.len(), pipeline.schema().inputs.len());
        assert!(row.is_fully_numeric());
    }

    #[test]
    fn test_partial_record_is_completed_and_tagged() {
        let pipeline = pipeline();
        let cities = cities();
        let reconciler = SchemaReconciler::new(&pipeline, &cities);
        let record = Record::new()
            .with("City", "Chennai")
            .with("Parking_Space", "Valet")
            .with("Size_in_SqFt", 0.0)
            .with("Price_in_Lakhs", 40.0)
            .with("Year_Built", 1990.0);

        let row = reconciler.reconcile(&record);
        assert!(row.is_fully_numeric());
        assert_eq!(row.get("Price_per_SqFt"), Some(0.0));
        assert_eq!(row.get("Age_of_Property"), Some(35.0));
        assert!((row.get("City_Median").unwrap() - 5833.333).abs() < 1e-2);
        assert!(row.was_defaulted("Locality"));
        assert!(row.was_defaulted("Parking_Space"));
        assert!(row
            .substitutions()
            .iter()
            .any(|s| s.reason == DefaultReason::NonPositiveSize));
        // column order follows the schema
        let expected: Vec<&str> = pipeline.schema().input_names().collect();
        assert_eq!(row.columns(), expected.as_slice());
    }

    #[test]
    fn test_seen_category_keeps_training_code() {
        let pipeline = pipeline();
        let cities = cities();
        let reconciler = SchemaReconciler::new(&pipeline, &cities);
        let row = reconciler.reconcile(&Record::new().with("Parking_Space", "Yes"));
        // vocabulary: No, Yes
        assert_eq!(row.get("Parking_Space"), Some(1.0));
        assert!(!row
            .substitutions()
            .iter()
            .any(|s| s.column == "Parking_Space"));
    }

    #[test]
    fn test_absent_categorical_tagged_once() {
        let pipeline = pipeline();
        let cities = cities();
        let reconciler = SchemaReconciler::new(&pipeline, &cities);
        let row = reconciler.reconcile(&Record::new().with("City", "Pune"));
        for column in ["Parking_Space", "Locality"] {
            let reasons: Vec<&DefaultReason> = row
                .substitutions()
                .iter()
                .filter(|s| s.column == column)
                .map(|s| &s.reason)
                .collect();
            assert_eq!(reasons, vec![&DefaultReason::AbsentColumn], "{}", column);
        }
    }

    #[test]
    fn test_empty_record_and_bad_values() {
        let pipeline = pipeline();
        let cities = CityReference::Unavailable("no corpus".into());
        let reconciler = SchemaReconciler::new(&pipeline, &cities);
        let record = Record::new()
            .with("Size_in_SqFt", "huge")
            .with("Year_Built", FieldValue::Missing);
        let row = reconciler.reconcile(&record);
        assert!(row.is_fully_numeric());
        assert_eq!(row.get("Size_in_SqFt"), Some(0.0));
        assert_eq!(row.get("Age_of_Property"), Some(0.0));
        assert!(row.substitutions().iter().any(|s| matches!(
            s.reason,
            DefaultReason::CorpusUnavailable { .. }
        )));
    }

    #[test]
    fn test_missing_encoders_fill_zero() {
        let pipeline = pipeline();
        let cities = cities();
        let empty = EncoderState::empty();
        let reconciler = SchemaReconciler {
            encoders: &empty,
            ..SchemaReconciler::new(&pipeline, &cities)
        };
        let row = reconciler.reconcile(&Record::new().with("City", "Pune"));
        assert_eq!(row.get("City"), Some(0.0));
        assert!(row.substitutions().iter().any(|s| s.column == "City"
            && s.reason == DefaultReason::EncoderUnavailable));
    }

    #[test]
    fn test_row_serializes_as_ordered_object() {
        let pipeline = pipeline();
        let cities = cities();
        let row = SchemaReconciler::new(&pipeline, &cities).reconcile(&Record::new());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(
            json["features"].as_object().unwrap().len(),
            pipeline.schema().inputs.len()
        );
        assert!(json["substitutions"][0]["reason"]["kind"].is_string());
    }
}
