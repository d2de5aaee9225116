//! Composite investment score for presentation layers.
//!
//! ```text
//! score = w_cheap * (max_ppa - ppa) / max_ppa
//!       + w_age   * (1 - age / (1 + max_age))
//!       + w_amen  * amenity_count / (1 + max_amenity_count)
//!       + w_trans * transit_level
//! ```
//!
//! Each signal is clipped to [0, 1]; a signal that is not finite, or whose
//! denominator is not positive, counts as 0. The total is clipped to [0, 1].

use crate::config::{FeatureConfig, ScoreWeights};
use crate::dataset::{fields, Frame, Record};
use crate::stats;
use serde::{Deserialize, Serialize};

/// Number of non-empty comma-separated entries.
pub fn amenity_count(amenities: Option<&str>) -> usize {
    amenities
        .map(|s| s.split(',').filter(|item| !item.trim().is_empty()).count())
        .unwrap_or(0)
}

/// Transit accessibility level. Unknown or missing levels sit in the middle.
pub fn transit_level(level: Option<&str>) -> f64 {
    match level.map(str::trim) {
        Some("Low") => 0.0,
        Some("Medium") => 0.5,
        Some("High") => 1.0,
        _ => 0.5,
    }
}

fn unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 && denominator.is_finite() {
        unit(numerator / denominator)
    } else {
        0.0
    }
}

/// Scores listings against maxima taken from a reference batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestmentScorer {
    weights: ScoreWeights,
    max_price_per_area: f64,
    max_age: f64,
    max_amenities: f64,
}

impl InvestmentScorer {
    pub fn new(weights: ScoreWeights, max_price_per_area: f64, max_age: f64, max_amenities: f64) -> Self {
        Self {
            weights,
            max_price_per_area,
            max_age,
            max_amenities,
        }
    }

    /// Take the maxima from `frame`. Absent columns contribute a maximum of 0.
    pub fn from_frame(frame: &Frame, config: &FeatureConfig) -> Self {
        let column_max = |name: &str| {
            frame
                .column(name)
                .and_then(|c| stats::max(&c.to_numeric()))
                .unwrap_or(0.0)
        };
        let max_amenities = match frame.column(fields::AMENITIES) {
            Some(c) => c
                .to_categorical()
                .iter()
                .map(|a| amenity_count(a.as_deref()))
                .max()
                .unwrap_or(0),
            None => 0,
        };
        Self::new(
            config.score_weights.clone(),
            column_max(fields::PRICE_PER_AREA),
            column_max(fields::PROPERTY_AGE),
            max_amenities as f64,
        )
    }

    pub fn score(
        &self,
        price_per_area: f64,
        age: f64,
        amenities: Option<&str>,
        transit: Option<&str>,
    ) -> f64 {
        let w = &self.weights;
        let cheapness = ratio(self.max_price_per_area - price_per_area, self.max_price_per_area);
        let age_denominator = 1.0 + self.max_age;
        let age_signal = if age_denominator > 0.0 {
            unit(1.0 - age / age_denominator)
        } else {
            0.0
        };
        let amenity_signal = ratio(amenity_count(amenities) as f64, 1.0 + self.max_amenities);
        let transit_signal = transit_level(transit);

        unit(
            w.cheapness * cheapness
                + w.age * age_signal
                + w.amenities * amenity_signal
                + w.transit * transit_signal,
        )
    }

    /// Score a raw record. Missing numeric inputs count as NaN.
    pub fn score_record(&self, record: &Record) -> f64 {
        let amenities = record.get(fields::AMENITIES).and_then(|v| v.as_text());
        let transit = record.get(fields::TRANSIT).and_then(|v| v.as_text());
        self.score(
            record.number(fields::PRICE_PER_AREA).unwrap_or(f64::NAN),
            record.number(fields::PROPERTY_AGE).unwrap_or(f64::NAN),
            amenities.as_deref(),
            transit.as_deref(),
        )
    }

    /// Score every row of `frame`.
    pub fn score_frame(&self, frame: &Frame) -> Vec<f64> {
        let n = frame.n_rows();
        let numeric = |name: &str| {
            frame
                .column(name)
                .map(|c| c.to_numeric())
                .unwrap_or_else(|| vec![f64::NAN; n])
        };
        let text = |name: &str| {
            frame
                .column(name)
                .map(|c| c.to_categorical())
                .unwrap_or_else(|| vec![None; n])
        };
        let ppa = numeric(fields::PRICE_PER_AREA);
        let age = numeric(fields::PROPERTY_AGE);
        let amenities = text(fields::AMENITIES);
        let transit = text(fields::TRANSIT);
        (0..n)
            .map(|i| self.score(ppa[i], age[i], amenities[i].as_deref(), transit[i].as_deref()))
            .collect()
    }
}
