//! Training label and price projection.

use crate::config::FeatureConfig;
use crate::dataset::{fields, Column, Frame};
use crate::error::{PipelineError, Result};

/// Add `City_Median` and `Good_Investment` to `frame` and return the labels.
///
/// A listing is a good investment when its price-per-area is below
/// `City_Median * undervalued_ratio`. Rows with a missing city or
/// price-per-area are labeled 0.
pub fn label_good_investment(frame: &mut Frame, config: &FeatureConfig) -> Result<Vec<f64>> {
    if !frame.contains(fields::CITY) || !frame.contains(fields::PRICE_PER_AREA) {
        return Err(PipelineError::Labeling(format!(
            "required columns missing: {}, {}",
            fields::CITY,
            fields::PRICE_PER_AREA
        )));
    }
    let medians = frame.group_median(fields::CITY, fields::PRICE_PER_AREA)?;
    let cities = frame
        .column(fields::CITY)
        .map(Column::to_categorical)
        .unwrap_or_default();
    let ppa = frame.numeric(fields::PRICE_PER_AREA)?.to_vec();

    let city_median: Vec<f64> = cities
        .iter()
        .map(|c| {
            c.as_ref()
                .and_then(|c| medians.get(c).copied())
                .unwrap_or(f64::NAN)
        })
        .collect();
    let labels: Vec<f64> = ppa
        .iter()
        .zip(&city_median)
        .map(|(&p, &m)| {
            if p < m * config.undervalued_ratio {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    frame.insert(fields::CITY_MEDIAN, Column::Numeric(city_median))?;
    frame.insert(fields::LABEL, Column::Numeric(labels.clone()))?;
    Ok(labels)
}

/// `price * (1 + growth_rate)^years`.
pub fn projected_price(price: f64, growth_rate: f64, years: u32) -> f64 {
    price * (1.0 + growth_rate).powi(years as i32)
}
