//! Price-per-area and property-age derivations.
//!
//! Each derivation has a batch form used while fitting (impossible values
//! become NaN) and a single-record form used at inference (impossible values
//! become 0 and are tagged).

use crate::config::FeatureConfig;
use crate::dataset::{fields, Column, FieldValue, Frame, Record};
use crate::error::Result;
use crate::outcome::{DefaultReason, Outcome};

/// `price * unit_conversion / size`, or NaN when size is not positive or an input is missing.
pub fn price_per_area(price: f64, size: f64, unit_conversion: f64) -> f64 {
    if size > 0.0 && !price.is_nan() {
        price * unit_conversion / size
    } else {
        f64::NAN
    }
}

/// `reference_year - year_built`, or NaN when the year is missing.
pub fn property_age(year_built: f64, reference_year: i32) -> f64 {
    f64::from(reference_year) - year_built
}

/// Overwrite `Price_per_SqFt` from price and size. A no-op if either input column is absent.
pub fn add_price_per_area(frame: &mut Frame, config: &FeatureConfig) -> Result<()> {
    if !frame.contains(fields::PRICE) || !frame.contains(fields::SIZE) {
        return Ok(());
    }
    let price = frame.column(fields::PRICE).map(Column::to_numeric).unwrap_or_default();
    let size = frame.column(fields::SIZE).map(Column::to_numeric).unwrap_or_default();
    let values = price
        .iter()
        .zip(&size)
        .map(|(&p, &s)| price_per_area(p, s, config.unit_conversion))
        .collect();
    frame.insert(fields::PRICE_PER_AREA, Column::Numeric(values))
}

/// Overwrite `Age_of_Property` from `Year_Built`. A no-op if the year column is absent.
pub fn add_property_age(frame: &mut Frame, config: &FeatureConfig) -> Result<()> {
    let Some(year) = frame.column(fields::YEAR_BUILT).map(Column::to_numeric) else {
        return Ok(());
    };
    let values = year
        .into_iter()
        .map(|y| property_age(y, config.reference_year))
        .collect();
    frame.insert(fields::PROPERTY_AGE, Column::Numeric(values))
}

fn required_number(record: &Record, field: &str) -> std::result::Result<f64, DefaultReason> {
    match record.get(field) {
        None | Some(FieldValue::Missing) => Err(DefaultReason::MissingInput {
            field: field.to_string(),
        }),
        Some(value) => value.as_number().ok_or_else(|| {
            if value.is_missing() {
                DefaultReason::MissingInput {
                    field: field.to_string(),
                }
            } else {
                DefaultReason::NonNumeric {
                    field: field.to_string(),
                }
            }
        }),
    }
}

/// Price-per-area of a single record. Missing inputs or a non-positive size give 0.
pub fn price_per_area_for_record(record: &Record, config: &FeatureConfig) -> Outcome<f64> {
    let price = match required_number(record, fields::PRICE) {
        Ok(p) => p,
        Err(reason) => return Outcome::defaulted(0.0, reason),
    };
    let size = match required_number(record, fields::SIZE) {
        Ok(s) => s,
        Err(reason) => return Outcome::defaulted(0.0, reason),
    };
    if size <= 0.0 {
        return Outcome::defaulted(0.0, DefaultReason::NonPositiveSize);
    }
    Outcome::Computed(price_per_area(price, size, config.unit_conversion))
}

/// Property age of a single record. A missing construction year gives 0.
pub fn property_age_for_record(record: &Record, config: &FeatureConfig) -> Outcome<f64> {
    match required_number(record, fields::YEAR_BUILT) {
        Ok(year) => Outcome::Computed(property_age(year, config.reference_year)),
        Err(reason) => Outcome::defaulted(0.0, reason),
    }
}
