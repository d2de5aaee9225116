//! Derived features computed from raw listing columns.
//!
//! - price-per-area and property age ([`derive`])
//! - per-column outlier flags ([`OutlierFlagger`])
//! - the composite investment score ([`InvestmentScorer`])
//! - the training label and the projected future price ([`labels`])

pub mod derive;
mod investment;
pub mod labels;
mod outlier;

pub use derive::{
    add_price_per_area, add_property_age, price_per_area, price_per_area_for_record, property_age,
    property_age_for_record,
};
pub use investment::{amenity_count, transit_level, InvestmentScorer};
pub use labels::{label_good_investment, projected_price};
pub use outlier::OutlierFlagger;
