//! Feature scaling.
//!
//! Only z-score standardization is needed by the numeric branch; its
//! statistics are fixed at fit time and replayed on every transform.

mod standard;

pub use standard::{FittedStandardScaler, StandardScaler, StandardScalerParams};
