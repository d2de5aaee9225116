//! Tagged stage results.
//!
//! Derivations and encodings that can fall back to a default never fail; they
//! return an [`Outcome`] so the caller can tell a computed value from a
//! substituted one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a value was substituted instead of computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultReason {
    /// A required input field was absent or null.
    MissingInput { field: String },
    /// An input field held a value that could not be read as a number.
    NonNumeric { field: String },
    /// Size was zero or negative.
    NonPositiveSize,
    /// A low-cardinality category was appended to the session vocabulary.
    UnseenCategory { column: String, value: String },
    /// A high-cardinality category fell back to the global target mean.
    UnseenTargetCategory { column: String, value: String },
    /// The record's city has no reference price.
    UnknownCity { city: String },
    /// The training corpus could not be read for the city reference.
    CorpusUnavailable { reason: String },
    /// The schema names a column the record does not carry.
    AbsentColumn,
    /// No fitted encoder exists for a categorical column.
    EncoderUnavailable,
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultReason::MissingInput { field } => write!(f, "missing input {}", field),
            DefaultReason::NonNumeric { field } => write!(f, "non-numeric value in {}", field),
            DefaultReason::NonPositiveSize => write!(f, "size is not positive"),
            DefaultReason::UnseenCategory { column, value } => {
                write!(f, "unseen category {:?} in {}", value, column)
            }
            DefaultReason::UnseenTargetCategory { column, value } => {
                write!(f, "unseen category {:?} in {} (global mean used)", value, column)
            }
            DefaultReason::UnknownCity { city } => write!(f, "no reference price for {}", city),
            DefaultReason::CorpusUnavailable { reason } => {
                write!(f, "training corpus unavailable: {}", reason)
            }
            DefaultReason::AbsentColumn => write!(f, "column absent from record"),
            DefaultReason::EncoderUnavailable => write!(f, "no fitted encoder"),
        }
    }
}

/// A value that was either computed from its inputs or substituted with a default.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Computed(T),
    Defaulted { value: T, reason: DefaultReason },
}

impl<T> Outcome<T> {
    pub fn defaulted(value: T, reason: DefaultReason) -> Self {
        Outcome::Defaulted { value, reason }
    }

    pub fn value(&self) -> &T {
        match self {
            Outcome::Computed(v) => v,
            Outcome::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Outcome::Computed(v) => v,
            Outcome::Defaulted { value, .. } => value,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Outcome::Computed(_))
    }

    pub fn reason(&self) -> Option<&DefaultReason> {
        match self {
            Outcome::Computed(_) => None,
            Outcome::Defaulted { reason, .. } => Some(reason),
        }
    }

    /// Split into the value and the reason it was defaulted, if any.
    pub fn into_parts(self) -> (T, Option<DefaultReason>) {
        match self {
            Outcome::Computed(v) => (v, None),
            Outcome::Defaulted { value, reason } => (value, Some(reason)),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Computed(v) => Outcome::Computed(f(v)),
            Outcome::Defaulted { value, reason } => Outcome::Defaulted {
                value: f(value),
                reason,
            },
        }
    }
}
