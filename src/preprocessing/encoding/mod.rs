//! Categorical feature encoding.
//!
//! # Available Encoders
//!
//! ## IndexEncoder
//! Maps the categories of one column to integer codes through a sorted
//! [`Vocabulary`]. Missing values become a constant token first.
//!
//! ## OneHotEncoder
//! Converts integer codes to one-hot (dummy) columns.
//!
//! ```ignore
//! // Input: [[0], [1], [2]]  (3 samples, 1 code column)
//! // Output: [[1,0,0], [0,1,0], [0,0,1]]
//! ```
//!
//! ## TargetEncoder
//! Replaces each category of a high-cardinality column with its smoothed
//! mean label.
//!
//! [`EncoderState`] holds the fitted encoder of every categorical column and
//! hands out [`EncodingSession`]s for inference.

mod index;
mod one_hot;
mod state;
mod target;
mod vocabulary;

pub use index::{FittedIndexEncoder, IndexEncoder, IndexEncoderParams};
pub use one_hot::{FittedOneHotEncoder, OneHotEncoder, OneHotEncoderParams};
pub use state::{split_by_cardinality, ColumnEncoder, EncoderState, EncodingSession};
pub use target::{FittedTargetEncoder, TargetEncoder, TargetEncoderParams};
pub use vocabulary::{SessionVocabulary, Vocabulary};

/// Strategy for handling unknown categories during transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum HandleUnknown {
    /// Raise an error when unknown categories are encountered.
    #[default]
    Error,
    /// Ignore unknown categories (output zeros for one-hot).
    Ignore,
}
