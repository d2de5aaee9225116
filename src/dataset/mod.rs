//! Raw inputs and the column table the pipeline operates on.
//!
//! - [`Record`]: one listing as an unordered, possibly partial field map.
//! - [`Frame`]: the training corpus (or a wrapped record) as typed columns.

mod frame;
mod record;

pub use frame::{Column, Frame};
pub use record::{fields, format_number, FieldValue, Record};
