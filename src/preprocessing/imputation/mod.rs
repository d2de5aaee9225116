//! Missing-value imputation for numeric columns (NaN = missing).

mod iterative;
mod simple;

pub use iterative::{
    ColumnRegression, FittedIterativeImputer, IterativeImputer, IterativeImputerParams,
};
pub use simple::{FittedSimpleImputer, ImputeStrategy, SimpleImputer, SimpleImputerParams};
