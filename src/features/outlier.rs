//! Per-column outlier flags.

use crate::dataset::{fields, Column, Frame};
use crate::error::Result;
use crate::stats;

/// Flags values further than `threshold` sample standard deviations from the column mean.
///
/// Statistics come from the batch being flagged, so a single row never flags.
#[derive(Clone, Debug)]
pub struct OutlierFlagger {
    columns: Vec<String>,
    threshold: f64,
}

impl OutlierFlagger {
    pub fn new(columns: Vec<String>, threshold: f64) -> Self {
        Self { columns, threshold }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 0/1 flags for one column. Missing values, and every value of a column
    /// whose std is zero or undefined, flag 0.
    pub fn flags(values: &[f64], threshold: f64) -> Vec<f64> {
        let (Some(mean), Some(std)) = (stats::mean(values), stats::sample_std(values)) else {
            return vec![0.0; values.len()];
        };
        if std == 0.0 || !std.is_finite() {
            return vec![0.0; values.len()];
        }
        values
            .iter()
            .map(|&v| {
                if (v - mean).abs() > threshold * std {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Add `outlier_flag_<col>` for every configured column. Absent source
    /// columns get an all-zero flag so the output shape is stable.
    pub fn apply(&self, frame: &mut Frame) -> Result<()> {
        for column in &self.columns {
            let flags = match frame.column(column) {
                Some(c) => Self::flags(&c.to_numeric(), self.threshold),
                None => vec![0.0; frame.n_rows()],
            };
            frame.insert(&fields::outlier_flag(column), Column::Numeric(flags))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_column_never_flags() {
        assert_eq!(OutlierFlagger::flags(&[5.0; 10], 3.0), vec![0.0; 10]);
    }

    #[test]
    fn test_single_row_never_flags() {
        assert_eq!(OutlierFlagger::flags(&[1e9], 3.0), vec![0.0]);
    }

    #[test]
    fn test_extreme_value_flags() {
        let mut values = vec![10.0; 30];
        values.push(1000.0);
        values.push(f64::NAN);
        let flags = OutlierFlagger::flags(&values, 3.0);
        assert_eq!(flags[30], 1.0);
        assert_eq!(flags[31], 0.0);
        assert_eq!(flags.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn test_apply_adds_named_columns() {
        let mut frame = Frame::with_rows(3);
        frame
            .insert("BHK", Column::Numeric(vec![1.0, 2.0, 3.0]))
            .unwrap();
        let flagger = OutlierFlagger::new(vec!["BHK".into(), "Floor_No".into()], 3.0);
        flagger.apply(&mut frame).unwrap();
        assert_eq!(frame.numeric("outlier_flag_BHK").unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(
            frame.numeric("outlier_flag_Floor_No").unwrap(),
            &[0.0, 0.0, 0.0]
        );
    }
}
