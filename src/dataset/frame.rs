//! A minimal typed column table.
//!
//! Numeric columns use NaN as the missing marker; categorical columns use `None`.

use crate::dataset::record::{format_number, FieldValue, Record};
use crate::error::{PipelineError, Result};
use crate::stats;
use ndarray::Array2;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// A single column of a [`Frame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Numeric view: categorical cells are parsed, unparseable ones become NaN.
    pub fn to_numeric(&self) -> Vec<f64> {
        match self {
            Column::Numeric(v) => v.clone(),
            Column::Categorical(v) => v
                .iter()
                .map(|cell| {
                    cell.as_deref()
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .unwrap_or(f64::NAN)
                })
                .collect(),
        }
    }

    /// Categorical view: numbers render as labels, NaN becomes `None`.
    pub fn to_categorical(&self) -> Vec<Option<String>> {
        match self {
            Column::Numeric(v) => v
                .iter()
                .map(|&x| if x.is_nan() { None } else { Some(format_number(x)) })
                .collect(),
            Column::Categorical(v) => v.clone(),
        }
    }

    /// Number of distinct non-missing values.
    pub fn n_unique(&self) -> usize {
        match self {
            Column::Numeric(v) => {
                let mut bits: Vec<u64> = v.iter().filter(|x| !x.is_nan()).map(|x| x.to_bits()).collect();
                bits.sort_unstable();
                bits.dedup();
                bits.len()
            }
            Column::Categorical(v) => {
                let mut seen: Vec<&str> = v.iter().flatten().map(String::as_str).collect();
                seen.sort_unstable();
                seen.dedup();
                seen.len()
            }
        }
    }
}

/// An ordered collection of equally long named columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Frame {
    /// An empty frame with `n_rows` rows and no columns.
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
            n_rows,
        }
    }

    /// Read a CSV document with a header row.
    ///
    /// A column is numeric iff every non-empty cell parses as `f64`. Empty
    /// cells are missing. Rows with a different field count are an error.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(PipelineError::EmptyData("CSV has no header".to_string()));
        }

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for result in rdr.records() {
            let row = result?;
            for (col, cell) in raw.iter_mut().zip(row.iter()) {
                col.push(if cell.is_empty() { None } else { Some(cell.to_string()) });
            }
        }

        let n_rows = raw.first().map_or(0, Vec::len);
        let mut frame = Frame::with_rows(n_rows);
        for (name, cells) in headers.into_iter().zip(raw) {
            let parsed: Option<Vec<f64>> = cells
                .iter()
                .map(|cell| match cell {
                    None => Some(f64::NAN),
                    Some(s) => s.parse::<f64>().ok(),
                })
                .collect();
            let column = match parsed {
                Some(values) if cells.iter().any(Option::is_some) => Column::Numeric(values),
                _ => Column::Categorical(cells),
            };
            frame.insert(&name, column)?;
        }
        Ok(frame)
    }

    /// Read a CSV file. See [`Frame::from_reader`].
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Wrap a record as a single-row frame.
    ///
    /// Numbers become numeric columns, text becomes categorical. A missing value
    /// has no type and is stored as an empty categorical cell.
    pub fn from_record(record: &Record) -> Self {
        let mut frame = Frame::with_rows(1);
        for (name, value) in record.iter() {
            let column = match value {
                FieldValue::Number(v) => Column::Numeric(vec![*v]),
                FieldValue::Text(s) => Column::Categorical(vec![Some(s.clone())]),
                FieldValue::Missing => Column::Categorical(vec![None]),
            };
            frame.names.push(name.to_string());
            frame.columns.push(column);
        }
        frame
    }

    /// The cell at `row` of column `name`, or `None` if there is no such column.
    /// NaN and empty cells come back as [`FieldValue::Missing`].
    pub fn cell(&self, name: &str, row: usize) -> Option<FieldValue> {
        let value = match self.column(name)? {
            Column::Numeric(v) => match v.get(row)? {
                x if x.is_nan() => FieldValue::Missing,
                x => FieldValue::Number(*x),
            },
            Column::Categorical(v) => match v.get(row)? {
                Some(s) => FieldValue::Text(s.clone()),
                None => FieldValue::Missing,
            },
        };
        Some(value)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Iterate over `(name, column)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Numeric values of a column.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name) {
            Some(Column::Numeric(v)) => Ok(v),
            Some(Column::Categorical(_)) => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "numeric",
            }),
            None => Err(PipelineError::UnknownColumn(name.to_string())),
        }
    }

    /// Categorical values of a column.
    pub fn categorical(&self, name: &str) -> Result<&[Option<String>]> {
        match self.column(name) {
            Some(Column::Categorical(v)) => Ok(v),
            Some(Column::Numeric(_)) => Err(PipelineError::ColumnType {
                column: name.to_string(),
                expected: "categorical",
            }),
            None => Err(PipelineError::UnknownColumn(name.to_string())),
        }
    }

    /// Insert a column, replacing an existing one of the same name in place.
    pub fn insert(&mut self, name: &str, column: Column) -> Result<()> {
        if column.len() != self.n_rows {
            return Err(PipelineError::InvalidShape {
                expected: format!("{} rows", self.n_rows),
                got: format!("{} rows in column {}", column.len(), name),
            });
        }
        match self.position(name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Column> {
        let i = self.position(name)?;
        self.names.remove(i);
        Some(self.columns.remove(i))
    }

    /// Stack the named columns into an `n_rows x names.len()` matrix.
    /// Categorical columns are coerced; unparseable cells become NaN.
    pub fn numeric_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let mut out = Array2::<f64>::zeros((self.n_rows, names.len()));
        for (j, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let column = self
                .column(name)
                .ok_or_else(|| PipelineError::UnknownColumn(name.to_string()))?;
            let values = column.to_numeric();
            for (i, v) in values.into_iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        Ok(out)
    }

    /// Median of `value` per distinct non-missing `key`, ignoring missing values.
    pub fn group_median(&self, key: &str, value: &str) -> Result<HashMap<String, f64>> {
        let keys = self
            .column(key)
            .ok_or_else(|| PipelineError::UnknownColumn(key.to_string()))?
            .to_categorical();
        let values = self.numeric(value)?;

        let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
        for (k, &v) in keys.into_iter().zip(values) {
            if let Some(k) = k {
                let group = groups.entry(k).or_default();
                if !v.is_nan() {
                    group.push(v);
                }
            }
        }
        Ok(groups
            .into_iter()
            .filter_map(|(k, mut vs)| stats::median(&mut vs).map(|m| (k, m)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "ID,City,BHK,Price_in_Lakhs,Amenities\n\
                       1,Chennai,2,100.5,\"Gym, Pool\"\n\
                       2,Pune,,80,\n\
                       3,Chennai,3,120,Garden\n";

    #[test]
    fn test_from_reader_infers_column_types() {
        let frame = Frame::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.names(), &["ID", "City", "BHK", "Price_in_Lakhs", "Amenities"]);
        assert!(frame.column("ID").unwrap().is_numeric());
        assert!(!frame.column("City").unwrap().is_numeric());

        let bhk = frame.numeric("BHK").unwrap();
        assert_eq!(bhk[0], 2.0);
        assert!(bhk[1].is_nan());

        let amenities = frame.categorical("Amenities").unwrap();
        assert_eq!(amenities[0].as_deref(), Some("Gym, Pool"));
        assert_eq!(amenities[1], None);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let result = Frame::from_reader("a,b\n1,2\n3\n".as_bytes());
        assert!(matches!(result, Err(PipelineError::Csv(_))));
    }

    #[test]
    fn test_insert_replaces_in_place_and_checks_length() {
        let mut frame = Frame::from_reader(CSV.as_bytes()).unwrap();
        frame
            .insert("BHK", Column::Numeric(vec![1.0, 1.0, 1.0]))
            .unwrap();
        assert_eq!(frame.names()[2], "BHK");
        assert_eq!(frame.numeric("BHK").unwrap(), &[1.0, 1.0, 1.0]);

        let err = frame.insert("Extra", Column::Numeric(vec![1.0])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidShape { .. }));
    }

    #[test]
    fn test_accessor_errors() {
        let frame = Frame::from_reader(CSV.as_bytes()).unwrap();
        assert!(matches!(
            frame.numeric("City"),
            Err(PipelineError::ColumnType { .. })
        ));
        assert!(matches!(
            frame.numeric("Nope"),
            Err(PipelineError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_group_median() {
        let frame = Frame::from_reader(CSV.as_bytes()).unwrap();
        let medians = frame.group_median("City", "Price_in_Lakhs").unwrap();
        assert!((medians["Chennai"] - 110.25).abs() < 1e-9);
        assert_eq!(medians["Pune"], 80.0);
    }

    #[test]
    fn test_from_record_and_matrix() {
        let record = Record::new()
            .with("BHK", 3.0)
            .with("City", "Pune")
            .with("Size_in_SqFt", "1200")
            .with("Facing", FieldValue::Missing);
        let frame = Frame::from_record(&record);
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.n_cols(), 4);
        assert_eq!(frame.cell("BHK", 0), Some(FieldValue::Number(3.0)));
        assert_eq!(frame.cell("City", 0), Some(FieldValue::Text("Pune".into())));
        assert_eq!(frame.cell("Facing", 0), Some(FieldValue::Missing));
        assert_eq!(frame.cell("Facing", 1), None);
        assert_eq!(frame.cell("Owner_Type", 0), None);

        let m = frame.numeric_matrix(&["BHK", "Size_in_SqFt", "City"]).unwrap();
        assert_eq!(m.shape(), &[1, 3]);
        assert_eq!(m[[0, 0]], 3.0);
        assert_eq!(m[[0, 1]], 1200.0);
        assert!(m[[0, 2]].is_nan());
    }

    #[test]
    fn test_n_unique_ignores_missing() {
        let col = Column::Categorical(vec![Some("a".into()), None, Some("a".into()), Some("b".into())]);
        assert_eq!(col.n_unique(), 2);
        let col = Column::Numeric(vec![1.0, f64::NAN, 1.0]);
        assert_eq!(col.n_unique(), 1);
    }
}
