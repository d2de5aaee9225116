//! Raw property records: an unordered, possibly partial field → value mapping.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Field names of the listing corpus and of derived columns.
pub mod fields {
    pub const ID: &str = "ID";
    pub const STATE: &str = "State";
    pub const CITY: &str = "City";
    pub const LOCALITY: &str = "Locality";
    pub const PROPERTY_TYPE: &str = "Property_Type";
    pub const BHK: &str = "BHK";
    pub const SIZE: &str = "Size_in_SqFt";
    pub const PRICE: &str = "Price_in_Lakhs";
    pub const PRICE_PER_AREA: &str = "Price_per_SqFt";
    pub const YEAR_BUILT: &str = "Year_Built";
    pub const FURNISHED_STATUS: &str = "Furnished_Status";
    pub const FLOOR_NO: &str = "Floor_No";
    pub const TOTAL_FLOORS: &str = "Total_Floors";
    pub const PROPERTY_AGE: &str = "Age_of_Property";
    pub const NEARBY_SCHOOLS: &str = "Nearby_Schools";
    pub const NEARBY_HOSPITALS: &str = "Nearby_Hospitals";
    pub const TRANSIT: &str = "Public_Transport_Accessibility";
    pub const PARKING: &str = "Parking_Space";
    pub const SECURITY: &str = "Security";
    pub const AMENITIES: &str = "Amenities";
    pub const FACING: &str = "Facing";
    pub const OWNER_TYPE: &str = "Owner_Type";
    pub const AVAILABILITY: &str = "Availability_Status";

    /// Median price-per-area of the listing's city over the training corpus.
    pub const CITY_MEDIAN: &str = "City_Median";
    /// Supervised label.
    pub const LABEL: &str = "Good_Investment";
    pub const FUTURE_PRICE: &str = "Future_Price_5yrs";

    pub const OUTLIER_FLAG_PREFIX: &str = "outlier_flag_";

    pub fn outlier_flag(column: &str) -> String {
        format!("{}{}", OUTLIER_FLAG_PREFIX, column)
    }

    pub fn is_outlier_flag(column: &str) -> bool {
        column.starts_with(OUTLIER_FLAG_PREFIX)
    }
}

/// A single field value.
///
/// Deserializes from any JSON scalar: numbers become [`FieldValue::Number`],
/// strings and booleans [`FieldValue::Text`], `null` [`FieldValue::Missing`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Numeric view of the value. Text is parsed; NaN counts as missing.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) if !v.is_nan() => Some(*v),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    /// Categorical view of the value. Whole numbers render without a fraction.
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(v) if !v.is_nan() => Some(format_number(*v)),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Number(v) => v.is_nan(),
            FieldValue::Text(_) => false,
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Null => FieldValue::Missing,
            serde_json::Value::Number(n) => n.as_f64().map_or(FieldValue::Missing, FieldValue::Number),
            serde_json::Value::String(s) => FieldValue::Text(s),
            serde_json::Value::Bool(b) => FieldValue::Text(if b { "Yes" } else { "No" }.to_string()),
            other => FieldValue::Text(other.to_string()),
        })
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

/// Render a number the way it would appear as a category label.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// A raw property record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from a JSON object.
    pub fn from_json_str(s: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Whether the field exists with a non-missing value.
    pub fn has(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(|v| !v.is_missing())
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(FieldValue::as_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_json() {
        let record = Record::from_json_str(
            r#"{"City": "Chennai", "BHK": 1, "Price_in_Lakhs": 489.76, "Security": false, "Facing": null}"#,
        )
        .unwrap();
        assert_eq!(record.get("City"), Some(&FieldValue::Text("Chennai".into())));
        assert_eq!(record.number("BHK"), Some(1.0));
        assert_eq!(record.get("Security"), Some(&FieldValue::Text("No".into())));
        assert!(!record.has("Facing"));
        assert!(!record.has("Owner_Type"));
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let v = FieldValue::Text(" 4740 ".into());
        assert_eq!(v.as_number(), Some(4740.0));
        assert_eq!(FieldValue::Text("n/a".into()).as_number(), None);
        assert_eq!(FieldValue::Number(f64::NAN).as_number(), None);
        assert!(FieldValue::Number(f64::NAN).is_missing());
    }

    #[test]
    fn test_number_as_category_label() {
        assert_eq!(FieldValue::Number(3.0).as_text().as_deref(), Some("3"));
        assert_eq!(FieldValue::Number(2.5).as_text().as_deref(), Some("2.5"));
        assert_eq!(FieldValue::Missing.as_text(), None);
    }

    #[test]
    fn test_outlier_flag_names() {
        assert_eq!(fields::outlier_flag("BHK"), "outlier_flag_BHK");
        assert!(fields::is_outlier_flag("outlier_flag_BHK"));
        assert!(!fields::is_outlier_flag("BHK"));
    }

    #[test]
    fn test_record_serializes_as_plain_object() {
        let record: Record = [("BHK", FieldValue::Number(2.0)), ("City", "Pune".into())]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"BHK":2.0,"City":"Pune"}"#);
    }
}
