//! The feature schema: which raw inputs the fitted pipeline consumes, how
//! each is treated, and the names of the columns it emits.

use serde::{Deserialize, Serialize};

/// How an input column is treated by the fitted pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Imputed and standardized.
    Numeric,
    /// Index-coded, then one-hot encoded.
    LowCardinality,
    /// Target-mean encoded, then imputed and standardized with the numeric columns.
    HighCardinality,
}

impl InputKind {
    pub fn is_categorical(&self) -> bool {
        !matches!(self, InputKind::Numeric)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInput {
    pub name: String,
    pub kind: InputKind,
}

/// Ordered input and output columns of a fitted pipeline.
///
/// Written next to the fitted artifacts as `feature_columns.json` and
/// embedded in the preprocessor so a lost JSON file can be recovered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub format_version: u32,
    pub inputs: Vec<SchemaInput>,
    pub outputs: Vec<String>,
}

impl FeatureSchema {
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(inputs: Vec<SchemaInput>, outputs: Vec<String>) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            inputs,
            outputs,
        }
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|i| i.name.as_str())
    }

    pub fn kind_of(&self, name: &str) -> Option<InputKind> {
        self.inputs.iter().find(|i| i.name == name).map(|i| i.kind)
    }

    pub fn requires(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup_and_json_shape() {
        let schema = FeatureSchema::new(
            vec![
                SchemaInput {
                    name: "BHK".into(),
                    kind: InputKind::Numeric,
                },
                SchemaInput {
                    name: "Locality".into(),
                    kind: InputKind::HighCardinality,
                },
            ],
            vec!["BHK".into(), "Locality".into()],
        );
        assert_eq!(schema.kind_of("Locality"), Some(InputKind::HighCardinality));
        assert!(!schema.requires("City"));
        assert!(InputKind::LowCardinality.is_categorical());

        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains(r#""kind":"high_cardinality""#));
        let back: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
