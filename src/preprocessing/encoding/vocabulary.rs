//! Category vocabularies.
//!
//! A [`Vocabulary`] is fixed once fitted. Categories first seen at inference
//! go into a [`SessionVocabulary`] overlay that lives for one encoding call
//! and is never written back.

use crate::outcome::{DefaultReason, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An ordered, immutable category → code mapping.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    categories: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build a lexicographically ordered vocabulary of the distinct values.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: Vec<String> = values.into_iter().map(Into::into).collect();
        categories.sort();
        categories.dedup();
        Self::from(categories)
    }

    pub fn code(&self, category: &str) -> Option<usize> {
        self.index.get(category).copied()
    }

    pub fn category(&self, code: usize) -> Option<&str> {
        self.categories.get(code).map(String::as_str)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl From<Vec<String>> for Vocabulary {
    /// Keeps the given order; later duplicates are dropped.
    fn from(values: Vec<String>) -> Self {
        let mut categories = Vec::with_capacity(values.len());
        let mut index = HashMap::with_capacity(values.len());
        for value in values {
            if !index.contains_key(&value) {
                index.insert(value.clone(), categories.len());
                categories.push(value);
            }
        }
        Self { categories, index }
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.categories
    }
}

/// A per-call overlay on top of a fitted [`Vocabulary`].
///
/// Unseen categories get `base.len() + position` codes. These codes are only
/// meaningful within the session that assigned them.
#[derive(Clone, Debug)]
pub struct SessionVocabulary<'a> {
    column: String,
    base: &'a Vocabulary,
    overlay: Vec<String>,
}

impl<'a> SessionVocabulary<'a> {
    pub fn new(column: impl Into<String>, base: &'a Vocabulary) -> Self {
        Self {
            column: column.into(),
            base,
            overlay: Vec::new(),
        }
    }

    /// Look `category` up in the base vocabulary, then in the overlay,
    /// appending it to the overlay if it is new. Never fails.
    pub fn code(&mut self, category: &str) -> Outcome<usize> {
        if let Some(code) = self.base.code(category) {
            return Outcome::Computed(code);
        }
        let position = match self.overlay.iter().position(|c| c == category) {
            Some(p) => p,
            None => {
                self.overlay.push(category.to_string());
                self.overlay.len() - 1
            }
        };
        Outcome::defaulted(
            self.base.len() + position,
            DefaultReason::UnseenCategory {
                column: self.column.clone(),
                value: category.to_string(),
            },
        )
    }

    /// Category of a base or overlay code.
    pub fn category(&self, code: usize) -> Option<&str> {
        self.base
            .category(code)
            .or_else(|| self.overlay.get(code.checked_sub(self.base.len())?).map(String::as_str))
    }

    pub fn base(&self) -> &Vocabulary {
        self.base
    }

    pub fn overlay(&self) -> &[String] {
        &self.overlay
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_sorted_and_unique() {
        let v = Vocabulary::from_values(["West", "East", "North", "East"]);
        assert_eq!(v.categories(), &["East", "North", "West"]);
        assert_eq!(v.code("North"), Some(1));
        assert_eq!(v.category(2), Some("West"));
        assert_eq!(v.code("South"), None);
    }

    #[test]
    fn test_vocabulary_serializes_as_list() {
        let v = Vocabulary::from_values(["b", "a"]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
        let back: Vocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
        assert_eq!(back.code("b"), Some(1));
    }

    #[test]
    fn test_session_extends_without_touching_base() {
        let base = Vocabulary::from_values(["Apartment", "Villa"]);
        let mut session = SessionVocabulary::new("Property_Type", &base);

        assert_eq!(session.code("Villa"), Outcome::Computed(1));

        let first = session.code("Houseboat");
        assert_eq!(*first.value(), 2);
        assert!(matches!(
            first.reason(),
            Some(DefaultReason::UnseenCategory { column, value })
                if column == "Property_Type" && value == "Houseboat"
        ));
        assert_eq!(*session.code("Treehouse").value(), 3);
        assert_eq!(*session.code("Houseboat").value(), 2);
        assert_eq!(session.category(3), Some("Treehouse"));
        assert_eq!(session.len(), 4);

        assert_eq!(base.len(), 2);
        assert_eq!(base.code("Houseboat"), None);
    }

    #[test]
    fn test_sessions_are_independent() {
        let base = Vocabulary::from_values(["a"]);
        let mut one = SessionVocabulary::new("c", &base);
        let mut two = SessionVocabulary::new("c", &base);
        assert_eq!(*one.code("x").value(), 1);
        assert_eq!(*two.code("y").value(), 1);
        assert!(one.overlay() != two.overlay());
    }
}
