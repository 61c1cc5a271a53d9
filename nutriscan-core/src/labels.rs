//! Food-category label table and normalization.
//!
//! The classifier emits a class index; this module maps it to a canonical
//! label string that matches the nutrition catalog keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output classes of the bundled food classifier, in logit order.
pub const DEFAULT_LABELS: [&str; 14] = [
    "BEEF",
    "BERRIES",
    "CHICKEN",
    "COOKING_VEGS",
    "EGGS",
    "FISH",
    "HIGH SUGAR FRUITS",
    "LEGUMES",
    "LEAFY GREENS",
    "OATMEAL/CEREALS",
    "PIZZA",
    "POTATOES",
    "PORK",
    "RICE",
];

/// Label used when the classifier returns an index outside the table.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Uppercase and turn underscores into spaces.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_uppercase().replace('_', " ")
}

/// A normalized food-category label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(raw: &str) -> Self {
        Self(normalize_label(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered class-index → label mapping.
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Build from an optional override, falling back to [`DEFAULT_LABELS`].
    pub fn from_override(labels: Option<&[String]>) -> Self {
        match labels {
            Some(l) if !l.is_empty() => Self::new(l.to_vec()),
            _ => Self::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Resolve a class index. Out-of-range indices resolve to `Unknown`
    /// instead of failing.
    pub fn resolve(&self, index: usize) -> Label {
        let raw = self
            .labels
            .get(index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL);
        Label::new(raw)
    }
}
