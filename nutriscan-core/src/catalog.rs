//! Nutrition catalog — static label → macro lookup loaded once at startup.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::labels::{normalize_label, Label};
use crate::models::MacroRecord;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog at {path} is not a JSON object of records: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only nutrition table. Keys are normalized labels.
#[derive(Debug, Clone, Default)]
pub struct NutritionCatalog {
    entries: HashMap<String, MacroRecord>,
}

impl NutritionCatalog {
    /// Load the catalog from a JSON file.
    ///
    /// A missing file is not an error: it yields an empty catalog, and every
    /// lookup against it misses.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Nutrition catalog not found — all lookups will report no nutrition data"
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let catalog = Self::from_json_str(&raw).map_err(|source| CatalogError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!(path = %path.display(), entries = catalog.len(), "Loaded nutrition catalog");
        Ok(catalog)
    }

    /// Parse `{"LABEL": {"calories": .., "protein": .., "carbs": .., "fat": ..}, ..}`.
    ///
    /// Entries that do not deserialize or carry negative values are skipped.
    /// When two keys normalize to the same label, the key already written in
    /// normalized form wins; otherwise the first key in sorted order wins.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let records: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;
        let mut records: Vec<(String, serde_json::Value)> = records.into_iter().collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));

        let mut entries: HashMap<String, MacroRecord> = HashMap::with_capacity(records.len());
        for (key, value) in records {
            let record = match serde_json::from_value::<MacroRecord>(value) {
                Ok(record) if record.is_valid() => record,
                Ok(_) => {
                    tracing::warn!(label = %key, "Skipping catalog entry with negative or non-finite values");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(label = %key, error = %e, "Skipping malformed catalog entry");
                    continue;
                }
            };

            let normalized = normalize_label(&key);
            let exact = key == normalized;
            match entries.entry(normalized) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                Entry::Occupied(mut slot) => {
                    tracing::warn!(
                        label = %slot.key(),
                        duplicate = %key,
                        "Catalog keys collide after normalization"
                    );
                    if exact {
                        slot.insert(record);
                    }
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, MacroRecord)>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (normalize_label(&k), v))
                .collect(),
        }
    }

    pub fn lookup(&self, label: &Label) -> Option<&MacroRecord> {
        self.entries.get(label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "CHICKEN": {"calories": 239, "protein": 27, "carbs": 0, "fat": 14},
        "HIGH SUGAR FRUITS": {"calories": 70, "protein": 0.8, "carbs": 18.5, "fat": 0.3},
        "rice": {"calories": 130, "protein": 2.7, "carbs": 28, "fat": 0.3}
    }"#;

    #[test]
    fn test_missing_file_yields_empty_catalog() {
        let catalog = NutritionCatalog::load(Path::new("/nonexistent/nutrition_data.json")).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.lookup(&Label::new("CHICKEN")).is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = NutritionCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);

        let chicken = catalog.lookup(&Label::new("chicken")).unwrap();
        assert_eq!(*chicken, MacroRecord::new(239.0, 27.0, 0.0, 14.0));
    }

    #[test]
    fn test_lookup_returns_stored_record_unchanged() {
        let stored = MacroRecord::new(70.0, 0.8, 18.5, 0.3);
        let catalog =
            NutritionCatalog::from_entries(vec![("HIGH_SUGAR_FRUITS".to_string(), stored)]);
        let found = catalog.lookup(&Label::new("high sugar fruits")).unwrap();
        assert_eq!(found.protein.to_bits(), stored.protein.to_bits());
        assert_eq!(found.carbs.to_bits(), stored.carbs.to_bits());
        assert_eq!(found.fat.to_bits(), stored.fat.to_bits());
        assert_eq!(found.calories.to_bits(), stored.calories.to_bits());
    }

    #[test]
    fn test_keys_are_normalized_on_load() {
        let catalog = NutritionCatalog::from_json_str(SAMPLE).unwrap();
        assert!(catalog.lookup(&Label::new("RICE")).is_some());
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let raw = r#"{
            "BEEF": {"calories": 250, "protein": 26, "carbs": 0, "fat": 15},
            "BROKEN": {"calories": "lots"},
            "NEGATIVE": {"calories": -1, "protein": 0, "carbs": 0, "fat": 0}
        }"#;
        let catalog = NutritionCatalog::from_json_str(raw).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup(&Label::new("BEEF")).is_some());
    }

    #[test]
    fn test_colliding_keys_resolve_to_normalized_spelling() {
        let raw = r#"{
            "COOKING_VEGS": {"calories": 1, "protein": 0, "carbs": 0, "fat": 0},
            "COOKING VEGS": {"calories": 2, "protein": 0, "carbs": 0, "fat": 0},
            "cooking vegs": {"calories": 3, "protein": 0, "carbs": 0, "fat": 0}
        }"#;
        for _ in 0..50 {
            let catalog = NutritionCatalog::from_json_str(raw).unwrap();
            assert_eq!(catalog.len(), 1);
            let record = catalog.lookup(&Label::new("COOKING VEGS")).unwrap();
            assert_eq!(record.calories, 2.0);
        }
    }

    #[test]
    fn test_colliding_keys_without_exact_spelling_pick_first_sorted() {
        let raw = r#"{
            "rice": {"calories": 2, "protein": 0, "carbs": 0, "fat": 0},
            "Rice": {"calories": 1, "protein": 0, "carbs": 0, "fat": 0}
        }"#;
        for _ in 0..50 {
            let catalog = NutritionCatalog::from_json_str(raw).unwrap();
            assert_eq!(catalog.lookup(&Label::new("RICE")).unwrap().calories, 1.0);
        }
    }

    #[test]
    fn test_non_object_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[1, 2, 3]").unwrap();

        match NutritionCatalog::load(file.path()) {
            Err(CatalogError::Parse { .. }) => {}
            other => panic!("Expected Parse error, got: {other:?}"),
        }
    }
}
