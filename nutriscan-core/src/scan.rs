//! Scan orchestrator — classify, resolve the label, look up macros, record.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use image::RgbImage;
use std::sync::Arc;

use crate::catalog::NutritionCatalog;
use crate::classifier::{load_classifier, ClassifierLoad};
use crate::config::NutriScanConfig;
use crate::error::NutriScanError;
use crate::history::SessionHistory;
use crate::labels::{Label, LabelTable};
use crate::models::ScanResult;

/// Outcome of a single scan. Every failure is a variant here; nothing raw
/// escapes to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Classified and found in the catalog; already appended to history.
    Success(ScanResult),
    /// Classified, but the catalog has no entry for the label.
    NoNutritionData(Label),
    /// No classifier is loaded.
    Unavailable(String),
    /// Decoding or inference failed.
    ClassificationError(String),
}

impl ScanOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::NoNutritionData(_) => "no_nutrition_data",
            Self::Unavailable(_) => "model_unavailable",
            Self::ClassificationError(_) => "classification_error",
        }
    }
}

/// Process-wide scanning resources. Holds nothing session-specific; the
/// caller passes the session's history into each scan.
#[derive(Debug, Clone)]
pub struct Scanner {
    classifier: ClassifierLoad,
    catalog: Arc<NutritionCatalog>,
    labels: LabelTable,
    offset: FixedOffset,
}

impl Scanner {
    pub fn new(
        classifier: ClassifierLoad,
        catalog: Arc<NutritionCatalog>,
        labels: LabelTable,
        utc_offset_minutes: i32,
    ) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| {
            tracing::warn!(utc_offset_minutes, "Invalid display offset, timestamps will use UTC");
            Utc.fix()
        });
        Self {
            classifier,
            catalog,
            labels,
            offset,
        }
    }

    /// One-time startup initialization of the catalog and classifier.
    ///
    /// A missing or unreadable catalog and an unavailable model both degrade
    /// instead of failing. Only `[classifier] required` makes startup fail.
    pub fn from_config(config: &NutriScanConfig) -> Result<Self, NutriScanError> {
        let classifier = load_classifier(&config.classifier);

        if let ClassifierLoad::Unavailable(reason) = &classifier {
            if config.classifier.required {
                return Err(NutriScanError::ClassifierRequired(reason.clone()));
            }
        }

        let catalog = match NutritionCatalog::load(&config.catalog.resolved_path()) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Nutrition catalog unusable, continuing with an empty catalog");
                NutritionCatalog::default()
            }
        };

        let labels = LabelTable::from_override(config.classifier.labels.as_deref());
        Ok(Self::new(
            classifier,
            Arc::new(catalog),
            labels,
            config.display.utc_offset_minutes,
        ))
    }

    pub fn classifier_status(&self) -> &ClassifierLoad {
        &self.classifier
    }

    pub fn catalog(&self) -> &NutritionCatalog {
        &self.catalog
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Scan raw uploaded bytes (JPEG, PNG, ...).
    pub async fn scan(&self, image_bytes: &[u8], history: &mut SessionHistory) -> ScanOutcome {
        if let ClassifierLoad::Unavailable(reason) = &self.classifier {
            return ScanOutcome::Unavailable(reason.clone());
        }

        let image = match decode_upload(image_bytes.to_vec()).await {
            Ok(img) => img,
            Err(message) => {
                tracing::warn!(error = %message, "Uploaded image could not be decoded");
                return ScanOutcome::ClassificationError(message);
            }
        };

        self.scan_image(image, history).await
    }

    /// Scan an already-decoded image.
    pub async fn scan_image(&self, image: RgbImage, history: &mut SessionHistory) -> ScanOutcome {
        let classifier = match &self.classifier {
            ClassifierLoad::Loaded(c) => c,
            ClassifierLoad::Unavailable(reason) => {
                return ScanOutcome::Unavailable(reason.clone());
            }
        };

        let index = match classifier.classify(image).await {
            Ok(i) => i,
            Err(e) => {
                tracing::error!(backend = classifier.name(), error = %e, "Classification failed");
                return ScanOutcome::ClassificationError(e.to_string());
            }
        };

        let label = self.labels.resolve(index);
        tracing::debug!(index, label = %label, "Classified image");

        match self.catalog.lookup(&label) {
            Some(macros) => {
                let result = ScanResult {
                    label,
                    macros: *macros,
                    timestamp: self.now(),
                };
                history.append(result.clone());
                ScanOutcome::Success(result)
            }
            None => {
                tracing::warn!(label = %label, "No nutritional info found");
                ScanOutcome::NoNutritionData(label)
            }
        }
    }
}

/// Decode uploaded bytes to RGB on the blocking pool.
pub async fn decode_upload(bytes: Vec<u8>) -> Result<RgbImage, String> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgb8()))
        .await
        .map_err(|e| format!("Image decode task failed: {e}"))?
        .map_err(|e| format!("Image decode error: {e}"))
}
