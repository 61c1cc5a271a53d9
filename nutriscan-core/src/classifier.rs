//! Classifier adapter — image → top-1 class index.
//!
//! The `ImageClassifier` trait hides the inference runtime. Loading never
//! panics: initialization failures come back as `ClassifierLoad::Unavailable`
//! so callers can disable scanning instead of aborting.

use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ClassifierConfig;
use crate::onnx_classifier::OnnxImageClassifier;

/// Abstraction over image-classification backends.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Classify an RGB image of any size. Returns the argmax class index.
    async fn classify(&self, image: RgbImage) -> Result<usize, ClassifierError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model artifacts not found at {path}")]
    ModelNotFound { path: String },

    #[error("Invalid preprocessor config: {0}")]
    PreprocessorConfig(String),

    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("ONNX inference error: {0}")]
    OnnxInference(String),

    #[error("Model produced no logits")]
    EmptyOutput,
}

/// Result of classifier initialization.
#[derive(Clone)]
pub enum ClassifierLoad {
    Loaded(Arc<dyn ImageClassifier>),
    Unavailable(String),
}

impl std::fmt::Debug for ClassifierLoad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(c) => f.debug_tuple("Loaded").field(&c.name()).finish(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

impl ClassifierLoad {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn classifier(&self) -> Option<&Arc<dyn ImageClassifier>> {
        match self {
            Self::Loaded(c) => Some(c),
            Self::Unavailable(_) => None,
        }
    }
}

impl<C: ImageClassifier + 'static> From<Result<C, ClassifierError>> for ClassifierLoad {
    fn from(result: Result<C, ClassifierError>) -> Self {
        match result {
            Ok(c) => Self::Loaded(Arc::new(c)),
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }
}

/// Load the ONNX classifier described by `config`.
pub fn load_classifier(config: &ClassifierConfig) -> ClassifierLoad {
    let model_dir = config.resolved_model_dir();
    let load: ClassifierLoad = OnnxImageClassifier::from_dir(
        &model_dir,
        &config.model_file,
        &config.preprocessor_file,
        config.intra_threads,
    )
    .into();

    match &load {
        ClassifierLoad::Loaded(c) => {
            tracing::info!(dir = %model_dir.display(), backend = c.name(), "Classifier loaded");
        }
        ClassifierLoad::Unavailable(reason) => {
            tracing::warn!(dir = %model_dir.display(), reason = %reason, "Classifier unavailable — scanning disabled");
        }
    }
    load
}

/// Index of the largest logit. Ties go to the lowest index; NaN never wins.
pub fn argmax(logits: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in logits.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
