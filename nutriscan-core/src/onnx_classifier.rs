//! ONNX image-classification backend.
//!
//! Uses the `ort` crate for ONNX Runtime. The model directory holds the
//! exported network (`model.onnx`) and its `preprocessor_config.json`.

use async_trait::async_trait;
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::classifier::{argmax, ClassifierError, ImageClassifier};
use crate::preprocess::PreprocessorConfig;

/// Local ONNX image classifier.
pub struct OnnxImageClassifier {
    session: Arc<Mutex<Session>>,
    preprocessor: Arc<PreprocessorConfig>,
}

impl std::fmt::Debug for OnnxImageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxImageClassifier")
            .field("preprocessor", &self.preprocessor)
            .finish_non_exhaustive()
    }
}

impl OnnxImageClassifier {
    /// Load the model and preprocessing config from `dir`.
    ///
    /// Returns `ClassifierError::ModelNotFound` if the directory or either
    /// file is missing.
    pub fn from_dir(
        dir: &Path,
        model_file: &str,
        preprocessor_file: &str,
        intra_threads: usize,
    ) -> Result<Self, ClassifierError> {
        if !dir.is_dir() {
            return Err(ClassifierError::ModelNotFound {
                path: dir.display().to_string(),
            });
        }

        let model_path = dir.join(model_file);
        if !model_path.exists() {
            return Err(ClassifierError::ModelNotFound {
                path: model_path.display().to_string(),
            });
        }
        let preprocessor_path = dir.join(preprocessor_file);
        if !preprocessor_path.exists() {
            return Err(ClassifierError::ModelNotFound {
                path: preprocessor_path.display().to_string(),
            });
        }

        let preprocessor = PreprocessorConfig::from_file(&preprocessor_path)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(intra_threads.max(1)))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| ClassifierError::OnnxInference(e.to_string()))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            preprocessor: Arc::new(preprocessor),
        })
    }
}

#[async_trait]
impl ImageClassifier for OnnxImageClassifier {
    async fn classify(&self, image: RgbImage) -> Result<usize, ClassifierError> {
        // ONNX inference is CPU-bound — run on the blocking thread pool.
        let session = Arc::clone(&self.session);
        let preprocessor = Arc::clone(&self.preprocessor);

        tokio::task::spawn_blocking(move || {
            let mut session_guard = session.lock().map_err(|e| {
                ClassifierError::OnnxInference(format!("session lock poisoned: {e}"))
            })?;
            classify_sync(&mut session_guard, &preprocessor, &image)
        })
        .await
        .map_err(|e| ClassifierError::OnnxInference(format!("spawn_blocking join error: {e}")))?
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Run one forward pass synchronously and take the argmax of the logits.
fn classify_sync(
    session: &mut Session,
    preprocessor: &PreprocessorConfig,
    image: &RgbImage,
) -> Result<usize, ClassifierError> {
    // 1. Preprocess to NCHW
    let pixels = preprocessor.to_tensor(image)?;
    let shape: Vec<i64> = pixels.shape().iter().map(|&d| d as i64).collect();
    let (data, _offset) = pixels.into_raw_vec_and_offset();

    let input = Tensor::from_array((shape, data))
        .map_err(|e| ClassifierError::OnnxInference(e.to_string()))?;

    // 2. Run session
    let outputs = session
        .run(ort::inputs![input])
        .map_err(|e| ClassifierError::OnnxInference(e.to_string()))?;

    // 3. Logits: [1, num_labels]
    let (out_shape, logits) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| ClassifierError::OnnxInference(e.to_string()))?;

    let num_labels = out_shape.last().copied().unwrap_or(0).max(0) as usize;
    let first_row = &logits[..num_labels.min(logits.len())];

    argmax(first_row).ok_or(ClassifierError::EmptyOutput)
}
