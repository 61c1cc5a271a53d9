use thiserror::Error;

#[derive(Error, Debug)]
pub enum NutriScanError {
    #[error("Classifier required but unavailable: {0}")]
    ClassifierRequired(String),
}
