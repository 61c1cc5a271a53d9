pub mod catalog;
pub mod chart;
pub mod classifier;
pub mod config;
pub mod error;
pub mod history;
pub mod labels;
pub mod models;
pub mod onnx_classifier;
pub mod preprocess;
pub mod scan;

pub use catalog::{CatalogError, NutritionCatalog};
pub use chart::{MacroChart, MacroSlice};
pub use classifier::{load_classifier, ClassifierError, ClassifierLoad, ImageClassifier};
pub use config::NutriScanConfig;
pub use error::NutriScanError;
pub use history::SessionHistory;
pub use labels::{Label, LabelTable};
pub use models::{MacroRecord, ScanResult};
pub use onnx_classifier::OnnxImageClassifier;
pub use scan::{ScanOutcome, Scanner};
