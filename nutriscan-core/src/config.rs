use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NutriScanConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "nutrition_data.json".to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn resolved_path(&self) -> PathBuf {
        expand_path(&self.path)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_dir: String,
    pub model_file: String,
    pub preprocessor_file: String,
    pub intra_threads: usize,
    /// Refuse to start when the model cannot be loaded, instead of running
    /// with scanning disabled.
    pub required: bool,
    /// Overrides the built-in label table. Order must match the model's output logits.
    pub labels: Option<Vec<String>>,
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_preprocessor_file() -> String {
    "preprocessor_config.json".to_string()
}

fn default_intra_threads() -> usize {
    1
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir: "./model".to_string(),
            model_file: default_model_file(),
            preprocessor_file: default_preprocessor_file(),
            intra_threads: default_intra_threads(),
            required: false,
            labels: None,
        }
    }
}

impl ClassifierConfig {
    pub fn resolved_model_dir(&self) -> PathBuf {
        expand_path(&self.model_dir)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// Fixed civil offset used for scan timestamps. 60 = Central European Time.
    pub utc_offset_minutes: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_minutes: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 60,
            sweep_interval_seconds: 60,
        }
    }
}

impl NutriScanConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }

    /// Like [`NutriScanConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;
        s.try_deserialize()
    }
}

/// Expand `~` and `$VAR` in a configured path. Falls back to the raw string
/// when a variable is undefined.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::warn!(path = raw, error = %e, "Path expansion failed, using as-is");
            PathBuf::from(raw)
        }
    }
}
