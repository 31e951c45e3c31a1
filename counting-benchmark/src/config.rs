//! Configuration management for the counting harness
//!
//! Loads dataset paths, provider settings and run parameters from a TOML
//! file. Every field has a default matching the FSC-147 layout used for the
//! paper, so an empty file (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// File and directory locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Full source corpus of images
    #[serde(default = "default_source_images")]
    pub source_images: PathBuf,
    /// Tab-separated `<filename>\t<class>` list
    #[serde(default = "default_class_file")]
    pub class_file: PathBuf,
    /// Point annotations, keyed by filename
    #[serde(default = "default_annotation_file")]
    pub annotation_file: PathBuf,
    /// Working directory holding the selected sample
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// Label table written by the selector
    #[serde(default = "default_labels_csv")]
    pub labels_csv: PathBuf,
    /// Shared table holding every model response column
    #[serde(default = "default_evaluation_csv")]
    pub evaluation_csv: PathBuf,
    /// Label table with a populated `human` column
    #[serde(default = "default_human_csv")]
    pub human_csv: PathBuf,
    /// RMSE report table
    #[serde(default = "default_rmse_csv")]
    pub rmse_csv: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_images: default_source_images(),
            class_file: default_class_file(),
            annotation_file: default_annotation_file(),
            image_dir: default_image_dir(),
            labels_csv: default_labels_csv(),
            evaluation_csv: default_evaluation_csv(),
            human_csv: default_human_csv(),
            rmse_csv: default_rmse_csv(),
        }
    }
}

/// Dataset sampling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            seed: default_seed(),
        }
    }
}

/// Model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// `openai` or `anthropic`
    #[serde(default = "default_provider")]
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Requests per minute
    #[serde(default = "default_rpm")]
    pub rpm: u32,
    /// Override the API base URL (proxies, compatible gateways)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            model: default_model(),
            rpm: default_rpm(),
            base_url: None,
        }
    }
}

/// Per-request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Omitted from the request when unset
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

// Default value functions
fn default_source_images() -> PathBuf { PathBuf::from("FSC147_384_V2/images_384_VarV2") }
fn default_class_file() -> PathBuf { PathBuf::from("FSC147_384_V2/ImageClasses_FSC147.txt") }
fn default_annotation_file() -> PathBuf { PathBuf::from("FSC147_384_V2/annotation_FSC147_384.json") }
fn default_image_dir() -> PathBuf { PathBuf::from("FSC147_384_V2/selected_300_images") }
fn default_labels_csv() -> PathBuf { PathBuf::from("FSC147_384_V2/300_image_labels.csv") }
fn default_evaluation_csv() -> PathBuf { PathBuf::from("results/gpt4_evaluation.csv") }
fn default_human_csv() -> PathBuf { PathBuf::from("results/human_evaluation.csv") }
fn default_rmse_csv() -> PathBuf { PathBuf::from("results/rmse_evaluation.csv") }
fn default_sample_size() -> usize { 300 }
fn default_seed() -> u64 { 42 }
fn default_provider() -> String { "openai".to_string() }
fn default_model() -> String { crate::providers::openai::DEFAULT_MODEL.to_string() }
fn default_rpm() -> u32 { 500 }
fn default_max_tokens() -> u32 { 1024 }
fn default_timeout_ms() -> u64 { 120_000 }

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from the default config location or return defaults.
    ///
    /// A config file that exists but cannot be read or parsed is an error.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        Self::load_first(&[
            "config/harness.toml",
            "counting-benchmark/config/harness.toml",
        ])
    }

    fn load_first<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        for path in paths {
            let path = path.as_ref();
            if path.exists() {
                let config = Self::from_file(path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                return Ok(config);
            }
        }

        tracing::info!("Using default configuration");
        Ok(Self::default())
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.name, "openai");
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.selection.sample_size, 300);
        assert_eq!(config.selection.seed, 42);
        assert_eq!(config.paths.evaluation_csv, PathBuf::from("results/gpt4_evaluation.csv"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[paths]
image_dir = "data/images"

[provider]
name = "anthropic"
model = "claude-sonnet-4-5-20250929"
rpm = 50

[run]
temperature = 0.0
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.paths.image_dir, PathBuf::from("data/images"));
        assert_eq!(config.paths.labels_csv, default_labels_csv());
        assert_eq!(config.provider.name, "anthropic");
        assert_eq!(config.provider.rpm, 50);
        assert_eq!(config.run.temperature, Some(0.0));
        assert_eq!(config.run.timeout_ms, 120_000);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = Config::from_toml(include_str!("../config/harness.toml")).unwrap();
        let defaults = Config::default();
        assert_eq!(shipped.paths.image_dir, defaults.paths.image_dir);
        assert_eq!(shipped.selection.seed, defaults.selection.seed);
        assert_eq!(shipped.provider.model, defaults.provider.model);
        assert_eq!(shipped.run.timeout_ms, defaults.run.timeout_ms);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.run.max_tokens, 1024);
        assert!(config.provider.base_url.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.toml");

        let mut config = Config::default();
        config.selection.seed = 7;
        config.save_toml(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.selection.seed, 7);
        assert_eq!(loaded.paths.rmse_csv, config.paths.rmse_csv);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = Config::from_toml("[provider\nname = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_first_skips_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.toml");
        let present = dir.path().join("harness.toml");
        std::fs::write(&present, "[selection]\nseed = 11\n").unwrap();

        let config = Config::load_first(&[&absent, &present]).unwrap();
        assert_eq!(config.selection.seed, 11);

        let config = Config::load_first(&[&absent]).unwrap();
        assert_eq!(config.selection.seed, Config::default().selection.seed);
    }

    #[test]
    fn test_load_first_fails_on_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("harness.toml");
        let fallback = dir.path().join("fallback.toml");
        std::fs::write(&broken, "[paths\nimage_dir = 1").unwrap();
        std::fs::write(&fallback, "").unwrap();

        let err = Config::load_first(&[&broken, &fallback]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
