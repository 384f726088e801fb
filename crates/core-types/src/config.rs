//! TOML configuration for the storelens tools.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration. CLI flags override individual values after loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "STORELENS_CONFIG";
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to encode default config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("API key is required: set OPENAI_API_KEY, add it to a .env file, or pass --api-key")]
    MissingApiKey,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSettings,
    pub models: ModelSettings,
    pub upload: UploadSettings,
    pub evaluation: EvaluationSettings,
    pub visualization: VisualizationSettings,
    pub viewer: ViewerSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Prefer the environment or a .env file over storing the key here.
    pub api_key: Option<String>,
    /// Per-request timeout; unset means requests wait for the server.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            request_timeout_secs: None,
        }
    }
}

impl ApiSettings {
    /// Resolve the API key: explicit override, then config, then `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Result<String, ConfigError> {
        override_key
            .map(str::to_string)
            .or_else(|| self.api_key.clone())
            .or_else(|| env::var(API_KEY_ENV_VAR).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model used for LLM-integrated search and retrieval evaluation.
    pub search_model: String,
    /// Model used to write evaluation questions from PDF text.
    pub question_model: String,
    pub embedding_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            search_model: "gpt-4o-mini".to_string(),
            question_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub workers: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self { workers: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub workers: usize,
    pub k: usize,
    /// Cap on characters of PDF text sent when generating a question.
    pub question_max_chars: Option<usize>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            k: 5,
            question_max_chars: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationSettings {
    pub max_results: usize,
    pub chunk_chars: usize,
    pub embedding_batch_size: usize,
    pub n_components: usize,
    pub min_cluster_size: usize,
    pub min_samples: Option<usize>,
    pub cluster_selection_epsilon: f64,
    pub preview_chars: usize,
    pub title: String,
}

impl Default for VisualizationSettings {
    fn default() -> Self {
        Self {
            max_results: 1000,
            chunk_chars: 2000,
            embedding_batch_size: 64,
            n_components: 3,
            min_cluster_size: 5,
            min_samples: None,
            cluster_selection_epsilon: 0.5,
            preview_chars: 100,
            title: "Vector Store Embeddings Visualization".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub bind: String,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8050".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Optional log file; stderr only when unset.
    pub file: Option<String>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

/// Load the configuration.
///
/// With an explicit path the file is read, and written with defaults first if
/// it does not exist yet. Without one, `STORELENS_CONFIG` is consulted; when
/// that is unset the defaults are returned without touching the disk.
pub fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match env::var_os(CONFIG_ENV_VAR) {
            Some(p) => PathBuf::from(p),
            None => return Ok(AppConfig::default()),
        },
    };

    if !path.exists() {
        let cfg = AppConfig::default();
        let text = toml::to_string_pretty(&cfg)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.clone(),
                source,
            })?;
        }
        fs::write(&path, text).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
        return Ok(cfg);
    }

    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("storelens.toml");

        let cfg = load_or_create_config(Some(&path)).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(path.exists());

        let again = load_or_create_config(Some(&path)).unwrap();
        assert_eq!(again, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storelens.toml");
        fs::write(&path, "[upload]\nworkers = 4\n\n[evaluation]\nk = 10\n").unwrap();

        let cfg = load_or_create_config(Some(&path)).unwrap();
        assert_eq!(cfg.upload.workers, 4);
        assert_eq!(cfg.evaluation.k, 10);
        assert_eq!(cfg.evaluation.workers, 10);
        assert_eq!(cfg.models.search_model, "gpt-4o-mini");
        assert_eq!(cfg.visualization.min_cluster_size, 5);
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "upload = 3").unwrap();

        let err = load_or_create_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_api_key_wins() {
        let settings = ApiSettings {
            api_key: Some("from-config".into()),
            ..ApiSettings::default()
        };
        assert_eq!(
            settings.resolve_api_key(Some("from-flag")).unwrap(),
            "from-flag"
        );
        assert_eq!(settings.resolve_api_key(None).unwrap(), "from-config");
    }
}
