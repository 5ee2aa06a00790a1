//! TOML-backed application configuration.
//!
//! Resolution order: built-in defaults, then the TOML file (created with
//! defaults when missing), then `LOGSIGHT_*` environment variables. `.env`
//! files are honoured by the binaries through `dotenvy` before loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/logsight.toml";
pub const CONFIG_PATH_ENV: &str = "LOGSIGHT_CONFIG";

/// Encoding used for the persisted vector index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    #[default]
    Binary,
    Json,
}

/// Which embedding backend the host wires into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    Hashing,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub data_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Index file location; empty means `<data_dir>/index/log_index.lsix`.
    pub index_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    pub format: IndexFormat,
    pub batch_size: usize,
}

impl Default for IndexSection {
    fn default() -> Self {
        Self {
            format: IndexFormat::Binary,
            batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub provider: EmbeddingProviderKind,
    pub dimension: usize,
    pub endpoint: Option<String>,
    pub model: String,
    /// Name of the environment variable holding the bearer token, if any.
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            dimension: 384,
            endpoint: None,
            model: "all-MiniLM-L6-v2".into(),
            api_key_env: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub timeout_ms: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            max_top_k: 100,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub listen_addr: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7878".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// Log file path; empty disables file output.
    pub file: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub paths: PathsSection,
    pub index: IndexSection,
    pub embedding: EmbeddingSection,
    pub search: SearchSection,
    pub service: ServiceSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
}

impl AppConfig {
    /// Resolved path of the persisted vector index.
    pub fn index_path(&self) -> PathBuf {
        if self.paths.index_file.is_empty() {
            Path::new(&self.app.data_dir)
                .join("index")
                .join("log_index.lsix")
        } else {
            PathBuf::from(&self.paths.index_file)
        }
    }

    /// Apply `LOGSIGHT_*` overrides read through `lookup`.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOGSIGHT_DATA_DIR") {
            self.app.data_dir = v;
        }
        if let Some(v) = lookup("LOGSIGHT_INDEX_PATH") {
            self.paths.index_file = v;
        }
        if let Some(v) = lookup("LOGSIGHT_LISTEN_ADDR") {
            self.service.listen_addr = v;
        }
        if let Some(v) = lookup("LOGSIGHT_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("LOGSIGHT_EMBEDDING_PROVIDER") {
            self.embedding.provider = match v.to_ascii_lowercase().as_str() {
                "hashing" => EmbeddingProviderKind::Hashing,
                "http" => EmbeddingProviderKind::Http,
                other => anyhow::bail!("LOGSIGHT_EMBEDDING_PROVIDER: unknown provider {other:?}"),
            };
        }
        if let Some(v) = lookup("LOGSIGHT_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = Some(v);
        }
        if let Some(v) = lookup("LOGSIGHT_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = lookup("LOGSIGHT_EMBEDDING_DIMENSION") {
            self.embedding.dimension = v
                .parse()
                .with_context(|| format!("LOGSIGHT_EMBEDDING_DIMENSION: invalid value {v:?}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.embedding.dimension > 0, "embedding.dimension must be > 0");
        anyhow::ensure!(self.index.batch_size > 0, "index.batch_size must be > 0");
        anyhow::ensure!(self.search.default_top_k > 0, "search.default_top_k must be > 0");
        anyhow::ensure!(
            self.search.max_top_k >= self.search.default_top_k,
            "search.max_top_k must be >= search.default_top_k"
        );
        if self.embedding.provider == EmbeddingProviderKind::Http {
            anyhow::ensure!(
                self.embedding.endpoint.as_deref().is_some_and(|e| !e.is_empty()),
                "embedding.endpoint is required for the http provider"
            );
        }
        Ok(())
    }
}

/// Load configuration from `path` (or `$LOGSIGHT_CONFIG`, or the default
/// location), writing a default file first if none exists.
pub fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
    };

    let mut cfg = load_file_or_default(&path)?;
    cfg.apply_env_overrides_from(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

fn load_file_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&raw).with_context(|| format!("parse config {}", path.display()))?;
        return Ok(cfg);
    }

    let cfg = AppConfig::default();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let rendered = toml::to_string_pretty(&cfg).context("render default config")?;
    fs::write(path, rendered).with_context(|| format!("write config {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default configuration");
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn creates_default_file_when_missing() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("logsight.toml");

        let cfg = load_file_or_default(&path)?;
        assert_eq!(cfg, AppConfig::default());
        assert!(path.exists());

        // Second load parses what the first one wrote.
        let again = load_file_or_default(&path)?;
        assert_eq!(again, cfg);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("logsight.toml");
        fs::write(
            &path,
            "[search]\ndefault_top_k = 5\n\n[index]\nformat = \"json\"\n",
        )?;

        let cfg = load_file_or_default(&path)?;
        assert_eq!(cfg.search.default_top_k, 5);
        assert_eq!(cfg.search.max_top_k, 100);
        assert_eq!(cfg.index.format, IndexFormat::Json);
        assert_eq!(cfg.embedding.dimension, 384);
        Ok(())
    }

    #[test]
    fn env_overrides_apply() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("LOGSIGHT_INDEX_PATH", "/tmp/idx.lsix"),
            ("LOGSIGHT_EMBEDDING_PROVIDER", "HTTP"),
            ("LOGSIGHT_EMBEDDING_DIMENSION", "768"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        cfg.apply_env_overrides_from(|k| vars.get(k).map(|v| (*v).to_string()))?;
        assert_eq!(cfg.index_path(), PathBuf::from("/tmp/idx.lsix"));
        assert_eq!(cfg.embedding.provider, EmbeddingProviderKind::Http);
        assert_eq!(cfg.embedding.dimension, 768);
        // http without an endpoint is rejected
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn default_index_path_lives_under_data_dir() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.index_path(),
            Path::new("data").join("index").join("log_index.lsix")
        );
    }
}
