//! CLI configuration, loaded from `lexlink.toml`.

use anyhow::{Context, Result};
use lexlink_retrieval::RetrievalConfig;
use lexlink_validate::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "lexlink.toml";

/// Where corpus snapshots and index generations live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root data directory
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl StorageConfig {
    /// Corpus snapshot file.
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join("corpus.json")
    }

    /// Link-store file.
    pub fn links_path(&self) -> PathBuf {
        self.data_dir.join("links.json")
    }

    /// Lexical generation root.
    pub fn lexical_root(&self) -> PathBuf {
        self.data_dir.join("index").join("lexical")
    }

    /// Dense generation root.
    pub fn dense_root(&self) -> PathBuf {
        self.data_dir.join("index").join("dense")
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hashing` (offline, deterministic) or `http`
    pub provider: String,
    /// Model name for the HTTP provider
    pub model: String,
    /// Embedding dimension (fixed at build time)
    pub dimensions: usize,
    /// Base URL override for the HTTP provider
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Character budget applied before embedding long documents
    pub char_budget: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashing".to_string(),
            model: "text-embedding-3-large".to_string(),
            dimensions: 256,
            base_url: None,
            api_key_env: "LEXLINK_EMBED_API_KEY".to_string(),
            char_budget: lexlink_index::embed::DEFAULT_EMBED_CHAR_BUDGET,
        }
    }
}

/// Full CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub validation: ValidationConfig,
}

impl CliConfig {
    /// Loads `./lexlink.toml` when present, defaults otherwise.
    pub fn load() -> Self {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            match Self::from_file(path) {
                Ok(config) => return config,
                Err(error) => {
                    tracing::warn!(%error, "failed to read {CONFIG_FILE}, using defaults");
                }
            }
        }
        Self::default()
    }

    /// Loads a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
        assert_eq!(config.embedding.provider, "hashing");
        assert_eq!(config.retrieval.top_k, 10);
    }

    #[test]
    fn test_partial_file_overrides() {
        let raw = r#"
[storage]
data_dir = "corpus-data"

[embedding]
dimensions = 128
"#;
        let config: CliConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("corpus-data"));
        assert_eq!(config.embedding.dimensions, 128);
        // Untouched sections keep defaults.
        assert_eq!(config.retrieval.merge_limit, 500);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexlink.toml");
        std::fs::write(&path, "[embedding]\nprovider = \"http\"\n").unwrap();

        let config = CliConfig::from_file(&path).unwrap();
        assert_eq!(config.embedding.provider, "http");

        assert!(CliConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
