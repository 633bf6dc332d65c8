//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_RETRIEVAL__TARGET_COUNT=5`). Provides helpers to expand `~` and
//! `${VAR}` and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Layers `config.toml`, `config.<env>.toml` and `APP_*` variables found
    /// relative to `dir` over the built-in defaults.
    pub fn load_from_dir(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates the typed settings tree.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub context: ContextSettings,
    pub ingest: IngestSettings,
    pub embedding: EmbeddingSettings,
    pub data: DataSettings,
    pub backend: BackendSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.chunking.max_chunk_chars == 0 {
            return Err(Error::InvalidConfig("chunking.max_chunk_chars must be positive".into()));
        }
        if self.retrieval.target_count == 0 {
            return Err(Error::InvalidConfig("retrieval.target_count must be positive".into()));
        }
        if self.retrieval.min_keyword_chars == 0 {
            return Err(Error::InvalidConfig("retrieval.min_keyword_chars must be at least 1".into()));
        }
        if self.ingest.batch_size == 0 {
            return Err(Error::InvalidConfig("ingest.batch_size must be positive".into()));
        }
        if self.embedding.kind == EmbedderKind::Hash && self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        Ok(())
    }

    /// Anchors the relative data and model paths at `base`, normally the
    /// directory the config files were read from.
    pub fn anchor_paths(&mut self, base: &Path) {
        let anchor = |p: &str| resolve_with_base(base, p).to_string_lossy().into_owned();
        self.data.text_index_dir = anchor(&self.data.text_index_dir);
        self.data.vector_db_dir = anchor(&self.data.vector_db_dir);
        self.embedding.model_dir = anchor(&self.embedding.model_dir);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_chunk_chars: usize,
    pub part_label: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { max_chunk_chars: 2000, part_label: "Part".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Cascade,
    Vector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub target_count: usize,
    pub min_keyword_chars: usize,
    pub mode: RetrievalMode,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { target_count: 3, min_keyword_chars: 2, mode: RetrievalMode::Cascade }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub max_units: usize,
    /// `None` keeps bodies whole.
    pub preview_chars: Option<usize>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self { max_units: 3, preview_chars: Some(500) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Articles whose body is shorter than this are skipped.
    pub min_body_chars: usize,
    pub batch_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self { min_body_chars: 20, batch_size: 50 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Hash,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub kind: EmbedderKind,
    pub model_dir: String,
    pub max_len: usize,
    /// Output size of the hash embedder; the model reports its own.
    pub dim: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::Hash,
            model_dir: "models/paraphrase-multilingual-mpnet-base-v2".to_string(),
            max_len: 256,
            dim: 768,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub text_index_dir: String,
    pub vector_db_dir: String,
    pub vector_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            text_index_dir: "data/indexes/tantivy".to_string(),
            vector_db_dir: "data/indexes/lancedb".to_string(),
            vector_table: "units".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Expands `p`, then anchors it at `base` unless it is already absolute.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    match expand_path(p) {
        abs if abs.is_absolute() => abs,
        rel => base.join(rel),
    }
}
