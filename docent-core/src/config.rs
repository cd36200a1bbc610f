use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole engine.
///
/// Every section has defaults, so a config file only needs the values that differ.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub retrieval: RetrievalConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub timeouts: TimeoutConfig,
    pub responses: Responses,
}

/// Completion-service selection.
///
/// The `provider` tag picks the backend; each variant carries only the
/// parameters that backend understands. An unknown tag fails at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
    MistralApi {
        #[serde(default = "default_mistral_url")]
        base_url: String,
        model: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_temperature")]
        temperature: f64,
    },
    QwenApi {
        #[serde(default = "default_openrouter_url")]
        base_url: String,
        model: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_temperature")]
        temperature: f64,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
    },
}

impl LlmConfig {
    /// Short provider name, as written in the config file.
    pub fn provider_name(&self) -> &'static str {
        match self {
            LlmConfig::Ollama { .. } => "ollama",
            LlmConfig::MistralApi { .. } => "mistral_api",
            LlmConfig::QwenApi { .. } => "qwen_api",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmConfig::Ollama { model, .. }
            | LlmConfig::MistralApi { model, .. }
            | LlmConfig::QwenApi { model, .. } => model,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Ollama {
            base_url: default_ollama_url(),
            model: "qwen2.5:3b".to_string(),
            temperature: default_temperature(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_mistral_url() -> String {
    "https://api.mistral.ai/v1".to_string()
}

fn default_openrouter_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    512
}

/// Embedding service used to build and query the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    /// Number of chunks embedded concurrently while building the index.
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: "paraphrase-multilingual".to_string(),
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Most recent stored turns included in a prompt.
    pub max_history: usize,
    pub session_timeout_minutes: u64,
}

impl ChatConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: 6,
            session_timeout_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched by the first search.
    pub k_neighbors: usize,
    /// Upper bound on chunks placed in the final context.
    pub max_docs: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 8,
            max_docs: 20,
        }
    }
}

/// The hierarchical content source (a Notion workspace).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_version: String,
    pub token: Option<String>,
    /// Page or database the ingestion walk starts from.
    pub root_id: Option<String>,
}

impl SourceConfig {
    /// Token from the config file, falling back to `NOTION_API_KEY`.
    pub fn resolved_token(&self) -> Option<String> {
        non_empty(self.token.clone()).or_else(|| env_var("NOTION_API_KEY"))
    }

    /// Root id from the config file, falling back to `NOTION_PAGE_ID`.
    pub fn resolved_root_id(&self) -> Option<String> {
        non_empty(self.root_id.clone()).or_else(|| env_var("NOTION_PAGE_ID"))
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            api_version: "2022-06-28".to_string(),
            token: None,
            root_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persisted index artifact, replaced atomically on every sync.
    pub index_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/index/knowledge.json"),
        }
    }
}

/// Upper bounds for every outbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub completion_secs: u64,
    pub embedding_secs: u64,
    pub source_secs: u64,
}

impl TimeoutConfig {
    pub fn completion(&self) -> Duration {
        Duration::from_secs(self.completion_secs)
    }

    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn source(&self) -> Duration {
        Duration::from_secs(self.source_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            completion_secs: 60,
            embedding_secs: 30,
            source_secs: 30,
        }
    }
}

/// Fixed replies returned without a retrieval round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Responses {
    pub greeting: String,
    pub thanks: String,
    pub general: String,
    pub off_topic: String,
    pub not_found: String,
    pub fallback: String,
    pub internal_error: String,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            greeting: "Halo! Saya asisten virtual IOSS. Ada yang bisa saya bantu terkait dokumen panduan?".to_string(),
            thanks: "Sama-sama! Senang bisa membantu.".to_string(),
            general: "Saya adalah asisten virtual yang menjawab pertanyaan seputar sistem IOSS berdasarkan dokumen panduan.".to_string(),
            off_topic: "Maaf, saya hanya dapat memberikan informasi yang berkaitan dengan panduan sistem IOSS.".to_string(),
            not_found: "Maaf, saya tidak menemukan informasi tersebut dalam dokumen IOSS.".to_string(),
            fallback: "Maaf, saya kurang mengerti. Bisa coba tanyakan dengan cara lain?".to_string(),
            internal_error: "Terjadi kesalahan internal saat memproses permintaan Anda.".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load configuration from `docent.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("docent.yaml").unwrap_or_default()
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn env_var(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_config_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.max_history, 6);
        assert_eq!(config.session_timeout(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_retrieval_config_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.k_neighbors, 8);
        assert_eq!(config.max_docs, 20);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "retrieval:\n  k_neighbors: 3\nsource:\n  root_id: abc123\n",
        )
        .unwrap();
        assert_eq!(config.retrieval.k_neighbors, 3);
        assert_eq!(config.retrieval.max_docs, 20);
        assert_eq!(config.source.root_id.as_deref(), Some("abc123"));
        assert_eq!(config.llm.provider_name(), "ollama");
    }

    #[test]
    fn test_provider_selection() {
        let config = Config::from_yaml(
            "llm:\n  provider: qwen_api\n  model: qwen/qwen-2.5-72b-instruct\n  api_key: sk-test\n",
        )
        .unwrap();
        match &config.llm {
            LlmConfig::QwenApi { base_url, max_tokens, api_key, .. } => {
                assert_eq!(base_url, "https://openrouter.ai/api/v1");
                assert_eq!(*max_tokens, 512);
                assert_eq!(api_key.as_deref(), Some("sk-test"));
            }
            other => panic!("unexpected provider: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result = Config::from_yaml("llm:\n  provider: gpt_local\n  model: x\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_blank_root_id_counts_as_missing() {
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(Some("abc".to_string())), Some("abc".to_string()));
    }
}
