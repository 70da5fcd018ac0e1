//! YAML configuration file support.
//!
//! One document configures the whole assistant: embedding, vector store, completion backend
//! and the answering tables. Secrets are not meant to live in the file; they are read from the
//! environment by [`RagConfig::apply_env`].
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "phoenixville"
//!
//! semantic:
//!   mode: "api"
//!   api_provider: "openai"
//!   api_url: "https://api.openai.com/v1/embeddings"
//!   model_name: "text-embedding-ada-002"
//!   target_dim: 1536
//!
//! index:
//!   backend: "pinecone"
//!   pinecone:
//!     host: "phoenixville-abc123.svc.us-east-1.pinecone.io"
//!   search:
//!     score_threshold: 0.4
//!     top_k: 5
//!
//! llm:
//!   provider: "openai"
//!   model: "gpt-4"
//!   temperature: 0.3
//!   max_tokens: 500
//!
//! assistant:
//!   simulation_mode: false
//! ```

use std::fs;
use std::path::Path;

use assistant::AssistantConfig;
use index::{PineconeConfig, SearchConfig};
use llm::LlmConfig;
use semantic::SemanticConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Holds the completion and (for the `openai` provider) the embedding API key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";
/// `true`/`1` forces simulation mode, `false`/`0` clears it.
pub const SIMULATION_ENV: &str = "MUNIRAG_SIMULATION";

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for the assistant pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RagConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub semantic: SemanticConfig,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl RagConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: RagConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill secrets and switches from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Like [`apply_env`](Self::apply_env), reading variables through `lookup`.
    ///
    /// Keys already present in the file win over the environment. The simulation switch is
    /// the exception: when set, it overrides the file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(OPENAI_API_KEY) {
            if self.llm.api_key.is_none() {
                self.llm.api_key = Some(key.clone());
            }
            let openai_embeddings = self.semantic.mode == "api"
                && self.semantic.api_provider.as_deref() == Some("openai");
            if openai_embeddings && self.semantic.api_auth_header.is_none() {
                self.semantic.api_auth_header = Some(format!("Bearer {key}"));
            }
        }

        if let Some(key) = non_empty(PINECONE_API_KEY) {
            if self.index.pinecone.api_key.is_none() {
                self.index.pinecone.api_key = Some(key);
            }
        }

        if let Some(flag) = non_empty(SIMULATION_ENV) {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.assistant.simulation_mode = true,
                "0" | "false" | "no" | "off" => self.assistant.simulation_mode = false,
                other => tracing::warn!(
                    variable = SIMULATION_ENV,
                    value = other,
                    "ignoring unrecognised simulation flag"
                ),
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        if self.semantic.target_dim == 0 {
            return Err(ConfigLoadError::Validation(
                "semantic.target_dim must be >= 1".into(),
            ));
        }
        self.index.validate()?;
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigLoadError::Validation(format!(
                "llm.temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }
        self.assistant
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;

        Ok(())
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            semantic: SemanticConfig::default(),
            index: IndexYamlConfig::default(),
            llm: LlmConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// Vector store selection plus the search settings applied on top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    /// `"pinecone"` or `"in_memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub search: SearchConfig,

    /// Only read when `backend` is `"pinecone"`.
    #[serde(default)]
    pub pinecone: PineconeConfig,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.backend.as_str() {
            "pinecone" | "in_memory" => {}
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "index.backend must be 'pinecone' or 'in_memory', got '{other}'"
                )));
            }
        }
        // Scores are backend-defined, so negative thresholds are legal.
        if !self.search.score_threshold.is_finite() {
            return Err(ConfigLoadError::Validation(format!(
                "index.search.score_threshold must be a finite number, got {}",
                self.search.score_threshold
            )));
        }
        if self.search.top_k == 0 {
            return Err(ConfigLoadError::Validation(
                "index.search.top_k must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            search: SearchConfig::default(),
            pinecone: PineconeConfig::default(),
        }
    }
}

fn default_backend() -> String {
    "pinecone".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
index:
  backend: "in_memory"
  search:
    score_threshold: 0.5
    top_k: 3
llm:
  provider: "ollama"
  model: "mistral"
"#;

        let config = RagConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.index.backend, "in_memory");
        assert_eq!(config.index.search.top_k, 3);
        assert_eq!(config.index.search.score_threshold, 0.5);
        // untouched search keys keep their defaults
        assert_eq!(config.index.search.text_key, "text");
        assert_eq!(config.llm.provider, "ollama");
        assert!(!config.assistant.simulation_mode);
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1"
assistant:
  simulation_mode: true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = RagConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.version, "1");
        assert!(config.assistant.simulation_mode);
    }

    #[test]
    fn test_missing_file() {
        let err = RagConfig::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileRead(_)));
    }

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
        assert_eq!(config.index.backend, "pinecone");
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = RagConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_index_validation() {
        let yaml = r#"
version: "1.0"
index:
  backend: "qdrant"
"#;
        let err = RagConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("index.backend"));

        let yaml = r#"
version: "1.0"
index:
  search:
    score_threshold: .nan
"#;
        let err = RagConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("score_threshold"));
    }

    #[test]
    fn test_negative_threshold_accepted() {
        for threshold in ["-0.3", "-0.5"] {
            let yaml = format!(
                "version: \"1.0\"\nindex:\n  backend: \"in_memory\"\n  search:\n    score_threshold: {threshold}\n"
            );
            let config = RagConfig::from_yaml(&yaml).unwrap();
            assert!(config.index.search.score_threshold < 0.0);
        }
    }

    #[test]
    fn test_assistant_validation() {
        let yaml = r#"
version: "1.0"
assistant:
  simulation:
    default_template: "   "
"#;
        let err = RagConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Validation(_)));
        assert!(err.to_string().contains("default_template"));
    }

    #[test]
    fn test_env_supplies_secrets() {
        let mut config = RagConfig::default();
        config.semantic.mode = "api".into();
        config.semantic.api_provider = Some("openai".into());

        config.apply_overrides(env(&[
            (OPENAI_API_KEY, "sk-env"),
            (PINECONE_API_KEY, "pc-env"),
        ]));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(
            config.semantic.api_auth_header.as_deref(),
            Some("Bearer sk-env")
        );
        assert_eq!(config.index.pinecone.api_key.as_deref(), Some("pc-env"));
    }

    #[test]
    fn test_file_secrets_win_over_env() {
        let mut config = RagConfig::default();
        config.llm.api_key = Some("sk-file".into());

        config.apply_overrides(env(&[(OPENAI_API_KEY, "sk-env")]));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-file"));
        // fast embeddings never receive the key
        assert!(config.semantic.api_auth_header.is_none());
    }

    #[test]
    fn test_simulation_flag() {
        let mut config = RagConfig::default();
        config.apply_overrides(env(&[(SIMULATION_ENV, "TRUE")]));
        assert!(config.assistant.simulation_mode);

        config.apply_overrides(env(&[(SIMULATION_ENV, "0")]));
        assert!(!config.assistant.simulation_mode);

        config.assistant.simulation_mode = true;
        config.apply_overrides(env(&[(SIMULATION_ENV, "maybe")]));
        assert!(config.assistant.simulation_mode);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
version: "1.0"
name: "production"

semantic:
  mode: "api"
  api_provider: "openai"
  api_url: "https://api.openai.com/v1/embeddings"
  target_dim: 1536
  timeout: 5000
  normalize: true

index:
  backend: "pinecone"
  pinecone:
    host: "phoenixville-abc123.svc.us-east-1.pinecone.io"
    timeout: 8000
  search:
    score_threshold: 0.4
    top_k: 5
    namespace: "borough"

llm:
  provider: "openai"
  model: "gpt-4"
  temperature: 0.3
  max_tokens: 500

assistant:
  simulation_mode: false
  entities:
    entries:
      - name: "mayor"
        answer: "The mayor is Peter Urscheler."
"#;

        let config = RagConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.semantic.mode, "api");
        assert_eq!(config.semantic.timeout.as_millis(), 5000);
        assert!(config.semantic.normalize);
        assert_eq!(
            config.index.pinecone.host,
            "phoenixville-abc123.svc.us-east-1.pinecone.io"
        );
        assert_eq!(config.index.pinecone.timeout.as_millis(), 8000);
        assert_eq!(config.index.search.namespace.as_deref(), Some("borough"));
        assert_eq!(config.llm.max_tokens, Some(500));
        assert_eq!(config.assistant.entities.entries.len(), 1);
        // trigger terms were not overridden
        assert!(
            config
                .assistant
                .entities
                .trigger_terms
                .contains(&"who".to_string())
        );
    }
}
