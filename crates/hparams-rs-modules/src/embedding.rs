//! Word embedding table hyperparameters.

use hparams_rs_config::{Component, ConfigAccessor, ConfigError, SchemaNode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Embedding table initialised randomly and optionally read from a pretrained file.
pub struct Embedding;

impl Component for Embedding {
    const NAME: &'static str = "embedding";

    fn default_schema() -> Result<SchemaNode, ConfigError> {
        SchemaNode::from_defaults(&json!({
            "file": "",
            "dim": 50,
            "read_fn": "load_word2vec",
            "init_fn": {
                "type": "numpy.random.uniform",
                "kwargs": {
                    "low": -0.1,
                    "high": 0.1
                }
            },
            "@no_typecheck": ["read_fn", "init_fn"]
        }))
    }
}

/// Typed view of an embedding config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingSettings {
    pub file: String,
    pub dim: u64,
    pub read_fn: String,
    pub init_fn: InitFn,
}

/// Initializer used for tokens missing from the pretrained file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InitFn {
    #[serde(rename = "type")]
    pub kind: String,
    pub kwargs: Map<String, Value>,
}

impl EmbeddingSettings {
    /// Decode and check an embedding config.
    pub fn from_config(config: &ConfigAccessor) -> Result<Self, ConfigError> {
        let settings: Self = config.deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The table shape is derived from the vocabulary, so initializer kwargs may not set it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for reserved in ["shape", "size"] {
            if self.init_fn.kwargs.contains_key(reserved) {
                return Err(ConfigError::InvalidField {
                    path: format!("init_fn.kwargs.{reserved}"),
                    message: "inferred from the vocabulary; must not be set".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Pretrained vector file, if one is configured.
    pub fn pretrained_file(&self) -> Option<&str> {
        Some(self.file.as_str()).filter(|file| !file.is_empty())
    }
}
