//! Data iterator hyperparameters shared by every dataset type.

use hparams_rs_config::{
    Component, ConfigAccessor, ConfigError, LeafSchema, SchemaNode, TreeSchema, TypeTag,
};
use serde::Deserialize;
use serde_json::Value;

/// Batching, shuffling, and caching options of a data iterator.
pub struct DataIterator;

impl Component for DataIterator {
    const NAME: &'static str = "data_iterator";

    fn default_schema() -> Result<SchemaNode, ConfigError> {
        Ok(TreeSchema::new()
            .child("num_epochs", LeafSchema::new(1))
            .child("batch_size", LeafSchema::new(64))
            .child("allow_smaller_final_batch", LeafSchema::new(true))
            .child("shuffle", LeafSchema::new(true))
            .child(
                "shuffle_buffer_size",
                LeafSchema::new(Value::Null).allow(TypeTag::Int),
            )
            .child("shard_and_shuffle", LeafSchema::new(false))
            .child("num_parallel_calls", LeafSchema::new(1))
            .child("prefetch_buffer_size", LeafSchema::new(0))
            .child("max_dataset_size", LeafSchema::new(-1))
            .child("seed", LeafSchema::new(Value::Null).allow(TypeTag::Int))
            .child(
                "lazy_strategy",
                LeafSchema::new("none").choices(["none", "process", "all"]),
            )
            .child(
                "cache_strategy",
                LeafSchema::new("processed").choices(["none", "loaded", "processed"]),
            )
            .child("parallelize_processing", LeafSchema::new(true))
            .child("datasets", LeafSchema::new(Value::Array(Vec::new())))
            .child("name", LeafSchema::new("data"))
            .into())
    }
}

/// When raw examples are read and processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LazyStrategy {
    None,
    Process,
    All,
}

/// Which stage of examples is kept in memory between epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    None,
    Loaded,
    Processed,
}

/// Typed view of a data iterator config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataIteratorSettings {
    pub num_epochs: u64,
    pub batch_size: u64,
    pub allow_smaller_final_batch: bool,
    pub shuffle: bool,
    pub shuffle_buffer_size: Option<u64>,
    pub shard_and_shuffle: bool,
    pub num_parallel_calls: u64,
    pub prefetch_buffer_size: u64,
    pub max_dataset_size: i64,
    pub seed: Option<u64>,
    pub lazy_strategy: LazyStrategy,
    pub cache_strategy: CacheStrategy,
    pub parallelize_processing: bool,
    pub datasets: Vec<Value>,
    pub name: String,
}

impl DataIteratorSettings {
    /// Decode and check a data iterator config.
    pub fn from_config(config: &ConfigAccessor) -> Result<Self, ConfigError> {
        let settings: Self = config.deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidField {
                path: "batch_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.shuffle_buffer_size == Some(0) {
            return Err(ConfigError::InvalidField {
                path: "shuffle_buffer_size".to_string(),
                message: "must be positive when set".to_string(),
            });
        }
        if self.lazy_strategy == LazyStrategy::All && self.cache_strategy == CacheStrategy::Processed {
            return Err(ConfigError::InvalidField {
                path: "cache_strategy".to_string(),
                message: "processed examples cannot be cached when loading lazily".to_string(),
            });
        }
        Ok(())
    }

    /// Dataset size cap; `None` when every example is used.
    pub fn max_examples(&self) -> Option<u64> {
        u64::try_from(self.max_dataset_size).ok()
    }
}
