//! Read-only view over merged and validated hyperparameters.

use crate::ConfigError;
use crate::merge::merge;
use crate::schema::SchemaNode;
use crate::utils::{join_path, split_path};
use crate::validate::{ViolationReport, coerce, validate};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Immutable hyperparameters handed to a component at construction time.
///
/// Cloning is cheap; clones share the same backing tree. Equality and hashing
/// are structural, so an accessor can key a cache of built components.
#[derive(Debug, Clone)]
pub struct ConfigAccessor {
    root: Arc<Value>,
}

impl ConfigAccessor {
    /// Merge `raw` with the schema defaults, validate, and freeze the result.
    pub fn new(raw: Option<&Value>, schema: &SchemaNode) -> Result<Self, ConfigError> {
        let merged = merge(raw, schema)?;
        let violations = validate(&merged, schema);
        if !violations.is_empty() {
            warn!("hyperparameter validation failed ({} violations)", violations.len());
            return Err(ConfigError::Validation(ViolationReport::new(violations)));
        }
        debug!("hyperparameters merged and validated");
        Ok(Self::frozen(coerce(&merged, schema)))
    }

    fn frozen(value: Value) -> Self {
        Self {
            root: Arc::new(value),
        }
    }

    /// Look up a value by dotted path, e.g. `"encoder.multihead_attention.num_heads"`.
    pub fn get(&self, path: &str) -> Result<&Value, ConfigError> {
        self.get_path(&split_path(path))
    }

    /// Look up a value by a sequence of nested keys.
    pub fn get_path<S: AsRef<str>>(&self, keys: &[S]) -> Result<&Value, ConfigError> {
        let mut current = self.root.as_ref();
        let mut walked = String::new();
        for key in keys {
            let key = key.as_ref();
            walked = join_path(&walked, key);
            current = current
                .as_object()
                .and_then(|map| map.get(key))
                .ok_or_else(|| ConfigError::KeyNotFound {
                    path: walked.clone(),
                })?;
        }
        Ok(current)
    }

    /// Single-level lookup; `name` is used as a key verbatim.
    pub fn attr(&self, name: &str) -> Result<&Value, ConfigError> {
        self.get_path(&[name])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// Top-level keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root
            .as_object()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Accessor over a nested dictionary.
    pub fn section(&self, path: &str) -> Result<ConfigAccessor, ConfigError> {
        let value = self.get(path)?;
        if !value.is_object() {
            return Err(ConfigError::invalid_field(path, "expected object"));
        }
        Ok(Self::frozen(value.clone()))
    }

    pub fn get_bool(&self, path: &str) -> Result<bool, ConfigError> {
        self.get(path)?
            .as_bool()
            .ok_or_else(|| ConfigError::invalid_field(path, "expected bool"))
    }

    pub fn get_i64(&self, path: &str) -> Result<i64, ConfigError> {
        self.get(path)?
            .as_i64()
            .ok_or_else(|| ConfigError::invalid_field(path, "expected integer"))
    }

    pub fn get_u64(&self, path: &str) -> Result<u64, ConfigError> {
        self.get(path)?
            .as_u64()
            .ok_or_else(|| ConfigError::invalid_field(path, "expected unsigned integer"))
    }

    /// Numeric lookup; integers are widened.
    pub fn get_f64(&self, path: &str) -> Result<f64, ConfigError> {
        self.get(path)?
            .as_f64()
            .ok_or_else(|| ConfigError::invalid_field(path, "expected number"))
    }

    pub fn get_str(&self, path: &str) -> Result<&str, ConfigError> {
        self.get(path)?
            .as_str()
            .ok_or_else(|| ConfigError::invalid_field(path, "expected string"))
    }

    /// Decode the whole config into a typed settings struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        Ok(T::deserialize(self.root.as_ref())?)
    }

    /// Decode the value at `path` into a typed struct.
    pub fn deserialize_at<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        Ok(T::deserialize(self.get(path)?)?)
    }

    /// Borrow the backing tree.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Deep copy of the backing tree; reloadable as a raw config.
    pub fn snapshot(&self) -> Value {
        self.root.as_ref().clone()
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self.root.as_ref())?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self.root.as_ref())?)
    }

    /// Always fails: configs are frozen once built.
    pub fn set(&self, path: &str, _value: impl Into<Value>) -> Result<(), ConfigError> {
        Err(ConfigError::Immutable {
            path: path.to_string(),
        })
    }

    /// Always fails: configs are frozen once built.
    pub fn remove(&self, path: &str) -> Result<Value, ConfigError> {
        Err(ConfigError::Immutable {
            path: path.to_string(),
        })
    }
}

impl PartialEq for ConfigAccessor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root) || self.root == other.root
    }
}

// Validated trees hold no NaN: JSON numbers are always finite.
impl Eq for ConfigAccessor {}

impl Hash for ConfigAccessor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.root, state);
    }
}

impl Serialize for ConfigAccessor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl fmt::Display for ConfigAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(flag) => {
            1u8.hash(state);
            flag.hash(state);
        }
        Value::Number(number) => {
            2u8.hash(state);
            number.to_string().hash(state);
        }
        Value::String(text) => {
            3u8.hash(state);
            text.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            for (key, item) in entries {
                key.hash(state);
                hash_value(item, state);
            }
        }
    }
}
