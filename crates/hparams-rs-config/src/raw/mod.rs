//! Loading raw hyperparameters from JSON5 text and files.
//!
//! Raw configs are untrusted, possibly partial dictionaries. Several files can
//! be stacked (a base file followed by overrides) before the schema merge.


use crate::ConfigError;
use crate::merge::overlay;
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parse a raw config from JSON5 contents.
pub fn load_from_str(contents: &str) -> Result<Value, ConfigError> {
    debug!("loading raw config from contents (len={})", contents.len());
    let value: Value = json5::from_str(contents)?;
    ensure_raw_shape(&value)?;
    Ok(value)
}

/// Read and parse a raw config file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Value, ConfigError> {
    let path = path.as_ref();
    debug!("loading raw config from path: {}", path.display());
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load several raw config files and overlay them in order; later files win.
pub fn load_layers<P: AsRef<Path>>(paths: &[P]) -> Result<Value, ConfigError> {
    let mut merged = Value::Object(serde_json::Map::new());
    for path in paths {
        let layer = load_from_path(path)?;
        if !layer.is_null() {
            overlay(&mut merged, &layer);
        }
    }
    info!("raw config layers loaded (layers={})", paths.len());
    Ok(merged)
}

/// Raw configs are dictionaries; null stands for "all defaults".
fn ensure_raw_shape(value: &Value) -> Result<(), ConfigError> {
    match value {
        Value::Object(_) | Value::Null => Ok(()),
        _ => Err(ConfigError::invalid_field("", "expected object")),
    }
}
