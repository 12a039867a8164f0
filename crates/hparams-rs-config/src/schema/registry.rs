//! Registry of default schemas, one per component type.

use super::SchemaNode;
use crate::{ConfigAccessor, ConfigError};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;

/// A configurable component that declares its default hyperparameters.
pub trait Component {
    /// Registry key for the component type.
    const NAME: &'static str;

    /// Root schema for the component; must be a tree.
    fn default_schema() -> Result<SchemaNode, ConfigError>;
}

/// Collects schema registrations during start-up.
#[derive(Debug, Default, Clone)]
pub struct RegistryBuilder {
    schemas: BTreeMap<String, SchemaNode>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the root schema for a component type.
    ///
    /// Registering an identical schema twice is a no-op; a different schema
    /// for an already registered type is rejected.
    pub fn register(
        mut self,
        component_type: impl Into<String>,
        schema: SchemaNode,
    ) -> Result<Self, ConfigError> {
        let component_type = component_type.into();
        if !schema.is_tree() {
            return Err(ConfigError::Schema(format!(
                "root schema for {component_type} must be a dictionary"
            )));
        }
        schema.check().map_err(|err| match err {
            ConfigError::Schema(message) => {
                ConfigError::Schema(format!("{component_type}: {message}"))
            }
            other => other,
        })?;

        match self.schemas.get(&component_type) {
            Some(existing) if *existing == schema => {
                debug!("schema already registered (component={component_type})");
            }
            Some(_) => {
                return Err(ConfigError::Schema(format!(
                    "conflicting schemas registered for {component_type}"
                )));
            }
            None => {
                debug!("registered schema (component={component_type})");
                self.schemas.insert(component_type, schema);
            }
        }
        Ok(self)
    }

    /// Register a component through its type-level schema declaration.
    pub fn register_component<C: Component>(self) -> Result<Self, ConfigError> {
        self.register(C::NAME, C::default_schema()?)
    }

    /// Freeze the registrations.
    pub fn build(self) -> SchemaRegistry {
        info!("schema registry built (components={})", self.schemas.len());
        SchemaRegistry {
            schemas: self.schemas,
        }
    }
}

/// Immutable map from component type to its root schema.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, SchemaNode>,
}

impl SchemaRegistry {
    /// Look up the root schema registered for a component type.
    pub fn schema_for(&self, component_type: &str) -> Result<&SchemaNode, ConfigError> {
        self.schemas.get(component_type).ok_or_else(|| {
            ConfigError::Schema(format!("no schema registered for {component_type}"))
        })
    }

    /// Merge and validate a raw config for a component type.
    pub fn resolve(
        &self,
        component_type: &str,
        raw: Option<&Value>,
    ) -> Result<ConfigAccessor, ConfigError> {
        let schema = self.schema_for(component_type)?;
        ConfigAccessor::new(raw, schema)
    }

    /// Registered component types, sorted.
    pub fn component_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn contains(&self, component_type: &str) -> bool {
        self.schemas.contains_key(component_type)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
