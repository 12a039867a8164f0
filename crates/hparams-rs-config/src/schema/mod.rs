//! Schema nodes describing hyperparameter defaults and their accepted types.
//!
//! A schema is a tree: [`TreeSchema`] nodes describe nested dictionaries and
//! [`LeafSchema`] nodes describe scalar or sequence entries. Schemas are built
//! once per component type and never mutated afterwards.

mod registry;

pub use registry::{Component, RegistryBuilder, SchemaRegistry};

use crate::ConfigError;
use crate::utils::join_path;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Reserved key in a defaults dictionary listing children exempt from type checks.
pub const NO_TYPECHECK_KEY: &str = "@no_typecheck";
/// Child name whose subtree always accepts free-form keyword arguments.
pub const KWARGS_KEY: &str = "kwargs";
/// Child name selecting the implementation that `kwargs` are passed to.
pub const TYPE_KEY: &str = "type";

/// Runtime kind of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
}

impl TypeTag {
    /// Classify a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Bool,
            Value::Number(number) if number.is_i64() || number.is_u64() => TypeTag::Int,
            Value::Number(_) => TypeTag::Float,
            Value::String(_) => TypeTag::Str,
            Value::Array(_) => TypeTag::List,
            Value::Object(_) => TypeTag::Map,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "string",
            TypeTag::List => "list",
            TypeTag::Map => "map",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a hyperparameter schema: either a leaf value or a nested dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Leaf(LeafSchema),
    Tree(TreeSchema),
}

impl SchemaNode {
    /// Build a schema from a nested defaults dictionary.
    ///
    /// Maps become trees and everything else becomes a leaf whose accepted
    /// type is inferred from the default. `"@no_typecheck"` lists children
    /// that skip type checking, and any `"kwargs"` child accepts free-form keys.
    pub fn from_defaults(defaults: &Value) -> Result<Self, ConfigError> {
        from_defaults_at(defaults, "")
    }

    /// Return the pure default tree described by this schema.
    pub fn defaults(&self) -> Value {
        match self {
            SchemaNode::Leaf(leaf) => leaf.default.clone(),
            SchemaNode::Tree(tree) => tree.defaults(),
        }
    }

    pub fn as_tree(&self) -> Option<&TreeSchema> {
        match self {
            SchemaNode::Tree(tree) => Some(tree),
            SchemaNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafSchema> {
        match self {
            SchemaNode::Leaf(leaf) => Some(leaf),
            SchemaNode::Tree(_) => None,
        }
    }

    /// Unwrap a tree node, e.g. to extend a component schema.
    pub fn into_tree(self) -> Result<TreeSchema, ConfigError> {
        match self {
            SchemaNode::Tree(tree) => Ok(tree),
            SchemaNode::Leaf(_) => Err(ConfigError::Schema(
                "expected a dictionary schema, found a leaf".to_string(),
            )),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, SchemaNode::Tree(_))
    }

    /// Check that every leaf default is one of its own declared choices.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.check_at("")
    }

    fn check_at(&self, path: &str) -> Result<(), ConfigError> {
        match self {
            SchemaNode::Leaf(leaf) => leaf.check_at(path),
            SchemaNode::Tree(tree) => {
                for (key, child) in &tree.children {
                    child.check_at(&join_path(path, key))?;
                }
                Ok(())
            }
        }
    }

    /// Turn off type checking for this node and every leaf below it.
    fn without_typecheck(self) -> Self {
        match self {
            SchemaNode::Leaf(leaf) => SchemaNode::Leaf(leaf.no_typecheck()),
            SchemaNode::Tree(mut tree) => {
                tree.children = tree
                    .children
                    .into_iter()
                    .map(|(key, child)| (key, child.without_typecheck()))
                    .collect();
                SchemaNode::Tree(tree)
            }
        }
    }
}

impl From<LeafSchema> for SchemaNode {
    fn from(leaf: LeafSchema) -> Self {
        SchemaNode::Leaf(leaf)
    }
}

impl From<TreeSchema> for SchemaNode {
    fn from(tree: TreeSchema) -> Self {
        SchemaNode::Tree(tree)
    }
}

/// Scalar or sequence entry with a default value and accepted types.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafSchema {
    default: Value,
    allowed: BTreeSet<TypeTag>,
    choices: Option<Vec<Value>>,
    typecheck: bool,
}

impl LeafSchema {
    /// Create a leaf whose accepted type is inferred from `default`.
    ///
    /// A null default accepts any value until a type is added with [`allow`](Self::allow).
    pub fn new(default: impl Into<Value>) -> Self {
        let default = default.into();
        let tag = TypeTag::of(&default);
        Self {
            allowed: BTreeSet::from([tag]),
            typecheck: tag != TypeTag::Null,
            choices: None,
            default,
        }
    }

    /// Accept an additional type and enable type checking.
    pub fn allow(mut self, tag: TypeTag) -> Self {
        self.allowed.insert(tag);
        self.typecheck = true;
        self
    }

    /// Also accept null.
    pub fn optional(mut self) -> Self {
        self.allowed.insert(TypeTag::Null);
        self
    }

    /// Restrict values to an enumerated set.
    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Accept any value at this entry.
    pub fn no_typecheck(mut self) -> Self {
        self.typecheck = false;
        self
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn allowed_types(&self) -> &BTreeSet<TypeTag> {
        &self.allowed
    }

    pub fn allowed_choices(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn typecheck(&self) -> bool {
        self.typecheck
    }

    /// Whether a value of kind `tag` is accepted, allowing int to float coercion.
    pub fn accepts(&self, tag: TypeTag) -> bool {
        if !self.typecheck {
            return true;
        }
        self.allowed.contains(&tag)
            || (tag == TypeTag::Int && self.allowed.contains(&TypeTag::Float))
    }

    /// Whether `value` is one of the declared choices (always true without choices).
    pub fn is_choice(&self, value: &Value) -> bool {
        match &self.choices {
            None => true,
            Some(_) if value.is_null() && self.allowed.contains(&TypeTag::Null) => true,
            Some(choices) => choices.contains(value),
        }
    }

    /// Whether an int value at this entry should be stored as a float.
    pub(crate) fn coerces_int_to_float(&self) -> bool {
        self.typecheck
            && !self.allowed.contains(&TypeTag::Int)
            && self.allowed.contains(&TypeTag::Float)
    }

    fn check_at(&self, path: &str) -> Result<(), ConfigError> {
        if !self.accepts(TypeTag::of(&self.default)) {
            return Err(ConfigError::Schema(format!(
                "default at {path} is not one of its allowed types"
            )));
        }
        if !self.is_choice(&self.default) {
            return Err(ConfigError::Schema(format!(
                "default at {path} is not one of its declared choices"
            )));
        }
        Ok(())
    }
}

/// Nested dictionary entry with named children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeSchema {
    children: BTreeMap<String, SchemaNode>,
    extensible: bool,
}

impl TreeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named child.
    pub fn child(mut self, name: impl Into<String>, node: impl Into<SchemaNode>) -> Self {
        self.children.insert(name.into(), node.into());
        self
    }

    /// Accept keys that are not declared as children, passing them through unchecked.
    pub fn extensible(mut self) -> Self {
        self.extensible = true;
        self
    }

    /// Compose two trees; children of `other` replace same-named children.
    pub fn extend(mut self, other: TreeSchema) -> Self {
        self.children.extend(other.children);
        self.extensible |= other.extensible;
        self
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.children.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Same extensibility, no declared children.
    pub(crate) fn without_children(&self) -> Self {
        Self {
            children: BTreeMap::new(),
            extensible: self.extensible,
        }
    }

    /// Whether `map` sets `type` away from its default while `kwargs` is declared.
    ///
    /// Default kwargs belong to the default type, so such a map replaces them.
    pub(crate) fn drops_default_kwargs(&self, map: &Map<String, Value>) -> bool {
        let (Some(raw_type), Some(SchemaNode::Leaf(default_type)), Some(SchemaNode::Tree(_))) = (
            map.get(TYPE_KEY),
            self.children.get(TYPE_KEY),
            self.children.get(KWARGS_KEY),
        ) else {
            return false;
        };
        raw_type != default_type.default_value()
    }

    fn defaults(&self) -> Value {
        let map: Map<String, Value> = self
            .children
            .iter()
            .map(|(key, child)| (key.clone(), child.defaults()))
            .collect();
        Value::Object(map)
    }
}

fn from_defaults_at(value: &Value, path: &str) -> Result<SchemaNode, ConfigError> {
    let Value::Object(map) = value else {
        return Ok(LeafSchema::new(value.clone()).into());
    };

    let no_typecheck = no_typecheck_names(map, path)?;
    let mut tree = TreeSchema::new();
    for (key, child) in map {
        if key == NO_TYPECHECK_KEY {
            continue;
        }
        let child_path = join_path(path, key);
        let mut node = from_defaults_at(child, &child_path)?;
        if key == KWARGS_KEY {
            node = match node {
                SchemaNode::Tree(kwargs) => kwargs.extensible().into(),
                leaf => leaf,
            };
        }
        if no_typecheck.contains(key.as_str()) {
            node = node.without_typecheck();
        }
        tree = tree.child(key.clone(), node);
    }

    for name in &no_typecheck {
        if tree.get(name).is_none() {
            return Err(ConfigError::Schema(format!(
                "{} at {} names unknown entry {name}",
                NO_TYPECHECK_KEY,
                if path.is_empty() { "root" } else { path }
            )));
        }
    }
    Ok(tree.into())
}

fn no_typecheck_names<'a>(
    map: &'a Map<String, Value>,
    path: &str,
) -> Result<BTreeSet<&'a str>, ConfigError> {
    let Some(value) = map.get(NO_TYPECHECK_KEY) else {
        return Ok(BTreeSet::new());
    };
    let malformed = || {
        ConfigError::Schema(format!(
            "{} at {} must be a list of strings",
            NO_TYPECHECK_KEY,
            if path.is_empty() { "root" } else { path }
        ))
    };
    let Value::Array(names) = value else {
        return Err(malformed());
    };
    names
        .iter()
        .map(|name| name.as_str().ok_or_else(malformed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn leaf_infers_type_from_default() {
        let leaf = LeafSchema::new(json!(50));
        assert!(leaf.accepts(TypeTag::Int));
        assert!(!leaf.accepts(TypeTag::Float));
        assert!(!leaf.accepts(TypeTag::Str));

        let rate = LeafSchema::new(json!(0.1));
        assert!(rate.accepts(TypeTag::Int));
        assert!(rate.coerces_int_to_float());
    }

    #[test]
    fn null_default_accepts_anything_until_typed() {
        let any = LeafSchema::new(Value::Null);
        assert!(any.accepts(TypeTag::Map));

        let length = LeafSchema::new(Value::Null).allow(TypeTag::Int);
        assert!(length.accepts(TypeTag::Null));
        assert!(length.accepts(TypeTag::Int));
        assert!(!length.accepts(TypeTag::Str));
    }

    #[test]
    fn from_defaults_builds_nested_trees() {
        let schema = SchemaNode::from_defaults(&json!({
            "dim": 50,
            "read_fn": "load_word2vec",
            "init_fn": {
                "type": "uniform",
                "kwargs": { "low": -0.1, "high": 0.1 }
            },
            "@no_typecheck": ["read_fn"]
        }))
        .expect("schema");

        let tree = schema.as_tree().expect("tree");
        assert_eq!(tree.len(), 3);
        assert!(!tree.get("read_fn").and_then(SchemaNode::as_leaf).expect("leaf").typecheck());
        let init_fn = tree.get("init_fn").and_then(SchemaNode::as_tree).expect("init_fn");
        assert!(!init_fn.is_extensible());
        let kwargs = init_fn.get("kwargs").and_then(SchemaNode::as_tree).expect("kwargs");
        assert!(kwargs.is_extensible());
        assert_eq!(
            schema.defaults(),
            json!({
                "dim": 50,
                "read_fn": "load_word2vec",
                "init_fn": { "type": "uniform", "kwargs": { "low": -0.1, "high": 0.1 } }
            })
        );
    }

    #[test]
    fn from_defaults_rejects_malformed_no_typecheck() {
        let err = SchemaNode::from_defaults(&json!({ "a": 1, "@no_typecheck": "a" }))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::Schema(_)));

        let err = SchemaNode::from_defaults(&json!({ "a": 1, "@no_typecheck": ["b"] }))
            .expect_err("must fail");
        assert!(format!("{err}").contains("unknown entry b"));
    }

    #[test]
    fn extend_replaces_same_named_children() {
        let base = TreeSchema::new()
            .child("name", LeafSchema::new("encoder"))
            .child("dim", LeafSchema::new(768));
        let extended = base.extend(TreeSchema::new().child("name", LeafSchema::new("classifier")));
        assert_eq!(
            SchemaNode::from(extended).defaults(),
            json!({ "name": "classifier", "dim": 768 })
        );
    }

    #[test]
    fn check_rejects_defaults_outside_constraints() {
        let bad_choice: SchemaNode = TreeSchema::new()
            .child("mode", LeafSchema::new("fast").choices(["slow", "safe"]))
            .into();
        assert!(matches!(bad_choice.check(), Err(ConfigError::Schema(_))));

        let nested: SchemaNode = TreeSchema::new()
            .child(
                "encoder",
                TreeSchema::new().child("act", LeafSchema::new("gelu").choices(["relu"])),
            )
            .into();
        let err = nested.check().expect_err("nested default outside choices");
        assert!(format!("{err}").contains("encoder.act"));

        let optional_choice: SchemaNode = TreeSchema::new()
            .child(
                "mode",
                LeafSchema::new(Value::Null)
                    .allow(TypeTag::Str)
                    .choices(["a", "b"]),
            )
            .into();
        assert!(optional_choice.check().is_ok());
    }

    #[test]
    fn leaf_builders_keep_the_default_type_accepted() {
        let leaves = [
            LeafSchema::new(1),
            LeafSchema::new(0.5).optional(),
            LeafSchema::new(Value::Null).allow(TypeTag::Int),
            LeafSchema::new(Value::Null).allow(TypeTag::Map).allow(TypeTag::List),
            LeafSchema::new("cls").choices(["cls", "all"]),
            LeafSchema::new(json!([64, 64])).no_typecheck(),
        ];
        for leaf in leaves {
            assert!(
                leaf.accepts(TypeTag::of(leaf.default_value())),
                "{:?}",
                leaf.default_value()
            );
            assert!(SchemaNode::from(leaf).check().is_ok());
        }
    }

    #[test]
    fn type_tags_classify_json_values() {
        assert_eq!(TypeTag::of(&json!(1)), TypeTag::Int);
        assert_eq!(TypeTag::of(&json!(-1)), TypeTag::Int);
        assert_eq!(TypeTag::of(&json!(1.5)), TypeTag::Float);
        assert_eq!(TypeTag::of(&json!("x")), TypeTag::Str);
        assert_eq!(TypeTag::of(&json!([1])), TypeTag::List);
        assert_eq!(TypeTag::of(&json!({})), TypeTag::Map);
        assert_eq!(TypeTag::Str.to_string(), "string");
    }
}
