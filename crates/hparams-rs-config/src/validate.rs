//! Validation of merged hyperparameters against their schema.
//!
//! Every problem is collected into the returned list rather than stopping at
//! the first, so a single pass gives a complete report.

use crate::schema::{KWARGS_KEY, LeafSchema, SchemaNode, TreeSchema, TypeTag};
use crate::utils::join_path;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A single way in which a merged config fails its schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Dotted path of the offending entry (empty for the root).
    pub path: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
    /// The value found at `path`.
    pub value: Value,
}

/// What went wrong at a violation's path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// The value's kind is not accepted by the leaf.
    TypeMismatch {
        expected: Vec<TypeTag>,
        actual: TypeTag,
    },
    /// The value is not one of the leaf's declared choices.
    NotAChoice { choices: Vec<Value> },
    /// A declared key is absent.
    Missing,
    /// A dictionary was expected.
    NotAnObject { actual: TypeTag },
    /// The key is not declared by a non-extensible dictionary.
    UnknownKey,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "root"
        } else {
            &self.path
        };
        match &self.kind {
            ViolationKind::TypeMismatch { expected, actual } => {
                let expected: Vec<&str> = expected.iter().map(|tag| tag.as_str()).collect();
                write!(
                    f,
                    "{path}: expected {}, found {actual} ({})",
                    expected.join(" or "),
                    self.value
                )
            }
            ViolationKind::NotAChoice { choices } => {
                let choices: Vec<String> = choices.iter().map(Value::to_string).collect();
                write!(
                    f,
                    "{path}: {} is not one of {}",
                    self.value,
                    choices.join(", ")
                )
            }
            ViolationKind::Missing => write!(f, "{path}: missing required entry"),
            ViolationKind::NotAnObject { actual } => {
                write!(f, "{path}: expected map, found {actual}")
            }
            ViolationKind::UnknownKey => write!(f, "{path}: unknown key"),
        }
    }
}

/// All violations found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ViolationReport {
    violations: Vec<Violation>,
}

impl ViolationReport {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ViolationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, violation) in self.violations.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  {violation}")?;
        }
        Ok(())
    }
}

impl IntoIterator for ViolationReport {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.into_iter()
    }
}

/// Check a merged config against its schema, returning every violation.
pub fn validate(merged: &Value, schema: &SchemaNode) -> Vec<Violation> {
    let mut violations = Vec::new();
    validate_node(merged, schema, "", &mut violations);
    violations
}

/// Copy of `merged` with ints stored as floats wherever only floats are accepted.
pub fn coerce(merged: &Value, schema: &SchemaNode) -> Value {
    let mut coerced = merged.clone();
    coerce_in_place(&mut coerced, schema);
    coerced
}

fn validate_node(value: &Value, schema: &SchemaNode, path: &str, out: &mut Vec<Violation>) {
    match schema {
        SchemaNode::Leaf(leaf) => validate_leaf(value, leaf, path, out),
        SchemaNode::Tree(tree) => validate_tree(value, tree, path, out),
    }
}

fn validate_tree(value: &Value, tree: &TreeSchema, path: &str, out: &mut Vec<Violation>) {
    let Value::Object(map) = value else {
        out.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::NotAnObject {
                actual: TypeTag::of(value),
            },
            value: value.clone(),
        });
        return;
    };
    let reset_kwargs = tree.drops_default_kwargs(map);
    for (key, child) in tree.children() {
        let child_path = join_path(path, key);
        match (map.get(key), child) {
            (Some(child_value), SchemaNode::Tree(kwargs)) if reset_kwargs && key == KWARGS_KEY => {
                validate_tree(child_value, &kwargs.without_children(), &child_path, out)
            }
            (Some(child_value), _) => validate_node(child_value, child, &child_path, out),
            (None, _) => out.push(Violation {
                path: child_path,
                kind: ViolationKind::Missing,
                value: Value::Null,
            }),
        }
    }
}

fn validate_leaf(value: &Value, leaf: &LeafSchema, path: &str, out: &mut Vec<Violation>) {
    let actual = TypeTag::of(value);
    if !leaf.accepts(actual) {
        out.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::TypeMismatch {
                expected: leaf.allowed_types().iter().copied().collect(),
                actual,
            },
            value: value.clone(),
        });
        return;
    }
    if !leaf.is_choice(value) {
        out.push(Violation {
            path: path.to_string(),
            kind: ViolationKind::NotAChoice {
                choices: leaf.allowed_choices().unwrap_or_default().to_vec(),
            },
            value: value.clone(),
        });
    }
}

fn coerce_in_place(value: &mut Value, schema: &SchemaNode) {
    match (value, schema) {
        (Value::Object(map), SchemaNode::Tree(tree)) => {
            let reset_kwargs = tree.drops_default_kwargs(map);
            for (key, child) in tree.children() {
                if reset_kwargs && key == KWARGS_KEY {
                    continue;
                }
                if let Some(child_value) = map.get_mut(key) {
                    coerce_in_place(child_value, child);
                }
            }
        }
        (slot, SchemaNode::Leaf(leaf)) => {
            if !leaf.coerces_int_to_float() || TypeTag::of(slot) != TypeTag::Int {
                return;
            }
            if let Some(float) = slot.as_f64() {
                *slot = Value::from(float);
            }
        }
        _ => {}
    }
}
