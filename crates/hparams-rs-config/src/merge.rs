//! Merging raw hyperparameters with schema defaults.

use crate::ConfigError;
use crate::schema::{KWARGS_KEY, SchemaNode, TYPE_KEY, TreeSchema, TypeTag};
use crate::utils::join_path;
use crate::validate::{Violation, ViolationKind, ViolationReport};
use log::debug;
use serde_json::{Map, Value};

/// Merge a raw, possibly partial config with the defaults of `schema`.
///
/// Declared keys missing from `raw` take their defaults, nested dictionaries
/// are merged recursively and lists are replaced wholesale. A null or empty
/// value where a dictionary is expected keeps that subtree's defaults.
/// Undeclared keys pass through extensible trees.
///
/// Problems are collected across the whole tree. Undeclared keys alone are
/// reported as [`ConfigError::UnknownKeys`]; once any value also sits where a
/// dictionary is expected, every problem is reported together as
/// [`ConfigError::Validation`].
pub fn merge(raw: Option<&Value>, schema: &SchemaNode) -> Result<Value, ConfigError> {
    let mut issues = MergeIssues::default();
    let merged = merge_node(raw, schema, "", &mut issues);
    issues.into_result()?;
    Ok(merged)
}

/// Keep only the top-level raw entries that `schema` declares.
///
/// Lets a composite component hand a sub-component the part of its own raw
/// config the sub-component understands.
pub fn fetch_subset(raw: Option<&Value>, schema: &SchemaNode) -> Value {
    let mut subset = Map::new();
    if let (Some(Value::Object(raw_map)), Some(tree)) = (raw, schema.as_tree()) {
        for (key, value) in raw_map {
            if tree.get(key).is_some() {
                subset.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(subset)
}

/// Overlay raw values onto a base raw config, recursively merging objects.
///
/// An overlay that switches `type` replaces the base `kwargs` instead of
/// merging into them, since they belong to the previous type.
pub fn overlay(base: &mut Value, overlay_value: &Value) {
    match (base, overlay_value) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let type_changed = match (base_map.get(TYPE_KEY), overlay_map.get(TYPE_KEY)) {
                (Some(base_type), Some(overlay_type)) => base_type != overlay_type,
                _ => false,
            };
            if type_changed && base_map.remove(KWARGS_KEY).is_some() {
                debug!("overlay switched type; dropped previous kwargs");
            }
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Problems found while merging, reported once the whole tree is walked.
#[derive(Debug, Default)]
struct MergeIssues {
    unknown: Vec<(String, Value)>,
    shapes: Vec<Violation>,
}

impl MergeIssues {
    fn into_result(mut self) -> Result<(), ConfigError> {
        self.unknown.sort_by(|left, right| left.0.cmp(&right.0));
        if self.shapes.is_empty() {
            if self.unknown.is_empty() {
                return Ok(());
            }
            let paths: Vec<String> = self.unknown.into_iter().map(|(path, _)| path).collect();
            debug!("merge found unknown keys: {}", paths.join(", "));
            return Err(ConfigError::UnknownKeys { paths });
        }

        let mut violations = self.shapes;
        violations.extend(self.unknown.into_iter().map(|(path, value)| Violation {
            path,
            kind: ViolationKind::UnknownKey,
            value,
        }));
        violations.sort_by(|left, right| left.path.cmp(&right.path));
        debug!("merge found {} structural problems", violations.len());
        Err(ConfigError::Validation(ViolationReport::new(violations)))
    }
}

fn merge_node(
    raw: Option<&Value>,
    schema: &SchemaNode,
    path: &str,
    issues: &mut MergeIssues,
) -> Value {
    match schema {
        SchemaNode::Leaf(leaf) => raw
            .cloned()
            .unwrap_or_else(|| leaf.default_value().clone()),
        SchemaNode::Tree(tree) => merge_tree(raw, tree, path, issues),
    }
}

fn merge_tree(
    raw: Option<&Value>,
    tree: &TreeSchema,
    path: &str,
    issues: &mut MergeIssues,
) -> Value {
    let raw_map = match raw {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map),
        Some(other) => {
            issues.shapes.push(Violation {
                path: path.to_string(),
                kind: ViolationKind::NotAnObject {
                    actual: TypeTag::of(other),
                },
                value: other.clone(),
            });
            return other.clone();
        }
    };
    let reset_kwargs = raw_map.is_some_and(|map| tree.drops_default_kwargs(map));

    let mut merged = Map::new();
    for (key, child) in tree.children() {
        let child_path = join_path(path, key);
        let raw_value = raw_map.and_then(|map| map.get(key));
        let value = match child {
            SchemaNode::Tree(kwargs) if reset_kwargs && key == KWARGS_KEY => {
                debug!("type overridden; dropping default kwargs (path={child_path})");
                merge_tree(raw_value, &kwargs.without_children(), &child_path, issues)
            }
            _ => merge_node(raw_value, child, &child_path, issues),
        };
        merged.insert(key.to_string(), value);
    }

    if let Some(raw_map) = raw_map {
        for (key, value) in raw_map {
            if tree.get(key).is_some() {
                continue;
            }
            if tree.is_extensible() {
                merged.insert(key.clone(), value.clone());
            } else {
                issues.unknown.push((join_path(path, key), value.clone()));
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LeafSchema, TreeSchema};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn nested_schema() -> SchemaNode {
        SchemaNode::from_defaults(&json!({
            "a": { "x": 1, "y": 2 },
            "layers": [64, 64],
            "name": "net"
        }))
        .expect("schema")
    }

    #[test]
    fn absent_raw_yields_defaults() {
        let schema = nested_schema();
        assert_eq!(merge(None, &schema).expect("merge"), schema.defaults());
    }

    #[test]
    fn nested_override_keeps_sibling_defaults() {
        let merged = merge(Some(&json!({ "a": { "x": 10 } })), &nested_schema()).expect("merge");
        assert_eq!(merged["a"], json!({ "x": 10, "y": 2 }));
        assert_eq!(merged["name"], json!("net"));
    }

    #[test]
    fn null_or_empty_subtree_keeps_defaults() {
        let schema = nested_schema();
        for raw in [json!({ "a": null }), json!({ "a": {} })] {
            let merged = merge(Some(&raw), &schema).expect("merge");
            assert_eq!(merged["a"], json!({ "x": 1, "y": 2 }));
        }
    }

    #[test]
    fn lists_are_replaced_wholesale() {
        let merged = merge(Some(&json!({ "layers": [32] })), &nested_schema()).expect("merge");
        assert_eq!(merged["layers"], json!([32]));
    }

    #[test]
    fn unknown_keys_are_collected_across_the_tree() {
        let raw = json!({ "b": 3, "a": { "z": 1, "x": 5 }, "c": null });
        let err = merge(Some(&raw), &nested_schema()).expect_err("unknown keys");
        match err {
            ConfigError::UnknownKeys { paths } => {
                assert_eq!(paths, vec!["a.z".to_string(), "b".to_string(), "c".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn single_unknown_key_is_named() {
        let schema: SchemaNode = TreeSchema::new().child("a", LeafSchema::new(1)).into();
        let err = merge(Some(&json!({ "a": 2, "b": 3 })), &schema).expect_err("unknown");
        assert!(matches!(err, ConfigError::UnknownKeys { ref paths } if paths == &["b"]));
    }

    #[test]
    fn extensible_trees_pass_unknown_keys_through() {
        let schema: SchemaNode = TreeSchema::new()
            .child("a", LeafSchema::new(1))
            .extensible()
            .into();
        let merged = merge(Some(&json!({ "b": { "deep": true } })), &schema).expect("merge");
        assert_eq!(merged, json!({ "a": 1, "b": { "deep": true } }));
    }

    #[test]
    fn scalar_where_tree_expected_is_rejected() {
        let err = merge(Some(&json!({ "a": 5 })), &nested_schema()).expect_err("shape");
        let ConfigError::Validation(report) = err else {
            panic!("expected validation report, got {err}");
        };
        assert_eq!(report.len(), 1);
        let violation = report.iter().next().expect("violation");
        assert_eq!(violation.path, "a");
        assert_eq!(
            violation.kind,
            ViolationKind::NotAnObject {
                actual: TypeTag::Int
            }
        );
    }

    #[test]
    fn shape_errors_and_unknown_keys_are_reported_together() {
        let schema = SchemaNode::from_defaults(&json!({
            "a": { "x": 1 },
            "b": { "y": 2 },
            "c": 3
        }))
        .expect("schema");
        let err = merge(Some(&json!({ "a": 5, "b": 6, "zzz": 1 })), &schema)
            .expect_err("problems");
        let ConfigError::Validation(report) = err else {
            panic!("expected validation report, got {err}");
        };
        let found: Vec<_> = report
            .iter()
            .map(|violation| (violation.path.as_str(), violation.kind.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                (
                    "a",
                    ViolationKind::NotAnObject {
                        actual: TypeTag::Int
                    }
                ),
                (
                    "b",
                    ViolationKind::NotAnObject {
                        actual: TypeTag::Int
                    }
                ),
                ("zzz", ViolationKind::UnknownKey),
            ]
        );
        assert!(format!("{report}").contains("zzz: unknown key"));
    }

    #[test]
    fn shape_errors_inside_nested_trees_are_all_found() {
        let schema = SchemaNode::from_defaults(&json!({
            "encoder": { "attention": { "heads": 8 }, "ffn": { "dim": 64 } }
        }))
        .expect("schema");
        let err = merge(
            Some(&json!({ "encoder": { "attention": [8], "ffn": "wide", "depth": 2 } })),
            &schema,
        )
        .expect_err("problems");
        let ConfigError::Validation(report) = err else {
            panic!("expected validation report, got {err}");
        };
        let paths: Vec<_> = report.iter().map(|violation| violation.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["encoder.attention", "encoder.depth", "encoder.ffn"]
        );
    }

    #[test]
    fn changing_type_drops_default_kwargs() {
        let schema = SchemaNode::from_defaults(&json!({
            "init_fn": { "type": "uniform", "kwargs": { "low": -0.1, "high": 0.1 } }
        }))
        .expect("schema");

        let same_type = merge(
            Some(&json!({ "init_fn": { "type": "uniform", "kwargs": { "low": -1.0 } } })),
            &schema,
        )
        .expect("merge");
        assert_eq!(
            same_type["init_fn"]["kwargs"],
            json!({ "low": -1.0, "high": 0.1 })
        );

        let new_type = merge(
            Some(&json!({ "init_fn": { "type": "normal", "kwargs": { "stddev": 0.02 } } })),
            &schema,
        )
        .expect("merge");
        assert_eq!(new_type["init_fn"]["kwargs"], json!({ "stddev": 0.02 }));

        let no_kwargs = merge(Some(&json!({ "init_fn": { "type": "zeros" } })), &schema)
            .expect("merge");
        assert_eq!(no_kwargs["init_fn"]["kwargs"], json!({}));
    }

    #[test]
    fn merge_is_idempotent_and_leaves_inputs_untouched() {
        let schema = nested_schema();
        let raw = json!({ "a": { "y": 7 }, "layers": [1, 2, 3] });
        let before = raw.clone();
        let once = merge(Some(&raw), &schema).expect("merge");
        let twice = merge(Some(&once), &schema).expect("merge");
        assert_eq!(once, twice);
        assert_eq!(raw, before);
        assert_eq!(
            schema.defaults(),
            json!({ "a": { "x": 1, "y": 2 }, "layers": [64, 64], "name": "net" })
        );
    }

    #[test]
    fn fetch_subset_keeps_declared_keys_only() {
        let schema = nested_schema();
        let raw = json!({ "name": "clf", "num_classes": 3, "a": { "x": 4 } });
        assert_eq!(
            fetch_subset(Some(&raw), &schema),
            json!({ "name": "clf", "a": { "x": 4 } })
        );
        assert_eq!(fetch_subset(None, &schema), json!({}));
    }

    #[test]
    fn overlay_switching_type_replaces_kwargs() {
        let mut base = json!({ "init_fn": { "type": "uniform", "kwargs": { "low": -1.0 } } });
        overlay(
            &mut base,
            &json!({ "init_fn": { "type": "normal", "kwargs": { "std": 0.02 } } }),
        );
        assert_eq!(
            base,
            json!({ "init_fn": { "type": "normal", "kwargs": { "std": 0.02 } } })
        );

        let mut base = json!({ "init_fn": { "type": "uniform", "kwargs": { "low": -1.0 } } });
        overlay(&mut base, &json!({ "init_fn": { "type": "zeros" } }));
        assert_eq!(base, json!({ "init_fn": { "type": "zeros" } }));

        let mut base = json!({ "init_fn": { "type": "uniform", "kwargs": { "low": -1.0 } } });
        overlay(
            &mut base,
            &json!({ "init_fn": { "type": "uniform", "kwargs": { "high": 1.0 } } }),
        );
        assert_eq!(
            base["init_fn"]["kwargs"],
            json!({ "low": -1.0, "high": 1.0 })
        );
    }

    #[test]
    fn overlay_merges_objects_and_replaces_scalars() {
        let mut base = json!({ "a": { "x": 1, "y": 2 }, "layers": [1, 2] });
        overlay(&mut base, &json!({ "a": { "y": 3 }, "layers": [9], "name": "x" }));
        assert_eq!(
            base,
            json!({ "a": { "x": 1, "y": 3 }, "layers": [9], "name": "x" })
        );
    }
}
