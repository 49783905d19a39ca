//! Kind compatibility checking
//!
//! Decides whether a candidate kind may replace its previously published
//! revision, and detects the structural changes between two schema documents
//! so violations can be reported precisely.
//!
//! Rules, in order:
//! 1. Nothing published yet: always compatible.
//! 2. Maturity never regresses.
//! 3. Below `stable` the lineage may be rewritten freely.
//! 4. From `stable` on, the published lineage is append-only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::CompatError;
use crate::kind::Kind;
use crate::lineage::SchemaEngine;

// =============================================================================
// Structural changes
// =============================================================================

/// A detected change between two schema documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type of change
    pub change_type: ChangeType,
    /// Path to the changed element (e.g., "properties.name.type")
    pub path: String,
    /// Old value (if applicable)
    pub old_value: Option<String>,
    /// New value (if applicable)
    pub new_value: Option<String>,
    /// Whether a consumer of the old schema could reject data of the new one
    pub is_breaking: bool,
    /// Human-readable description
    pub description: String,
}

/// Type of schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// A new field was added
    FieldAdded,
    /// A field was removed
    FieldRemoved,
    /// A field's type changed
    TypeChanged,
    /// A field's optionality changed (required <-> optional)
    OptionalityChanged,
    /// Enum variant added
    EnumVariantAdded,
    /// Enum variant removed
    EnumVariantRemoved,
    /// A named definition was removed
    DefinitionRemoved,
    /// Extra properties are no longer accepted
    ClosedObject,
}

/// Keywords that only annotate a schema and never change what it accepts
const ANNOTATION_KEYWORDS: &[&str] = &["description", "title", "$comment", "examples", "deprecated"];

/// Copy of `value` with every annotation keyword removed, recursively
pub fn strip_annotations(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !ANNOTATION_KEYWORDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), strip_annotations(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_annotations).collect()),
        other => other.clone(),
    }
}

/// Whether two documents accept exactly the same shape, ignoring annotations
pub fn structurally_equal(old: &Value, new: &Value) -> bool {
    strip_annotations(old) == strip_annotations(new)
}

/// Detect changes between two JSON Schema documents.
///
/// Output order is deterministic: properties and definitions are walked in
/// key order and enum values in declaration order.
pub fn detect_changes(old: &Value, new: &Value) -> Vec<SchemaChange> {
    let mut changes = Vec::new();
    walk(old, new, "", &mut changes);
    changes
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

fn required_set(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn walk(old: &Value, new: &Value, path: &str, changes: &mut Vec<SchemaChange>) {
    // Type changes
    let old_type = old.get("type");
    let new_type = new.get("type");
    if old_type != new_type {
        changes.push(SchemaChange {
            change_type: ChangeType::TypeChanged,
            path: join(path, "type"),
            old_value: old_type.map(|t| t.to_string()),
            new_value: new_type.map(|t| t.to_string()),
            is_breaking: true,
            description: format!(
                "'{}' type changed from {} to {}",
                if path.is_empty() { "<root>" } else { path },
                old_type.map(|t| t.to_string()).unwrap_or_else(|| "any".into()),
                new_type.map(|t| t.to_string()).unwrap_or_else(|| "any".into()),
            ),
        });
    }

    // Reference target changes
    let old_ref = old.get("$ref");
    let new_ref = new.get("$ref");
    if old_ref != new_ref {
        changes.push(SchemaChange {
            change_type: ChangeType::TypeChanged,
            path: join(path, "$ref"),
            old_value: old_ref.map(|r| r.to_string()),
            new_value: new_ref.map(|r| r.to_string()),
            is_breaking: true,
            description: format!("'{}' now references a different definition", path),
        });
    }

    let old_required = required_set(old);
    let new_required = required_set(new);

    // Properties
    let empty = serde_json::Map::new();
    let old_props = old.get("properties").and_then(Value::as_object);
    let new_props = new.get("properties").and_then(Value::as_object);
    if old_props.is_some() || new_props.is_some() {
        let old_props = old_props.unwrap_or(&empty);
        let new_props = new_props.unwrap_or(&empty);

        for (name, old_prop) in old_props {
            let prop_path = join(path, &format!("properties.{}", name));
            match new_props.get(name) {
                None => changes.push(SchemaChange {
                    change_type: ChangeType::FieldRemoved,
                    path: prop_path,
                    old_value: Some(old_prop.to_string()),
                    new_value: None,
                    is_breaking: true,
                    description: format!("Property '{}' was removed", name),
                }),
                Some(new_prop) => {
                    let was_required = old_required.contains(&name.as_str());
                    let is_required = new_required.contains(&name.as_str());
                    if was_required != is_required {
                        changes.push(SchemaChange {
                            change_type: ChangeType::OptionalityChanged,
                            path: prop_path.clone(),
                            old_value: Some(was_required.to_string()),
                            new_value: Some(is_required.to_string()),
                            is_breaking: is_required,
                            description: if is_required {
                                format!("Property '{}' is now required", name)
                            } else {
                                format!("Property '{}' is no longer required", name)
                            },
                        });
                    }
                    walk(old_prop, new_prop, &prop_path, changes);
                }
            }
        }

        for (name, new_prop) in new_props {
            if old_props.contains_key(name) {
                continue;
            }
            let is_required = new_required.contains(&name.as_str());
            changes.push(SchemaChange {
                change_type: ChangeType::FieldAdded,
                path: join(path, &format!("properties.{}", name)),
                old_value: None,
                new_value: Some(new_prop.to_string()),
                is_breaking: is_required,
                description: if is_required {
                    format!("Required property '{}' was added", name)
                } else {
                    format!("Optional property '{}' was added", name)
                },
            });
        }
    }

    // Enum changes
    if let (Some(old_enum), Some(new_enum)) = (
        old.get("enum").and_then(Value::as_array),
        new.get("enum").and_then(Value::as_array),
    ) {
        for removed in old_enum.iter().filter(|v| !new_enum.contains(v)) {
            changes.push(SchemaChange {
                change_type: ChangeType::EnumVariantRemoved,
                path: join(path, "enum"),
                old_value: Some(removed.to_string()),
                new_value: None,
                is_breaking: true,
                description: format!("Enum variant {} was removed", removed),
            });
        }
        for added in new_enum.iter().filter(|v| !old_enum.contains(v)) {
            changes.push(SchemaChange {
                change_type: ChangeType::EnumVariantAdded,
                path: join(path, "enum"),
                old_value: None,
                new_value: Some(added.to_string()),
                is_breaking: false,
                description: format!("Enum variant {} was added", added),
            });
        }
    }

    // Array items
    if let (Some(old_items), Some(new_items)) = (old.get("items"), new.get("items")) {
        if old_items.is_object() && new_items.is_object() {
            walk(old_items, new_items, &join(path, "items"), changes);
        }
    }

    // Open vs closed objects
    let old_extra = old.get("additionalProperties");
    let new_extra = new.get("additionalProperties");
    match (old_extra, new_extra) {
        (Some(o), Some(n)) if o.is_object() && n.is_object() => {
            walk(o, n, &join(path, "additionalProperties"), changes);
        }
        (o, Some(Value::Bool(false))) if o != Some(&Value::Bool(false)) => {
            changes.push(SchemaChange {
                change_type: ChangeType::ClosedObject,
                path: join(path, "additionalProperties"),
                old_value: o.map(|v| v.to_string()),
                new_value: Some("false".to_string()),
                is_breaking: true,
                description: format!("'{}' no longer accepts additional properties", path),
            });
        }
        _ => {}
    }

    // Named definitions
    for defs_key in ["$defs", "definitions"] {
        if let Some(old_defs) = old.get(defs_key).and_then(Value::as_object) {
            let new_defs = new.get(defs_key).and_then(Value::as_object);
            for (name, old_def) in old_defs {
                let def_path = join(path, &format!("{}.{}", defs_key, name));
                match new_defs.and_then(|d| d.get(name)) {
                    Some(new_def) => walk(old_def, new_def, &def_path, changes),
                    None => changes.push(SchemaChange {
                        change_type: ChangeType::DefinitionRemoved,
                        path: def_path,
                        old_value: Some(old_def.to_string()),
                        new_value: None,
                        is_breaking: true,
                        description: format!("Definition '{}' was removed", name),
                    }),
                }
            }
        }
    }
}

/// Only the breaking subset of `changes`
pub fn breaking(changes: &[SchemaChange]) -> Vec<&SchemaChange> {
    changes.iter().filter(|c| c.is_breaking).collect()
}

// =============================================================================
// Kind compatibility
// =============================================================================

/// Compatibility checker for kind revisions.
///
/// Pure decision function: no side effects, same answer for the same inputs.
pub struct CompatibilityChecker<'e, E: SchemaEngine + ?Sized> {
    engine: &'e E,
}

impl<'e, E: SchemaEngine + ?Sized> CompatibilityChecker<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Check a candidate kind against its published revision.
    ///
    /// Rules are applied in order: name, category, maturity, append-only.
    ///
    /// `old` is `None` when the kind has never been published.
    pub fn check(&self, old: Option<&Kind>, new: &Kind) -> Result<(), CompatError> {
        let Some(old) = old else {
            debug!(kind = new.name(), "no published revision; nothing to compare");
            return Ok(());
        };

        if old.name() != new.name() {
            return Err(CompatError::NameMismatch {
                old: old.name().to_string(),
                new: new.name().to_string(),
            });
        }

        if old.category() != new.category() {
            return Err(CompatError::CategoryChanged {
                kind: new.name().to_string(),
                old: old.category(),
                new: new.category(),
            });
        }

        if new.maturity() < old.maturity() {
            return Err(CompatError::MaturityRegression {
                kind: new.name().to_string(),
                old: old.maturity(),
                new: new.maturity(),
            });
        }

        if !old.maturity().is_append_only() {
            debug!(kind = new.name(), maturity = %old.maturity(), "published below stable; lineage may be rewritten");
            return Ok(());
        }

        match (old.lineage(), new.lineage()) {
            (Some(old_lineage), Some(new_lineage)) => self
                .engine
                .is_append_only(old_lineage, new_lineage)
                .map_err(|violation| CompatError::NonAppendOnlyChange {
                    kind: new.name().to_string(),
                    maturity: old.maturity(),
                    reason: violation.to_string(),
                    changes: violation.changes,
                }),
            _ => Ok(()),
        }
    }
}

/// Check `new` against its published revision `old` with the given engine
pub fn check<E: SchemaEngine + ?Sized>(engine: &E, old: Option<&Kind>, new: &Kind) -> Result<(), CompatError> {
    CompatibilityChecker::new(engine).check(old, new)
}
