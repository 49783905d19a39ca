//! JSON Schema backed lineage engine
//!
//! Binds version chains of JSON Schema documents into lineages, answers
//! append-only questions and validates instances. Compiled validators are
//! cached per engine by document checksum, which keeps the engine `!Sync`:
//! parallel loaders build one engine per worker.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tracing::{debug, trace};

use super::{AppendOnlyViolation, Lineage, Schema, SchemaEngine};
use crate::checksum::Checksum;
use crate::compat::{breaking, detect_changes, structurally_equal};
use crate::error::EngineError;
use crate::version::SyntacticVersion;

/// Schema engine evaluating lineages as JSON Schema (draft 7) documents
pub struct JsonSchemaEngine {
    draft: Draft,
    compiled: RefCell<HashMap<Checksum, Rc<JSONSchema>>>,
}

impl Default for JsonSchemaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonSchemaEngine {
    pub fn new() -> Self {
        Self::with_draft(Draft::Draft7)
    }

    pub fn with_draft(draft: Draft) -> Self {
        Self {
            draft,
            compiled: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct documents compiled so far
    pub fn cached(&self) -> usize {
        self.compiled.borrow().len()
    }

    fn compile(
        &self,
        version: SyntacticVersion,
        checksum: &Checksum,
        document: &Value,
    ) -> Result<Rc<JSONSchema>, EngineError> {
        if let Some(hit) = self.compiled.borrow().get(checksum) {
            return Ok(Rc::clone(hit));
        }

        trace!(%version, checksum = checksum.short(), "compiling schema");
        let compiled = JSONSchema::options()
            .with_draft(self.draft)
            .compile(document)
            .map_err(|e| EngineError::Compile {
                version,
                reason: e.to_string(),
            })?;
        let compiled = Rc::new(compiled);
        self.compiled
            .borrow_mut()
            .insert(checksum.clone(), Rc::clone(&compiled));
        Ok(compiled)
    }

    fn check_group(schema: &Schema) -> Result<(), EngineError> {
        let props = schema.properties().ok_or_else(|| EngineError::BadGroup {
            version: schema.version(),
            reason: "no top-level properties".to_string(),
        })?;
        for (name, member) in props {
            let is_object = member.get("type").and_then(Value::as_str) == Some("object")
                || member.get("properties").is_some()
                || member.get("$ref").is_some();
            if !is_object {
                return Err(EngineError::BadGroup {
                    version: schema.version(),
                    reason: format!("member '{}' is not an object schema", name),
                });
            }
        }
        Ok(())
    }
}

impl SchemaEngine for JsonSchemaEngine {
    fn bind(
        &self,
        name: &str,
        schemas: Vec<(SyntacticVersion, Value)>,
        grouped: bool,
    ) -> Result<Lineage, EngineError> {
        let Some((first, _)) = schemas.first() else {
            return Err(EngineError::Empty);
        };
        if *first != SyntacticVersion::ZERO {
            return Err(EngineError::BadFirstVersion(*first));
        }

        let mut bound: Vec<Schema> = Vec::with_capacity(schemas.len());
        for (version, document) in schemas {
            if let Some(prev) = bound.last() {
                if !prev.version().admits_successor(&version) {
                    return Err(EngineError::BadSuccessor {
                        prev: prev.version(),
                        next: version,
                    });
                }
            }

            let schema = Schema::new(version, document);
            self.compile(version, schema.checksum(), schema.document())?;

            if grouped {
                Self::check_group(&schema)?;
            }

            if let Some(prev) = bound.last() {
                if prev.version().major() == version.major() {
                    let changes = detect_changes(prev.document(), schema.document());
                    let breaking = breaking(&changes);
                    if !breaking.is_empty() {
                        return Err(EngineError::BreakingMinor {
                            prev: prev.version(),
                            version,
                            changes: breaking
                                .iter()
                                .map(|c| c.description.as_str())
                                .collect::<Vec<_>>()
                                .join("; "),
                        });
                    }
                }
            }

            bound.push(schema);
        }

        debug!(lineage = name, schemas = bound.len(), grouped, "bound lineage");
        Ok(Lineage::from_validated(name.to_string(), bound, grouped))
    }

    fn is_append_only(&self, old: &Lineage, new: &Lineage) -> Result<(), AppendOnlyViolation> {
        for (idx, published) in old.schemas().iter().enumerate() {
            let Some(candidate) = new.schemas().get(idx) else {
                return Err(AppendOnlyViolation {
                    version: published.version(),
                    reason: format!("published schema {} was removed", published.version()),
                    changes: Vec::new(),
                });
            };

            if candidate.version() != published.version() {
                return Err(AppendOnlyViolation {
                    version: published.version(),
                    reason: format!(
                        "published schema {} was renumbered to {}",
                        published.version(),
                        candidate.version()
                    ),
                    changes: Vec::new(),
                });
            }

            if candidate.checksum() != published.checksum()
                && !structurally_equal(published.document(), candidate.document())
            {
                return Err(AppendOnlyViolation {
                    version: published.version(),
                    reason: format!("published schema {} was modified", published.version()),
                    changes: detect_changes(published.document(), candidate.document()),
                });
            }
        }

        if old.is_grouped() != new.is_grouped() {
            return Err(AppendOnlyViolation {
                version: old.latest().version(),
                reason: "lineage grouping changed".to_string(),
                changes: Vec::new(),
            });
        }

        Ok(())
    }

    fn decode(&self, schema: &Schema, instance: &Value) -> Result<Value, EngineError> {
        let compiled = self.compile(schema.version(), schema.checksum(), schema.document())?;
        let reasons: Vec<String> = match compiled.validate(instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let at = e.instance_path.to_string();
                    if at.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", at, e)
                    }
                })
                .collect(),
        };

        if reasons.is_empty() {
            Ok(instance.clone())
        } else {
            Err(EngineError::Invalid {
                version: schema.version(),
                reasons: reasons.join("; "),
            })
        }
    }
}
