//! Schema Lineages
//!
//! A lineage is the ordered, immutable version history of one kind's schema.
//! Lineages are only ever produced by a `SchemaEngine` bind, and are cheap to
//! clone: every clone shares the same frozen schemas, so one bound lineage can
//! be handed to any number of concurrent generators without locking.

pub mod engine;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::checksum::Checksum;
use crate::compat::SchemaChange;
use crate::error::EngineError;
use crate::version::SyntacticVersion;

pub use engine::JsonSchemaEngine;

// =============================================================================
// Schema
// =============================================================================

/// One immutable, versioned member of a lineage
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    version: SyntacticVersion,
    document: Value,
    checksum: Checksum,
}

impl Schema {
    pub(crate) fn new(version: SyntacticVersion, document: Value) -> Self {
        let checksum = Checksum::from_json(&document);
        Self {
            version,
            document,
            checksum,
        }
    }

    pub fn version(&self) -> SyntacticVersion {
        self.version
    }

    /// The JSON Schema document for this version
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Top-level `properties` of the document, if it declares any
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.document.get("properties").and_then(Value::as_object)
    }

    /// Top-level `description` annotation
    pub fn description(&self) -> Option<&str> {
        self.document.get("description").and_then(Value::as_str)
    }
}

// =============================================================================
// Lineage
// =============================================================================

#[derive(Debug)]
struct LineageInner {
    name: String,
    schemas: Vec<Schema>,
    grouped: bool,
}

/// Ordered, acyclic, finite sequence of schemas belonging to one kind.
///
/// Invariant: holds at least one schema, versions strictly increase and each
/// schema's successor is the next entry.
#[derive(Debug, Clone)]
pub struct Lineage {
    inner: Arc<LineageInner>,
}

impl Lineage {
    /// Only engines construct lineages, after validating the version chain.
    pub(crate) fn from_validated(name: String, schemas: Vec<Schema>, grouped: bool) -> Self {
        debug_assert!(!schemas.is_empty());
        Self {
            inner: Arc::new(LineageInner {
                name,
                schemas,
                grouped,
            }),
        }
    }

    /// Lineage name; equals the owning kind's machine name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether top-level fields of each schema are independent schemas
    pub fn is_grouped(&self) -> bool {
        self.inner.grouped
    }

    pub fn schemas(&self) -> &[Schema] {
        &self.inner.schemas
    }

    pub fn len(&self) -> usize {
        self.inner.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.schemas.is_empty()
    }

    /// The first schema, always version 0.0
    pub fn first(&self) -> &Schema {
        &self.inner.schemas[0]
    }

    /// The newest schema
    pub fn latest(&self) -> &Schema {
        &self.inner.schemas[self.inner.schemas.len() - 1]
    }

    /// Look up a schema by version
    pub fn schema(&self, version: SyntacticVersion) -> Option<&Schema> {
        self.inner
            .schemas
            .binary_search_by(|s| s.version.cmp(&version))
            .ok()
            .map(|idx| &self.inner.schemas[idx])
    }

    /// The schema that directly follows `schema`, or `None` for the latest
    pub fn successor(&self, schema: &Schema) -> Option<&Schema> {
        let idx = self
            .inner
            .schemas
            .binary_search_by(|s| s.version.cmp(&schema.version))
            .ok()?;
        self.inner.schemas.get(idx + 1)
    }

    /// All versions in order
    pub fn versions(&self) -> Vec<SyntacticVersion> {
        self.inner.schemas.iter().map(|s| s.version).collect()
    }

    /// Distinct major versions in ascending order
    pub fn majors(&self) -> Vec<u64> {
        let mut majors: Vec<u64> = self.inner.schemas.iter().map(|s| s.version.major()).collect();
        majors.dedup();
        majors
    }

    /// Newest schema within the given major version
    pub fn latest_in_major(&self, major: u64) -> Option<&Schema> {
        self.inner
            .schemas
            .iter()
            .rev()
            .find(|s| s.version.major() == major)
    }

    /// For grouped lineages, the independent member schemas of `version`
    /// in name order. Empty for ungrouped lineages.
    pub fn groups(&self, version: SyntacticVersion) -> Vec<(&str, &Value)> {
        if !self.inner.grouped {
            return Vec::new();
        }
        self.schema(version)
            .and_then(Schema::properties)
            .map(|props| props.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default()
    }

    /// Validate `instance` against schema `version` and deserialize it
    pub fn decode<T, E>(&self, engine: &E, version: SyntacticVersion, instance: &Value) -> Result<T, EngineError>
    where
        T: DeserializeOwned,
        E: SchemaEngine + ?Sized,
    {
        let schema = self
            .schema(version)
            .ok_or(EngineError::NoSuchVersion(version))?;
        let value = engine.decode(schema, instance)?;
        Ok(serde_json::from_value(value)?)
    }
}

// =============================================================================
// Engine contract
// =============================================================================

/// Why a candidate lineage is not an append-only extension of a published one
#[derive(Debug, Clone)]
pub struct AppendOnlyViolation {
    /// The first published version that was altered or removed
    pub version: SyntacticVersion,
    /// Human readable summary
    pub reason: String,
    /// Structural changes detected in the altered version
    pub changes: Vec<SchemaChange>,
}

impl std::fmt::Display for AppendOnlyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)?;
        for change in &self.changes {
            write!(f, "; {}", change.description)?;
        }
        Ok(())
    }
}

/// Narrow contract to the schema description/validation engine.
///
/// Implementations are not required to be thread safe: concurrent callers
/// must hold one engine per thread.
pub trait SchemaEngine {
    /// Validate a version chain of schema documents and freeze it into a lineage
    fn bind(
        &self,
        name: &str,
        schemas: Vec<(SyntacticVersion, Value)>,
        grouped: bool,
    ) -> Result<Lineage, EngineError>;

    /// Whether `new` only appends schemas after `old.latest()`, leaving every
    /// schema already present in `old` structurally untouched
    fn is_append_only(&self, old: &Lineage, new: &Lineage) -> Result<(), AppendOnlyViolation>;

    /// Validate an instance document against one schema of a lineage
    fn decode(&self, schema: &Schema, instance: &Value) -> Result<Value, EngineError>;
}
