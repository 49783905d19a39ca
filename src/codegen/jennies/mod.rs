//! Concrete generators
//!
//! | Jenny | Shape | Output |
//! |---|---|---|
//! | `RustTypesJenny` | one-to-one | `rust/<m>/<m>_types.gen.rs` |
//! | `TsTypesJenny` | one-to-one | `ts/<m>/<m>_types.gen.ts` |
//! | `SchemaVersionsJenny` | one-to-many | `jsonschema/<m>/v<maj>-<min>.json` |
//! | `CrdJenny` | one-to-one | `crd/<plural>.crd.json` |
//! | `RawExtensionsJenny` | one-to-one | `raw/<m>.extensions.json` |
//! | `KindRegistryJenny` | many-to-one | `rust/registry.gen.rs` |
//! | `ReportJenny` | many-to-one | `report/kinds.json` |

pub mod crd;
pub mod raw;
pub mod registry;
pub mod report;
pub mod rust;
pub mod schema_versions;
pub mod typescript;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fs::File;
use super::postprocess::{ensure_trailing_newline, header_comment};
use super::shape::{collect_grouped_types, collect_types, TypeSet};
use super::{Pipeline, Unit};
use crate::kind::{Category, Kind};
use crate::version::SyntacticVersion;

pub use crd::CrdJenny;
pub use raw::RawExtensionsJenny;
pub use registry::KindRegistryJenny;
pub use report::ReportJenny;
pub use rust::RustTypesJenny;
pub use schema_versions::SchemaVersionsJenny;
pub use typescript::TsTypesJenny;

/// Default header prepended to generated source files
pub const DEFAULT_HEADER: &str = "Code generated by kindgen. DO NOT EDIT.";

/// An output target that can be switched on or off in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Rust,
    TypeScript,
    JsonSchema,
    Crd,
    Raw,
    Registry,
    Report,
}

impl Target {
    pub const ALL: [Target; 7] = [
        Target::Rust,
        Target::TypeScript,
        Target::JsonSchema,
        Target::Crd,
        Target::Raw,
        Target::Registry,
        Target::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Rust => "rust",
            Target::TypeScript => "typescript",
            Target::JsonSchema => "jsonschema",
            Target::Crd => "crd",
            Target::Raw => "raw",
            Target::Registry => "registry",
            Target::Report => "report",
        }
    }

    /// Whether this target produces a per-kind file for `category`
    pub fn applies_to(&self, category: Category) -> bool {
        match self {
            Target::Rust | Target::TypeScript | Target::JsonSchema => category != Category::Raw,
            Target::Crd => category == Category::Core,
            Target::Raw => category == Category::Raw,
            Target::Registry | Target::Report => false,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown target '{}'", s))
    }
}

/// What the default pipeline generates
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub targets: Vec<Target>,
    /// Machine names of kinds that are planned but not yet declared
    pub planned: Vec<String>,
    /// Header comment for source files; `None` disables it
    pub header: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            targets: Target::ALL.to_vec(),
            planned: Vec::new(),
            header: Some(DEFAULT_HEADER.to_string()),
        }
    }
}

/// Build the standard kind pipeline for the enabled targets
pub fn default_pipeline(options: &PipelineOptions) -> Pipeline {
    let enabled = |t: Target| options.targets.contains(&t);
    let mut pipeline = Pipeline::new("kinds");

    if enabled(Target::Rust) {
        pipeline = pipeline.append(Unit::one_to_one(RustTypesJenny));
    }
    if enabled(Target::TypeScript) {
        pipeline = pipeline.append(Unit::one_to_one(TsTypesJenny::with_plugin_imports()));
    }
    if enabled(Target::JsonSchema) {
        pipeline = pipeline.append(Unit::one_to_many(SchemaVersionsJenny));
    }
    if enabled(Target::Crd) {
        pipeline = pipeline.append(Unit::one_to_one(CrdJenny));
    }
    if enabled(Target::Raw) {
        pipeline = pipeline.append(Unit::one_to_one(RawExtensionsJenny));
    }
    if enabled(Target::Registry) {
        pipeline = pipeline.append(Unit::many_to_one(KindRegistryJenny));
    }
    if enabled(Target::Report) {
        pipeline = pipeline.append(Unit::many_to_one(ReportJenny::new(
            options.targets.clone(),
            options.planned.clone(),
        )));
    }

    if let Some(header) = &options.header {
        pipeline = pipeline.with_postprocessor(header_comment(header.clone()));
    }
    pipeline.with_postprocessor(ensure_trailing_newline())
}

// =============================================================================
// Shared helpers
// =============================================================================

/// The type set of a kind's current schema, with the version it came from.
/// `None` for raw kinds.
pub(crate) fn current_types(kind: &Kind) -> Option<(SyntacticVersion, TypeSet)> {
    let schema = kind.current_schema()?;
    let types = if kind.common().lineage_is_group {
        collect_grouped_types(schema.document())
    } else {
        collect_types(kind.name(), schema.document())
    };
    Some((schema.version(), types))
}

/// Pretty JSON file with a trailing newline
pub(crate) fn json_file(path: String, value: &Value, owner: &str) -> anyhow::Result<File> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    Ok(File::new(path, data, owner))
}

/// Render a multi-line description as comment lines with `prefix`
pub(crate) fn doc_lines(out: &mut String, indent: &str, prefix: &str, text: &str) {
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            out.push_str(&format!("{}{}\n", indent, prefix));
        } else {
            out.push_str(&format!("{}{} {}\n", indent, prefix, line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_names_round_trip() {
        for target in Target::ALL {
            assert_eq!(target.as_str().parse::<Target>().unwrap(), target);
        }
        assert!("go".parse::<Target>().is_err());
    }

    #[test]
    fn test_default_pipeline_units() {
        let pipeline = default_pipeline(&PipelineOptions::default());
        assert_eq!(
            pipeline.unit_names(),
            vec!["rust-types", "ts-types", "schema-versions", "crd", "raw-extensions", "kind-registry", "report"]
        );

        let only_rust = default_pipeline(&PipelineOptions {
            targets: vec![Target::Rust],
            ..PipelineOptions::default()
        });
        assert_eq!(only_rust.unit_names(), vec!["rust-types"]);
    }

    #[test]
    fn test_target_applicability() {
        assert!(Target::Crd.applies_to(Category::Core));
        assert!(!Target::Crd.applies_to(Category::Custom));
        assert!(Target::Raw.applies_to(Category::Raw));
        assert!(!Target::Rust.applies_to(Category::Raw));
        assert!(Target::TypeScript.applies_to(Category::Composable));
    }
}
