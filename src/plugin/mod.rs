//! Plugin Schema Parser
//!
//! Turns a tree of plugin directories into composable kinds:
//!
//! ```text
//! <plugins>/<dir>/plugin.json    mandatory manifest (id, type, name?)
//! <plugins>/<dir>/models.json    optional schema source
//! ```
//!
//! A directory without a manifest is not a plugin and is skipped. Contract
//! violations (disallowed imports, missing or unexpected slot
//! implementations) are fatal to the plugin that commits them and are
//! collected across the whole tree.

pub mod imports;
pub mod slots;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::bind::bind_decl;
use crate::codegen::names::to_pascal_case;
use crate::error::{PluginError, PluginErrors};
use crate::kind::decl::{ComposableDecl, KindDecl, LineageDecl};
use crate::kind::Kind;
use crate::lineage::SchemaEngine;
use crate::maturity::Maturity;
use crate::version::SyntacticVersion;

pub use slots::{Obligation, PluginType, Slot};

/// Manifest file that marks a directory as a plugin
pub const MANIFEST_FILE: &str = "plugin.json";

/// Optional schema source inside a plugin directory
pub const MODELS_FILE: &str = "models.json";

/// The fields of `plugin.json` this parser cares about; others are ignored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Contents of `models.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelsSource {
    #[serde(default)]
    pub imports: Vec<String>,
    /// Slot name -> implementation
    #[serde(default)]
    pub composable_kinds: BTreeMap<String, SlotImplementation>,
}

/// One slot implementation declared by a plugin
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlotImplementation {
    pub maturity: Maturity,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub current_version: Option<SyntacticVersion>,
    pub lineage: LineageDecl,
}

/// A successfully parsed plugin and the kinds it declares
#[derive(Debug, Clone)]
pub struct ParsedPlugin {
    pub dir: PathBuf,
    pub manifest: PluginManifest,
    /// One composable kind per implemented slot, in slot name order
    pub kinds: Vec<Kind>,
}

#[derive(Debug)]
pub enum PluginOutcome {
    Plugin(ParsedPlugin),
    /// No manifest; the directory is something else
    NotAPlugin,
}

/// Name of the composable kind a plugin declares for `slot`
pub fn composable_name(plugin_id: &str, slot: &str) -> String {
    format!("{}{}", to_pascal_case(plugin_id), slot)
}

/// Check a schema source against the plugin contract and turn it into
/// composable declarations
pub fn composable_decls(manifest: &PluginManifest, source: ModelsSource) -> Result<Vec<ComposableDecl>, PluginError> {
    for import in &source.imports {
        if !imports::is_permitted(import) {
            return Err(PluginError::DisallowedImport {
                plugin: manifest.id.clone(),
                import: import.clone(),
                permitted: imports::permitted_list(),
            });
        }
    }

    for implementation in source.composable_kinds.values() {
        for schema in &implementation.lineage.schemas {
            if let Some(import) = imports::referenced_modules(&schema.schema)
                .into_iter()
                .find(|module| !imports::is_permitted(module))
            {
                return Err(PluginError::DisallowedImport {
                    plugin: manifest.id.clone(),
                    import,
                    permitted: imports::permitted_list(),
                });
            }
        }
    }

    for slot_name in source.composable_kinds.keys() {
        let slot = Slot::lookup(slot_name).ok_or_else(|| PluginError::UnknownSlot {
            plugin: manifest.id.clone(),
            slot: slot_name.clone(),
        })?;
        if slot.obligation(manifest.plugin_type) == Obligation::NotAccepted {
            return Err(PluginError::ImplementationNotAllowed {
                plugin: manifest.id.clone(),
                slot: slot_name.clone(),
                plugin_type: manifest.plugin_type.to_string(),
            });
        }
    }

    for slot in Slot::all() {
        if slot.obligation(manifest.plugin_type) == Obligation::Required
            && !source.composable_kinds.contains_key(slot.name())
        {
            return Err(PluginError::MissingRequiredImplementation {
                plugin: manifest.id.clone(),
                slot: slot.name().to_string(),
                plugin_type: manifest.plugin_type.to_string(),
            });
        }
    }

    Ok(source
        .composable_kinds
        .into_iter()
        .map(|(slot, implementation)| ComposableDecl {
            name: composable_name(&manifest.id, &slot),
            plural_name: None,
            maturity: implementation.maturity,
            description: implementation.description,
            current_version: implementation.current_version,
            schema_interface: slot,
            lineage: implementation.lineage,
        })
        .collect())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, PluginError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PluginError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Read a plugin manifest; `None` when there is none
pub fn read_manifest(dir: &Path) -> Result<Option<PluginManifest>, PluginError> {
    let path = dir.join(MANIFEST_FILE);
    let Some(bytes) = read_optional(&path)? else {
        return Ok(None);
    };

    let manifest: PluginManifest = serde_json::from_slice(&bytes).map_err(|e| PluginError::InvalidManifest {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if manifest.id.trim().is_empty() {
        return Err(PluginError::InvalidManifest {
            path: path.display().to_string(),
            reason: "empty plugin id".to_string(),
        });
    }
    Ok(Some(manifest))
}

/// Parse one plugin directory
pub fn parse_plugin<E: SchemaEngine + ?Sized>(engine: &E, dir: &Path) -> Result<PluginOutcome, PluginError> {
    let Some(manifest) = read_manifest(dir)? else {
        return Ok(PluginOutcome::NotAPlugin);
    };

    let models_path = dir.join(MODELS_FILE);
    let kinds = match read_optional(&models_path)? {
        None => Vec::new(),
        Some(bytes) => {
            let source: ModelsSource = serde_json::from_slice(&bytes).map_err(|e| PluginError::InvalidSource {
                plugin: manifest.id.clone(),
                reason: e.to_string(),
            })?;

            composable_decls(&manifest, source)?
                .into_iter()
                .map(|decl| {
                    bind_decl(engine, KindDecl::Composable(decl)).map_err(|source| PluginError::Kind {
                        plugin: manifest.id.clone(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    debug!(plugin = %manifest.id, kinds = kinds.len(), "parsed plugin");
    Ok(PluginOutcome::Plugin(ParsedPlugin {
        dir: dir.to_path_buf(),
        manifest,
        kinds,
    }))
}

/// Parse every plugin directory directly under `root`.
///
/// Returns the plugins that parsed cleanly and every error from the ones
/// that did not. A missing root holds no plugins.
pub fn parse_all<E: SchemaEngine + ?Sized>(root: &Path, engine: &E) -> (Vec<ParsedPlugin>, PluginErrors) {
    let mut plugins = Vec::new();
    let mut errors = PluginErrors::new();

    if !root.exists() {
        debug!(root = %root.display(), "no plugin tree");
        return (plugins, errors);
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                errors.push(PluginError::Io {
                    path,
                    source: e.into(),
                });
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        match parse_plugin(engine, entry.path()) {
            Ok(PluginOutcome::Plugin(plugin)) => plugins.push(plugin),
            Ok(PluginOutcome::NotAPlugin) => {
                debug!(dir = %entry.path().display(), "not a plugin, skipping");
            }
            Err(e) => {
                warn!(plugin = e.plugin(), error = %e, "plugin rejected");
                errors.push(e);
            }
        }
    }

    info!(plugins = plugins.len(), errors = errors.len(), "parsed plugin tree");
    (plugins, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Category;
    use crate::lineage::JsonSchemaEngine;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn write_plugin(root: &Path, dir: &str, manifest: Value, models: Option<Value>) {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        if let Some(models) = models {
            fs::write(path.join(MODELS_FILE), models.to_string()).unwrap();
        }
    }

    fn panel_models() -> Value {
        json!({
            "imports": ["schema/common"],
            "composableKinds": {
                "PanelCfg": {
                    "maturity": "committed",
                    "lineage": {"schemas": [{"version": [0, 0], "schema": {
                        "type": "object",
                        "properties": {
                            "Options": {"type": "object", "properties": {"legend": {"type": "boolean"}}}
                        }
                    }}]}
                }
            }
        })
    }

    #[test]
    fn test_panel_plugin_yields_grouped_composable() {
        let dir = tempdir().unwrap();
        write_plugin(
            dir.path(),
            "piechart",
            json!({"id": "piechart", "type": "panel", "info": {"version": "1.0"}}),
            Some(panel_models()),
        );

        let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(plugins.len(), 1);

        let kind = &plugins[0].kinds[0];
        assert_eq!(kind.name(), "PiechartPanelCfg");
        assert_eq!(kind.category(), Category::Composable);
        assert!(kind.lineage().unwrap().is_grouped());
    }

    #[test]
    fn test_missing_manifest_is_not_a_plugin() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        assert!(matches!(
            parse_plugin(&JsonSchemaEngine::new(), &dir.path().join("docs")).unwrap(),
            PluginOutcome::NotAPlugin
        ));
        let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
        assert!(plugins.is_empty() && errors.is_empty());
    }

    #[test]
    fn test_models_source_is_optional() {
        let dir = tempdir().unwrap();
        write_plugin(dir.path(), "renderer", json!({"id": "image-renderer", "type": "renderer"}), None);
        let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
        assert!(errors.is_empty());
        assert!(plugins[0].kinds.is_empty());
    }

    #[test]
    fn test_contract_violations() {
        let manifest = |t: &str| PluginManifest {
            id: "demo".into(),
            plugin_type: t.parse().unwrap(),
            name: None,
        };
        let source = |value: Value| -> ModelsSource { serde_json::from_value(value).unwrap() };

        let err = composable_decls(&manifest("panel"), source(json!({"imports": ["schema/secret"]}))).unwrap_err();
        assert!(matches!(err, PluginError::DisallowedImport { ref import, .. } if import == "schema/secret"));
        assert!(err.to_string().contains("schema/common"));

        let err = composable_decls(&manifest("panel"), source(json!({}))).unwrap_err();
        assert!(matches!(err, PluginError::MissingRequiredImplementation { ref slot, .. } if slot == "PanelCfg"));

        let models = panel_models();
        let err = composable_decls(&manifest("datasource"), source(models)).unwrap_err();
        assert!(matches!(err, PluginError::ImplementationNotAllowed { ref slot, .. } if slot == "PanelCfg"));

        let err = composable_decls(&manifest("app"), source(json!({"composableKinds": {"Nope": {
            "maturity": "committed",
            "lineage": {"schemas": []}
        }}})))
        .unwrap_err();
        assert!(matches!(err, PluginError::UnknownSlot { .. }));
    }

    #[test]
    fn test_referenced_modules_must_be_permitted() {
        let manifest = PluginManifest {
            id: "vault".into(),
            plugin_type: PluginType::Panel,
            name: None,
        };
        let source: ModelsSource = serde_json::from_value(json!({
            "imports": [],
            "composableKinds": {"PanelCfg": {
                "maturity": "committed",
                "lineage": {"schemas": [{"version": [0, 0], "schema": {
                    "type": "object",
                    "properties": {"Options": {
                        "type": "object",
                        "properties": {"key": {"$ref": "schema/secrets#/definitions/Key"}}
                    }}
                }}]}
            }}
        }))
        .unwrap();

        let err = composable_decls(&manifest, source).unwrap_err();
        assert!(matches!(err, PluginError::DisallowedImport { ref import, .. } if import == "schema/secrets"));
    }

    #[test]
    fn test_errors_are_collected_per_plugin() {
        let dir = tempdir().unwrap();
        write_plugin(dir.path(), "a", json!({"id": "a", "type": "panel"}), Some(json!({})));
        write_plugin(dir.path(), "b", json!({"id": "b", "type": "panel"}), Some(panel_models()));
        write_plugin(dir.path(), "c", json!({"id": "c"}), None);

        let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].manifest.id, "b");
        let failed: Vec<&str> = errors.iter().map(PluginError::plugin).collect();
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0], "a");
        assert!(failed[1].ends_with(MANIFEST_FILE));
    }

    #[test]
    fn test_optional_slot_may_be_absent() {
        let manifest = PluginManifest {
            id: "prometheus".into(),
            plugin_type: PluginType::Datasource,
            name: None,
        };
        let source: ModelsSource = serde_json::from_value(json!({"composableKinds": {"DataQuery": {
            "maturity": "committed",
            "lineage": {"schemas": [{"version": [0, 0], "schema": {"type": "object"}}]}
        }}}))
        .unwrap();
        let decls = composable_decls(&manifest, source).unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "PrometheusDataQuery");
    }
}
