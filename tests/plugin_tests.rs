//! Plugin Tree Tests for kindgen

use std::fs;
use std::path::Path;

use kindgen::bind::check_unique_names;
use kindgen::error::{KindError, PluginError};
use kindgen::plugin::{parse_all, MANIFEST_FILE, MODELS_FILE};
use kindgen::{Category, JsonSchemaEngine};
use serde_json::{json, Value};
use tempfile::tempdir;

fn write_plugin(root: &Path, dir: &str, manifest: Value, models: Value) {
    let path = root.join(dir);
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join(MANIFEST_FILE), manifest.to_string()).unwrap();
    fs::write(path.join(MODELS_FILE), models.to_string()).unwrap();
}

fn lineage(field: &str) -> Value {
    json!({"schemas": [{"version": [0, 0], "schema": {
        "type": "object",
        "properties": {field: {"type": "object"}}
    }}]})
}

#[test]
fn test_broken_plugins_do_not_hide_healthy_ones() {
    let dir = tempdir().unwrap();
    write_plugin(
        dir.path(),
        "bad-import",
        json!({"id": "bad-import", "type": "panel"}),
        json!({
            "imports": ["schema/secrets"],
            "composableKinds": {"PanelCfg": {"maturity": "committed", "lineage": lineage("Options")}}
        }),
    );
    write_plugin(
        dir.path(),
        "loki",
        json!({"id": "loki", "type": "datasource"}),
        json!({
            "composableKinds": {"DataSourceCfg": {"maturity": "committed", "lineage": lineage("Options")}}
        }),
    );
    write_plugin(
        dir.path(),
        "table",
        json!({"id": "table", "type": "panel"}),
        json!({
            "imports": ["schema/units"],
            "composableKinds": {"PanelCfg": {"maturity": "synchronized", "lineage": lineage("Options")}}
        }),
    );

    let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());

    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].manifest.id, "table");
    assert_eq!(plugins[0].kinds[0].name(), "TablePanelCfg");
    assert_eq!(plugins[0].kinds[0].category(), Category::Composable);

    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(
        e,
        PluginError::DisallowedImport { import, .. } if import == "schema/secrets"
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        PluginError::MissingRequiredImplementation { slot, .. } if slot == "DataQuery"
    )));
}

#[test]
fn test_slot_not_accepted_by_plugin_type() {
    let dir = tempdir().unwrap();
    write_plugin(
        dir.path(),
        "clock",
        json!({"id": "clock", "type": "panel"}),
        json!({
            "composableKinds": {
                "PanelCfg": {"maturity": "committed", "lineage": lineage("Options")},
                "DataQuery": {"maturity": "committed", "lineage": lineage("expr")}
            }
        }),
    );

    let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
    assert!(plugins.is_empty());
    assert!(matches!(
        errors.iter().next(),
        Some(PluginError::ImplementationNotAllowed { .. })
    ));
}

#[test]
fn test_undeclared_module_reference_is_rejected() {
    let dir = tempdir().unwrap();
    write_plugin(
        dir.path(),
        "vault",
        json!({"id": "vault", "type": "panel"}),
        json!({
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
        }),
    );

    let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
    assert!(plugins.is_empty());
    assert!(matches!(
        errors.iter().next(),
        Some(PluginError::DisallowedImport { import, .. }) if import == "schema/secrets"
    ));
}

#[test]
fn test_plugins_with_colliding_machine_names() {
    let dir = tempdir().unwrap();
    for id in ["pie-chart", "piechart"] {
        write_plugin(
            dir.path(),
            id,
            json!({"id": id, "type": "panel"}),
            json!({"composableKinds": {"PanelCfg": {"maturity": "committed", "lineage": lineage("Options")}}}),
        );
    }

    let (plugins, errors) = parse_all(dir.path(), &JsonSchemaEngine::new());
    assert!(errors.is_empty());
    let kinds: Vec<_> = plugins.into_iter().flat_map(|p| p.kinds).collect();
    assert_eq!(kinds.len(), 2);

    let duplicates = check_unique_names(&kinds).unwrap_err();
    assert!(duplicates.iter().any(|e| matches!(
        e,
        KindError::DuplicateName { value, .. } if value == "piechartpanelcfg"
    )));
}
