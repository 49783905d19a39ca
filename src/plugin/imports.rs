//! Imports a plugin schema may use, and where they live in TypeScript

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

/// Schema modules a plugin's `models.json` may import
pub const PERMITTED_IMPORTS: &[&str] = &["schema/common", "schema/dataquery", "schema/units"];

/// Generated TypeScript module for each permitted import
const TS_IMPORT_MAPPINGS: &[(&str, &str)] = &[
    ("schema/common", "@kindgen/schema/common"),
    ("schema/dataquery", "@kindgen/schema/dataquery"),
    ("schema/units", "@kindgen/schema/units"),
];

pub fn is_permitted(import: &str) -> bool {
    PERMITTED_IMPORTS.contains(&import)
}

/// Comma-separated list for error messages
pub fn permitted_list() -> String {
    PERMITTED_IMPORTS.join(", ")
}

/// TypeScript module path for a permitted import
pub fn ts_module(import: &str) -> Option<&'static str> {
    TS_IMPORT_MAPPINGS
        .iter()
        .find(|(from, _)| *from == import)
        .map(|(_, to)| *to)
}

/// The full import -> TypeScript module mapping
pub fn import_mappings() -> BTreeMap<String, String> {
    TS_IMPORT_MAPPINGS
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

/// Modules named by the external `$ref`s (`module#/pointer`) anywhere in `schema`.
/// Local references (`#/...`) name no module.
pub fn referenced_modules(schema: &Value) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();
    collect_refs(schema, &mut modules);
    modules
}

fn collect_refs(value: &Value, modules: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", Value::String(target)) => {
                        let module = target.split_once('#').map_or(target.as_str(), |(m, _)| m);
                        if !module.is_empty() {
                            modules.insert(module.to_string());
                        }
                    }
                    _ => collect_refs(child, modules),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, modules)),
        _ => {}
    }
}

/// Check that the permitted imports and the TypeScript mapping cover exactly
/// the same modules. Run once at startup.
pub fn verify_import_mappings() -> anyhow::Result<()> {
    let permitted: BTreeSet<&str> = PERMITTED_IMPORTS.iter().copied().collect();
    let mapped: BTreeSet<&str> = TS_IMPORT_MAPPINGS.iter().map(|(from, _)| *from).collect();

    let unmapped: Vec<&str> = permitted.difference(&mapped).copied().collect();
    let unpermitted: Vec<&str> = mapped.difference(&permitted).copied().collect();
    if !unmapped.is_empty() || !unpermitted.is_empty() {
        anyhow::bail!(
            "import mapping out of sync: permitted but unmapped [{}], mapped but not permitted [{}]",
            unmapped.join(", "),
            unpermitted.join(", ")
        );
    }
    Ok(())
}
