//! TypeScript type generation

use std::collections::BTreeMap;

use crate::codegen::fs::File;
use crate::codegen::names::{to_camel_case, ts_property_name, ts_type_name, UniqueNames};
use crate::codegen::shape::{Field, Scalar, TypeDef, TypeSet, TypeShape};
use crate::codegen::{Jenny, OneToOne};
use crate::kind::Kind;
use crate::plugin::imports::import_mappings;

use super::{current_types, doc_lines};

/// `ts/<machine>/<machine>_types.gen.ts` for every kind with a lineage.
///
/// External schema references are imported from the module the import
/// mapping assigns them, or from the schema module path itself when unmapped.
pub struct TsTypesJenny {
    mappings: BTreeMap<String, String>,
}

impl TsTypesJenny {
    pub fn new(mappings: BTreeMap<String, String>) -> Self {
        Self { mappings }
    }

    /// Use the plugin import mapping
    pub fn with_plugin_imports() -> Self {
        Self::new(import_mappings())
    }
}

impl Jenny for TsTypesJenny {
    fn name(&self) -> &str {
        "ts-types"
    }
}

impl OneToOne for TsTypesJenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>> {
        let Some((version, types)) = current_types(kind) else {
            return Ok(None);
        };

        let aliases = import_aliases(&types);
        let mut output = String::new();

        for (import, alias) in &aliases {
            let module = self.mappings.get(import).map(String::as_str).unwrap_or(import);
            output.push_str(&format!("import * as {} from '{}';\n", alias, module));
        }
        if !aliases.is_empty() {
            output.push('\n');
        }

        output.push_str(&format!(
            "export const schemaVersion = '{}.{}';\n",
            version.major(),
            version.minor()
        ));

        let renderer = Renderer { aliases: &aliases };
        for def in &types.defs {
            output.push('\n');
            renderer.emit(&mut output, def);
        }

        let m = kind.machine_name();
        Ok(Some(File::new(format!("ts/{m}/{m}_types.gen.ts"), output, self.name())))
    }
}

/// Namespace alias per imported module, e.g. `schema/units` -> `units`
fn import_aliases(types: &TypeSet) -> BTreeMap<String, String> {
    let mut taken = UniqueNames::new();
    types
        .imports
        .iter()
        .map(|import| {
            let last = import.rsplit('/').next().unwrap_or(import);
            let mut base = to_camel_case(last);
            if base.is_empty() {
                base = "imported".to_string();
            }
            (import.clone(), taken.claim(&base))
        })
        .collect()
}

struct Renderer<'a> {
    aliases: &'a BTreeMap<String, String>,
}

impl Renderer<'_> {
    fn emit(&self, output: &mut String, def: &TypeDef) {
        match def {
            TypeDef::Struct {
                name,
                description,
                fields,
            } => {
                if let Some(desc) = description {
                    jsdoc(output, "", desc);
                }
                output.push_str(&format!("export interface {} {{\n", ts_type_name(name)));
                for field in fields {
                    self.emit_field(output, field);
                }
                output.push_str("}\n");
            }
            TypeDef::Enum {
                name,
                description,
                variants,
            } => {
                if let Some(desc) = description {
                    jsdoc(output, "", desc);
                }
                let union: Vec<String> = variants.iter().map(|v| quote(v)).collect();
                output.push_str(&format!("export type {} = ({});\n", ts_type_name(name), union.join(" | ")));
            }
            TypeDef::Alias {
                name,
                description,
                target,
            } => {
                if let Some(desc) = description {
                    jsdoc(output, "", desc);
                }
                output.push_str(&format!("export type {} = {};\n", ts_type_name(name), self.shape(target)));
            }
        }
    }

    fn emit_field(&self, output: &mut String, field: &Field) {
        if let Some(desc) = &field.description {
            jsdoc(output, "  ", desc);
        }
        let optional = if field.required { "" } else { "?" };
        output.push_str(&format!(
            "  {}{}: {};\n",
            ts_property_name(&field.json_name),
            optional,
            self.shape(&field.shape)
        ));
    }

    fn shape(&self, shape: &TypeShape) -> String {
        match shape {
            TypeShape::Scalar(Scalar::String) => "string".to_string(),
            TypeShape::Scalar(Scalar::Integer) | TypeShape::Scalar(Scalar::Number) => "number".to_string(),
            TypeShape::Scalar(Scalar::Boolean) => "boolean".to_string(),
            TypeShape::Scalar(Scalar::Null) => "null".to_string(),
            TypeShape::Array(inner) => format!("Array<{}>", self.shape(inner)),
            TypeShape::Map(inner) => format!("Record<string, {}>", self.shape(inner)),
            TypeShape::Nullable(inner) => format!("({} | null)", self.shape(inner)),
            TypeShape::Named(name) => ts_type_name(name),
            TypeShape::External { import, name } => match self.aliases.get(import) {
                Some(alias) => format!("{}.{}", alias, name),
                None => "unknown".to_string(),
            },
            TypeShape::Any => "unknown".to_string(),
        }
    }
}

fn jsdoc(output: &mut String, indent: &str, text: &str) {
    output.push_str(&format!("{}/**\n", indent));
    doc_lines(output, indent, " *", &text.replace("*/", "*\\/"));
    output.push_str(&format!("{} */\n", indent));
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind_kind;
    use crate::lineage::JsonSchemaEngine;
    use serde_json::json;

    fn bind(doc: serde_json::Value, origin: &str) -> Kind {
        bind_kind(&JsonSchemaEngine::new(), doc.to_string().as_bytes(), origin).unwrap()
    }

    #[test]
    fn test_interfaces_and_unions() {
        let kind = bind(
            json!({
                "name": "Playlist",
                "maturity": "committed",
                "crd": {"group": "playlist.example.io", "scope": "Namespaced"},
                "lineage": {"schemas": [{"version": [0, 0], "schema": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": {"type": "string", "description": "Display name"},
                        "interval": {"type": "string", "enum": ["1m", "5m"]},
                        "max-items": {"type": "integer"}
                    }
                }}]}
            }),
            "playlist",
        );

        let file = TsTypesJenny::with_plugin_imports().generate(&kind).unwrap().unwrap();
        assert_eq!(file.path, "ts/playlist/playlist_types.gen.ts");

        let text = file.text();
        assert!(text.starts_with("export const schemaVersion = '0.0';\n"));
        assert!(text.contains("export interface Playlist {\n"));
        assert!(text.contains("  interval?: PlaylistInterval;\n"));
        assert!(text.contains("  'max-items'?: number;\n"));
        assert!(text.contains("  /**\n   * Display name\n   */\n  name: string;\n"));
        assert!(text.contains("export type PlaylistInterval = ('1m' | '5m');\n"));
    }

    #[test]
    fn test_grouped_composable_with_mapped_import() {
        let kind = bind(
            json!({
                "name": "PiechartPanelCfg",
                "maturity": "committed",
                "schemaInterface": "PanelCfg",
                "lineage": {"schemas": [{"version": [0, 0], "schema": {
                    "type": "object",
                    "properties": {
                        "Options": {
                            "type": "object",
                            "properties": {"unit": {"$ref": "schema/units#/definitions/Unit"}}
                        },
                        "FieldConfig": {
                            "type": "object",
                            "properties": {"hidden": {"type": "boolean"}}
                        }
                    }
                }}]}
            }),
            "piechartpanelcfg",
        );

        let text = TsTypesJenny::with_plugin_imports().generate(&kind).unwrap().unwrap().text().to_string();
        assert!(text.starts_with("import * as units from '@kindgen/schema/units';\n\n"));
        assert!(text.contains("export interface Options {\n  unit?: units.Unit;\n}"));
        assert!(text.contains("export interface FieldConfig {\n  hidden?: boolean;\n}"));
        assert!(!text.contains("export interface PiechartPanelCfg"));
    }
}
