//! One JSON Schema file per lineage version

use crate::codegen::fs::File;
use crate::codegen::{Jenny, OneToMany};
use crate::kind::Kind;

use super::json_file;

/// `jsonschema/<machine>/v<maj>-<min>.json` for every schema of a lineage
pub struct SchemaVersionsJenny;

impl Jenny for SchemaVersionsJenny {
    fn name(&self) -> &str {
        "schema-versions"
    }
}

impl OneToMany for SchemaVersionsJenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Vec<File>> {
        let Some(lineage) = kind.lineage() else {
            return Ok(Vec::new());
        };

        lineage
            .schemas()
            .iter()
            .map(|schema| {
                let path = format!(
                    "jsonschema/{}/{}.json",
                    kind.machine_name(),
                    schema.version().file_stem()
                );
                json_file(path, schema.document(), self.name())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind_kind;
    use crate::lineage::JsonSchemaEngine;
    use serde_json::{json, Value};

    #[test]
    fn test_one_file_per_version() {
        let doc = json!({
            "name": "Widget",
            "maturity": "committed",
            "group": "ext.example.io",
            "lineage": {"schemas": [
                {"version": [0, 0], "schema": {"type": "object", "properties": {"a": {"type": "string"}}}},
                {"version": [0, 1], "schema": {"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "integer"}}}},
                {"version": [1, 0], "schema": {"type": "object", "properties": {"c": {"type": "string"}}}}
            ]}
        });
        let kind = bind_kind(&JsonSchemaEngine::new(), doc.to_string().as_bytes(), "widget").unwrap();

        let files = SchemaVersionsJenny.generate(&kind).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["jsonschema/widget/v0-0.json", "jsonschema/widget/v0-1.json", "jsonschema/widget/v1-0.json"]
        );

        let parsed: Value = serde_json::from_slice(&files[2].data).unwrap();
        assert_eq!(parsed["properties"]["c"]["type"], "string");
        assert!(files[2].data.ends_with(b"}\n"));
    }
}
