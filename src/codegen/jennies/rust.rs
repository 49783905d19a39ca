//! Rust type generation
//!
//! Renders the current schema of a kind as serde-ready Rust types.

use std::fmt::Write as _;

use crate::codegen::fs::File;
use crate::codegen::names::{rust_field_name, rust_variant_name, to_snake_case, UniqueNames};
use crate::codegen::shape::{Field, Scalar, TypeDef, TypeSet, TypeShape};
use crate::codegen::{Jenny, OneToOne};
use crate::kind::Kind;

use super::{current_types, doc_lines};

/// `rust/<machine>/<machine>_types.gen.rs` for every kind with a lineage
pub struct RustTypesJenny;

impl Jenny for RustTypesJenny {
    fn name(&self) -> &str {
        "rust-types"
    }
}

impl OneToOne for RustTypesJenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>> {
        let Some((version, types)) = current_types(kind) else {
            return Ok(None);
        };

        let mut output = String::new();
        output.push_str(&format!("//! Types for kind `{}`, schema version {}\n\n", kind.name(), version));
        output.push_str("use serde::{Deserialize, Serialize};\n\n");
        output.push_str("/// Schema version these types were generated from\n");
        output.push_str(&format!(
            "pub const SCHEMA_VERSION: (u64, u64) = ({}, {});\n",
            version.major(),
            version.minor()
        ));

        output.push_str(&render_types(&types));

        let m = kind.machine_name();
        Ok(Some(File::new(format!("rust/{m}/{m}_types.gen.rs"), output, self.name())))
    }
}

/// Render every definition of a type set
pub fn render_types(types: &TypeSet) -> String {
    let mut output = String::new();
    for def in &types.defs {
        output.push('\n');
        match def {
            TypeDef::Struct {
                name,
                description,
                fields,
            } => emit_struct(&mut output, name, description.as_deref(), fields),
            TypeDef::Enum {
                name,
                description,
                variants,
            } => emit_enum(&mut output, name, description.as_deref(), variants),
            TypeDef::Alias {
                name,
                description,
                target,
            } => {
                if let Some(desc) = description {
                    doc_lines(&mut output, "", "///", desc);
                }
                output.push_str(&format!("pub type {} = {};\n", name, render_shape(target)));
            }
        }
    }
    output
}

fn emit_struct(output: &mut String, name: &str, description: Option<&str>, fields: &[Field]) {
    if let Some(desc) = description {
        doc_lines(output, "", "///", desc);
    }
    output.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
    output.push_str(&format!("pub struct {} {{\n", name));

    let mut idents = UniqueNames::new();
    for field in fields {
        if let Some(desc) = &field.description {
            doc_lines(output, "    ", "///", desc);
        }

        let (base, mut renamed) = rust_field_name(&field.json_name);
        let ident = idents.claim(&base);
        renamed |= ident != base;

        let mut attrs = Vec::new();
        if renamed {
            attrs.push(format!("rename = \"{}\"", escape(&field.json_name)));
        }
        let ty = if field.required {
            render_shape(&field.shape)
        } else {
            attrs.push("default".to_string());
            attrs.push("skip_serializing_if = \"Option::is_none\"".to_string());
            match &field.shape {
                // Optional and nullable collapse to a single Option
                TypeShape::Nullable(inner) => format!("Option<{}>", render_shape(inner)),
                shape => format!("Option<{}>", render_shape(shape)),
            }
        };
        if !attrs.is_empty() {
            let _ = writeln!(output, "    #[serde({})]", attrs.join(", "));
        }
        let _ = writeln!(output, "    pub {}: {},", ident, ty);
    }

    output.push_str("}\n");
}

fn emit_enum(output: &mut String, name: &str, description: Option<&str>, variants: &[String]) {
    if let Some(desc) = description {
        doc_lines(output, "", "///", desc);
    }
    output.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]\n");
    output.push_str(&format!("pub enum {} {{\n", name));

    let mut taken = UniqueNames::new();
    for value in variants {
        let variant = taken.claim(&rust_variant_name(value));
        if variant != *value {
            output.push_str(&format!("    #[serde(rename = \"{}\")]\n", escape(value)));
        }
        output.push_str(&format!("    {},\n", variant));
    }

    output.push_str("}\n");
}

/// Rust spelling of a type reference
pub fn render_shape(shape: &TypeShape) -> String {
    match shape {
        TypeShape::Scalar(Scalar::String) => "String".to_string(),
        TypeShape::Scalar(Scalar::Integer) => "i64".to_string(),
        TypeShape::Scalar(Scalar::Number) => "f64".to_string(),
        TypeShape::Scalar(Scalar::Boolean) => "bool".to_string(),
        TypeShape::Scalar(Scalar::Null) => "()".to_string(),
        TypeShape::Array(inner) => format!("Vec<{}>", render_shape(inner)),
        TypeShape::Map(inner) => format!("std::collections::BTreeMap<String, {}>", render_shape(inner)),
        TypeShape::Nullable(inner) => format!("Option<{}>", render_shape(inner)),
        TypeShape::Named(name) => name.clone(),
        TypeShape::External { import, name } => format!("crate::{}::{}", module_path(import), name),
        TypeShape::Any => "serde_json::Value".to_string(),
    }
}

/// `schema/common` -> `schema::common`
fn module_path(import: &str) -> String {
    import
        .split('/')
        .filter(|s| !s.is_empty())
        .map(to_snake_case)
        .collect::<Vec<_>>()
        .join("::")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
