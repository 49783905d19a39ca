//! Language-agnostic type model
//!
//! Projects a JSON Schema document onto a small set of named type
//! definitions (structs, string enums, aliases) that language jennies render.
//! Inline objects and enums are hoisted into their own named definitions, so
//! renderers never read raw schema JSON.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::names::{rust_type_name, to_pascal_case, UniqueNames};

// =============================================================================
// Shapes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

/// A type reference as it appears in a field or alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Scalar(Scalar),
    Array(Box<TypeShape>),
    /// String-keyed map
    Map(Box<TypeShape>),
    /// `T | null`
    Nullable(Box<TypeShape>),
    /// A definition in the same type set
    Named(String),
    /// A type provided by an imported module
    External { import: String, name: String },
    /// Anything at all
    Any,
}

/// One struct field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Property name as it appears on the wire
    pub json_name: String,
    pub shape: TypeShape,
    pub required: bool,
    pub description: Option<String>,
}

/// A named definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDef {
    Struct {
        name: String,
        description: Option<String>,
        fields: Vec<Field>,
    },
    Enum {
        name: String,
        description: Option<String>,
        variants: Vec<String>,
    },
    Alias {
        name: String,
        description: Option<String>,
        target: TypeShape,
    },
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Struct { name, .. } | TypeDef::Enum { name, .. } | TypeDef::Alias { name, .. } => name,
        }
    }
}

/// Every definition needed to render one schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet {
    /// Definitions in emission order: a parent precedes the types hoisted from it
    pub defs: Vec<TypeDef>,
    /// Modules referenced by `External` shapes
    pub imports: BTreeSet<String>,
}

impl TypeSet {
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.defs.iter().find(|d| d.name() == name)
    }
}

// =============================================================================
// Collection
// =============================================================================

/// Builds a `TypeSet` from one or more schema roots
#[derive(Debug, Default)]
pub struct TypeCollector {
    names: UniqueNames,
    defs: Vec<TypeDef>,
    imports: BTreeSet<String>,
    /// `$defs`/`definitions` key -> claimed type name
    definitions: BTreeMap<String, String>,
    /// Registered definitions not yet defined
    pending: Vec<(String, Value)>,
}

impl TypeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim names for the `$defs` (or `definitions`) of a document so local
    /// `$ref`s resolve to them; their bodies are defined by `finish`
    pub fn register_definitions(&mut self, document: &Value) {
        for key in ["$defs", "definitions"] {
            if let Some(defs) = document.get(key).and_then(Value::as_object) {
                for (def_name, schema) in defs {
                    if self.definitions.contains_key(def_name) {
                        continue;
                    }
                    let name = self.names.claim(&rust_type_name(def_name));
                    self.definitions.insert(def_name.clone(), name.clone());
                    self.pending.push((name, schema.clone()));
                }
            }
        }
    }

    /// Reserve a unique root type name derived from `name`
    pub fn claim_root(&mut self, name: &str) -> String {
        self.names.claim(&rust_type_name(name))
    }

    /// Define the root type `name` (as returned by `claim_root`) for `schema`
    pub fn define_root(&mut self, name: &str, schema: &Value) {
        self.define_named(name.to_string(), schema);
    }

    pub fn finish(mut self) -> TypeSet {
        for (name, schema) in std::mem::take(&mut self.pending) {
            self.define_named(name, &schema);
        }
        TypeSet {
            defs: self.defs,
            imports: self.imports,
        }
    }

    fn define_named(&mut self, name: String, schema: &Value) {
        let description = describe(schema);

        if let Some(variants) = string_enum(schema) {
            self.defs.push(TypeDef::Enum {
                name,
                description,
                variants,
            });
            return;
        }

        if let Some(props) = object_properties(schema) {
            // Reserve the slot so the parent is emitted before its children
            let slot = self.defs.len();
            self.defs.push(TypeDef::Alias {
                name: name.clone(),
                description: None,
                target: TypeShape::Any,
            });
            let fields = self.fields(&name, props, schema);
            self.defs[slot] = TypeDef::Struct {
                name,
                description,
                fields,
            };
            return;
        }

        let target = self.shape_of(&name, schema);
        self.defs.push(TypeDef::Alias {
            name,
            description,
            target,
        });
    }

    fn fields(&mut self, owner: &str, props: &Map<String, Value>, schema: &Value) -> Vec<Field> {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        props
            .iter()
            .map(|(prop, prop_schema)| {
                let context = format!("{}{}", owner, to_pascal_case(prop));
                // A hoisted type carries the description itself
                let description = if is_hoisted(prop_schema) {
                    None
                } else {
                    describe(prop_schema)
                };
                Field {
                    json_name: prop.clone(),
                    shape: self.shape_of(&context, prop_schema),
                    required: required.contains(&prop.as_str()),
                    description,
                }
            })
            .collect()
    }

    /// Shape of `schema`; `context` names any type hoisted out of it
    fn shape_of(&mut self, context: &str, schema: &Value) -> TypeShape {
        let Some(obj) = schema.as_object() else {
            // `true` / `false` schemas
            return TypeShape::Any;
        };

        if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
            return self.resolve_ref(target);
        }

        if obj.contains_key("const") {
            return match obj.get("const") {
                Some(Value::String(_)) => TypeShape::Scalar(Scalar::String),
                Some(Value::Bool(_)) => TypeShape::Scalar(Scalar::Boolean),
                Some(Value::Number(n)) if n.is_f64() => TypeShape::Scalar(Scalar::Number),
                Some(Value::Number(_)) => TypeShape::Scalar(Scalar::Integer),
                _ => TypeShape::Any,
            };
        }

        if is_hoisted(schema) {
            let name = self.names.claim(&rust_type_name(context));
            self.define_named(name.clone(), schema);
            return TypeShape::Named(name);
        }

        match obj.get("type") {
            Some(Value::String(t)) => self.shape_of_type(context, t, obj),
            Some(Value::Array(types)) => {
                let non_null: Vec<&str> = types
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|t| *t != "null")
                    .collect();
                let nullable = non_null.len() < types.len();
                let inner = match non_null.as_slice() {
                    [single] => self.shape_of_type(context, single, obj),
                    [] => TypeShape::Scalar(Scalar::Null),
                    _ => TypeShape::Any,
                };
                if nullable && !matches!(inner, TypeShape::Scalar(Scalar::Null)) {
                    TypeShape::Nullable(Box::new(inner))
                } else {
                    inner
                }
            }
            _ => TypeShape::Any,
        }
    }

    fn shape_of_type(&mut self, context: &str, type_name: &str, obj: &Map<String, Value>) -> TypeShape {
        match type_name {
            "string" => TypeShape::Scalar(Scalar::String),
            "integer" => TypeShape::Scalar(Scalar::Integer),
            "number" => TypeShape::Scalar(Scalar::Number),
            "boolean" => TypeShape::Scalar(Scalar::Boolean),
            "null" => TypeShape::Scalar(Scalar::Null),
            "array" => match obj.get("items") {
                Some(items) if items.is_object() => {
                    TypeShape::Array(Box::new(self.shape_of(&format!("{}Item", context), items)))
                }
                _ => TypeShape::Array(Box::new(TypeShape::Any)),
            },
            "object" => match obj.get("additionalProperties") {
                Some(values) if values.is_object() => {
                    TypeShape::Map(Box::new(self.shape_of(&format!("{}Value", context), values)))
                }
                _ => TypeShape::Map(Box::new(TypeShape::Any)),
            },
            _ => TypeShape::Any,
        }
    }

    /// `#/$defs/Name` resolves locally; `module#/path/Name` is external
    fn resolve_ref(&mut self, target: &str) -> TypeShape {
        let (module, pointer) = target.split_once('#').unwrap_or((target, ""));
        let last = pointer.rsplit('/').next().filter(|s| !s.is_empty());

        if module.is_empty() {
            return match last {
                Some(def) => TypeShape::Named(
                    self.definitions
                        .get(def)
                        .cloned()
                        .unwrap_or_else(|| rust_type_name(def)),
                ),
                None => TypeShape::Any,
            };
        }

        let name = match last {
            Some(def) => rust_type_name(def),
            None => rust_type_name(module.rsplit('/').next().unwrap_or(module)),
        };
        self.imports.insert(module.to_string());
        TypeShape::External {
            import: module.to_string(),
            name,
        }
    }
}

/// Inline enums and objects become named definitions of their own
fn is_hoisted(schema: &Value) -> bool {
    let Some(obj) = schema.as_object() else {
        return false;
    };
    !obj.contains_key("$ref")
        && !obj.contains_key("const")
        && (string_enum(schema).is_some() || object_properties(schema).is_some())
}

fn describe(schema: &Value) -> Option<String> {
    schema
        .get("description")
        .and_then(Value::as_str)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Values of a string-only `enum`
fn string_enum(schema: &Value) -> Option<Vec<String>> {
    let values = schema.get("enum")?.as_array()?;
    if values.is_empty() {
        return None;
    }
    values.iter().map(|v| v.as_str().map(str::to_string)).collect()
}

/// `properties` of an object schema that declares at least one
fn object_properties(schema: &Value) -> Option<&Map<String, Value>> {
    let type_ok = match schema.get("type") {
        None => true,
        Some(Value::String(t)) => t == "object",
        Some(_) => false,
    };
    if !type_ok {
        return None;
    }
    schema.get("properties")?.as_object().filter(|p| !p.is_empty())
}

/// Collect the types of one schema document rooted at `root_name`
pub fn collect_types(root_name: &str, document: &Value) -> TypeSet {
    let mut collector = TypeCollector::new();
    let root = collector.claim_root(root_name);
    collector.register_definitions(document);
    collector.define_root(&root, document);
    collector.finish()
}

/// Collect the types of a grouped schema: each top-level property becomes
/// its own root
pub fn collect_grouped_types(document: &Value) -> TypeSet {
    let mut collector = TypeCollector::new();
    let members: Vec<(String, &Value)> = document
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(member, schema)| (collector.claim_root(member), schema))
                .collect()
        })
        .unwrap_or_default();
    collector.register_definitions(document);
    for (root, schema) in members {
        collector.define_root(&root, schema);
    }
    collector.finish()
}
