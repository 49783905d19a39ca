//! On-disk declaration format
//!
//! Each category is its own struct with `deny_unknown_fields`, so the
//! category of a document is decided by which shape it fits, never by a tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CrdScope;
use crate::maturity::Maturity;
use crate::version::SyntacticVersion;

/// One schema entry of a declared lineage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    pub version: SyntacticVersion,
    pub schema: Value,
}

/// Declared lineage: `{ "name"?: string, "schemas": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineageDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub schemas: Vec<SchemaDecl>,
}

impl LineageDecl {
    pub(crate) fn into_pairs(self) -> Vec<(SyntacticVersion, Value)> {
        self.schemas.into_iter().map(|s| (s.version, s.schema)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrdDecl {
    pub group: String,
    pub scope: CrdScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoreDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    pub maturity: Maturity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<SyntacticVersion>,
    pub crd: CrdDecl,
    pub lineage: LineageDecl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CustomDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    pub maturity: Maturity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<SyntacticVersion>,
    pub group: String,
    pub lineage: LineageDecl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    pub maturity: Maturity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComposableDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
    pub maturity: Maturity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<SyntacticVersion>,
    pub schema_interface: String,
    pub lineage: LineageDecl,
}

/// A declaration of any category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KindDecl {
    Core(CoreDecl),
    Custom(CustomDecl),
    Raw(RawDecl),
    Composable(ComposableDecl),
}

impl KindDecl {
    /// Decode a declaration document, requiring that exactly one category
    /// shape fits. On failure returns why each shape was rejected.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err("declaration must be a JSON object".to_string());
        }

        let mut matches = Vec::new();
        let mut rejections = Vec::new();

        match serde_json::from_value::<CoreDecl>(value.clone()) {
            Ok(d) => matches.push(KindDecl::Core(d)),
            Err(e) => rejections.push(format!("core: {}", e)),
        }
        match serde_json::from_value::<CustomDecl>(value.clone()) {
            Ok(d) => matches.push(KindDecl::Custom(d)),
            Err(e) => rejections.push(format!("custom: {}", e)),
        }
        match serde_json::from_value::<RawDecl>(value.clone()) {
            Ok(d) => matches.push(KindDecl::Raw(d)),
            Err(e) => rejections.push(format!("raw: {}", e)),
        }
        match serde_json::from_value::<ComposableDecl>(value.clone()) {
            Ok(d) => matches.push(KindDecl::Composable(d)),
            Err(e) => rejections.push(format!("composable: {}", e)),
        }

        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(format!("matches no kind category ({})", rejections.join("; "))),
            n => Err(format!("ambiguous: matches {} kind categories", n)),
        }
    }

    /// Declared name, whatever the category
    pub fn name(&self) -> &str {
        match self {
            KindDecl::Core(d) => &d.name,
            KindDecl::Custom(d) => &d.name,
            KindDecl::Raw(d) => &d.name,
            KindDecl::Composable(d) => &d.name,
        }
    }
}
