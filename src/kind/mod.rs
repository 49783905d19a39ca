//! Kind declarations
//!
//! A kind is a named, versioned type declaration in one of four categories.
//! The categories form a closed sum type; generators dispatch on the variant.

pub mod decl;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KindError;
use crate::lineage::{Lineage, Schema};
use crate::maturity::Maturity;
use crate::version::SyntacticVersion;

use decl::{ComposableDecl, CoreDecl, CrdDecl, CustomDecl, KindDecl, LineageDecl, RawDecl, SchemaDecl};

// =============================================================================
// Categories
// =============================================================================

/// Kind category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// First-party kind with CRD metadata
    Core,
    /// Unstructured byte format, no lineage
    Raw,
    /// Third-party kind with its own API group
    Custom,
    /// Plugin-provided implementation of a schema interface
    Composable,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Core => "core",
            Category::Raw => "raw",
            Category::Custom => "custom",
            Category::Composable => "composable",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kubernetes resource scope of a core kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrdScope {
    Namespaced,
    Cluster,
}

// =============================================================================
// Properties
// =============================================================================

/// Metadata every kind carries exactly once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonProperties {
    pub name: String,
    pub plural_name: String,
    pub machine_name: String,
    pub plural_machine_name: String,
    pub maturity: Maturity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub lineage_is_group: bool,
}

impl CommonProperties {
    /// Derive the common block from declared values, validating the names
    pub fn new(
        name: &str,
        plural_name: Option<&str>,
        maturity: Maturity,
        description: Option<String>,
        lineage_is_group: bool,
    ) -> Result<Self, KindError> {
        let machine = machine_name(name)?;
        let plural_name = plural_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}s", name));
        let plural_machine_name = machine_name(&plural_name)?;

        Ok(Self {
            name: name.to_string(),
            plural_name,
            machine_name: machine,
            plural_machine_name,
            maturity,
            description,
            lineage_is_group,
        })
    }

    /// Declared plural, or `None` when it is the derived default
    fn declared_plural(&self) -> Option<String> {
        if self.plural_name == format!("{}s", self.name) {
            None
        } else {
            Some(self.plural_name.clone())
        }
    }
}

/// Derive the machine name of a kind: lower-cased, with every character
/// outside `[a-z0-9]` removed. Must start with a letter.
pub fn machine_name(name: &str) -> Result<String, KindError> {
    let derived: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if derived.is_empty() {
        return Err(KindError::InvalidName {
            name: name.to_string(),
            reason: "machine name would be empty".to_string(),
        });
    }
    if !derived.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(KindError::InvalidName {
            name: name.to_string(),
            reason: format!("machine name '{}' must start with a letter", derived),
        });
    }
    Ok(derived)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrdProperties {
    pub group: String,
    pub scope: CrdScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreProperties {
    #[serde(flatten)]
    pub common: CommonProperties,
    pub current_version: SyntacticVersion,
    pub crd: CrdProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomProperties {
    #[serde(flatten)]
    pub common: CommonProperties,
    pub current_version: SyntacticVersion,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProperties {
    #[serde(flatten)]
    pub common: CommonProperties,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposableProperties {
    #[serde(flatten)]
    pub common: CommonProperties,
    pub current_version: SyntacticVersion,
    pub schema_interface: String,
}

// =============================================================================
// Kind
// =============================================================================

/// A bound kind: declaration metadata plus its lineage (except raw kinds)
#[derive(Debug, Clone)]
pub enum Kind {
    Core { props: CoreProperties, lineage: Lineage },
    Custom { props: CustomProperties, lineage: Lineage },
    Raw { props: RawProperties },
    Composable { props: ComposableProperties, lineage: Lineage },
}

impl Kind {
    pub fn category(&self) -> Category {
        match self {
            Kind::Core { .. } => Category::Core,
            Kind::Custom { .. } => Category::Custom,
            Kind::Raw { .. } => Category::Raw,
            Kind::Composable { .. } => Category::Composable,
        }
    }

    pub fn common(&self) -> &CommonProperties {
        match self {
            Kind::Core { props, .. } => &props.common,
            Kind::Custom { props, .. } => &props.common,
            Kind::Raw { props } => &props.common,
            Kind::Composable { props, .. } => &props.common,
        }
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn machine_name(&self) -> &str {
        &self.common().machine_name
    }

    pub fn plural_machine_name(&self) -> &str {
        &self.common().plural_machine_name
    }

    pub fn maturity(&self) -> Maturity {
        self.common().maturity
    }

    pub fn description(&self) -> Option<&str> {
        self.common().description.as_deref()
    }

    /// The kind's lineage; `None` for raw kinds
    pub fn lineage(&self) -> Option<&Lineage> {
        match self {
            Kind::Core { lineage, .. }
            | Kind::Custom { lineage, .. }
            | Kind::Composable { lineage, .. } => Some(lineage),
            Kind::Raw { .. } => None,
        }
    }

    /// Version generators target; `None` for raw kinds
    pub fn current_version(&self) -> Option<SyntacticVersion> {
        match self {
            Kind::Core { props, .. } => Some(props.current_version),
            Kind::Custom { props, .. } => Some(props.current_version),
            Kind::Composable { props, .. } => Some(props.current_version),
            Kind::Raw { .. } => None,
        }
    }

    /// Schema at the current version
    pub fn current_schema(&self) -> Option<&Schema> {
        let version = self.current_version()?;
        self.lineage()?.schema(version)
    }

    /// Rebuild the source declaration, as published to a release directory
    pub fn to_decl(&self) -> KindDecl {
        fn lineage_decl(lineage: &Lineage) -> LineageDecl {
            LineageDecl {
                name: Some(lineage.name().to_string()),
                schemas: lineage
                    .schemas()
                    .iter()
                    .map(|s| SchemaDecl {
                        version: s.version(),
                        schema: s.document().clone(),
                    })
                    .collect(),
            }
        }

        match self {
            Kind::Core { props, lineage } => KindDecl::Core(CoreDecl {
                name: props.common.name.clone(),
                plural_name: props.common.declared_plural(),
                maturity: props.common.maturity,
                description: props.common.description.clone(),
                current_version: Some(props.current_version),
                crd: CrdDecl {
                    group: props.crd.group.clone(),
                    scope: props.crd.scope,
                },
                lineage: lineage_decl(lineage),
            }),
            Kind::Custom { props, lineage } => KindDecl::Custom(CustomDecl {
                name: props.common.name.clone(),
                plural_name: props.common.declared_plural(),
                maturity: props.common.maturity,
                description: props.common.description.clone(),
                current_version: Some(props.current_version),
                group: props.group.clone(),
                lineage: lineage_decl(lineage),
            }),
            Kind::Raw { props } => KindDecl::Raw(RawDecl {
                name: props.common.name.clone(),
                plural_name: props.common.declared_plural(),
                maturity: props.common.maturity,
                description: props.common.description.clone(),
                extensions: props.extensions.clone(),
            }),
            Kind::Composable { props, lineage } => KindDecl::Composable(ComposableDecl {
                name: props.common.name.clone(),
                plural_name: props.common.declared_plural(),
                maturity: props.common.maturity,
                description: props.common.description.clone(),
                current_version: Some(props.current_version),
                schema_interface: props.schema_interface.clone(),
                lineage: lineage_decl(lineage),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Widget", "widget")]
    #[case("LibraryPanel", "librarypanel")]
    #[case("Query-History_2", "queryhistory2")]
    #[case("SVG", "svg")]
    fn test_machine_name_derivation(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(machine_name(name).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("--")]
    #[case("2fa")]
    fn test_machine_name_rejects(#[case] name: &str) {
        assert!(matches!(machine_name(name), Err(KindError::InvalidName { .. })));
    }

    #[test]
    fn test_plural_defaults() {
        let common = CommonProperties::new("Widget", None, Maturity::Committed, None, false).unwrap();
        assert_eq!(common.plural_name, "Widgets");
        assert_eq!(common.plural_machine_name, "widgets");
        assert_eq!(common.declared_plural(), None);

        let common = CommonProperties::new("Query", Some("Queries"), Maturity::Committed, None, false).unwrap();
        assert_eq!(common.plural_machine_name, "queries");
        assert_eq!(common.declared_plural().as_deref(), Some("Queries"));
    }
}
