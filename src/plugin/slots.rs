//! Schema interfaces ("slots") a plugin's composable kinds may implement

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Plugin type, as declared in `plugin.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Panel,
    Datasource,
    App,
    Renderer,
    #[serde(rename = "secretsmanager")]
    SecretsManager,
}

impl PluginType {
    pub const ALL: [PluginType; 5] = [
        PluginType::Panel,
        PluginType::Datasource,
        PluginType::App,
        PluginType::Renderer,
        PluginType::SecretsManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Panel => "panel",
            PluginType::Datasource => "datasource",
            PluginType::App => "app",
            PluginType::Renderer => "renderer",
            PluginType::SecretsManager => "secretsmanager",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PluginType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown plugin type '{}'", s))
    }
}

/// Whether a plugin type must, may, or may not implement a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obligation {
    Required,
    Optional,
    NotAccepted,
}

/// A named schema interface
#[derive(Debug)]
pub struct Slot {
    name: &'static str,
    grouped: bool,
    /// Plugin types that accept this slot, and whether they require it
    accepted_by: &'static [(PluginType, bool)],
}

static SLOTS: [Slot; 3] = [
    Slot {
        name: "PanelCfg",
        grouped: true,
        accepted_by: &[(PluginType::Panel, true)],
    },
    Slot {
        name: "DataQuery",
        grouped: false,
        accepted_by: &[(PluginType::Datasource, true)],
    },
    Slot {
        name: "DataSourceCfg",
        grouped: true,
        accepted_by: &[(PluginType::Datasource, false)],
    },
];

impl Slot {
    /// Every known slot, in a fixed order
    pub fn all() -> &'static [Slot] {
        &SLOTS
    }

    pub fn lookup(name: &str) -> Option<&'static Slot> {
        SLOTS.iter().find(|s| s.name == name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the top-level fields of an implementation are independent schemas
    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    pub fn obligation(&self, plugin_type: PluginType) -> Obligation {
        match self.accepted_by.iter().find(|(t, _)| *t == plugin_type) {
            Some((_, true)) => Obligation::Required,
            Some((_, false)) => Obligation::Optional,
            None => Obligation::NotAccepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PanelCfg", PluginType::Panel, Obligation::Required)]
    #[case("PanelCfg", PluginType::Datasource, Obligation::NotAccepted)]
    #[case("DataQuery", PluginType::Datasource, Obligation::Required)]
    #[case("DataQuery", PluginType::Panel, Obligation::NotAccepted)]
    #[case("DataSourceCfg", PluginType::Datasource, Obligation::Optional)]
    #[case("DataSourceCfg", PluginType::App, Obligation::NotAccepted)]
    fn test_obligations(#[case] slot: &str, #[case] plugin_type: PluginType, #[case] expected: Obligation) {
        assert_eq!(Slot::lookup(slot).unwrap().obligation(plugin_type), expected);
    }

    #[test]
    fn test_grouping() {
        assert!(Slot::lookup("PanelCfg").unwrap().is_grouped());
        assert!(!Slot::lookup("DataQuery").unwrap().is_grouped());
        assert!(Slot::lookup("Nope").is_none());
    }

    #[test]
    fn test_plugin_type_names() {
        assert_eq!("secretsmanager".parse::<PluginType>().unwrap(), PluginType::SecretsManager);
        let json = serde_json::to_string(&PluginType::SecretsManager).unwrap();
        assert_eq!(json, "\"secretsmanager\"");
    }
}
