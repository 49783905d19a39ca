//! Kind status report

use std::collections::BTreeMap;

use serde::Serialize;

use crate::codegen::fs::File;
use crate::codegen::{Jenny, ManyToOne};
use crate::kind::{machine_name, Kind};
use crate::maturity::KindStatus;
use crate::version::SyntacticVersion;

use super::{json_file, Target};

/// One row of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub name: String,
    pub machine_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub status: KindStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<SyntacticVersion>,
    pub targets: Vec<Target>,
}

/// `report/kinds.json`: every declared kind plus the planned ones, sorted by
/// machine name
pub struct ReportJenny {
    targets: Vec<Target>,
    planned: Vec<String>,
}

impl ReportJenny {
    pub fn new(targets: Vec<Target>, planned: Vec<String>) -> Self {
        Self { targets, planned }
    }

    pub fn entries(&self, kinds: &[Kind]) -> Vec<ReportEntry> {
        let mut rows: BTreeMap<String, ReportEntry> = BTreeMap::new();

        for name in &self.planned {
            let machine = machine_name(name).unwrap_or_else(|_| name.to_ascii_lowercase());
            rows.insert(
                machine.clone(),
                ReportEntry {
                    name: name.clone(),
                    machine_name: machine,
                    category: None,
                    status: KindStatus::Planned,
                    current_version: None,
                    targets: Vec::new(),
                },
            );
        }

        // A declaration supersedes a stale planned entry of the same name
        for kind in kinds {
            let targets = self
                .targets
                .iter()
                .copied()
                .filter(|t| t.applies_to(kind.category()))
                .collect();
            rows.insert(
                kind.machine_name().to_string(),
                ReportEntry {
                    name: kind.name().to_string(),
                    machine_name: kind.machine_name().to_string(),
                    category: Some(kind.category().as_str().to_string()),
                    status: KindStatus::Declared(kind.maturity()),
                    current_version: kind.current_version(),
                    targets,
                },
            );
        }

        rows.into_values().collect()
    }
}

impl Jenny for ReportJenny {
    fn name(&self) -> &str {
        "report"
    }
}

impl ManyToOne for ReportJenny {
    fn generate(&self, kinds: &[Kind]) -> anyhow::Result<Option<File>> {
        let report = serde_json::json!({ "kinds": self.entries(kinds) });
        json_file("report/kinds.json".to_string(), &report, self.name()).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind_kind;
    use crate::lineage::JsonSchemaEngine;
    use crate::maturity::Maturity;
    use serde_json::{json, Value};

    fn widget() -> Kind {
        let doc = json!({
            "name": "Widget",
            "maturity": "synchronized",
            "group": "ext.example.io",
            "lineage": {"schemas": [{"version": [0, 0], "schema": {"type": "object"}}]}
        });
        bind_kind(&JsonSchemaEngine::new(), doc.to_string().as_bytes(), "widget").unwrap()
    }

    #[test]
    fn test_planned_and_declared_entries() {
        let jenny = ReportJenny::new(Target::ALL.to_vec(), vec!["Alerting".into(), "Widget".into()]);
        let entries = jenny.entries(&[widget()]);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].machine_name, "alerting");
        assert_eq!(entries[0].status, KindStatus::Planned);
        assert_eq!(entries[1].status, KindStatus::Declared(Maturity::Synchronized));
        assert_eq!(entries[1].targets, vec![Target::Rust, Target::TypeScript, Target::JsonSchema]);
    }

    #[test]
    fn test_report_json_shape() {
        let jenny = ReportJenny::new(vec![Target::Rust], vec![]);
        let file = jenny.generate(&[widget()]).unwrap().unwrap();
        assert_eq!(file.path, "report/kinds.json");

        let report: Value = serde_json::from_slice(&file.data).unwrap();
        let row = &report["kinds"][0];
        assert_eq!(row["machineName"], "widget");
        assert_eq!(row["category"], "custom");
        assert_eq!(row["status"], json!({"status": "declared", "maturity": "synchronized"}));
        assert_eq!(row["currentVersion"], json!([0, 0]));
        assert_eq!(row["targets"], json!(["rust"]));
    }
}
