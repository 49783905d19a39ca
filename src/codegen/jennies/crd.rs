//! Kubernetes CustomResourceDefinitions for core kinds

use serde_json::{json, Map, Value};

use crate::codegen::fs::File;
use crate::codegen::{Jenny, OneToOne};
use crate::kind::{CoreProperties, Kind};
use crate::lineage::Lineage;

use super::json_file;

/// Keys Kubernetes' structural schemas do not accept
const UNSUPPORTED_KEYS: &[&str] = &["$schema", "$id", "$comment"];

/// `crd/<plural>.crd.json` for core kinds.
///
/// One served version per major, built from that major's latest minor.
/// The current version's major is the storage version.
pub struct CrdJenny;

impl Jenny for CrdJenny {
    fn name(&self) -> &str {
        "crd"
    }
}

impl OneToOne for CrdJenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>> {
        let Kind::Core { props, lineage } = kind else {
            return Ok(None);
        };

        let crd = build_crd(props, lineage);
        let path = format!("crd/{}.crd.json", props.common.plural_machine_name);
        json_file(path, &crd, self.name()).map(Some)
    }
}

fn build_crd(props: &CoreProperties, lineage: &Lineage) -> Value {
    let common = &props.common;
    let storage_major = props.current_version.major();

    let versions: Vec<Value> = lineage
        .majors()
        .into_iter()
        .filter_map(|major| lineage.latest_in_major(major))
        .map(|schema| {
            let major = schema.version().major();
            json!({
                "name": format!("v{}", major),
                "served": true,
                "storage": major == storage_major,
                "schema": {
                    "openAPIV3Schema": {
                        "type": "object",
                        "properties": {
                            "spec": structural(schema.document())
                        },
                        "required": ["spec"]
                    }
                }
            })
        })
        .collect();

    json!({
        "apiVersion": "apiextensions.k8s.io/v1",
        "kind": "CustomResourceDefinition",
        "metadata": {
            "name": format!("{}.{}", common.plural_machine_name, props.crd.group)
        },
        "spec": {
            "group": props.crd.group,
            "scope": props.crd.scope,
            "names": {
                "kind": common.name,
                "listKind": format!("{}List", common.name),
                "plural": common.plural_machine_name,
                "singular": common.machine_name
            },
            "versions": versions
        }
    })
}

/// Drop top-level keys a structural schema cannot carry
fn structural(document: &Value) -> Value {
    match document.as_object() {
        Some(obj) => {
            let kept: Map<String, Value> = obj
                .iter()
                .filter(|(k, _)| !UNSUPPORTED_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(kept)
        }
        None => document.clone(),
    }
}
