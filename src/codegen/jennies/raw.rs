//! Extension listings for raw kinds

use serde_json::json;

use crate::codegen::fs::File;
use crate::codegen::{Jenny, OneToOne};
use crate::kind::Kind;

use super::json_file;

/// `raw/<machine>.extensions.json`: the file extensions a raw kind's byte
/// format is recognized by
pub struct RawExtensionsJenny;

impl Jenny for RawExtensionsJenny {
    fn name(&self) -> &str {
        "raw-extensions"
    }
}

impl OneToOne for RawExtensionsJenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>> {
        let Kind::Raw { props } = kind else {
            return Ok(None);
        };

        let mut extensions: Vec<String> = props
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        extensions.sort();
        extensions.dedup();

        let listing = json!({
            "name": props.common.name,
            "machineName": props.common.machine_name,
            "maturity": props.common.maturity,
            "extensions": extensions,
        });
        json_file(format!("raw/{}.extensions.json", props.common.machine_name), &listing, self.name()).map(Some)
    }
}
