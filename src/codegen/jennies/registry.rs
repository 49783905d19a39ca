//! Static registry of every kind, as Rust source

use crate::codegen::fs::File;
use crate::codegen::{Jenny, ManyToOne};
use crate::kind::Kind;

/// `rust/registry.gen.rs`, listing every kind of the batch
pub struct KindRegistryJenny;

impl Jenny for KindRegistryJenny {
    fn name(&self) -> &str {
        "kind-registry"
    }
}

impl ManyToOne for KindRegistryJenny {
    fn generate(&self, kinds: &[Kind]) -> anyhow::Result<Option<File>> {
        let mut sorted: Vec<&Kind> = kinds.iter().collect();
        sorted.sort_by(|a, b| {
            a.category()
                .as_str()
                .cmp(b.category().as_str())
                .then_with(|| a.machine_name().cmp(b.machine_name()))
        });

        let mut output = String::new();
        output.push_str("//! Every kind known at generation time\n\n");

        output.push_str("/// Static description of one kind\n");
        output.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
        output.push_str("pub struct KindInfo {\n");
        output.push_str("    pub name: &'static str,\n");
        output.push_str("    pub machine_name: &'static str,\n");
        output.push_str("    pub plural_machine_name: &'static str,\n");
        output.push_str("    pub category: &'static str,\n");
        output.push_str("    pub maturity: &'static str,\n");
        output.push_str("    /// `None` for raw kinds\n");
        output.push_str("    pub current_version: Option<(u64, u64)>,\n");
        output.push_str("}\n\n");

        output.push_str("pub const KINDS: &[KindInfo] = &[\n");
        for kind in sorted {
            let version = match kind.current_version() {
                Some(v) => format!("Some(({}, {}))", v.major(), v.minor()),
                None => "None".to_string(),
            };
            output.push_str("    KindInfo {\n");
            output.push_str(&format!("        name: {:?},\n", kind.name()));
            output.push_str(&format!("        machine_name: {:?},\n", kind.machine_name()));
            output.push_str(&format!("        plural_machine_name: {:?},\n", kind.plural_machine_name()));
            output.push_str(&format!("        category: {:?},\n", kind.category().as_str()));
            output.push_str(&format!("        maturity: {:?},\n", kind.maturity().as_str()));
            output.push_str(&format!("        current_version: {},\n", version));
            output.push_str("    },\n");
        }
        output.push_str("];\n\n");

        output.push_str("/// Look up a kind by machine name\n");
        output.push_str("pub fn find(machine_name: &str) -> Option<&'static KindInfo> {\n");
        output.push_str("    KINDS.iter().find(|k| k.machine_name == machine_name)\n");
        output.push_str("}\n");

        Ok(Some(File::new("rust/registry.gen.rs", output, self.name())))
    }
}
