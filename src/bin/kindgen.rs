//! Kind code generator CLI
//!
//! Loads kinds and plugins, runs the generation pipeline, then either writes
//! the output tree or verifies it against disk.
//!
//! Verify mode is selected by `--verify` or `KINDGEN_VERIFY=1`.

use std::path::{Path, PathBuf};

use clap::Parser;
use kindgen::bind::{check_unique_names, load_kinds, select_kinds};
use kindgen::codegen::jennies::default_pipeline;
use kindgen::codegen::VerifyFinding;
use kindgen::plugin::{self, imports::verify_import_mappings};
use kindgen::{CancelToken, JsonSchemaEngine, Kind, KindgenConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kindgen")]
#[command(about = "Generate code from kind declarations, or verify generated code is up to date")]
struct Cli {
    /// Restrict per-kind generation to these kinds
    kinds: Vec<String>,

    /// Kind declaration tree
    #[arg(long = "kinds")]
    kinds_dir: Option<PathBuf>,

    /// Plugin tree
    #[arg(long)]
    plugins: Option<PathBuf>,

    /// Output root
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compare against disk instead of writing
    #[arg(long)]
    verify: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn verify_from_env() -> bool {
    std::env::var("KINDGEN_VERIFY")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Returns whether the run succeeded
fn run(cli: Cli) -> anyhow::Result<bool> {
    verify_import_mappings()?;

    let config = KindgenConfig::load_from(cli.config.as_deref())?;
    let kinds_dir = cli.kinds_dir.unwrap_or_else(|| config.paths.kinds.clone());
    let plugins_dir = cli.plugins.unwrap_or_else(|| config.paths.plugins.clone());
    let out_dir = cli.out.unwrap_or_else(|| config.paths.output.clone());
    let verify = cli.verify || verify_from_env();
    let concurrency = config.codegen.concurrency;

    println!("🔍 Loading kinds from {}", kinds_dir.display());
    let (mut kinds, mut kind_errors) = load_kinds(&kinds_dir, concurrency, JsonSchemaEngine::new);
    let (plugins, plugin_errors) = plugin::parse_all(&plugins_dir, &JsonSchemaEngine::new());
    for parsed in plugins {
        kinds.extend(parsed.kinds);
    }
    if let Err(duplicates) = check_unique_names(&kinds) {
        kind_errors.extend(duplicates);
    }
    println!("   {} kinds loaded", kinds.len());

    if !kind_errors.is_empty() || !plugin_errors.is_empty() {
        println!();
        println!("❌ {} kind(s) and {} plugin(s) failed to load:", kind_errors.len(), plugin_errors.len());
        for e in kind_errors.iter() {
            println!("   └─ {}", e);
        }
        for e in plugin_errors.iter() {
            println!("   └─ {}", e);
        }
        println!();
        println!("💡 Fix the declarations above; nothing is generated until every kind loads");
        return Ok(false);
    }

    let scope = if cli.kinds.is_empty() {
        None
    } else {
        match select_kinds(&kinds, &cli.kinds) {
            Ok(selected) => Some(selected),
            Err(errors) => {
                for e in errors.iter() {
                    println!("❌ {}", e);
                }
                return Ok(false);
            }
        }
    };

    let cancel = CancelToken::new();
    let pipeline = default_pipeline(&config.pipeline_options());
    let output = pipeline.generate_scoped(&kinds, scope.as_deref(), &cancel)?;
    debug!(files = output.len(), "pipeline finished");

    if verify {
        println!("🔍 Verifying {} files under {}", output.len(), out_dir.display());
        match output.verify(&out_dir) {
            Ok(()) => {
                println!("✅ Generated code is up to date");
                Ok(true)
            }
            Err(findings) => {
                println!("❌ {} file(s) out of date:", findings.len());
                for finding in findings.iter() {
                    match finding {
                        VerifyFinding::ContentMismatch { path, diff } => {
                            println!("   └─ {} differs", path);
                            for line in diff.lines() {
                                println!("      {}", line);
                            }
                        }
                        other => println!("   └─ {}", other),
                    }
                }
                let paths: Vec<&str> = findings.iter().map(VerifyFinding::path).collect();
                print_hint(&kinds_for_paths(&kinds, &paths));
                Ok(false)
            }
        }
    } else {
        match output.write(&out_dir, concurrency, &cancel) {
            Ok(summary) => {
                println!(
                    "✅ Wrote {} files to {} ({} skipped)",
                    summary.written,
                    out_dir.display(),
                    summary.skipped
                );
                Ok(true)
            }
            Err(failures) => {
                println!("❌ {} file(s) could not be written:", failures.len());
                for failure in failures.iter() {
                    println!("   └─ {}", failure);
                }
                Ok(false)
            }
        }
    }
}

/// Machine names of the kinds that own any of `paths`
fn kinds_for_paths<'a>(kinds: &'a [Kind], paths: &[&str]) -> Vec<&'a str> {
    kinds
        .iter()
        .filter(|kind| {
            paths.iter().any(|path| {
                Path::new(path).iter().any(|segment| {
                    let segment = segment.to_string_lossy();
                    let stem = segment.split('.').next().unwrap_or("");
                    segment == kind.machine_name() || stem == kind.machine_name() || stem == kind.plural_machine_name()
                })
            })
        })
        .map(Kind::machine_name)
        .collect()
}

fn print_hint(failing: &[&str]) {
    if failing.is_empty() {
        return;
    }
    println!();
    println!("💡 Re-run for just the failing kinds with:");
    println!("   kindgen {}", failing.join(" "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindgen::bind_kind;
    use serde_json::json;

    #[test]
    fn test_hint_names_kinds_not_paths() {
        let engine = JsonSchemaEngine::new();
        let widget = json!({
            "name": "Widget",
            "maturity": "stable",
            "crd": {"group": "widgets.example.io", "scope": "Namespaced"},
            "lineage": {"schemas": [{"version": [0, 0], "schema": {"type": "object"}}]}
        });
        let svg = json!({"name": "SVG", "maturity": "committed", "extensions": ["svg"]});
        let kinds = vec![
            bind_kind(&engine, widget.to_string().as_bytes(), "widget.json").unwrap(),
            bind_kind(&engine, svg.to_string().as_bytes(), "svg.json").unwrap(),
        ];

        assert_eq!(kinds_for_paths(&kinds, &["crd/widgets.crd.json"]), vec!["widget"]);
        assert_eq!(kinds_for_paths(&kinds, &["raw/svg.extensions.json"]), vec!["svg"]);
        assert!(kinds_for_paths(&kinds, &["report/kinds.json"]).is_empty());
    }
}
