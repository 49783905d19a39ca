//! Publish-time compatibility CLI
//!
//! Checks every kind against its predecessor in the latest published
//! release and optionally publishes the kinds as a new release.

use std::path::PathBuf;

use clap::Parser;
use kindgen::bind::{check_unique_names, load_kinds, select_kinds};
use kindgen::error::CompatError;
use kindgen::plugin;
use kindgen::registry::publish;
use kindgen::{JsonSchemaEngine, Kind, KindgenConfig, PublishedRegistry, ReleaseVersion};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kind-compat")]
#[command(about = "Check kinds against the latest published release")]
struct Cli {
    /// Only check these kinds
    kinds: Vec<String>,

    /// Published Version Directory
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Kind declaration tree
    #[arg(long = "kinds")]
    kinds_dir: Option<PathBuf>,

    /// Plugin tree
    #[arg(long)]
    plugins: Option<PathBuf>,

    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// After a clean check, publish every kind as this release
    #[arg(long, value_name = "VERSION", conflicts_with = "kinds")]
    publish: Option<String>,
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

fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = KindgenConfig::load_from(cli.config.as_deref())?;
    let registry_dir = cli.registry.unwrap_or_else(|| config.paths.registry.clone());
    let kinds_dir = cli.kinds_dir.unwrap_or_else(|| config.paths.kinds.clone());
    let plugins_dir = cli.plugins.unwrap_or_else(|| config.paths.plugins.clone());

    let (mut kinds, mut kind_errors) = load_kinds(&kinds_dir, config.codegen.concurrency, JsonSchemaEngine::new);
    let (plugins, plugin_errors) = plugin::parse_all(&plugins_dir, &JsonSchemaEngine::new());
    for parsed in plugins {
        kinds.extend(parsed.kinds);
    }
    if let Err(duplicates) = check_unique_names(&kinds) {
        kind_errors.extend(duplicates);
    }

    let mut ok = true;
    for e in kind_errors.iter() {
        println!("❌ {}", e);
        ok = false;
    }
    for e in plugin_errors.iter() {
        println!("❌ {}", e);
        ok = false;
    }

    let checked: Vec<Kind> = if cli.kinds.is_empty() {
        kinds.clone()
    } else {
        match select_kinds(&kinds, &cli.kinds) {
            Ok(selected) => kinds
                .iter()
                .filter(|k| selected.iter().any(|m| m == k.machine_name()))
                .cloned()
                .collect(),
            Err(errors) => {
                for e in errors.iter() {
                    println!("❌ {}", e);
                }
                return Ok(false);
            }
        }
    };

    let registry = PublishedRegistry::new(&registry_dir);
    let engine = JsonSchemaEngine::new();
    let report = registry.check_all(&engine, &checked)?;

    match &report.latest_dir {
        Some(dir) => println!("🔍 Checking {} kinds against release {}", checked.len(), dir),
        None => println!("🔍 No release under {}; every kind is new", registry_dir.display()),
    }
    println!();

    for name in &report.passed {
        println!("✅ {}", name);
    }
    for name in &report.unpublished {
        println!("🆕 {} (not previously published)", name);
    }
    for e in &report.errors {
        println!("❌ {}", e);
    }
    for violation in &report.violations {
        print_violation(violation);
    }

    println!();
    if !report.is_ok() || !ok {
        println!(
            "❌ {} violation(s), {} unreadable release file(s), {} load error(s)",
            report.violations.len(),
            report.errors.len(),
            kind_errors.len() + plugin_errors.len()
        );
        let failing: Vec<&str> = report.violations.iter().map(CompatError::kind_name).collect();
        if !failing.is_empty() {
            println!("💡 Re-run for just the failing kinds with:");
            println!("   kind-compat {}", failing.join(" "));
        }
        return Ok(false);
    }
    println!("✅ All kinds are compatible with the published release");

    if let Some(version) = cli.publish {
        let version = ReleaseVersion::parse(&version)?;
        let summary = publish(&registry_dir, &version, &kinds)?;
        println!("📦 Published {} kinds as {} in {}", summary.files.len(), version, summary.dir.display());
    }
    Ok(true)
}

fn print_violation(violation: &CompatError) {
    println!("❌ {} [{}]", violation, violation.rule());
    if let CompatError::NonAppendOnlyChange { changes, .. } = violation {
        for change in changes {
            let marker = if change.is_breaking { "breaking" } else { "changed" };
            println!("   └─ {} at {} ({})", change.description, change.path, marker);
        }
    }
}
