//! Lineage binder
//!
//! Turns declaration source into bound kinds. A document must fit exactly one
//! kind category; its lineage is then validated and frozen by a schema engine.
//! Bulk loading fans out per kind directory, one engine per worker.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{KindError, KindErrors};
use crate::kind::decl::{KindDecl, LineageDecl};
use crate::kind::{
    machine_name, CommonProperties, ComposableProperties, CoreProperties, CrdProperties, CustomProperties, Kind, RawProperties,
};
use crate::lineage::{Lineage, SchemaEngine};
use crate::plugin::slots::Slot;
use crate::version::SyntacticVersion;
use crate::worker::{run_bounded, CancelToken};

/// Bind declaration source bytes into a kind.
///
/// `origin` names the source (usually its path) in error messages.
pub fn bind_kind<E: SchemaEngine + ?Sized>(engine: &E, source: &[u8], origin: &str) -> Result<Kind, KindError> {
    let value: Value = serde_json::from_slice(source).map_err(|e| KindError::InvalidSchema {
        kind: origin.to_string(),
        reason: e.to_string(),
    })?;

    let decl = KindDecl::from_value(&value).map_err(|reason| KindError::NotAKind {
        origin: origin.to_string(),
        reason,
    })?;

    bind_decl(engine, decl)
}

/// Bind an already decoded declaration
pub fn bind_decl<E: SchemaEngine + ?Sized>(engine: &E, decl: KindDecl) -> Result<Kind, KindError> {
    let kind = match decl {
        KindDecl::Core(d) => {
            let common = CommonProperties::new(&d.name, d.plural_name.as_deref(), d.maturity, d.description, false)?;
            let lineage = bind_lineage(engine, &common, d.lineage)?;
            let current_version = resolve_current(&common, &lineage, d.current_version)?;
            Kind::Core {
                props: CoreProperties {
                    common,
                    current_version,
                    crd: CrdProperties {
                        group: d.crd.group,
                        scope: d.crd.scope,
                    },
                },
                lineage,
            }
        }
        KindDecl::Custom(d) => {
            let common = CommonProperties::new(&d.name, d.plural_name.as_deref(), d.maturity, d.description, false)?;
            let lineage = bind_lineage(engine, &common, d.lineage)?;
            let current_version = resolve_current(&common, &lineage, d.current_version)?;
            Kind::Custom {
                props: CustomProperties {
                    common,
                    current_version,
                    group: d.group,
                },
                lineage,
            }
        }
        KindDecl::Raw(d) => {
            let common = CommonProperties::new(&d.name, d.plural_name.as_deref(), d.maturity, d.description, false)?;
            Kind::Raw {
                props: RawProperties {
                    common,
                    extensions: d.extensions,
                },
            }
        }
        KindDecl::Composable(d) => {
            let slot = Slot::lookup(&d.schema_interface).ok_or_else(|| KindError::InvalidSchema {
                kind: d.name.clone(),
                reason: format!("unknown schema interface '{}'", d.schema_interface),
            })?;
            let common = CommonProperties::new(
                &d.name,
                d.plural_name.as_deref(),
                d.maturity,
                d.description,
                slot.is_grouped(),
            )?;
            let lineage = bind_lineage(engine, &common, d.lineage)?;
            let current_version = resolve_current(&common, &lineage, d.current_version)?;
            Kind::Composable {
                props: ComposableProperties {
                    common,
                    current_version,
                    schema_interface: d.schema_interface,
                },
                lineage,
            }
        }
    };

    debug!(kind = kind.name(), category = %kind.category(), "bound kind");
    Ok(kind)
}

/// Bind a declared lineage on behalf of the kind described by `common`
pub fn bind_lineage<E: SchemaEngine + ?Sized>(
    engine: &E,
    common: &CommonProperties,
    decl: LineageDecl,
) -> Result<Lineage, KindError> {
    if let Some(name) = &decl.name {
        if *name != common.machine_name {
            return Err(KindError::InvalidSchema {
                kind: common.name.clone(),
                reason: format!(
                    "lineage name '{}' must equal the machine name '{}'",
                    name, common.machine_name
                ),
            });
        }
    }

    engine
        .bind(&common.machine_name, decl.into_pairs(), common.lineage_is_group)
        .map_err(|e| KindError::InvalidSchema {
            kind: common.name.clone(),
            reason: e.to_string(),
        })
}

fn resolve_current(
    common: &CommonProperties,
    lineage: &Lineage,
    declared: Option<SyntacticVersion>,
) -> Result<SyntacticVersion, KindError> {
    match declared {
        None => Ok(lineage.latest().version()),
        Some(v) if lineage.schema(v).is_some() => Ok(v),
        Some(v) => Err(KindError::InvalidSchema {
            kind: common.name.clone(),
            reason: format!("current version {} is not in the lineage", v),
        }),
    }
}

// =============================================================================
// Loading from disk
// =============================================================================

/// Load the single kind declared in `dir`.
///
/// The directory must hold exactly one `<machinename>.json`, and the
/// directory itself must be named after the machine name.
pub fn load_kind_dir<E: SchemaEngine + ?Sized>(engine: &E, dir: &Path) -> Result<Kind, KindError> {
    let origin = dir.display().to_string();
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().map_or(false, |ext| ext == "json"))
        .map(|e| e.into_path())
        .collect();
    sources.sort();

    let source_path = match sources.as_slice() {
        [single] => single,
        [] => {
            return Err(KindError::NotAKind {
                origin,
                reason: "directory holds no .json declaration".to_string(),
            })
        }
        _ => {
            return Err(KindError::NotAKind {
                origin,
                reason: format!("directory holds {} .json files; expected exactly one", sources.len()),
            })
        }
    };

    let source = std::fs::read(source_path).map_err(|e| KindError::Io {
        path: source_path.display().to_string(),
        source: e,
    })?;
    let kind = bind_kind(engine, &source, &source_path.display().to_string())?;

    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if stem != kind.machine_name() {
        return Err(KindError::FileNameMismatch {
            kind: kind.name().to_string(),
            file: source_path.display().to_string(),
            machine_name: kind.machine_name().to_string(),
        });
    }
    if dir_name != kind.machine_name() {
        return Err(KindError::DirectoryMismatch {
            kind: kind.name().to_string(),
            dir: dir_name,
            machine_name: kind.machine_name().to_string(),
        });
    }

    Ok(kind)
}

/// Immediate subdirectories of `root`, sorted by name
pub fn kind_dirs(root: &Path) -> Result<Vec<PathBuf>, KindError> {
    if !root.is_dir() {
        return Err(KindError::Io {
            path: root.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "kinds directory does not exist"),
        });
    }

    let dirs = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    Ok(dirs)
}

/// Load every kind under `root` with a bounded pool of workers.
///
/// Each worker gets its own engine from `make_engine`. Kinds come back in
/// directory-name order; failures are collected, never fatal to the batch.
pub fn load_kinds<E, F>(root: &Path, concurrency: usize, make_engine: F) -> (Vec<Kind>, KindErrors)
where
    E: SchemaEngine,
    F: Fn() -> E + Sync,
{
    let mut kinds = Vec::new();
    let mut errors = KindErrors::new();

    let dirs = match kind_dirs(root) {
        Ok(dirs) => dirs,
        Err(e) => {
            errors.push(e);
            return (kinds, errors);
        }
    };

    let results = run_bounded(&dirs, concurrency, &CancelToken::new(), make_engine, |engine, dir| {
        load_kind_dir(engine, dir)
    });

    for result in results.into_iter().flatten() {
        match result {
            Ok(kind) => kinds.push(kind),
            Err(e) => {
                warn!(subject = e.subject(), "failed to load kind: {}", e);
                errors.push(e);
            }
        }
    }

    info!(
        root = %root.display(),
        loaded = kinds.len(),
        failed = errors.len(),
        "loaded kinds"
    );
    (kinds, errors)
}

/// Check that no two kinds share a machine name or a plural machine name.
///
/// Run over the combined set of declared and plugin kinds; generated paths
/// are keyed by these names.
pub fn check_unique_names(kinds: &[Kind]) -> Result<(), KindErrors> {
    let mut errors = KindErrors::new();
    let fields: [(&'static str, fn(&Kind) -> &str); 2] = [
        ("machine name", Kind::machine_name),
        ("plural machine name", Kind::plural_machine_name),
    ];

    for (field, get) in fields {
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for kind in kinds {
            if let Some(first) = seen.insert(get(kind), kind.name()) {
                errors.push(KindError::DuplicateName {
                    first: first.to_string(),
                    second: kind.name().to_string(),
                    field,
                    value: get(kind).to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// =============================================================================
// Selection
// =============================================================================

/// Closest known machine name to `query`, by fuzzy score
pub fn suggest<'a>(query: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    use fuzzy_matcher::skim::SkimMatcherV2;
    use fuzzy_matcher::FuzzyMatcher;

    let matcher = SkimMatcherV2::default();
    let mut best: Option<(i64, &str)> = None;
    for candidate in candidates {
        if let Some(score) = matcher.fuzzy_match(candidate, query) {
            if best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
    }
    best.map(|(_, candidate)| candidate)
}

/// Resolve requested kind names (display or machine names) to machine names.
///
/// Every unknown name is reported, each with the nearest known name when
/// one is close enough.
pub fn select_kinds(kinds: &[Kind], requested: &[String]) -> Result<Vec<String>, KindErrors> {
    let mut selected = Vec::new();
    let mut errors = KindErrors::new();

    for name in requested {
        let wanted = machine_name(name).unwrap_or_else(|_| name.to_ascii_lowercase());
        if kinds.iter().any(|k| k.machine_name() == wanted) {
            if !selected.contains(&wanted) {
                selected.push(wanted);
            }
            continue;
        }

        let hint = suggest(&wanted, kinds.iter().map(Kind::machine_name))
            .map(|s| format!(", did you mean '{}'?", s))
            .unwrap_or_default();
        errors.push(KindError::UnknownKind {
            name: name.clone(),
            hint,
        });
    }

    if errors.is_empty() {
        Ok(selected)
    } else {
        Err(errors)
    }
}
