//! Published Version Directory
//!
//! Released kind schemas live in an append-only tree of semver-named
//! directories:
//!
//! ```text
//! <root>/<major>.<minor>.<patch>/<core|composable>/<machinename>.json
//! <root>/<major>.<minor>.<patch>/checksums.sha256
//! ```
//!
//! A missing root, version directory or kind file means "never published",
//! never an error. Published directories are immutable once written.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex::Regex;
use semver::Version;
use tracing::{debug, info, warn};

use crate::bind::bind_kind;
use crate::checksum::{checksum_listing, Checksum};
use crate::compat;
use crate::error::{CompatError, RegistryError};
use crate::kind::{Category, Kind};
use crate::lineage::SchemaEngine;
use crate::version::ReleaseVersion;

/// Name of the checksum listing inside each version directory
pub const CHECKSUMS_FILE: &str = "checksums.sha256";

/// Directory names recognized as releases; anything else is ignored
const VERSION_DIR_PATTERN: &str = r"^v?(\d+)\.(\d+)\.(\d+)$";

/// Subdirectory a kind is published under; raw kinds are never published
pub fn publish_category(category: Category) -> Option<&'static str> {
    match category {
        Category::Core | Category::Custom => Some("core"),
        Category::Composable => Some("composable"),
        Category::Raw => None,
    }
}

/// Parse a release directory name, or `None` when it is not one
fn parse_version_dir(pattern: &Regex, name: &str) -> Option<ReleaseVersion> {
    let caps = pattern.captures(name)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let version = Version::new(part(1)?, part(2)?, part(3)?);
    Some(ReleaseVersion {
        version,
        dir: Some(name.to_string()),
    })
}

/// Every release directory directly under `root`, oldest first.
/// A missing root yields an empty list.
pub fn release_dirs(root: &Path) -> Result<Vec<ReleaseVersion>, RegistryError> {
    let pattern = Regex::new(VERSION_DIR_PATTERN)?;

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(RegistryError::Io {
                path: root.display().to_string(),
                source,
            })
        }
    };

    let mut releases = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RegistryError::Io {
            path: root.display().to_string(),
            source,
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        match parse_version_dir(&pattern, &name) {
            Some(release) => releases.push(release),
            None => debug!(dir = %name, "ignoring non-release directory"),
        }
    }

    // Equal versions spelled differently ("1.0.0", "v1.0.0") order by name
    releases.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.dir_name().cmp(&b.dir_name())));
    Ok(releases)
}

/// Name of the newest release directory under `root`, compared as strict
/// semver. `None` means nothing has been published yet.
pub fn find_latest_dir(root: &Path) -> Result<Option<String>, RegistryError> {
    Ok(release_dirs(root)?.pop().map(|r| r.dir_name()))
}

// =============================================================================
// Reading
// =============================================================================

/// Outcome of checking a batch of kinds against the latest release
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Release compared against; `None` when nothing was published
    pub latest_dir: Option<String>,
    /// Kinds with a published predecessor that passed
    pub passed: Vec<String>,
    /// Kinds with no published predecessor
    pub unpublished: Vec<String>,
    pub violations: Vec<CompatError>,
    /// Published files that could not be read or bound
    pub errors: Vec<RegistryError>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty() && self.errors.is_empty()
    }
}

/// Read access to a Published Version Directory
#[derive(Debug, Clone)]
pub struct PublishedRegistry {
    root: PathBuf,
}

impl PublishedRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find_latest_dir(&self) -> Result<Option<String>, RegistryError> {
        find_latest_dir(&self.root)
    }

    /// Path of a published kind file
    pub fn kind_path(&self, machine_name: &str, category: &str, version_dir: &str) -> PathBuf {
        self.root
            .join(version_dir)
            .join(category)
            .join(format!("{}.json", machine_name))
    }

    /// Bytes of a published kind; `NotFound` when the release lacks it
    pub fn get_published(&self, machine_name: &str, category: &str, version_dir: &str) -> Result<Vec<u8>, RegistryError> {
        let path = self.kind_path(machine_name, category, version_dir);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RegistryError::NotFound {
                name: machine_name.to_string(),
                category: category.to_string(),
                version_dir: version_dir.to_string(),
            }),
            Err(source) => Err(RegistryError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// The published predecessor of `kind` in `version_dir`, bound with
    /// `engine`. `None` when the kind was never published there.
    pub fn load_published_kind<E: SchemaEngine + ?Sized>(
        &self,
        engine: &E,
        kind: &Kind,
        version_dir: &str,
    ) -> Result<Option<Kind>, RegistryError> {
        let Some(category) = publish_category(kind.category()) else {
            return Ok(None);
        };

        let bytes = match self.get_published(kind.machine_name(), category, version_dir) {
            Ok(bytes) => bytes,
            Err(RegistryError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let origin = self.kind_path(kind.machine_name(), category, version_dir);
        bind_kind(engine, &bytes, &origin.display().to_string())
            .map(Some)
            .map_err(|source| RegistryError::Kind {
                name: kind.name().to_string(),
                source,
            })
    }

    /// Check every kind against its predecessor in the latest release,
    /// collecting all violations instead of stopping at the first
    pub fn check_all<E: SchemaEngine + ?Sized>(&self, engine: &E, kinds: &[Kind]) -> Result<CheckReport, RegistryError> {
        let mut report = CheckReport {
            latest_dir: self.find_latest_dir()?,
            ..CheckReport::default()
        };

        let Some(latest) = report.latest_dir.clone() else {
            info!(root = %self.root.display(), "no published release; every kind is new");
            report.unpublished = kinds.iter().map(|k| k.name().to_string()).collect();
            return Ok(report);
        };

        for kind in kinds {
            let old = match self.load_published_kind(engine, kind, &latest) {
                Ok(old) => old,
                Err(e) => {
                    warn!(kind = kind.name(), error = %e, "unreadable published kind");
                    report.errors.push(e);
                    continue;
                }
            };

            match compat::check(engine, old.as_ref(), kind) {
                Ok(()) if old.is_none() => report.unpublished.push(kind.name().to_string()),
                Ok(()) => report.passed.push(kind.name().to_string()),
                Err(violation) => {
                    warn!(kind = kind.name(), rule = violation.rule(), "compatibility violation");
                    report.violations.push(violation);
                }
            }
        }

        info!(
            release = %latest,
            passed = report.passed.len(),
            new = report.unpublished.len(),
            violations = report.violations.len(),
            "checked kinds against published release"
        );
        Ok(report)
    }

    /// Paths in `version_dir` whose content no longer matches the
    /// checksum listing
    pub fn verify_checksums(&self, version_dir: &str) -> Result<Vec<String>, RegistryError> {
        let dir = self.root.join(version_dir);
        let listing_path = dir.join(CHECKSUMS_FILE);
        let listing = fs::read_to_string(&listing_path).map_err(|source| RegistryError::Io {
            path: listing_path.display().to_string(),
            source,
        })?;

        let mut mismatched = Vec::new();
        for line in listing.lines().filter(|l| !l.trim().is_empty()) {
            let Some((hash, path)) = line.split_once("  ") else {
                mismatched.push(line.to_string());
                continue;
            };
            let matches = fs::read(dir.join(path))
                .map(|data| Checksum::from_bytes(&data).as_str() == hash)
                .unwrap_or(false);
            if !matches {
                mismatched.push(path.to_string());
            }
        }
        Ok(mismatched)
    }
}

// =============================================================================
// Publishing
// =============================================================================

/// What `publish` wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub dir: PathBuf,
    /// Kind files relative to `dir`, sorted
    pub files: Vec<String>,
}

/// Write `kinds` as release `version` under `root`.
///
/// Refuses when any directory under `root` already names the same version.
/// Raw kinds are skipped.
pub fn publish(root: &Path, version: &ReleaseVersion, kinds: &[Kind]) -> Result<PublishSummary, RegistryError> {
    if release_dirs(root)?.iter().any(|r| r.version == version.version) || root.join(version.dir_name()).exists() {
        return Err(RegistryError::AlreadyPublished(version.version_string()));
    }

    let mut rendered: Vec<(String, Vec<u8>)> = Vec::new();
    for kind in kinds {
        let Some(category) = publish_category(kind.category()) else {
            debug!(kind = kind.name(), "raw kinds are not published");
            continue;
        };
        let mut data = serde_json::to_vec_pretty(&kind.to_decl())?;
        data.push(b'\n');
        rendered.push((format!("{}/{}.json", category, kind.machine_name()), data));
    }
    rendered.sort();

    let dir = root.join(version.dir_name());
    let io_err = |path: &Path| {
        let path = path.display().to_string();
        move |source: std::io::Error| RegistryError::Io { path, source }
    };

    for (rel, data) in &rendered {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(&path, data).map_err(io_err(&path))?;
    }

    let listing = checksum_listing(rendered.iter().map(|(rel, data)| (rel.as_str(), data.as_slice())));
    fs::create_dir_all(&dir).map_err(io_err(&dir))?;
    let listing_path = dir.join(CHECKSUMS_FILE);
    fs::write(&listing_path, listing).map_err(io_err(&listing_path))?;

    info!(release = %version, kinds = rendered.len(), dir = %dir.display(), "published release");
    Ok(PublishSummary {
        dir,
        files: rendered.into_iter().map(|(rel, _)| rel).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::JsonSchemaEngine;
    use serde_json::json;
    use tempfile::tempdir;

    fn widget(maturity: &str) -> Kind {
        let doc = json!({
            "name": "Widget",
            "maturity": maturity,
            "crd": {"group": "widget.example.io", "scope": "Namespaced"},
            "lineage": {"schemas": [{"version": [0, 0], "schema": {
                "type": "object",
                "properties": {"size": {"type": "integer"}}
            }}]}
        });
        bind_kind(&JsonSchemaEngine::new(), doc.to_string().as_bytes(), "widget").unwrap()
    }

    #[test]
    fn test_latest_dir_uses_semver() {
        let dir = tempdir().unwrap();
        for name in ["1.2.0", "1.10.0", "bogus", "v0.9.9"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("2.0.0"), "not a directory").unwrap();

        assert_eq!(find_latest_dir(dir.path()).unwrap(), Some("1.10.0".to_string()));
        let names: Vec<String> = release_dirs(dir.path()).unwrap().iter().map(|r| r.dir_name()).collect();
        assert_eq!(names, vec!["v0.9.9", "1.2.0", "1.10.0"]);
    }

    #[test]
    fn test_equal_versions_order_by_name() {
        let dir = tempdir().unwrap();
        for name in ["v1.0.0", "1.0.0", "0.1.0"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }

        let names: Vec<String> = release_dirs(dir.path()).unwrap().iter().map(|r| r.dir_name()).collect();
        assert_eq!(names, vec!["0.1.0", "1.0.0", "v1.0.0"]);
        assert_eq!(find_latest_dir(dir.path()).unwrap(), Some("v1.0.0".to_string()));
    }

    #[test]
    fn test_missing_root_is_unpublished() {
        let dir = tempdir().unwrap();
        assert_eq!(find_latest_dir(&dir.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn test_get_published_not_found() {
        let dir = tempdir().unwrap();
        let registry = PublishedRegistry::new(dir.path());
        assert!(matches!(
            registry.get_published("widget", "core", "1.0.0"),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(registry
            .load_published_kind(&JsonSchemaEngine::new(), &widget("stable"), "1.0.0")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_publish_then_load() {
        let dir = tempdir().unwrap();
        let version = ReleaseVersion::parse("1.0.0").unwrap();
        let summary = publish(dir.path(), &version, &[widget("stable")]).unwrap();
        assert_eq!(summary.files, vec!["core/widget.json"]);

        let registry = PublishedRegistry::new(dir.path());
        let loaded = registry
            .load_published_kind(&JsonSchemaEngine::new(), &widget("stable"), "1.0.0")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name(), "Widget");
        assert_eq!(loaded.category(), Category::Core);
        assert!(registry.verify_checksums("1.0.0").unwrap().is_empty());
    }

    #[test]
    fn test_publish_is_append_only() {
        let dir = tempdir().unwrap();
        publish(dir.path(), &ReleaseVersion::parse("1.0.0").unwrap(), &[widget("stable")]).unwrap();
        let again = publish(dir.path(), &ReleaseVersion::parse("v1.0.0").unwrap(), &[widget("stable")]);
        assert!(matches!(again, Err(RegistryError::AlreadyPublished(_))));
    }

    #[test]
    fn test_checksums_detect_tampering() {
        let dir = tempdir().unwrap();
        publish(dir.path(), &ReleaseVersion::parse("1.0.0").unwrap(), &[widget("stable")]).unwrap();
        fs::write(dir.path().join("1.0.0/core/widget.json"), "{}").unwrap();

        let registry = PublishedRegistry::new(dir.path());
        assert_eq!(registry.verify_checksums("1.0.0").unwrap(), vec!["core/widget.json"]);
    }

    #[test]
    fn test_check_all_reports_regressions() {
        let dir = tempdir().unwrap();
        publish(dir.path(), &ReleaseVersion::parse("1.0.0").unwrap(), &[widget("stable")]).unwrap();

        let registry = PublishedRegistry::new(dir.path());
        let engine = JsonSchemaEngine::new();

        let report = registry.check_all(&engine, &[widget("mature")]).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.passed, vec!["Widget"]);

        let report = registry.check_all(&engine, &[widget("committed")]).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.violations[0].rule(), "maturity-monotonic");
    }
}
