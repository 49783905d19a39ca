//! Output filesystem
//!
//! A virtual, conflict-checked set of generated files. Every path is claimed
//! by exactly one owner (the jenny that produced it). The set is committed to
//! disk with `write`, or compared against disk with `verify`.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use parking_lot::Mutex;
use similar::{ChangeTag, TextDiff};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ErrorList;
use crate::worker::{run_bounded, CancelToken};

// =============================================================================
// File
// =============================================================================

/// One generated file: a relative `/`-separated path, its bytes and the
/// identity of the generator that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub data: Vec<u8>,
    pub owner: String,
}

impl File {
    pub fn new(path: impl Into<String>, data: impl Into<Vec<u8>>, owner: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
            owner: owner.into(),
        }
    }

    /// Contents as text, replacing invalid UTF-8
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// File extension of the path, if any
    pub fn extension(&self) -> Option<&str> {
        let name = self.path.rsplit('/').next()?;
        name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

// =============================================================================
// Errors and findings
// =============================================================================

/// Structural errors raised while accumulating files
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("path conflict at '{path}': claimed by '{existing}' and '{incoming}'")]
    PathConflict {
        path: String,
        existing: String,
        incoming: String,
    },

    #[error("invalid output path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// One out-of-date file found by `verify`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyFinding {
    #[error("{path}: should exist but does not")]
    ShouldExistButDoesNot { path: String },

    #[error("{path}: content differs from generated output\n{diff}")]
    ContentMismatch { path: String, diff: String },

    #[error("{path}: could not be read: {reason}")]
    Unreadable { path: String, reason: String },
}

impl VerifyFinding {
    pub fn path(&self) -> &str {
        match self {
            VerifyFinding::ShouldExistButDoesNot { path }
            | VerifyFinding::ContentMismatch { path, .. }
            | VerifyFinding::Unreadable { path, .. } => path,
        }
    }
}

/// A file that could not be written
#[derive(Error, Debug)]
#[error("failed to write {path}: {source}")]
pub struct WriteFailure {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

pub type VerifyErrors = ErrorList<VerifyFinding>;
pub type WriteErrors = ErrorList<WriteFailure>;

/// Outcome of a successful `write`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Files written to disk
    pub written: usize,
    /// Files not attempted because the run was cancelled
    pub skipped: usize,
}

/// Canonical form of a relative output path: its normal components joined
/// by `/`, so `x/./y` and `x//y` key the same entry as `x/y`
pub(crate) fn normalize_path(path: &str) -> Result<String, FsError> {
    let invalid = |reason: &str| FsError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.starts_with('/') || Path::new(path).is_absolute() {
        return Err(invalid("must be relative"));
    }

    let mut segments = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().to_string()),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("must be relative")),
        }
    }
    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments.join("/"))
}

// =============================================================================
// OutputFs
// =============================================================================

/// Accumulated generator output, sorted by path
#[derive(Debug, Default)]
pub struct OutputFs {
    entries: Mutex<BTreeMap<String, File>>,
}

impl OutputFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `file.path` for `file.owner`.
    ///
    /// Re-adding a path from the same owner replaces the earlier content.
    /// The path is stored in normalized form.
    pub fn add(&self, mut file: File) -> Result<(), FsError> {
        file.path = normalize_path(&file.path)?;
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&file.path) {
            if existing.owner != file.owner {
                return Err(FsError::PathConflict {
                    path: file.path,
                    existing: existing.owner.clone(),
                    incoming: file.owner,
                });
            }
        }
        entries.insert(file.path.clone(), file);
        Ok(())
    }

    /// Add every file of `other`. On the first conflict nothing is applied.
    pub fn merge(&self, other: OutputFs) -> Result<(), FsError> {
        let incoming = other.entries.into_inner();
        let mut entries = self.entries.lock();

        for (path, file) in &incoming {
            if let Some(existing) = entries.get(path) {
                if existing.owner != file.owner {
                    return Err(FsError::PathConflict {
                        path: path.clone(),
                        existing: existing.owner.clone(),
                        incoming: file.owner.clone(),
                    });
                }
            }
        }

        entries.extend(incoming);
        Ok(())
    }

    /// Sorted snapshot of every entry
    pub fn files(&self) -> Vec<File> {
        self.entries.lock().values().cloned().collect()
    }

    /// Sorted list of claimed paths
    pub fn paths(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<File> {
        self.entries.lock().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Consume into the sorted list of files
    pub fn into_files(self) -> Vec<File> {
        self.entries.into_inner().into_values().collect()
    }

    /// Write every entry under `root` with at most `concurrency` writers.
    ///
    /// Writes are independent: one failure does not stop the others.
    /// Cancellation is checked between files.
    pub fn write(&self, root: &Path, concurrency: usize, cancel: &CancelToken) -> Result<WriteSummary, WriteErrors> {
        let snapshot = self.files();
        let results = run_bounded(&snapshot, concurrency, cancel, || (), |_, file| write_one(root, file));

        let mut summary = WriteSummary::default();
        let mut errors = WriteErrors::new();
        for result in results {
            match result {
                Some(Ok(())) => summary.written += 1,
                Some(Err(e)) => {
                    warn!(path = %e.path, "write failed: {}", e.source);
                    errors.push(e);
                }
                None => summary.skipped += 1,
            }
        }

        info!(
            root = %root.display(),
            written = summary.written,
            skipped = summary.skipped,
            failed = errors.len(),
            "wrote generated files"
        );
        if errors.is_empty() {
            Ok(summary)
        } else {
            Err(errors)
        }
    }

    /// Compare every entry against the file at the same path under `root`.
    ///
    /// Every finding is collected; nothing stops at the first mismatch.
    pub fn verify(&self, root: &Path) -> Result<(), VerifyErrors> {
        let entries = self.entries.lock();
        let mut findings = VerifyErrors::new();

        for (path, file) in entries.iter() {
            let on_disk = root.join(path);
            match std::fs::read(&on_disk) {
                Ok(existing) if existing == file.data => {
                    debug!(path = %path, "up to date");
                }
                Ok(existing) => findings.push(VerifyFinding::ContentMismatch {
                    path: path.clone(),
                    diff: render_diff(&String::from_utf8_lossy(&existing), &file.text()),
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    findings.push(VerifyFinding::ShouldExistButDoesNot { path: path.clone() })
                }
                Err(e) => findings.push(VerifyFinding::Unreadable {
                    path: path.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            root = %root.display(),
            checked = entries.len(),
            stale = findings.len(),
            "verified generated files"
        );
        if findings.is_empty() {
            Ok(())
        } else {
            Err(findings)
        }
    }
}

fn write_one(root: &Path, file: &File) -> Result<(), WriteFailure> {
    let target = root.join(&file.path);
    let fail = |source: std::io::Error| WriteFailure {
        path: file.path.clone(),
        source,
    };
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    std::fs::write(&target, &file.data).map_err(fail)?;
    debug!(path = %file.path, owner = %file.owner, bytes = file.data.len(), "wrote file");
    Ok(())
}

/// Line diff from the on-disk content to the generated content
fn render_diff(on_disk: &str, generated: &str) -> String {
    let diff = TextDiff::from_lines(on_disk, generated);
    let mut out = String::from("--- on disk\n+++ generated\n");
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => continue,
        };
        out.push(sign);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_conflicting_owners() {
        let fs = OutputFs::new();
        fs.add(File::new("x/y.out", "a", "first")).unwrap();
        let err = fs.add(File::new("x/y.out", "b", "second")).unwrap_err();
        assert_eq!(
            err,
            FsError::PathConflict {
                path: "x/y.out".into(),
                existing: "first".into(),
                incoming: "second".into(),
            }
        );
        assert_eq!(fs.get("x/y.out").unwrap().data, b"a");
    }

    #[test]
    fn test_same_owner_replaces() {
        let fs = OutputFs::new();
        fs.add(File::new("a.txt", "1", "j")).unwrap();
        fs.add(File::new("a.txt", "2", "j")).unwrap();
        assert_eq!(fs.len(), 1);
        assert_eq!(fs.get("a.txt").unwrap().data, b"2");
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let fs = OutputFs::new();
        fs.add(File::new("shared.txt", "mine", "a")).unwrap();

        let other = OutputFs::new();
        other.add(File::new("aaa.txt", "new", "b")).unwrap();
        other.add(File::new("shared.txt", "theirs", "b")).unwrap();

        assert!(matches!(fs.merge(other), Err(FsError::PathConflict { .. })));
        assert_eq!(fs.paths(), vec!["shared.txt".to_string()]);
    }

    #[test]
    fn test_invalid_paths() {
        let fs = OutputFs::new();
        assert!(matches!(fs.add(File::new("/etc/passwd", "", "j")), Err(FsError::InvalidPath { .. })));
        assert!(matches!(fs.add(File::new("../up.txt", "", "j")), Err(FsError::InvalidPath { .. })));
        assert!(matches!(fs.add(File::new("", "", "j")), Err(FsError::InvalidPath { .. })));
        assert!(matches!(fs.add(File::new("./.", "", "j")), Err(FsError::InvalidPath { .. })));
    }

    #[test]
    fn test_equivalent_spellings_share_one_entry() {
        let fs = OutputFs::new();
        fs.add(File::new("x/y.out", "a", "first")).unwrap();

        for spelling in ["x/./y.out", "x//y.out", "./x/y.out"] {
            let err = fs.add(File::new(spelling, "b", "second")).unwrap_err();
            assert!(matches!(err, FsError::PathConflict { ref path, .. } if path == "x/y.out"));
        }
        assert_eq!(fs.len(), 1);

        fs.add(File::new("x/./y.out", "c", "first")).unwrap();
        assert_eq!(fs.paths(), vec!["x/y.out".to_string()]);
        assert_eq!(fs.get("x/y.out").unwrap().data, b"c");
    }

    #[test]
    fn test_files_are_sorted() {
        let fs = OutputFs::new();
        fs.add(File::new("b/z.txt", "", "j")).unwrap();
        fs.add(File::new("a/z.txt", "", "j")).unwrap();
        fs.add(File::new("a/a.txt", "", "j")).unwrap();
        let paths: Vec<String> = fs.files().into_iter().map(|f| f.path).collect();
        assert_eq!(paths, vec!["a/a.txt", "a/z.txt", "b/z.txt"]);
    }

    #[test]
    fn test_write_then_verify() {
        let tmp = tempdir().unwrap();
        let fs = OutputFs::new();
        for i in 0..30 {
            fs.add(File::new(format!("dir{}/file{}.txt", i % 4, i), format!("content {}\n", i), "j"))
                .unwrap();
        }
        let summary = fs.write(tmp.path(), 12, &CancelToken::new()).unwrap();
        assert_eq!(summary.written, 30);
        assert!(fs.verify(tmp.path()).is_ok());
    }

    #[test]
    fn test_verify_collects_every_finding() {
        let tmp = tempdir().unwrap();
        let fs = OutputFs::new();
        fs.add(File::new("same.txt", "same\n", "j")).unwrap();
        fs.add(File::new("stale.txt", "new line\n", "j")).unwrap();
        fs.add(File::new("missing.txt", "x", "j")).unwrap();
        std::fs::write(tmp.path().join("same.txt"), "same\n").unwrap();
        std::fs::write(tmp.path().join("stale.txt"), "old line\n").unwrap();

        let findings = fs.verify(tmp.path()).unwrap_err().into_vec();
        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[0],
            VerifyFinding::ShouldExistButDoesNot {
                path: "missing.txt".into()
            }
        );
        match &findings[1] {
            VerifyFinding::ContentMismatch { path, diff } => {
                assert_eq!(path, "stale.txt");
                assert!(diff.contains("-old line"));
                assert!(diff.contains("+new line"));
            }
            other => panic!("unexpected finding: {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_write_skips_everything() {
        let tmp = tempdir().unwrap();
        let fs = OutputFs::new();
        fs.add(File::new("a.txt", "a", "j")).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = fs.write(tmp.path(), 2, &cancel).unwrap();
        assert_eq!(summary, WriteSummary { written: 0, skipped: 1 });
        assert!(!tmp.path().join("a.txt").exists());
    }

    #[test]
    fn test_extension() {
        assert_eq!(File::new("ts/a/b.gen.ts", "", "j").extension(), Some("ts"));
        assert_eq!(File::new("Makefile", "", "j").extension(), None);
    }
}
