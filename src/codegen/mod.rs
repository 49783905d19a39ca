//! Code Generation
//!
//! Generates files from bound kinds through composable generator units
//! ("jennies").
//!
//! Architecture:
//! - Jenny traits: `OneToOne`, `OneToMany`, `ManyToOne`, differing only in arity
//! - Unit: closed sum over the three shapes, the element of a pipeline
//! - Pipeline: ordered units plus postprocessors, producing an `OutputFs`
//! - OutputFs: conflict-checked virtual file set, written or verified as a whole
//!
//! The key constraint: jennies are pure. They read kinds and return files;
//! only the output filesystem ever touches disk.

pub mod fs;
pub mod jennies;
pub mod names;
pub mod postprocess;
pub mod shape;

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, info};

use crate::error::CodegenError;
use crate::kind::Kind;
use crate::worker::CancelToken;

pub use fs::{File, FsError, OutputFs, VerifyErrors, VerifyFinding, WriteErrors, WriteSummary};
pub use postprocess::Postprocessor;

// =============================================================================
// Jenny shapes
// =============================================================================

/// Common identity of every generator unit
pub trait Jenny: Send + Sync {
    /// Unique name within a pipeline; owns every path the jenny produces
    fn name(&self) -> &str;
}

/// One kind in, zero or one file out.
///
/// `Ok(None)` means "nothing to generate for this kind", not an error.
pub trait OneToOne: Jenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>>;
}

/// One kind in, any number of files out
pub trait OneToMany: Jenny {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Vec<File>>;
}

/// Every kind of the batch in, zero or one aggregate file out
pub trait ManyToOne: Jenny {
    fn generate(&self, kinds: &[Kind]) -> anyhow::Result<Option<File>>;
}

/// A generator unit of a pipeline
pub enum Unit {
    OneToOne(Box<dyn OneToOne>),
    OneToMany(Box<dyn OneToMany>),
    ManyToOne(Box<dyn ManyToOne>),
}

impl Unit {
    pub fn one_to_one(jenny: impl OneToOne + 'static) -> Self {
        Unit::OneToOne(Box::new(jenny))
    }

    pub fn one_to_many(jenny: impl OneToMany + 'static) -> Self {
        Unit::OneToMany(Box::new(jenny))
    }

    pub fn many_to_one(jenny: impl ManyToOne + 'static) -> Self {
        Unit::ManyToOne(Box::new(jenny))
    }

    pub fn name(&self) -> &str {
        match self {
            Unit::OneToOne(j) => j.name(),
            Unit::OneToMany(j) => j.name(),
            Unit::ManyToOne(j) => j.name(),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Unit::OneToOne(_) => "one-to-one",
            Unit::OneToMany(_) => "one-to-many",
            Unit::ManyToOne(_) => "many-to-one",
        }
    }
}

// =============================================================================
// Adapters
// =============================================================================

/// Restricts a per-kind jenny to the kinds matching a predicate
pub struct Filtered<J> {
    inner: J,
    name: String,
    predicate: Box<dyn Fn(&Kind) -> bool + Send + Sync>,
}

impl<J: Jenny> Filtered<J> {
    pub fn new(inner: J, predicate: impl Fn(&Kind) -> bool + Send + Sync + 'static) -> Self {
        let name = inner.name().to_string();
        Self {
            inner,
            name,
            predicate: Box::new(predicate),
        }
    }

    /// Rename the filtered unit, so one jenny can appear twice with
    /// different filters
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<J: Jenny> Jenny for Filtered<J> {
    fn name(&self) -> &str {
        &self.name
    }
}

impl<J: OneToOne> OneToOne for Filtered<J> {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>> {
        if (self.predicate)(kind) {
            self.inner.generate(kind)
        } else {
            Ok(None)
        }
    }
}

impl<J: OneToMany> OneToMany for Filtered<J> {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Vec<File>> {
        if (self.predicate)(kind) {
            self.inner.generate(kind)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Lifts a one-to-one jenny into a one-to-many jenny
pub struct Lifted<J>(pub J);

impl<J: Jenny> Jenny for Lifted<J> {
    fn name(&self) -> &str {
        self.0.name()
    }
}

impl<J: OneToOne> OneToMany for Lifted<J> {
    fn generate(&self, kind: &Kind) -> anyhow::Result<Vec<File>> {
        Ok(self.0.generate(kind)?.into_iter().collect())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Label used in errors raised by aggregate units
const ALL_KINDS: &str = "<all kinds>";

/// An ordered list of generator units plus postprocessors
pub struct Pipeline {
    name: String,
    units: Vec<Unit>,
    postprocessors: Vec<Postprocessor>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: Vec::new(),
            postprocessors: Vec::new(),
        }
    }

    pub fn append(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    /// Add a file transform applied, in order, to every generated file
    pub fn with_postprocessor(mut self, postprocessor: Postprocessor) -> Self {
        self.postprocessors.push(postprocessor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_names(&self) -> Vec<&str> {
        self.units.iter().map(Unit::name).collect()
    }

    /// Run every unit over every kind
    pub fn generate(&self, kinds: &[Kind], cancel: &CancelToken) -> Result<OutputFs, CodegenError> {
        self.generate_scoped(kinds, None, cancel)
    }

    /// Run the pipeline with per-kind units restricted to the kinds whose
    /// machine names are in `scope`. Aggregate units always see every kind,
    /// so scoped output stays identical to the unscoped output's subset.
    pub fn generate_scoped(
        &self,
        kinds: &[Kind],
        scope: Option<&[String]>,
        cancel: &CancelToken,
    ) -> Result<OutputFs, CodegenError> {
        self.check_unique_names()?;

        let in_scope: Vec<&Kind> = kinds
            .iter()
            .filter(|k| scope.map_or(true, |s| s.iter().any(|name| name == k.machine_name())))
            .collect();

        let total = OutputFs::new();
        for unit in &self.units {
            if cancel.is_cancelled() {
                return Err(CodegenError::Cancelled(unit.name().to_string()));
            }

            let files = self.run_unit(unit, kinds, &in_scope)?;
            let produced = files.len();

            // Every file of a unit shares one owner; repeats are caught here.
            let unit_fs = OutputFs::new();
            let mut claimed: HashMap<String, &str> = HashMap::new();
            for (source, file) in files {
                let file = self.postprocess(File {
                    owner: unit.name().to_string(),
                    ..file
                })?;
                let key = fs::normalize_path(&file.path)?;
                if let Some(previous) = claimed.insert(key.clone(), source) {
                    return Err(CodegenError::Fs(FsError::PathConflict {
                        path: key,
                        existing: format!("{} for '{}'", unit.name(), previous),
                        incoming: format!("{} for '{}'", unit.name(), source),
                    }));
                }
                unit_fs.add(file)?;
            }
            total.merge(unit_fs)?;

            debug!(
                pipeline = %self.name,
                jenny = unit.name(),
                shape = unit.shape(),
                files = produced,
                "jenny finished"
            );
        }

        info!(pipeline = %self.name, kinds = in_scope.len(), files = total.len(), "generated");
        Ok(total)
    }

    fn check_unique_names(&self) -> Result<(), CodegenError> {
        let mut seen = HashSet::new();
        for unit in &self.units {
            if !seen.insert(unit.name()) {
                return Err(CodegenError::DuplicateJenny {
                    pipeline: self.name.clone(),
                    jenny: unit.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Files of one unit, each paired with the name of the kind it came from
    fn run_unit<'k>(
        &self,
        unit: &Unit,
        all: &[Kind],
        in_scope: &[&'k Kind],
    ) -> Result<Vec<(&'k str, File)>, CodegenError> {
        let mut files = Vec::new();
        match unit {
            Unit::OneToOne(jenny) => {
                for kind in in_scope {
                    if let Some(file) = guarded(jenny.name(), kind.name(), || jenny.generate(kind))? {
                        files.push((kind.name(), file));
                    }
                }
            }
            Unit::OneToMany(jenny) => {
                for kind in in_scope {
                    let generated = guarded(jenny.name(), kind.name(), || jenny.generate(kind))?;
                    files.extend(generated.into_iter().map(|file| (kind.name(), file)));
                }
            }
            Unit::ManyToOne(jenny) => {
                if let Some(file) = guarded(jenny.name(), ALL_KINDS, || jenny.generate(all))? {
                    files.push((ALL_KINDS, file));
                }
            }
        }
        Ok(files)
    }

    fn postprocess(&self, mut file: File) -> Result<File, CodegenError> {
        for postprocessor in &self.postprocessors {
            let path = file.path.clone();
            file = postprocessor(file).map_err(|source| CodegenError::Postprocess { path, source })?;
        }
        Ok(file)
    }
}

/// Run one jenny invocation, turning errors and panics into `CodegenError`
fn guarded<T>(jenny: &str, kind: &str, f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, CodegenError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(out)) => Ok(out),
        Ok(Err(source)) => Err(CodegenError::Jenny {
            jenny: jenny.to_string(),
            kind: kind.to_string(),
            source,
        }),
        Err(_) => Err(CodegenError::Panicked {
            jenny: jenny.to_string(),
            kind: kind.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind_kind;
    use crate::lineage::JsonSchemaEngine;
    use serde_json::json;

    struct Fixed {
        name: &'static str,
        path: &'static str,
    }

    impl Jenny for Fixed {
        fn name(&self) -> &str {
            self.name
        }
    }

    impl OneToOne for Fixed {
        fn generate(&self, kind: &Kind) -> anyhow::Result<Option<File>> {
            Ok(Some(File::new(self.path.replace("{}", kind.machine_name()), kind.name(), self.name)))
        }
    }

    struct Failing;

    impl Jenny for Failing {
        fn name(&self) -> &str {
            "failing"
        }
    }

    impl OneToOne for Failing {
        fn generate(&self, _kind: &Kind) -> anyhow::Result<Option<File>> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    impl Jenny for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
    }

    impl ManyToOne for Panicking {
        fn generate(&self, _kinds: &[Kind]) -> anyhow::Result<Option<File>> {
            panic!("jenny bug")
        }
    }

    fn kinds() -> Vec<Kind> {
        let engine = JsonSchemaEngine::new();
        ["Widget", "Gadget"]
            .iter()
            .map(|name| {
                let doc = json!({
                    "name": name,
                    "maturity": "committed",
                    "group": "ext.example.io",
                    "lineage": {"schemas": [{"version": [0, 0], "schema": {"type": "object"}}]}
                });
                bind_kind(&engine, doc.to_string().as_bytes(), name).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_one_to_one_per_kind() {
        let pipeline = Pipeline::new("test").append(Unit::one_to_one(Fixed {
            name: "fixed",
            path: "out/{}.txt",
        }));
        let fs = pipeline.generate(&kinds(), &CancelToken::new()).unwrap();
        assert_eq!(fs.paths(), vec!["out/gadget.txt", "out/widget.txt"]);
        assert_eq!(fs.get("out/widget.txt").unwrap().owner, "fixed");
    }

    #[test]
    fn test_two_units_same_path_conflict() {
        let pipeline = Pipeline::new("test")
            .append(Unit::one_to_one(Fixed { name: "a", path: "x/y.out" }))
            .append(Unit::one_to_one(Fixed { name: "b", path: "x/y.out" }));
        let err = pipeline.generate(&kinds()[..1], &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CodegenError::Fs(FsError::PathConflict { .. })));
    }

    #[test]
    fn test_one_unit_same_path_for_two_kinds_conflicts() {
        let pipeline = Pipeline::new("test").append(Unit::one_to_one(Fixed { name: "a", path: "x/./y.out" }));
        let err = pipeline.generate(&kinds(), &CancelToken::new()).unwrap_err();
        let CodegenError::Fs(FsError::PathConflict { path, existing, incoming }) = err else {
            panic!("expected a path conflict");
        };
        assert_eq!(path, "x/y.out");
        assert!(existing.contains("Widget"));
        assert!(incoming.contains("Gadget"));
    }

    #[test]
    fn test_duplicate_unit_names() {
        let pipeline = Pipeline::new("test")
            .append(Unit::one_to_one(Fixed { name: "a", path: "1/{}" }))
            .append(Unit::one_to_one(Fixed { name: "a", path: "2/{}" }));
        assert!(matches!(
            pipeline.generate(&kinds(), &CancelToken::new()),
            Err(CodegenError::DuplicateJenny { .. })
        ));
    }

    #[test]
    fn test_errors_name_jenny_and_kind() {
        let pipeline = Pipeline::new("test").append(Unit::one_to_one(Failing));
        let err = pipeline.generate(&kinds(), &CancelToken::new()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failing"));
        assert!(msg.contains("Widget"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_panics_are_caught() {
        let pipeline = Pipeline::new("test").append(Unit::many_to_one(Panicking));
        let err = pipeline.generate(&kinds(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CodegenError::Panicked { .. }));
    }

    #[test]
    fn test_filtered_and_lifted() {
        let only_widget = Filtered::new(
            Fixed {
                name: "fixed",
                path: "f/{}.txt",
            },
            |k| k.machine_name() == "widget",
        );
        let pipeline = Pipeline::new("test")
            .append(Unit::one_to_many(Lifted(only_widget)))
            .append(Unit::one_to_many(Lifted(Fixed {
                name: "all",
                path: "all/{}.txt",
            })));
        let fs = pipeline.generate(&kinds(), &CancelToken::new()).unwrap();
        assert_eq!(fs.paths(), vec!["all/gadget.txt", "all/widget.txt", "f/widget.txt"]);
    }

    #[test]
    fn test_scoped_generation() {
        let pipeline = Pipeline::new("test").append(Unit::one_to_one(Fixed {
            name: "fixed",
            path: "out/{}.txt",
        }));
        let scope = vec!["gadget".to_string()];
        let fs = pipeline
            .generate_scoped(&kinds(), Some(scope.as_slice()), &CancelToken::new())
            .unwrap();
        assert_eq!(fs.paths(), vec!["out/gadget.txt"]);
    }

    #[test]
    fn test_cancel_between_units() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let pipeline = Pipeline::new("test").append(Unit::one_to_one(Fixed {
            name: "fixed",
            path: "out/{}.txt",
        }));
        assert!(matches!(
            pipeline.generate(&kinds(), &cancel),
            Err(CodegenError::Cancelled(_))
        ));
    }

    #[test]
    fn test_postprocessors_apply_in_order() {
        let pipeline = Pipeline::new("test")
            .append(Unit::one_to_one(Fixed {
                name: "fixed",
                path: "out/{}.txt",
            }))
            .with_postprocessor(postprocess::prefix_path("gen"))
            .with_postprocessor(postprocess::ensure_trailing_newline());
        let fs = pipeline.generate(&kinds()[..1], &CancelToken::new()).unwrap();
        assert_eq!(fs.get("gen/out/widget.txt").unwrap().data, b"Widget\n");
    }

    #[test]
    fn test_idempotent() {
        let pipeline = Pipeline::new("test").append(Unit::one_to_one(Fixed {
            name: "fixed",
            path: "out/{}.txt",
        }));
        let a = pipeline.generate(&kinds(), &CancelToken::new()).unwrap().into_files();
        let b = pipeline.generate(&kinds(), &CancelToken::new()).unwrap().into_files();
        assert_eq!(a, b);
    }
}
