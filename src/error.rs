//! Error types for kind loading, compatibility checking, publishing and codegen

use std::fmt;

use thiserror::Error;

use crate::codegen::fs::FsError;
use crate::compat::SchemaChange;
use crate::kind::Category;
use crate::maturity::Maturity;
use crate::version::SyntacticVersion;

/// Result type for kind operations
pub type Result<T> = std::result::Result<T, KindError>;

/// Errors raised while turning schema source into a bound kind.
///
/// These are fatal to the one kind they name, never to the whole run.
#[derive(Error, Debug)]
pub enum KindError {
    #[error("invalid schema for kind '{kind}': {reason}")]
    InvalidSchema { kind: String, reason: String },

    #[error("{origin}: not a kind: {reason}")]
    NotAKind { origin: String, reason: String },

    #[error("invalid kind name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("kind '{kind}' lives in directory '{dir}' but its machine name is '{machine_name}'")]
    DirectoryMismatch {
        kind: String,
        dir: String,
        machine_name: String,
    },

    #[error("kind '{kind}' is declared in '{file}' but its machine name is '{machine_name}'")]
    FileNameMismatch {
        kind: String,
        file: String,
        machine_name: String,
    },

    #[error("kinds '{first}' and '{second}' share the {field} '{value}'")]
    DuplicateName {
        first: String,
        second: String,
        field: &'static str,
        value: String,
    },

    #[error("unknown kind '{name}'{hint}")]
    UnknownKind { name: String, hint: String },

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl KindError {
    /// Name of the kind (or source location) this error is about
    pub fn subject(&self) -> &str {
        match self {
            KindError::InvalidSchema { kind, .. }
            | KindError::DirectoryMismatch { kind, .. }
            | KindError::FileNameMismatch { kind, .. } => kind,
            KindError::NotAKind { origin, .. } => origin,
            KindError::DuplicateName { second, .. } => second,
            KindError::InvalidName { name, .. } | KindError::UnknownKind { name, .. } => name,
            KindError::Io { path, .. } => path,
        }
    }
}

/// Errors reported by a schema engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("lineage has no schemas")]
    Empty,

    #[error("lineage must start at version 0.0, found {0}")]
    BadFirstVersion(SyntacticVersion),

    #[error("schema {next} cannot follow {prev}: a successor bumps the minor version or starts a new major at .0")]
    BadSuccessor {
        prev: SyntacticVersion,
        next: SyntacticVersion,
    },

    #[error("schema {version} is not a valid JSON Schema: {reason}")]
    Compile {
        version: SyntacticVersion,
        reason: String,
    },

    #[error("schema {version} is not backward compatible with {prev}: {changes}")]
    BreakingMinor {
        prev: SyntacticVersion,
        version: SyntacticVersion,
        changes: String,
    },

    #[error("grouped lineage schema {version} must declare top-level object properties ({reason})")]
    BadGroup {
        version: SyntacticVersion,
        reason: String,
    },

    #[error("no schema {0} in lineage")]
    NoSuchVersion(SyntacticVersion),

    #[error("instance does not validate against schema {version}: {reasons}")]
    Invalid {
        version: SyntacticVersion,
        reasons: String,
    },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Compatibility violations between a published kind and its candidate revision
#[derive(Error, Debug)]
pub enum CompatError {
    #[error("kind '{kind}': maturity regressed from {old} to {new}; maturity may never decrease once published")]
    MaturityRegression {
        kind: String,
        old: Maturity,
        new: Maturity,
    },

    #[error("kind '{kind}' is {maturity} and its published lineage may only be appended to: {reason}")]
    NonAppendOnlyChange {
        kind: String,
        maturity: Maturity,
        reason: String,
        changes: Vec<SchemaChange>,
    },

    #[error("cannot compare published kind '{old}' with candidate '{new}'")]
    NameMismatch { old: String, new: String },

    #[error("kind '{kind}' changed category from {old} to {new}")]
    CategoryChanged {
        kind: String,
        old: Category,
        new: Category,
    },
}

impl CompatError {
    /// Name of the kind this violation is about
    pub fn kind_name(&self) -> &str {
        match self {
            CompatError::MaturityRegression { kind, .. }
            | CompatError::NonAppendOnlyChange { kind, .. }
            | CompatError::CategoryChanged { kind, .. } => kind,
            CompatError::NameMismatch { new, .. } => new,
        }
    }

    /// Short identifier for the rule that was violated
    pub fn rule(&self) -> &'static str {
        match self {
            CompatError::MaturityRegression { .. } => "maturity-monotonic",
            CompatError::NonAppendOnlyChange { .. } => "append-only",
            CompatError::NameMismatch { .. } => "same-name",
            CompatError::CategoryChanged { .. } => "same-category",
        }
    }
}

/// Errors raised while reading from or writing to a published version directory
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no published {category} schema for '{name}' in version {version_dir}")]
    NotFound {
        name: String,
        category: String,
        version_dir: String,
    },

    #[error("version {0} is already published; published versions are immutable")]
    AlreadyPublished(String),

    #[error("invalid release version: {0}")]
    InvalidVersion(String),

    #[error("published schema for '{name}' is unreadable: {source}")]
    Kind {
        name: String,
        #[source]
        source: KindError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// Errors raised while running a generator pipeline.
///
/// All of these abort the run: the output is not trustworthy.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("jenny '{jenny}' failed for '{kind}': {source:#}")]
    Jenny {
        jenny: String,
        kind: String,
        source: anyhow::Error,
    },

    #[error("jenny '{jenny}' panicked while processing '{kind}'")]
    Panicked { jenny: String, kind: String },

    #[error("postprocessor failed on {path}: {source:#}")]
    Postprocess { path: String, source: anyhow::Error },

    #[error("pipeline '{pipeline}' contains two jennies named '{jenny}'")]
    DuplicateJenny { pipeline: String, jenny: String },

    #[error("generation cancelled before jenny '{0}'")]
    Cancelled(String),

    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Plugin contract violations; fatal to the plugin they name
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin '{plugin}' imports '{import}', which is not permitted (permitted: {permitted})")]
    DisallowedImport {
        plugin: String,
        import: String,
        permitted: String,
    },

    #[error("plugin '{plugin}' of type {plugin_type} must implement schema interface '{slot}'")]
    MissingRequiredImplementation {
        plugin: String,
        slot: String,
        plugin_type: String,
    },

    #[error("plugin '{plugin}' of type {plugin_type} may not implement schema interface '{slot}'")]
    ImplementationNotAllowed {
        plugin: String,
        slot: String,
        plugin_type: String,
    },

    #[error("plugin '{plugin}' declares unknown schema interface '{slot}'")]
    UnknownSlot { plugin: String, slot: String },

    #[error("plugin at {path} has an invalid manifest: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("plugin '{plugin}' has an invalid schema source: {reason}")]
    InvalidSource { plugin: String, reason: String },

    #[error("plugin '{plugin}': {source}")]
    Kind {
        plugin: String,
        #[source]
        source: KindError,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    /// Plugin id (or path, when the manifest could not be read)
    pub fn plugin(&self) -> &str {
        match self {
            PluginError::DisallowedImport { plugin, .. }
            | PluginError::MissingRequiredImplementation { plugin, .. }
            | PluginError::ImplementationNotAllowed { plugin, .. }
            | PluginError::UnknownSlot { plugin, .. }
            | PluginError::InvalidSource { plugin, .. }
            | PluginError::Kind { plugin, .. } => plugin,
            PluginError::InvalidManifest { path, .. } | PluginError::Io { path, .. } => path,
        }
    }
}

/// A batch of independent errors collected across a run
#[derive(Debug)]
pub struct ErrorList<E> {
    errors: Vec<E>,
}

impl<E> Default for ErrorList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ErrorList<E> {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, err: E) {
        self.errors.push(err);
    }

    pub fn extend(&mut self, errs: impl IntoIterator<Item = E>) {
        self.errors.extend(errs);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<E> {
        self.errors
    }
}

impl<E> IntoIterator for ErrorList<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<E: fmt::Display> fmt::Display for ErrorList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error(s):", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  - {}", err)?;
        }
        Ok(())
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for ErrorList<E> {}

/// Errors collected while loading a batch of kinds
pub type KindErrors = ErrorList<KindError>;

/// Errors collected while parsing a plugin tree
pub type PluginErrors = ErrorList<PluginError>;
