//! kindgen
//!
//! Versioned kind declarations with append-only compatibility rules, and a
//! composable pipeline that expands them into code for several languages.
//!
//! ## Features
//!
//! - **Lineages**: every kind carries an ordered, immutable history of schemas
//! - **Compatibility Checking**: stable kinds may only be extended, never rewritten
//! - **Published Releases**: semver-named release directories with SHA256 checksums
//! - **Code Generation**: Rust, TypeScript, JSON Schema and CRD output from one source
//! - **Plugins**: plugin trees contribute composable kinds through named slots
//!
//! ## Layout
//!
//! ```text
//! kinds/
//! ├── dashboard/
//! │   └── dashboard.json
//! └── svg/
//!     └── svg.json
//! plugins/
//! └── piechart/
//!     ├── plugin.json
//!     └── models.json
//! published/
//! ├── 1.2.0/
//! │   ├── core/dashboard.json
//! │   ├── composable/piechartpanelcfg.json
//! │   └── checksums.sha256
//! └── 1.10.0/
//! ```

pub mod bind;
pub mod checksum;
pub mod codegen;
pub mod compat;
pub mod config;
pub mod error;
pub mod kind;
pub mod lineage;
pub mod maturity;
pub mod plugin;
pub mod registry;
pub mod version;
pub mod worker;

pub use bind::{bind_kind, load_kinds};
pub use checksum::Checksum;
pub use codegen::{File, OutputFs, Pipeline, Unit};
pub use compat::CompatibilityChecker;
pub use config::KindgenConfig;
pub use error::{CodegenError, CompatError, KindError, PluginError, RegistryError, Result};
pub use kind::{Category, Kind};
pub use lineage::{JsonSchemaEngine, Lineage, Schema, SchemaEngine};
pub use maturity::{KindStatus, Maturity};
pub use registry::PublishedRegistry;
pub use version::{ReleaseVersion, SyntacticVersion};
pub use worker::CancelToken;
