//! Configuration for kindgen
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (kindgen.toml, .kindgen.toml or config/kindgen.toml)
//! - The user config directory
//! - An explicit file
//! - Environment variables (KINDGEN__*, e.g. `KINDGEN__CODEGEN__CONCURRENCY=4`)
//!
//! ## Example config file (kindgen.toml):
//! ```toml
//! [paths]
//! kinds = "kinds"
//! plugins = "plugins"
//! output = "gen"
//! registry = "published"
//!
//! [codegen]
//! targets = ["rust", "typescript", "jsonschema", "crd", "raw", "registry", "report"]
//! concurrency = 12
//! header = "Code generated by kindgen. DO NOT EDIT."
//!
//! [report]
//! planned = ["Alerting", "Folder"]
//! ```

use std::path::{Path, PathBuf};

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::codegen::jennies::{PipelineOptions, Target, DEFAULT_HEADER};
use crate::worker::DEFAULT_CONCURRENCY;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KindgenConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub codegen: CodegenConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// Where inputs and outputs live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Kind declaration tree
    #[serde(default = "default_kinds_dir")]
    pub kinds: PathBuf,

    /// Plugin tree
    #[serde(default = "default_plugins_dir")]
    pub plugins: PathBuf,

    /// Root generated files are written to and verified against
    #[serde(default = "default_output_dir")]
    pub output: PathBuf,

    /// Published Version Directory
    #[serde(default = "default_registry_dir")]
    pub registry: PathBuf,
}

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    #[serde(default = "default_targets")]
    pub targets: Vec<Target>,

    /// Concurrent file writes and kind loads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Comment prepended to generated source files; empty disables it
    #[serde(default = "default_header")]
    pub header: String,
}

/// Status report settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Kinds that are planned but not yet declared
    #[serde(default)]
    pub planned: Vec<String>,
}

// Default value functions
fn default_kinds_dir() -> PathBuf {
    PathBuf::from("kinds")
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("gen")
}

fn default_registry_dir() -> PathBuf {
    PathBuf::from("published")
}

fn default_targets() -> Vec<Target> {
    Target::ALL.to_vec()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_header() -> String {
    DEFAULT_HEADER.to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds_dir(),
            plugins: default_plugins_dir(),
            output: default_output_dir(),
            registry: default_registry_dir(),
        }
    }
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            concurrency: default_concurrency(),
            header: default_header(),
        }
    }
}

impl KindgenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["kindgen.toml", ".kindgen.toml", "config/kindgen.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "kindgen", "kindgen") {
            let user_config = dirs.config_dir().join("kindgen.toml");
            if user_config.exists() {
                builder = builder.add_source(File::from(user_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("KINDGEN")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        if config.codegen.concurrency == 0 {
            return Err(ConfigError::Message("codegen.concurrency must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Options for the standard generation pipeline
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            targets: self.codegen.targets.clone(),
            planned: self.report.planned.clone(),
            header: Some(self.codegen.header.clone()).filter(|h| !h.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = KindgenConfig::default();
        assert_eq!(config.paths.kinds, PathBuf::from("kinds"));
        assert_eq!(config.codegen.concurrency, 12);
        assert_eq!(config.codegen.targets.len(), Target::ALL.len());
        assert_eq!(config.pipeline_options().header.as_deref(), Some(DEFAULT_HEADER));
    }

    #[test]
    fn test_serialize_config() {
        let toml_str = toml::to_string_pretty(&KindgenConfig::default()).unwrap();
        assert!(toml_str.contains("[paths]"));
        assert!(toml_str.contains("[codegen]"));
        assert!(toml_str.contains("\"typescript\""));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[paths]\nkinds = \"schemas/kinds\"\n\n[codegen]\ntargets = [\"rust\", \"crd\"]\nheader = \"\"\n\n[report]\nplanned = [\"Folder\"]\n",
        )
        .unwrap();

        let config = KindgenConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.paths.kinds, PathBuf::from("schemas/kinds"));
        assert_eq!(config.paths.output, PathBuf::from("gen"));

        let options = config.pipeline_options();
        assert_eq!(options.targets, vec![Target::Rust, Target::Crd]);
        assert_eq!(options.planned, vec!["Folder"]);
        assert!(options.header.is_none());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kindgen.toml");
        let mut config = KindgenConfig::default();
        config.codegen.concurrency = 3;
        config.save(&path).unwrap();

        let loaded = KindgenConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.codegen.concurrency, 3);
    }
}
