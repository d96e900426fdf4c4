//! Configuration loading for the comping tools.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/comping/config.toml` (system)
//! 2. `~/.config/comping/config.toml` (user)
//! 3. `./comping.toml`, or the path given with `--config`
//! 4. Environment variables (`COMPING_*`)
//!
//! Later files only override the keys they set.
//!
//! # Example Config
//!
//! ```toml
//! [pipeline]
//! max_eighths = 3
//! trim_max_eighths = 4
//!
//! [reference]
//! window_eighths = 32
//! history_depth = 4
//! seed = 7
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{PipelineConfig, ReferenceConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompingConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub reference: ReferenceConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl CompingConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with `config_path` standing in for the local `./comping.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars were applied.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = loader::load_files(&files)?;
        loader::apply_env_overrides(&mut config, &mut sources);
        Ok((config, sources))
    }

    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Comping Configuration\n\n");

        output.push_str("[pipeline]\n");
        output.push_str(&format!("max_eighths = {}\n", self.pipeline.max_eighths));
        output.push_str(&format!(
            "trim_max_eighths = {}\n",
            self.pipeline.trim_max_eighths
        ));
        output.push_str(&format!("limit_lengths = {}\n", self.pipeline.limit_lengths));
        output.push_str(&format!("trim_outliers = {}\n", self.pipeline.trim_outliers));

        output.push_str("\n[reference]\n");
        output.push_str(&format!(
            "window_eighths = {}\n",
            self.reference.window_eighths
        ));
        output.push_str(&format!(
            "salsa_window_eighths = {}\n",
            self.reference.salsa_window_eighths
        ));
        output.push_str(&format!(
            "history_depth = {}\n",
            self.reference.history_depth
        ));
        if let Some(seed) = self.reference.seed {
            output.push_str(&format!("seed = {}\n", seed));
        }

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.telemetry.log_level
        ));

        output
    }
}
