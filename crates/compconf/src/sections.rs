//! Config sections, one per `[table]` in the TOML file.

use serde::{Deserialize, Serialize};

/// Normalization stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Length cap for every note, in eighths.
    /// Default: 3
    #[serde(default = "PipelineConfig::default_max_eighths")]
    pub max_eighths: u32,

    /// Hard cap used when trimming outlier notes, in eighths.
    /// Default: 4
    #[serde(default = "PipelineConfig::default_trim_max_eighths")]
    pub trim_max_eighths: u32,

    /// Default: true
    #[serde(default = "default_true")]
    pub limit_lengths: bool,

    /// Default: true
    #[serde(default = "default_true")]
    pub trim_outliers: bool,
}

impl PipelineConfig {
    fn default_max_eighths() -> u32 {
        3
    }

    fn default_trim_max_eighths() -> u32 {
        4
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_eighths: Self::default_max_eighths(),
            trim_max_eighths: Self::default_trim_max_eighths(),
            limit_lengths: true,
            trim_outliers: true,
        }
    }
}

/// Reference windowing and window selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Window length for soloing references, in eighths.
    /// Default: 32
    #[serde(default = "ReferenceConfig::default_window_eighths")]
    pub window_eighths: u64,

    /// Window length for salsa references, in eighths.
    /// Default: 16
    #[serde(default = "ReferenceConfig::default_salsa_window_eighths")]
    pub salsa_window_eighths: u64,

    /// How many recent picks per key the history policy avoids.
    /// Default: 4
    #[serde(default = "ReferenceConfig::default_history_depth")]
    pub history_depth: usize,

    /// Seed for window selection; unset means a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ReferenceConfig {
    fn default_window_eighths() -> u64 {
        32
    }

    fn default_salsa_window_eighths() -> u64 {
        16
    }

    fn default_history_depth() -> usize {
        4
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            window_eighths: Self::default_window_eighths(),
            salsa_window_eighths: Self::default_salsa_window_eighths(),
            history_depth: Self::default_history_depth(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_eighths, 3);
        assert_eq!(config.trim_max_eighths, 4);
        assert!(config.limit_lengths && config.trim_outliers);
    }

    #[test]
    fn test_reference_defaults() {
        let config = ReferenceConfig::default();
        assert_eq!(config.window_eighths, 32);
        assert_eq!(config.salsa_window_eighths, 16);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_partial_table_keeps_defaults() {
        let config: PipelineConfig = toml::from_str("trim_outliers = false").unwrap();
        assert_eq!(config.max_eighths, 3);
        assert!(config.limit_lengths);
        assert!(!config.trim_outliers);
    }
}
