//! Config file discovery, loading, and environment variable overlay.

use crate::{CompingConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// A CLI path replaces the local `./comping.toml` and is returned even when
/// missing, so loading it reports the error instead of silently skipping.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/comping/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("comping/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        files.push(path.to_path_buf());
        return files;
    }

    let local = PathBuf::from("comping.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file as a raw table.
pub fn load_from_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load `files` in order, later keys overriding earlier ones.
pub fn load_files(files: &[PathBuf]) -> Result<(CompingConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = load_from_file(path)?;
        // Each file must be valid on its own.
        parse_table(table.clone(), path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let origin = files.last().map(PathBuf::as_path).unwrap_or(Path::new("<defaults>"));
    let config = parse_table(merged, origin)?;
    Ok((config, sources))
}

fn parse_table(table: toml::Table, path: &Path) -> Result<CompingConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`; nested tables merge key by key.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply `COMPING_*` environment variable overrides to config.
pub fn apply_env_overrides(config: &mut CompingConfig, sources: &mut ConfigSources) {
    apply_overrides_with(config, sources, |key| env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an injectable variable lookup.
///
/// Values that do not parse are ignored.
pub fn apply_overrides_with(
    config: &mut CompingConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("COMPING_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("COMPING_LOG_LEVEL".to_string());
    }

    if let Some(Ok(v)) = lookup("COMPING_MAX_EIGHTHS").map(|v| v.parse::<u32>()) {
        config.pipeline.max_eighths = v;
        sources.env_overrides.push("COMPING_MAX_EIGHTHS".to_string());
    }
    if let Some(Ok(v)) = lookup("COMPING_TRIM_MAX_EIGHTHS").map(|v| v.parse::<u32>()) {
        config.pipeline.trim_max_eighths = v;
        sources.env_overrides.push("COMPING_TRIM_MAX_EIGHTHS".to_string());
    }

    if let Some(Ok(v)) = lookup("COMPING_WINDOW_EIGHTHS").map(|v| v.parse::<u64>()) {
        config.reference.window_eighths = v;
        sources.env_overrides.push("COMPING_WINDOW_EIGHTHS".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_discovered_files_exist() {
        assert!(discover_config_files().iter().all(|path| path.exists()));
    }

    #[test]
    fn test_cli_path_is_kept_even_if_missing() {
        let missing = Path::new("/nonexistent/comping.toml");
        let files = discover_config_files_with_override(Some(missing));
        assert_eq!(files.last().map(PathBuf::as_path), Some(missing));
    }

    #[test]
    fn test_merge_is_key_by_key() {
        let mut base: toml::Table = "[pipeline]\nmax_eighths = 5\ntrim_max_eighths = 6\n"
            .parse()
            .unwrap();
        let overlay: toml::Table = "[pipeline]\nmax_eighths = 2\n[telemetry]\nlog_level = \"warn\"\n"
            .parse()
            .unwrap();

        merge_tables(&mut base, overlay);

        let pipeline = base["pipeline"].as_table().unwrap();
        assert_eq!(pipeline["max_eighths"].as_integer(), Some(2));
        assert_eq!(pipeline["trim_max_eighths"].as_integer(), Some(6));
        assert_eq!(base["telemetry"]["log_level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("COMPING_LOG_LEVEL", "debug"),
            ("COMPING_MAX_EIGHTHS", "2"),
            ("COMPING_TRIM_MAX_EIGHTHS", "nope"),
            ("COMPING_WINDOW_EIGHTHS", "16"),
        ]
        .into_iter()
        .collect();

        let mut config = CompingConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_with(&mut config, &mut sources, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.pipeline.max_eighths, 2);
        assert_eq!(config.pipeline.trim_max_eighths, 4);
        assert_eq!(config.reference.window_eighths, 16);
        assert_eq!(
            sources.env_overrides,
            vec!["COMPING_LOG_LEVEL", "COMPING_MAX_EIGHTHS", "COMPING_WINDOW_EIGHTHS"]
        );
    }

    #[test]
    fn test_load_no_files_is_defaults() {
        let (config, sources) = load_files(&[]).unwrap();
        assert_eq!(config, CompingConfig::default());
        assert!(sources.files.is_empty());
    }
}
