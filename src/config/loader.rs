//! Configuration loading and discovery for `quire.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{QuireConfig, CONFIG_FILE_NAME};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No project file between the start directory and the filesystem root
    #[error("Could not find {} in {} or any parent directory", CONFIG_FILE_NAME, .0.display())]
    NotFound(PathBuf),
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse quire.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Override source directory
    pub src: Option<PathBuf>,
    /// Override environment tag
    pub environment: Option<String>,
}

/// A loaded configuration together with the directory it was found in.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The parsed, validated configuration
    pub config: QuireConfig,
    /// Directory containing quire.toml
    pub project_root: PathBuf,
}

/// Find quire.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find quire.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Locate and load the project configuration.
///
/// With an explicit `path`, that file is loaded. Otherwise quire.toml is
/// searched for from `start` upwards. A missing project file is an error:
/// without it there is no project root.
pub fn load_project(path: Option<&Path>, start: &Path) -> Result<LoadedConfig, ConfigError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => find_config_from(start.to_path_buf())
            .ok_or_else(|| ConfigError::NotFound(start.to_path_buf()))?,
    };

    let config = load_config_file(&config_path)?;
    let project_root = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| start.to_path_buf());

    Ok(LoadedConfig { config, project_root })
}

/// Load configuration from a specific file path.
pub fn load_config_file(path: &Path) -> Result<QuireConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: QuireConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut QuireConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(ref src) = overrides.src {
        config.project.src = src.clone();
    }

    if let Some(ref environment) = overrides.environment {
        config.build.environment = environment.clone();
    }
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
