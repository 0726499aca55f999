//! Configuration schema types for `quire.toml`
//!
//! Defines the structure and validation rules for quire project configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "quire.toml";

/// Upper bound accepted for `watch.debounce_ms`.
const MAX_DEBOUNCE_MS: u32 = 10_000;

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (defaults to the project root directory name)
    #[serde(default)]
    pub name: Option<String>,
    /// Source directory walked by full builds
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Build output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: None, src: default_src(), out: default_out() }
    }
}

/// Build settings shared by every pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Target environment tag exposed to transformers
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Directory names whose contents are never tracked as dependencies
    #[serde(default = "default_vendor_dirs")]
    pub vendor_dirs: Vec<String>,
    /// Ignore list file, relative to the project root
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
    /// Minify stylesheet output
    #[serde(default)]
    pub minify: bool,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_vendor_dirs() -> Vec<String> {
    vec!["node_modules".to_string()]
}

fn default_ignore_file() -> String {
    ".quireignore".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            vendor_dirs: default_vendor_dirs(),
            ignore_file: default_ignore_file(),
            minify: false,
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
}

fn default_debounce_ms() -> u32 {
    50
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

/// Complete quire.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuireConfig {
    /// Project layout
    #[serde(default)]
    pub project: ProjectConfig,
    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "build.vendor_dirs")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: '{}' {}", CONFIG_FILE_NAME, self.field, self.message)
    }
}

impl QuireConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.src.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.src".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        if self.project.out.as_os_str().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.out".to_string(),
                message: "must be a non-empty path".to_string(),
            });
        }

        if self.build.environment.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "build.environment".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        for (i, dir) in self.build.vendor_dirs.iter().enumerate() {
            if dir.is_empty() || dir.contains('/') || dir.contains('\\') {
                errors.push(ConfigValidationError {
                    field: format!("build.vendor_dirs[{}]", i),
                    message: "must be a single directory name".to_string(),
                });
            }
        }

        if self.build.ignore_file.is_empty() {
            errors.push(ConfigValidationError {
                field: "build.ignore_file".to_string(),
                message: "must be a non-empty file name".to_string(),
            });
        }

        if self.watch.debounce_ms > MAX_DEBOUNCE_MS {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: format!("must be at most {}", MAX_DEBOUNCE_MS),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: QuireConfig = toml::from_str("").unwrap();
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.out, PathBuf::from("dist"));
        assert_eq!(config.build.environment, "development");
        assert_eq!(config.build.vendor_dirs, vec!["node_modules".to_string()]);
        assert_eq!(config.build.ignore_file, ".quireignore");
        assert_eq!(config.watch.debounce_ms, 50);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_default_matches_empty_file() {
        let config = QuireConfig::default();
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.out, PathBuf::from("dist"));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_full_config() {
        let toml_str = r#"
[project]
name = "portfolio"
src = "content"
out = "public"

[build]
environment = "production"
vendor_dirs = ["node_modules", "vendor"]
minify = true

[watch]
debounce_ms = 200
clear_screen = true
"#;
        let config: QuireConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project.name.as_deref(), Some("portfolio"));
        assert_eq!(config.project.src, PathBuf::from("content"));
        assert_eq!(config.project.out, PathBuf::from("public"));
        assert_eq!(config.build.environment, "production");
        assert_eq!(config.build.vendor_dirs.len(), 2);
        assert!(config.build.minify);
        assert_eq!(config.watch.debounce_ms, 200);
        assert!(config.watch.clear_screen);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = QuireConfig::default();
        config.project.src = PathBuf::new();
        config.build.environment = "  ".to_string();
        config.build.vendor_dirs = vec!["a/b".to_string()];
        config.watch.debounce_ms = 60_000;

        let errors = config.validate();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["project.src", "build.environment", "build.vendor_dirs[0]", "watch.debounce_ms"]
        );
    }

    #[test]
    fn test_validation_error_display() {
        let error = ConfigValidationError {
            field: "project.out".to_string(),
            message: "must be a non-empty path".to_string(),
        };
        assert_eq!(error.to_string(), "quire.toml: 'project.out' must be a non-empty path");
    }
}
