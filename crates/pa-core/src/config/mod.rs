//! Extractor configuration.
//!
//! This module handles:
//! - Loading `config.toml`
//! - Resolution order (CLI > env > XDG > defaults)
//! - `PA_ENV_CAP` / `PA_PAGE_SIZE` overrides
//! - Range validation

use crate::procmem::DEFAULT_ENV_CAP;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "procargs";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Smallest accepted page size.
pub const MIN_PAGE_SIZE: usize = 64;

/// Largest accepted page size (1 MiB).
pub const MAX_PAGE_SIZE: usize = 1 << 20;

/// Largest accepted environment cap.
pub const MAX_ENV_CAP: usize = 1_000_000;

/// Page size used when the system cannot report one.
pub const FALLBACK_PAGE_SIZE: usize = 4096;

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid TOML in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("Invalid value {value:?} in environment variable {var}")]
    InvalidOverride { var: &'static str, value: String },
}

impl From<ConfigError> for pa_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { field, message } => pa_common::Error::InvalidConfigValue {
                field: field.to_string(),
                message,
            },
            other => pa_common::Error::Config(other.to_string()),
        }
    }
}

/// Tunables for one extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    /// Cache page size in bytes; `None` uses the system page size.
    pub page_size: Option<usize>,
    /// Most environment pointers kept per extraction.
    pub env_cap: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            page_size: None,
            env_cap: DEFAULT_ENV_CAP,
        }
    }
}

impl ExtractorConfig {
    /// Set an explicit page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Set the environment cap.
    pub fn with_env_cap(mut self, env_cap: usize) -> Self {
        self.env_cap = env_cap;
        self
    }

    /// Page size the cache will actually use.
    pub fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or_else(system_page_size)
    }

    /// Parse TOML text. `path` is only used for error messages.
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: ExtractorConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(page_size) = self.page_size {
            if !page_size.is_power_of_two() {
                return Err(ConfigError::InvalidValue {
                    field: "page_size",
                    message: format!("{} is not a power of two", page_size),
                });
            }
            if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
                return Err(ConfigError::InvalidValue {
                    field: "page_size",
                    message: format!(
                        "{} outside [{}, {}]",
                        page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
                    ),
                });
            }
        }
        if !(1..=MAX_ENV_CAP).contains(&self.env_cap) {
            return Err(ConfigError::InvalidValue {
                field: "env_cap",
                message: format!("{} outside [1, {}]", self.env_cap, MAX_ENV_CAP),
            });
        }
        Ok(())
    }
}

/// System page size, falling back to [`FALLBACK_PAGE_SIZE`].
#[cfg(unix)]
pub fn system_page_size() -> usize {
    static PAGE_SIZE: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        match usize::try_from(size) {
            Ok(size) if size.is_power_of_two() => size,
            _ => FALLBACK_PAGE_SIZE,
        }
    })
}

#[cfg(not(unix))]
pub fn system_page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

/// Where the configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// `--config` flag.
    CliFlag,
    /// `PA_CONFIG` environment variable.
    EnvVar,
    /// XDG config directory.
    XdgConfig,
    /// Built-in defaults.
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliFlag => write!(f, "cli"),
            ConfigSource::EnvVar => write!(f, "env"),
            ConfigSource::XdgConfig => write!(f, "xdg"),
            ConfigSource::Default => write!(f, "default"),
        }
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Resolved configuration with provenance information.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: ExtractorConfig,
    /// File the values were read from, if any.
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
    /// Environment variables that overrode file values.
    pub overrides: Vec<String>,
    /// Page size after system fallback.
    pub effective_page_size: usize,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI path
/// 2. `PA_CONFIG`
/// 3. `$XDG_CONFIG_HOME/procargs/config.toml`, else the platform config dir
/// 4. Built-in defaults
///
/// `PA_ENV_CAP` and `PA_PAGE_SIZE` are applied on top of whichever source won.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    load_config_with(options, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(options: &ConfigOptions, lookup: F) -> Result<ResolvedConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, path, source) = resolve_file(options, &lookup)?;

    let mut overrides = Vec::new();
    if let Some(raw) = lookup("PA_ENV_CAP") {
        config.env_cap = parse_override("PA_ENV_CAP", &raw)?;
        overrides.push("PA_ENV_CAP".to_string());
    }
    if let Some(raw) = lookup("PA_PAGE_SIZE") {
        config.page_size = Some(parse_override("PA_PAGE_SIZE", &raw)?);
        overrides.push("PA_PAGE_SIZE".to_string());
    }
    config.validate()?;

    Ok(ResolvedConfig {
        effective_page_size: config.effective_page_size(),
        config,
        path,
        source,
        overrides,
    })
}

fn resolve_file<F>(
    options: &ConfigOptions,
    lookup: &F,
) -> Result<(ExtractorConfig, Option<PathBuf>, ConfigSource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Explicit option
    if let Some(path) = &options.config_path {
        let config = load_config_file(path)?;
        return Ok((config, Some(path.clone()), ConfigSource::CliFlag));
    }

    // 2. Environment variable
    if let Some(path) = lookup("PA_CONFIG") {
        let path = PathBuf::from(path);
        let config = load_config_file(&path)?;
        return Ok((config, Some(path), ConfigSource::EnvVar));
    }

    // 3. XDG config home
    if let Some(dir) = default_config_dir(lookup) {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok((config, Some(path), ConfigSource::XdgConfig));
        }
    }

    // 4. Defaults
    Ok((ExtractorConfig::default(), None, ConfigSource::Default))
}

fn default_config_dir<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(xdg) = lookup("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join(CONFIG_DIR_NAME));
    }
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME))
}

fn parse_override(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidOverride {
            var,
            value: raw.to_string(),
        })
}

/// Load and validate one config file.
pub fn load_config_file(path: &Path) -> Result<ExtractorConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::IoError {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    ExtractorConfig::from_toml_str(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: Vec<(&str, String)>) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = ExtractorConfig::default();
        assert_eq!(config.page_size, None);
        assert_eq!(config.env_cap, 500);
        assert!(config.validate().is_ok());
        assert!(config.effective_page_size().is_power_of_two());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ExtractorConfig::from_toml_str("env_cap = 32\n", Path::new("x.toml")).unwrap();
        assert_eq!(config.env_cap, 32);
        assert_eq!(config.page_size, None);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ExtractorConfig::from_toml_str("env_kap = 1\n", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_page_size_must_be_power_of_two_in_range() {
        for bad in [100usize, 32, 2 << 20] {
            let err = ExtractorConfig::default().with_page_size(bad).validate().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { field: "page_size", .. }));
        }
        assert!(ExtractorConfig::default().with_page_size(64).validate().is_ok());
        assert!(ExtractorConfig::default().with_page_size(1 << 20).validate().is_ok());
    }

    #[test]
    fn test_env_cap_range() {
        assert!(ExtractorConfig::default().with_env_cap(0).validate().is_err());
        assert!(ExtractorConfig::default().with_env_cap(MAX_ENV_CAP + 1).validate().is_err());
        assert!(ExtractorConfig::default().with_env_cap(MAX_ENV_CAP).validate().is_ok());
    }

    #[test]
    fn test_cli_path_wins_over_env() {
        let dir = TempDir::new().unwrap();
        let cli = write_config(&dir, "cli.toml", "env_cap = 10\n");
        let env = write_config(&dir, "env.toml", "env_cap = 20\n");
        let options = ConfigOptions {
            config_path: Some(cli.clone()),
        };

        let resolved = load_config_with(
            &options,
            lookup(vec![("PA_CONFIG", env.display().to_string())]),
        )
        .unwrap();
        assert_eq!(resolved.source, ConfigSource::CliFlag);
        assert_eq!(resolved.path, Some(cli));
        assert_eq!(resolved.config.env_cap, 10);
    }

    #[test]
    fn test_env_path_used_without_cli() {
        let dir = TempDir::new().unwrap();
        let env = write_config(&dir, "env.toml", "page_size = 8192\n");

        let resolved = load_config_with(
            &ConfigOptions::default(),
            lookup(vec![("PA_CONFIG", env.display().to_string())]),
        )
        .unwrap();
        assert_eq!(resolved.source, ConfigSource::EnvVar);
        assert_eq!(resolved.config.page_size, Some(8192));
        assert_eq!(resolved.effective_page_size, 8192);
    }

    #[test]
    fn test_xdg_dir_then_defaults() {
        let dir = TempDir::new().unwrap();
        let xdg = dir.path().display().to_string();

        let resolved = load_config_with(
            &ConfigOptions::default(),
            lookup(vec![("XDG_CONFIG_HOME", xdg.clone())]),
        )
        .unwrap();
        assert_eq!(resolved.source, ConfigSource::Default);
        assert!(resolved.path.is_none());

        std::fs::create_dir_all(dir.path().join("procargs")).unwrap();
        std::fs::write(dir.path().join("procargs/config.toml"), "env_cap = 7\n").unwrap();
        let resolved =
            load_config_with(&ConfigOptions::default(), lookup(vec![("XDG_CONFIG_HOME", xdg)]))
                .unwrap();
        assert_eq!(resolved.source, ConfigSource::XdgConfig);
        assert_eq!(resolved.config.env_cap, 7);
    }

    #[test]
    fn test_env_overrides_apply_last() {
        let dir = TempDir::new().unwrap();
        let cli = write_config(&dir, "cli.toml", "env_cap = 10\npage_size = 4096\n");
        let options = ConfigOptions {
            config_path: Some(cli),
        };

        let resolved = load_config_with(
            &options,
            lookup(vec![
                ("PA_ENV_CAP", "99".to_string()),
                ("PA_PAGE_SIZE", "16384".to_string()),
            ]),
        )
        .unwrap();
        assert_eq!(resolved.config.env_cap, 99);
        assert_eq!(resolved.config.page_size, Some(16384));
        assert_eq!(resolved.overrides, vec!["PA_ENV_CAP", "PA_PAGE_SIZE"]);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = load_config_with(
            &ConfigOptions::default(),
            lookup(vec![
                ("XDG_CONFIG_HOME", dir.path().display().to_string()),
                ("PA_ENV_CAP", "lots".to_string()),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { var: "PA_ENV_CAP", .. }));
    }

    #[test]
    fn test_override_still_validated() {
        let dir = TempDir::new().unwrap();
        let err = load_config_with(
            &ConfigOptions::default(),
            lookup(vec![
                ("XDG_CONFIG_HOME", dir.path().display().to_string()),
                ("PA_PAGE_SIZE", "3000".to_string()),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "page_size", .. }));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            config_path: Some(dir.path().join("absent.toml")),
        };
        let err = load_config_with(&options, lookup(vec![])).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_config_error_maps_into_common_error() {
        let err: pa_common::Error = ConfigError::InvalidValue {
            field: "env_cap",
            message: "0 outside [1, 1000000]".to_string(),
        }
        .into();
        assert!(matches!(err, pa_common::Error::InvalidConfigValue { .. }));
        assert_eq!(err.code(), 11);
    }
}
