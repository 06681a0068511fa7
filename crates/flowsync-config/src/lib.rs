//! Configuration for the flowsync CLI.
//!
//! TOML element profiles merged with `FLOWSYNC_` environment variables,
//! and translation to `flowsync_core::ManagerOptions`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowsync_core::ManagerOptions;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("unknown element '{element}'")]
    UnknownElement { element: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Element used when none is given on the command line.
    pub default_element: Option<String>,

    /// Values every element inherits unless it overrides them.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named element profiles.
    #[serde(default)]
    pub elements: HashMap<String, ElementProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_element: Some("default".into()),
            defaults: Defaults::default(),
            elements: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub ignore_destination_port: bool,

    #[serde(default = "default_tolerance")]
    pub bitrate_tolerance_pct: f64,

    #[serde(default = "default_bootstrap_timeout")]
    pub bootstrap_timeout_secs: u64,

    #[serde(default = "default_bootstrap_interval")]
    pub bootstrap_interval_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            ignore_destination_port: false,
            bitrate_tolerance_pct: default_tolerance(),
            bootstrap_timeout_secs: default_bootstrap_timeout(),
            bootstrap_interval_ms: default_bootstrap_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_tolerance() -> f64 {
    10.0
}
fn default_bootstrap_timeout() -> u64 {
    30
}
fn default_bootstrap_interval() -> u64 {
    500
}

/// A named managed element.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ElementProfile {
    /// JSON table store file. Defaults to `<data dir>/<element>.json`.
    pub table_path: Option<PathBuf>,

    /// Override `defaults.ignore_destination_port`.
    pub ignore_destination_port: Option<bool>,

    /// Interface rows to wait for during bootstrap (0 = do not wait).
    #[serde(default)]
    pub expected_interfaces: usize,

    /// Override `defaults.bootstrap_timeout_secs`.
    pub bootstrap_timeout_secs: Option<u64>,

    /// Override `defaults.bootstrap_interval_ms`.
    pub bootstrap_interval_ms: Option<u64>,

    /// Override `defaults.bitrate_tolerance_pct`.
    pub bitrate_tolerance_pct: Option<f64>,

    /// DCF table group used to resolve interface links.
    pub dcf_interface_group: Option<i32>,
}

impl Config {
    /// Resolve an element name to its profile. The configured default
    /// element may be used without a profile entry.
    pub fn element(&self, name: &str) -> Result<ElementProfile, ConfigError> {
        match self.elements.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if self.default_element.as_deref() == Some(name) => Ok(ElementProfile::default()),
            None => Err(ConfigError::UnknownElement {
                element: name.into(),
            }),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "flowsync", "flowsync")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Table store file for `element` when the profile does not set one.
pub fn default_table_path(element: &str) -> PathBuf {
    let file = format!("{element}.json");
    project_dirs().map_or_else(
        || dirs_fallback().join("tables").join(&file),
        |dirs| dirs.data_dir().join(&file),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("flowsync");
    p
}

/// Table store path for a resolved profile.
pub fn table_path(profile: &ElementProfile, element: &str) -> PathBuf {
    profile
        .table_path
        .clone()
        .unwrap_or_else(|| default_table_path(element))
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, still merging the environment.
///
/// Nested keys use a double underscore, e.g.
/// `FLOWSYNC_DEFAULTS__BITRATE_TOLERANCE_PCT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLOWSYNC_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build `ManagerOptions` from a profile, filling gaps from `defaults`.
pub fn profile_to_manager_options(
    profile: &ElementProfile,
    defaults: &Defaults,
) -> Result<ManagerOptions, ConfigError> {
    let tolerance = profile
        .bitrate_tolerance_pct
        .unwrap_or(defaults.bitrate_tolerance_pct);
    if !(0.0..=100.0).contains(&tolerance) {
        return Err(ConfigError::Validation {
            field: "bitrate_tolerance_pct".into(),
            reason: format!("expected a percentage between 0 and 100, got {tolerance}"),
        });
    }

    let interval_ms = profile
        .bootstrap_interval_ms
        .unwrap_or(defaults.bootstrap_interval_ms);
    if interval_ms == 0 {
        return Err(ConfigError::Validation {
            field: "bootstrap_interval_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }

    let timeout_secs = profile
        .bootstrap_timeout_secs
        .unwrap_or(defaults.bootstrap_timeout_secs);
    if timeout_secs == 0 {
        return Err(ConfigError::Validation {
            field: "bootstrap_timeout_secs".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(ManagerOptions {
        ignore_destination_port: profile
            .ignore_destination_port
            .unwrap_or(defaults.ignore_destination_port),
        bitrate_tolerance_pct: tolerance,
        expected_interfaces: profile.expected_interfaces,
        bootstrap_interval: Duration::from_millis(interval_ms),
        bootstrap_timeout: Duration::from_secs(timeout_secs),
        dcf_interface_group: profile.dcf_interface_group,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_element = "studio-a"

[defaults]
bitrate_tolerance_pct = 5.0

[elements.studio-a]
table_path = "/var/lib/flowsync/studio-a.json"
expected_interfaces = 4

[elements.studio-b]
ignore_destination_port = true
bitrate_tolerance_pct = 20.0
bootstrap_interval_ms = 250
"#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn loads_profiles_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&write_sample(&dir)).unwrap();

        assert_eq!(cfg.default_element.as_deref(), Some("studio-a"));
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.defaults.bitrate_tolerance_pct, 5.0);

        let a = cfg.element("studio-a").unwrap();
        let opts = profile_to_manager_options(&a, &cfg.defaults).unwrap();
        assert_eq!(opts.expected_interfaces, 4);
        assert_eq!(opts.bitrate_tolerance_pct, 5.0);
        assert!(!opts.ignore_destination_port);
        assert_eq!(opts.bootstrap_timeout, Duration::from_secs(30));
        assert_eq!(
            table_path(&a, "studio-a"),
            PathBuf::from("/var/lib/flowsync/studio-a.json")
        );

        let b = cfg.element("studio-b").unwrap();
        let opts = profile_to_manager_options(&b, &cfg.defaults).unwrap();
        assert!(opts.ignore_destination_port);
        assert_eq!(opts.bitrate_tolerance_pct, 20.0);
        assert_eq!(opts.bootstrap_interval, Duration::from_millis(250));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_element.as_deref(), Some("default"));
        assert!(cfg.element("default").is_ok());
        assert!(matches!(
            cfg.element("nope"),
            Err(ConfigError::UnknownElement { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_tolerance() {
        let profile = ElementProfile {
            bitrate_tolerance_pct: Some(150.0),
            ..ElementProfile::default()
        };
        let err = profile_to_manager_options(&profile, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "bitrate_tolerance_pct"));
    }

    #[test]
    fn rejects_zero_interval() {
        let profile = ElementProfile {
            bootstrap_interval_ms: Some(0),
            ..ElementProfile::default()
        };
        assert!(profile_to_manager_options(&profile, &Defaults::default()).is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.elements.insert(
            "edge".into(),
            ElementProfile {
                dcf_interface_group: Some(1000),
                ..ElementProfile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }
}
