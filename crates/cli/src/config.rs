//! `provchain.toml` configuration.
//!
//! ```toml
//! [ledger]
//! path = "provchain-ledger.json"
//!
//! [log]
//! level = "info"
//! json = false
//! ```
//!
//! `PROVCHAIN_LEDGER` and `PROVCHAIN_LOG` override `ledger.path` and
//! `log.level`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "provchain.toml";
const DEFAULT_LEDGER_FILE: &str = "provchain-ledger.json";
const DEFAULT_LOG_LEVEL: &str = "warn";

pub(crate) const LEDGER_ENV: &str = "PROVCHAIN_LEDGER";
pub(crate) const LOG_ENV: &str = "PROVCHAIN_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub log: LogSettings,
}

/// `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LedgerSettings {
    /// File the ledger state is loaded from and saved to.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_FILE)
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            path: default_ledger_path(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Read and parse a config file.
pub(crate) fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Resolve the effective configuration.
///
/// An explicit `--config` file must exist. Without one, `provchain.toml` in
/// the working directory is used if present, else the defaults.
pub(crate) fn load(explicit: Option<&Path>) -> Result<Config, String> {
    let mut config = match explicit {
        Some(path) => read_config(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                read_config(default)?
            } else {
                Config::default()
            }
        }
    };
    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(path) = var(LEDGER_ENV).filter(|v| !v.is_empty()) {
        config.ledger.path = PathBuf::from(path);
    }
    if let Some(level) = var(LOG_ENV).filter(|v| !v.is_empty()) {
        config.log.level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.ledger.path, PathBuf::from("provchain-ledger.json"));
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn sections_are_partial() {
        let config: Config = toml::from_str("[log]\njson = true\n").unwrap();
        assert!(config.log.json);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.ledger, LedgerSettings::default());
    }

    #[test]
    fn env_overrides_file() {
        let mut config: Config =
            toml::from_str("[ledger]\npath = \"a.json\"\n[log]\nlevel = \"info\"\n").unwrap();
        apply_env(&mut config, |key| match key {
            LEDGER_ENV => Some("b.json".into()),
            LOG_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.ledger.path, PathBuf::from("b.json"));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = read_config(Path::new("/nonexistent/provchain.toml")).unwrap_err();
        assert!(err.starts_with("could not read"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = toml::from_str::<Config>("[log]\njson = \"yes\"\n").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
