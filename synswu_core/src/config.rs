/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load operator configuration: tool locations, session log
    directory and per-action softwareupdate timeouts.

  Security / Safety Notes:
    Configuration is read-only; paths are used verbatim and
    never expanded through a shell.

  Dependencies:
    serde + toml for parsing, dirs for default locations.

  Operational Scope:
    Resolved once at start-up by the binary entry point.

  Revision History:
    2025-11-09 COD  Introduced TOML configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Safe defaults when no file is present
    - Explicit failure when an operator-named file is missing
============================================================*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SynswuError};

const DEFAULT_BINARY: &str = "/usr/sbin/softwareupdate";
const DEFAULT_INSTALL_LOG: &str = "/var/log/install.log";

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynswuConfig {
    pub softwareupdate: PathBuf,
    pub install_log: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub timeouts: TimeoutConfig,
}

/// Per-action timeouts, in seconds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub list: u64,
    pub download: u64,
    pub install: u64,
}

impl Default for SynswuConfig {
    fn default() -> Self {
        Self {
            softwareupdate: PathBuf::from(DEFAULT_BINARY),
            install_log: PathBuf::from(DEFAULT_INSTALL_LOG),
            log_dir: None,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            list: 2 * 60 * 60,
            download: 4 * 60 * 60,
            install: 6 * 60 * 60,
        }
    }
}

impl TimeoutConfig {
    pub fn list(&self) -> Duration {
        Duration::from_secs(self.list.max(1))
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download.max(1))
    }

    pub fn install(&self) -> Duration {
        Duration::from_secs(self.install.max(1))
    }

    /// Apply a single operator override to every action.
    pub fn with_override(self, seconds: Option<u64>) -> Self {
        match seconds {
            Some(secs) => Self {
                list: secs,
                download: secs,
                install: secs,
            },
            None => self,
        }
    }
}

impl SynswuConfig {
    /// Load from an explicit path, or from the default location if present.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(candidate) if candidate.is_file() => Self::load(&candidate),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynswuError::Config(format!("Unable to read {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| SynswuError::Config(format!("{}: {err}", path.display())))
    }

    fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Directory holding session logs.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("syn-swu")
                .join("logs")
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("syn-swu").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SynswuConfig::parse("").unwrap();
        assert_eq!(config.softwareupdate, PathBuf::from(DEFAULT_BINARY));
        assert_eq!(config.install_log, PathBuf::from(DEFAULT_INSTALL_LOG));
        assert_eq!(config.timeouts.list(), Duration::from_secs(7200));
        assert_eq!(config.timeouts.download(), Duration::from_secs(14400));
        assert_eq!(config.timeouts.install(), Duration::from_secs(21600));
    }

    #[test]
    fn partial_timeouts_keep_remaining_defaults() {
        let config = SynswuConfig::parse(
            r#"
            softwareupdate = "/opt/bin/softwareupdate"
            [timeouts]
            list = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.softwareupdate, PathBuf::from("/opt/bin/softwareupdate"));
        assert_eq!(config.timeouts.list, 60);
        assert_eq!(config.timeouts.install, 21600);
    }

    #[test]
    fn override_applies_to_every_action() {
        let timeouts = TimeoutConfig::default().with_override(Some(30));
        assert_eq!(timeouts.list(), Duration::from_secs(30));
        assert_eq!(timeouts.download(), Duration::from_secs(30));
        assert_eq!(timeouts.install(), Duration::from_secs(30));
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SynswuConfig::load_from_optional_path(Some(&dir.path().join("absent.toml")))
            .unwrap_err();
        assert!(matches!(err, SynswuError::Config(_)));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "install_log = \"/tmp/install.log\"\n").unwrap();
        let config = SynswuConfig::load_from_optional_path(Some(&path)).unwrap();
        assert_eq!(config.install_log, PathBuf::from("/tmp/install.log"));
    }
}
