/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Append-only session logging for softwareupdate runs, with
    a SHA-256 seal written next to the log when the run ends.

  Security / Safety Notes:
    Only scrubbed tool output and command lines are logged.
    Log files inherit the invoking user's umask.

  Dependencies:
    chrono for UTC stamps, sha2 for the session digest.

  Operational Scope:
    Shared by the driver, orchestrator and probes to emit
    RFC-3339 stamped entries tagged with a stable event code.

  Revision History:
    2025-11-09 COD  Adapted the Syn-Syu logger for update runs.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynswuError};

/// Severity attached to every entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn always_echoed(self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

/// Session logger writing to stderr and, optionally, a file.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
}

impl Logger {
    /// Open a session logger. Parent directories of `path` are created.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match path.as_deref() {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_append(file_path)?))),
            None => None,
        };
        Ok(Self {
            file,
            path,
            verbose,
        })
    }

    /// Logger that never touches the filesystem and echoes warnings only.
    pub fn quiet() -> Self {
        Self {
            file: None,
            path: None,
            verbose: false,
        }
    }

    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let entry = format!(
            "{stamp} [{}] [{code}] {}",
            level.as_str(),
            message.as_ref()
        );

        if self.verbose || level.always_echoed() {
            eprintln!("{entry}");
        }

        let Some(file) = &self.file else {
            return;
        };
        let Ok(mut writer) = file.lock() else {
            return;
        };
        if writeln!(writer, "{entry}").and_then(|_| writer.flush()).is_err() {
            eprintln!("{stamp} [ERROR] [LOGGER] Failed to write session log entry");
        }
    }

    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    /// Path of the backing log file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Seal the session log with a `<log>.hash` SHA-256 digest.
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        let data = std::fs::read(path).map_err(|err| {
            SynswuError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);

        let mut hash_name = path.as_os_str().to_os_string();
        hash_name.push(".hash");
        let hash_path = PathBuf::from(hash_name);
        let file_name = path.file_name().unwrap_or_default().to_string_lossy();
        std::fs::write(&hash_path, format!("{digest:x}  {file_name}\n")).map_err(|err| {
            SynswuError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynswuError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SynswuError::Filesystem(format!(
                "Failed to open log file {}: {err}",
                path.display()
            ))
        })
}
