/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-SWU error types so every softwareupdate
    flow reports failures and exit codes the same way.

  Security / Safety Notes:
    Error contexts carry command names and scrubbed tool
    output only; no user data beyond the console username.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate unrecoverable failures
    (missing binaries, broken configuration, failed probes)
    and to consolidate exit codes for the binary entry point.

  Revision History:
    2025-11-09 COD  Derived from the Syn-Syu error taxonomy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - Malformed tool output degrades, it never raises
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-SWU operations.
pub type Result<T> = std::result::Result<T, SynswuError>;

/// Enumerates high-level error domains surfaced by Syn-SWU.
#[derive(Debug, Error)]
pub enum SynswuError {
    #[error("Required command `{command}` not found")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynswuError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynswuError::CommandMissing { .. } => ExitCode::from(10),
            SynswuError::CommandFailure { .. } => ExitCode::from(11),
            SynswuError::Config(_) => ExitCode::from(20),
            SynswuError::Serialization(_) => ExitCode::from(31),
            SynswuError::Filesystem(_) => ExitCode::from(40),
            SynswuError::Runtime(_) => ExitCode::from(50),
            SynswuError::Io(_) => ExitCode::from(41),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_command_names_the_binary() {
        let err = SynswuError::CommandMissing {
            command: "/usr/sbin/softwareupdate".into(),
        };
        assert_eq!(
            err.to_string(),
            "Required command `/usr/sbin/softwareupdate` not found"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: SynswuError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, SynswuError::Io(_)));
        assert_eq!(
            format!("{:?}", err.exit_code()),
            format!("{:?}", ExitCode::from(41))
        );
    }
}
