/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::driver
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Invoke softwareupdate for list, download and install
    actions; scrub its banner noise and classify the outcome,
    including the zero-exit "not enough free disk space" case.

  Security / Safety Notes:
    Update identifiers are passed as discrete argv entries and
    never interpolated into a shell line.

  Dependencies:
    regex for output cues; the process runner and device
    probe collaborators.

  Operational Scope:
    The only component that talks to softwareupdate.

  Revision History:
    2025-11-09 COD  Split invocation from outcome classification.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Exit code alone never decides success
    - Timeouts are fatal to the invocation and never retried
============================================================*/

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::device::DeviceProbe;
use crate::error::Result;
use crate::logger::Logger;
use crate::process::{display_argv, ProcessOutput, ProcessRunner};

const BANNER: &str = "Software Update Tool";
const DISK_SPACE_MARKER: &str = "Not enough free disk space";
const TIMEOUT_MESSAGE: &str =
    "The software update tool did not finish before its timeout and was stopped.";

lazy_static! {
    static ref RESTART_CUE_REGEX: Regex = Regex::new(r"(?i)restart").unwrap();
    static ref SHUTDOWN_CUE_REGEX: Regex = Regex::new(r"(?i)(shut down|shutdown|halt)").unwrap();
}

/// One softwareupdate invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    List { no_scan: bool },
    Download(String),
    Install(String),
    /// Install every applicable update at once, letting the tool reboot.
    InstallBatch { recommended_only: bool, no_scan: bool },
}

impl Action {
    pub fn argv(&self, binary: &Path) -> Vec<String> {
        let mut argv = vec![binary.display().to_string()];
        match self {
            Action::List { no_scan } => {
                argv.push("--list".into());
                if *no_scan {
                    argv.push("--no-scan".into());
                }
            }
            Action::Download(id) => {
                argv.extend(["--no-scan".into(), "--download".into(), id.clone()]);
            }
            Action::Install(id) => {
                argv.extend(["--no-scan".into(), "--install".into(), id.clone()]);
            }
            Action::InstallBatch {
                recommended_only,
                no_scan,
            } => {
                argv.push("--install".into());
                argv.push(if *recommended_only { "-arR" } else { "-aR" }.into());
                if *no_scan {
                    argv.push("--no-scan".into());
                }
            }
        }
        argv
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::List { .. } => write!(f, "list"),
            Action::Download(id) => write!(f, "download {id}"),
            Action::Install(id) => write!(f, "install {id}"),
            Action::InstallBatch { .. } => write!(f, "batch install"),
        }
    }
}

/// The zero-exit disk-space failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskSpaceShortfall {
    pub free_gib: Option<u64>,
    pub line: String,
}

/// Classified outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space_shortfall: Option<DiskSpaceShortfall>,
}

impl ExecutionResult {
    /// Failure detail: stderr first, stdout when stderr is empty, plus the
    /// timeout and disk-space explanations when they apply.
    pub fn error_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.timed_out {
            lines.push(TIMEOUT_MESSAGE.to_string());
        }
        let detail = if self.stderr_lines.is_empty() {
            &self.stdout_lines
        } else {
            &self.stderr_lines
        };
        lines.extend(detail.iter().cloned());
        if let Some(shortfall) = &self.disk_space_shortfall {
            if !lines.contains(&shortfall.line) {
                lines.push(shortfall.line.clone());
            }
            if let Some(free) = shortfall.free_gib {
                lines.push(format!("Only {free}GB Free Space Available."));
            }
        }
        lines
    }

    /// The tool's own output mentions a restart.
    pub fn restart_cue(&self) -> bool {
        self.stdout_lines
            .iter()
            .any(|line| RESTART_CUE_REGEX.is_match(line))
    }

    /// The tool's own output mentions a shutdown or halt.
    pub fn shutdown_cue(&self) -> bool {
        self.stdout_lines
            .iter()
            .any(|line| SHUTDOWN_CUE_REGEX.is_match(line))
    }
}

/// Drop the banner line and blank lines.
pub fn scrub(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && *line != BANNER)
        .map(str::to_string)
        .collect()
}

/// Pure outcome classification. A disk-space shortfall is reported with an
/// unknown free-space reading; the driver fills it in.
pub fn classify(output: &ProcessOutput) -> ExecutionResult {
    let stdout_lines = scrub(&output.stdout);
    let stderr_lines = scrub(&output.stderr);
    let disk_space_shortfall = stdout_lines
        .iter()
        .chain(stderr_lines.iter())
        .find(|line| line.contains(DISK_SPACE_MARKER))
        .map(|line| DiskSpaceShortfall {
            free_gib: None,
            line: line.clone(),
        });

    let succeeded =
        !output.timed_out && output.exit_code == Some(0) && disk_space_shortfall.is_none();

    ExecutionResult {
        succeeded,
        exit_code: output.exit_code,
        timed_out: output.timed_out,
        stdout_lines,
        stderr_lines,
        disk_space_shortfall,
    }
}

/// Runs softwareupdate actions one at a time.
pub struct Driver<'a, R: ProcessRunner, D: DeviceProbe> {
    runner: &'a R,
    device: &'a D,
    binary: PathBuf,
    logger: &'a Logger,
}

impl<'a, R: ProcessRunner, D: DeviceProbe> Driver<'a, R, D> {
    pub fn new(runner: &'a R, device: &'a D, binary: impl Into<PathBuf>, logger: &'a Logger) -> Self {
        Self {
            runner,
            device,
            binary: binary.into(),
            logger,
        }
    }

    pub fn device(&self) -> &'a D {
        self.device
    }

    pub fn logger(&self) -> &'a Logger {
        self.logger
    }

    /// Execute `action`. Only an unreachable binary is an `Err`; every other
    /// failure is reported through the returned result.
    pub async fn run(&self, action: &Action, timeout: Duration) -> Result<ExecutionResult> {
        let argv = action.argv(&self.binary);
        self.logger.debug("INVOKE", display_argv(&argv));

        let output = self.runner.execute(&argv, timeout).await?;
        let mut result = classify(&output);

        if result.timed_out {
            self.logger.warn(
                "TIMEOUT",
                format!("{action} stopped after {}s without finishing", timeout.as_secs()),
            );
        }

        if let Some(shortfall) = result.disk_space_shortfall.as_mut() {
            shortfall.free_gib = match self.device.free_disk_space_gib().await {
                Ok(free) => Some(free),
                Err(err) => {
                    self.logger
                        .warn("DISK", format!("Unable to read free disk space: {err}"));
                    None
                }
            };
            self.logger.warn(
                "DISK",
                format!(
                    "{action} reported a disk-space shortfall ({}GB free): {}",
                    shortfall
                        .free_gib
                        .map_or_else(|| "?".to_string(), |free| free.to_string()),
                    shortfall.line
                ),
            );
        }

        if result.succeeded {
            self.logger.info("INVOKE", format!("{action} succeeded"));
        } else {
            self.logger.warn(
                "INVOKE",
                format!(
                    "{action} failed (exit {:?}): {}",
                    result.exit_code,
                    result.error_lines().join(" | ")
                ),
            );
        }
        Ok(result)
    }
}
