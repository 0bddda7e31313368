/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::process
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Run external commands with a bound on both total runtime
    and the idle gap between output lines, capturing stdout
    and stderr separately.

  Security / Safety Notes:
    Commands are spawned directly from argv; nothing passes
    through a shell. Timed-out children are killed.

  Dependencies:
    tokio::process and tokio::time.

  Operational Scope:
    Backs the execution driver and every device probe.

  Revision History:
    2025-11-09 COD  Extracted from the pacman command helpers.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Missing binaries are the only hard failure
============================================================*/

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};

use crate::error::{Result, SynswuError};

/// Raw outcome of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed or ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Executes argv vectors; `argv[0]` is the program.
#[allow(async_fn_in_trait)]
pub trait ProcessRunner {
    async fn execute(&self, argv: &[String], timeout: Duration) -> Result<ProcessOutput>;
}

/// Runner backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl ProcessRunner for TokioRunner {
    async fn execute(&self, argv: &[String], timeout: Duration) -> Result<ProcessOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SynswuError::Runtime("Refusing to execute an empty command".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| map_spawn_error(err, program))?;

        let stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| SynswuError::Runtime(format!("{program}: stdout not captured")))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| SynswuError::Runtime(format!("{program}: stderr not captured")))?;
        let mut stdout_lines = BufReader::new(stdout_pipe).split(b'\n');
        let mut stderr_lines = BufReader::new(stderr_pipe).split(b'\n');

        let deadline = Instant::now() + timeout;
        let mut output = ProcessOutput::default();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout_lines.next_segment(), if stdout_open => {
                    stdout_open = collect_line(line, &mut output.stdout);
                }
                line = stderr_lines.next_segment(), if stderr_open => {
                    stderr_open = collect_line(line, &mut output.stderr);
                }
                _ = sleep(timeout) => {
                    output.timed_out = true;
                    break;
                }
                _ = sleep_until(deadline) => {
                    output.timed_out = true;
                    break;
                }
            }
        }

        if !output.timed_out {
            match timeout_at(deadline, child.wait()).await {
                Ok(status) => output.exit_code = status?.code(),
                Err(_) => output.timed_out = true,
            }
        }

        if output.timed_out {
            // The child may already be gone; only the reap matters here.
            let _ = child.kill().await;
        }

        Ok(output)
    }
}

/// Append one line; returns whether the stream is still open. Bytes that are
/// not UTF-8 are replaced so the pipe keeps draining.
fn collect_line(line: io::Result<Option<Vec<u8>>>, sink: &mut String) -> bool {
    match line {
        Ok(Some(bytes)) => {
            sink.push_str(&String::from_utf8_lossy(&bytes));
            sink.push('\n');
            true
        }
        Ok(None) | Err(_) => false,
    }
}

pub fn map_spawn_error(err: io::Error, command: &str) -> SynswuError {
    if err.kind() == io::ErrorKind::NotFound {
        SynswuError::CommandMissing {
            command: command.into(),
        }
    } else {
        SynswuError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}

/// Render argv for logs.
pub fn display_argv(argv: &[String]) -> String {
    argv.join(" ")
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    /// Scripted runner that replays queued outputs and records every argv.
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: RefCell<VecDeque<Result<ProcessOutput>>>,
        pub calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub fn push(&self, exit_code: i32, stdout: &str, stderr: &str) -> &Self {
            self.responses.borrow_mut().push_back(Ok(ProcessOutput {
                exit_code: Some(exit_code),
                stdout: stdout.into(),
                stderr: stderr.into(),
                timed_out: false,
            }));
            self
        }

        pub fn push_timeout(&self, stdout: &str) -> &Self {
            self.responses.borrow_mut().push_back(Ok(ProcessOutput {
                exit_code: None,
                stdout: stdout.into(),
                stderr: String::new(),
                timed_out: true,
            }));
            self
        }

        pub fn push_missing(&self, command: &str) -> &Self {
            self.responses
                .borrow_mut()
                .push_back(Err(SynswuError::CommandMissing {
                    command: command.into(),
                }));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        async fn execute(&self, argv: &[String], _timeout: Duration) -> Result<ProcessOutput> {
            self.calls.borrow_mut().push(argv.to_vec());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(ProcessOutput {
                    exit_code: Some(0),
                    ..ProcessOutput::default()
                }))
        }
    }
}
