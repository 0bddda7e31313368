/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-SWU. Lists, checks, downloads and
    installs macOS software updates through softwareupdate,
    and reports on the machine state that gates them.

  Security / Safety Notes:
    Installing requires the privileges softwareupdate itself
    demands (normally root). Reboot-capable installs are gated
    on power source, console user and FileVault state.

  Dependencies:
    clap for CLI parsing, chrono for session stamps, tokio
    for the (single-threaded) runtime.

  Operational Scope:
    Invoked by management tooling or operators on a single
    managed Mac; one softwareupdate invocation at a time.

  Revision History:
    2025-11-09 COD  Authored Syn-SWU runtime from Syn-Syu Core.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

mod config;
mod device;
mod driver;
mod error;
mod filter;
mod install_log;
mod logger;
mod orchestrator;
mod parser;
mod process;
mod report;
mod update;
mod wait;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};

use config::SynswuConfig;
use device::MacDevice;
use driver::Driver;
use error::Result;
use filter::FilterCriteria;
use install_log::FileInstallLog;
use logger::Logger;
use orchestrator::{InstallOptions, Orchestrator, RunReport};
use process::TokioRunner;
use report::{render_listing, render_run, render_summary, summarize, to_json, UpdateListing};
use wait::{wait_for, WaitConditions};

/// Command-line arguments for Syn-SWU.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-SWU",
    version,
    author = "Synavera Systems",
    about = "Conscious softwareupdate driver for managed Macs"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,
    /// softwareupdate timeout in seconds, for every action.
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

/// Update selection shared by the listing and install subcommands.
#[derive(Debug, Clone, Copy, Args)]
struct FilterArgs {
    /// Only include recommended updates.
    #[arg(long, action = ArgAction::SetTrue)]
    recommended: bool,
    /// Only include updates that require a restart.
    #[arg(long, action = ArgAction::SetTrue)]
    restart: bool,
    /// Only include updates that require a shutdown.
    #[arg(long, action = ArgAction::SetTrue)]
    shutdown: bool,
    /// Only include updates at or below this size, in KiB.
    #[arg(long, value_name = "KIB")]
    size: Option<u64>,
    /// Do not scan for new updates.
    #[arg(long, action = ArgAction::SetTrue)]
    no_scan: bool,
}

impl FilterArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            recommended_only: self.recommended,
            restart_only: self.restart,
            shutdown_only: self.shutdown,
            max_size_kib: self.size,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List matching updates.
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output results in JSON.
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// Print update identifiers only.
        #[arg(short, long, action = ArgAction::SetTrue)]
        quiet: bool,
    },
    /// Exit successfully only if matching updates exist.
    Check {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Download matching updates without installing them.
    Download {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Install matching updates.
    Install {
        #[command(flatten)]
        filter: FilterArgs,
        /// Install regardless of battery power or a logged-in user.
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Summarise available updates and the machine state.
    Summary {
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        no_scan: bool,
    },
    /// Wait up to SECONDS for the selected conditions to clear.
    Wait {
        seconds: u64,
        /// Wait for CPU load to drop.
        #[arg(long, action = ArgAction::SetTrue)]
        cpu: bool,
        /// Wait for the console user to log out.
        #[arg(long, action = ArgAction::SetTrue)]
        user: bool,
        /// Wait for AC power.
        #[arg(long, action = ArgAction::SetTrue)]
        power: bool,
        /// Wait for display sleep to be allowed.
        #[arg(long, action = ArgAction::SetTrue)]
        screen: bool,
        /// Wait for FileVault encryption to finish.
        #[arg(long, action = ArgAction::SetTrue)]
        filevault: bool,
        /// Wait for every condition.
        #[arg(long, action = ArgAction::SetTrue)]
        all: bool,
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::List { .. } => "list",
            Command::Check { .. } => "check",
            Command::Download { .. } => "download",
            Command::Install { .. } => "install",
            Command::Summary { .. } => "summary",
            Command::Wait { .. } => "wait",
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-SWU] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = SynswuConfig::load_from_optional_path(cli.config.as_deref())?;
    let timeouts = config.timeouts.with_override(cli.timeout);

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .unwrap_or_else(|| config.log_dir().join(format!("swu_{session_stamp}.log")));
    let logger = Logger::new(Some(log_path), cli.verbose)?;
    logger.info(
        "INIT",
        format!(
            "Syn-SWU {} awakening for `{}`",
            env!("CARGO_PKG_VERSION"),
            cli.command.name()
        ),
    );

    let runner = TokioRunner;
    let device = MacDevice::new(&runner);
    let driver = Driver::new(&runner, &device, &config.softwareupdate, &logger);
    let install_log = FileInstallLog::new(&config.install_log);
    let orchestrator = Orchestrator::new(driver, &install_log, timeouts);

    let code = match cli.command {
        Command::List {
            filter,
            json,
            quiet,
        } => {
            let updates = orchestrator
                .matching(&filter.criteria(), filter.no_scan)
                .await?;
            if json {
                println!("{}", to_json(&UpdateListing::new(&updates))?);
            } else {
                print!("{}", render_listing(&updates, quiet));
            }
            ExitCode::SUCCESS
        }
        Command::Check { filter } => {
            if orchestrator.check(&filter.criteria(), filter.no_scan).await? {
                println!("There are matching updates to install.");
                ExitCode::SUCCESS
            } else {
                println!("There are no matching updates to install.");
                ExitCode::FAILURE
            }
        }
        Command::Download { filter, json } => {
            let report = orchestrator
                .download(&filter.criteria(), filter.no_scan)
                .await?;
            emit_run(&report, json)?
        }
        Command::Install {
            filter,
            force,
            json,
        } => {
            let options = InstallOptions {
                force,
                no_scan: filter.no_scan,
            };
            let report = orchestrator.install(&filter.criteria(), &options).await?;
            emit_run(&report, json)?
        }
        Command::Summary { json, no_scan } => {
            let updates = orchestrator.updates(no_scan).await?;
            let summary = summarize(updates, orchestrator.device(), &logger).await;
            if json {
                println!("{}", to_json(&summary)?);
            } else {
                print!("{}", render_summary(&summary));
            }
            ExitCode::SUCCESS
        }
        Command::Wait {
            seconds,
            cpu,
            user,
            power,
            screen,
            filevault,
            all,
            json,
        } => {
            let conditions = if all {
                WaitConditions::all()
            } else {
                WaitConditions {
                    cpu,
                    user,
                    power,
                    screen,
                    filevault,
                }
            };
            let report = wait_for(
                orchestrator.device(),
                conditions,
                seconds,
                Duration::from_secs(1),
                &logger,
            )
            .await;
            if json {
                println!("{}", to_json(&report)?);
            } else {
                print!("{}", wait::render(&report));
            }
            if report.blocking() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    };

    logger.info("COMPLETE", "Session closed.");
    logger.finalize()?;
    Ok(code)
}

fn emit_run(report: &RunReport, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", to_json(report)?);
    } else {
        print!("{}", render_run(report));
    }
    Ok(if report.succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
