/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::orchestrator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Drive whole update runs: build the update catalog once,
    select updates, gate installs on machine state, and pick
    between one batch install and per-update installs.

  Security / Safety Notes:
    Installs that reboot or power off the machine are refused
    on battery power or with a user at the console unless
    forced; never while FileVault is encrypting.

  Dependencies:
    tokio::sync::OnceCell for the catalog, serde for reports.

  Operational Scope:
    Called by the list, check, download, install and summary
    subcommands.

  Revision History:
    2025-11-09 COD  Converged install/download/list flows.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One softwareupdate invocation in flight at a time
    - Every preflight gate evaluated and reported together
    - Per-update failures never halt the remaining updates
============================================================*/

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::TimeoutConfig;
use crate::device::DeviceProbe;
use crate::driver::{Action, Driver, ExecutionResult};
use crate::error::{Result, SynswuError};
use crate::filter::{filter, FilterCriteria};
use crate::install_log::{reclassify_shutdown, InstallLog};
use crate::parser::parse;
use crate::process::ProcessRunner;
use crate::update::{PostInstall, UpdateRecord};

/// Operator switches for install runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Skip the battery and console-user gates.
    pub force: bool,
    pub no_scan: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Download,
    Install,
}

/// How a run was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPath {
    /// One invocation per update.
    Sequential,
    /// A single invocation installing everything, allowed to reboot.
    Batch,
    /// Preflight gates refused the run; nothing was invoked.
    Blocked,
}

/// Result of one softwareupdate invocation within a run.
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub action: String,
    pub result: ExecutionResult,
}

/// Aggregate result of a download or install run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub operation: Operation,
    pub path: RunPath,
    pub updates: Vec<UpdateRecord>,
    pub preflight_failures: Vec<String>,
    pub outcomes: Vec<ActionOutcome>,
    pub errors: Vec<String>,
    pub succeeded: bool,
}

impl RunReport {
    fn new(operation: Operation, path: RunPath, updates: Vec<UpdateRecord>) -> Self {
        Self {
            operation,
            path,
            updates,
            preflight_failures: Vec::new(),
            outcomes: Vec::new(),
            errors: Vec::new(),
            succeeded: true,
        }
    }

    fn record(&mut self, action: &Action, result: ExecutionResult) {
        if !result.succeeded {
            self.succeeded = false;
            self.errors.extend(result.error_lines());
        }
        self.outcomes.push(ActionOutcome {
            action: action.to_string(),
            result,
        });
    }
}

/// Batch when anything needs a restart or shutdown, since the tool reboots
/// at most once per invocation.
pub fn choose_path(records: &[UpdateRecord]) -> RunPath {
    if records
        .iter()
        .any(|record| record.post_install() != PostInstall::None)
    {
        RunPath::Batch
    } else {
        RunPath::Sequential
    }
}

pub struct Orchestrator<'a, R: ProcessRunner, D: DeviceProbe, L: InstallLog> {
    driver: Driver<'a, R, D>,
    install_log: &'a L,
    timeouts: TimeoutConfig,
    catalog: OnceCell<Vec<UpdateRecord>>,
}

impl<'a, R: ProcessRunner, D: DeviceProbe, L: InstallLog> Orchestrator<'a, R, D, L> {
    pub fn new(driver: Driver<'a, R, D>, install_log: &'a L, timeouts: TimeoutConfig) -> Self {
        Self {
            driver,
            install_log,
            timeouts,
            catalog: OnceCell::new(),
        }
    }

    pub fn device(&self) -> &'a D {
        self.driver.device()
    }

    /// Every available update, listed and classified once per process.
    pub async fn updates(&self, no_scan: bool) -> Result<&[UpdateRecord]> {
        let records = self
            .catalog
            .get_or_try_init(|| self.load_catalog(no_scan))
            .await?;
        Ok(records.as_slice())
    }

    async fn load_catalog(&self, no_scan: bool) -> Result<Vec<UpdateRecord>> {
        let logger = self.driver.logger();
        let device = self.driver.device();

        let version = device.os_version().await?;
        let variant = version.format_variant();
        logger.info("CATALOG", format!("macOS {version}: {variant:?} listing layout"));

        let result = self
            .driver
            .run(&Action::List { no_scan }, self.timeouts.list())
            .await?;
        if !result.succeeded {
            return Err(SynswuError::Runtime(format!(
                "Unable to list available updates: {}",
                result.error_lines().join("; ")
            )));
        }

        let parsed = parse(&result.stdout_lines, variant);
        let has_security_chip = if parsed.iter().any(UpdateRecord::is_restart) {
            device.has_security_chip().await.unwrap_or_else(|err| {
                logger.warn(
                    "SHUTDOWN",
                    format!("Security chip probe failed, keeping restart classification: {err}"),
                );
                false
            })
        } else {
            false
        };

        let records: Vec<UpdateRecord> = parsed
            .into_iter()
            .map(|record| {
                let classified = reclassify_shutdown(record, has_security_chip, self.install_log);
                if classified.is_shutdown() && !classified.is_restart() {
                    logger.debug("SHUTDOWN", format!("{} requires shutdown", classified.id()));
                }
                classified
            })
            .collect();
        logger.info("CATALOG", format!("{} updates available", records.len()));
        Ok(records)
    }

    pub async fn matching(
        &self,
        criteria: &FilterCriteria,
        no_scan: bool,
    ) -> Result<Vec<UpdateRecord>> {
        let records = self.updates(no_scan).await?;
        let selected = filter(records, criteria);
        self.driver.logger().info(
            "FILTER",
            format!("{} of {} updates match", selected.len(), records.len()),
        );
        Ok(selected)
    }

    /// True when at least one update matches.
    pub async fn check(&self, criteria: &FilterCriteria, no_scan: bool) -> Result<bool> {
        Ok(!self.matching(criteria, no_scan).await?.is_empty())
    }

    /// Download every matching update, one invocation each.
    pub async fn download(&self, criteria: &FilterCriteria, no_scan: bool) -> Result<RunReport> {
        let records = self.matching(criteria, no_scan).await?;
        let mut report = RunReport::new(Operation::Download, RunPath::Sequential, records.clone());
        for record in &records {
            let action = Action::Download(record.id().to_string());
            let result = self.driver.run(&action, self.timeouts.download()).await?;
            self.log_outcome("DOWNLOAD", record, &result);
            report.record(&action, result);
        }
        Ok(report)
    }

    pub async fn install(
        &self,
        criteria: &FilterCriteria,
        options: &InstallOptions,
    ) -> Result<RunReport> {
        let records = self.matching(criteria, options.no_scan).await?;
        self.install_records(records, criteria.recommended_only, options)
            .await
    }

    /// Install an already-selected set of updates.
    pub async fn install_records(
        &self,
        records: Vec<UpdateRecord>,
        recommended_only: bool,
        options: &InstallOptions,
    ) -> Result<RunReport> {
        let logger = self.driver.logger();
        if records.is_empty() {
            logger.info("INSTALL", "No matching updates; nothing to install");
            return Ok(RunReport::new(Operation::Install, RunPath::Sequential, records));
        }
        let path = choose_path(&records);
        let reboot_required = path == RunPath::Batch;

        let failures = self.preflight(reboot_required, options.force).await;
        if !failures.is_empty() {
            for failure in &failures {
                logger.error("PREFLIGHT", failure);
            }
            let mut report = RunReport::new(Operation::Install, RunPath::Blocked, records);
            report.errors = failures.clone();
            report.preflight_failures = failures;
            report.succeeded = false;
            return Ok(report);
        }

        match path {
            RunPath::Batch => self.install_batch(records, recommended_only, options).await,
            _ => self.install_each(records).await,
        }
    }

    async fn install_batch(
        &self,
        records: Vec<UpdateRecord>,
        recommended_only: bool,
        options: &InstallOptions,
    ) -> Result<RunReport> {
        let logger = self.driver.logger();
        let needs_shutdown = records
            .iter()
            .any(|record| record.post_install() == PostInstall::Shutdown);
        logger.info(
            "INSTALL",
            format!(
                "Installing {} updates in one pass; the system will {} when appropriate",
                records.len(),
                if needs_shutdown { "shut down" } else { "restart" }
            ),
        );

        let action = Action::InstallBatch {
            recommended_only,
            no_scan: options.no_scan,
        };
        let result = self.driver.run(&action, self.timeouts.install()).await?;
        let pending = result.succeeded && (result.restart_cue() || result.shutdown_cue());
        let word = if needs_shutdown || result.shutdown_cue() {
            "SHUTDOWN"
        } else {
            "RESTART"
        };

        let mut report = RunReport::new(Operation::Install, RunPath::Batch, records);
        report.record(&action, result);
        if pending {
            // Normally the machine goes down before the tool returns.
            let message = format!(
                "The system installed an update that requires a {word}, but did not {word}. Please {word}."
            );
            logger.error("INSTALL", &message);
            report.errors.push(message);
            report.succeeded = false;
        }
        Ok(report)
    }

    async fn install_each(&self, records: Vec<UpdateRecord>) -> Result<RunReport> {
        let mut report = RunReport::new(Operation::Install, RunPath::Sequential, records.clone());
        for record in &records {
            let action = Action::Install(record.id().to_string());
            let result = self.driver.run(&action, self.timeouts.install()).await?;
            self.log_outcome("INSTALL", record, &result);
            report.record(&action, result);
        }
        Ok(report)
    }

    /// Evaluate every gate; returns the failures, empty when clear to proceed.
    pub async fn preflight(&self, reboot_required: bool, force: bool) -> Vec<String> {
        let device = self.driver.device();
        let mut failures = Vec::new();

        if !force {
            match device.power().await {
                Ok(power) if power.on_battery => {
                    failures.push("The system is running on battery power.".to_string())
                }
                Ok(_) => {}
                Err(err) => failures.push(format!("Unable to determine the power source: {err}")),
            }
        }

        if reboot_required && !force {
            match device.console_user().await {
                Ok(Some(user)) => failures.push(format!(
                    "A user ({user}) is logged in, and a shutdown or restart is required."
                )),
                Ok(None) => {}
                Err(err) => failures.push(format!("Unable to determine the console user: {err}")),
            }
        }

        match device.is_filevault_encrypting().await {
            Ok(true) => failures
                .push("Updates cannot be installed while File Vault is encrypting.".to_string()),
            Ok(false) => {}
            Err(err) => failures.push(format!("Unable to determine File Vault status: {err}")),
        }

        failures
    }

    fn log_outcome(&self, code: &str, record: &UpdateRecord, result: &ExecutionResult) {
        let logger = self.driver.logger();
        if result.succeeded {
            logger.info(code, format!("{} [SUCCESS]", record.display_name()));
        } else {
            logger.error(
                code,
                format!(
                    "{} [ERROR] {}",
                    record.display_name(),
                    result.error_lines().join(" | ")
                ),
            );
        }
    }
}
