/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::wait
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Hold an update run back until the machine is idle: CPU
    load, console user, AC power, display sleep and FileVault
    are polled once per interval up to a deadline.

  Security / Safety Notes:
    Read-only polling through the device probes.

  Dependencies:
    tokio::time for the poll interval, serde for JSON output.

  Operational Scope:
    The `wait` subcommand, typically chained before install.

  Revision History:
    2025-11-09 COD  Introduced wait conditions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Unreadable probes count as blocking
============================================================*/

use std::time::Duration;

use serde::Serialize;

use crate::device::DeviceProbe;
use crate::error::Result;
use crate::logger::Logger;

/// Conditions the operator asked to wait on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitConditions {
    pub cpu: bool,
    pub user: bool,
    pub power: bool,
    pub screen: bool,
    pub filevault: bool,
}

impl WaitConditions {
    pub fn all() -> Self {
        Self {
            cpu: true,
            user: true,
            power: true,
            screen: true,
            filevault: true,
        }
    }
}

/// Which selected conditions were still blocking when waiting ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WaitReport {
    pub cpu: bool,
    pub filevault: bool,
    pub power: bool,
    pub screen: bool,
    pub user: bool,
}

impl WaitReport {
    pub fn blocking(&self) -> bool {
        self.cpu || self.filevault || self.power || self.screen || self.user
    }
}

/// Poll until nothing selected is blocking, or `polls` intervals have passed.
pub async fn wait_for<D: DeviceProbe>(
    device: &D,
    conditions: WaitConditions,
    polls: u64,
    interval: Duration,
    logger: &Logger,
) -> WaitReport {
    let mut remaining = polls;
    loop {
        let report = evaluate(device, conditions, logger).await;
        if !report.blocking() || remaining == 0 {
            logger.info("WAIT", format!("Finished waiting: {report:?}"));
            return report;
        }
        logger.debug("WAIT", format!("{remaining} polls left: {report:?}"));
        tokio::time::sleep(interval).await;
        remaining -= 1;
    }
}

async fn evaluate<D: DeviceProbe>(
    device: &D,
    conditions: WaitConditions,
    logger: &Logger,
) -> WaitReport {
    let mut report = WaitReport::default();
    if conditions.cpu {
        report.cpu = blocking(logger, "cpu", cpu_is_busy(device).await);
    }
    if conditions.filevault {
        report.filevault = blocking(logger, "filevault", device.is_filevault_encrypting().await);
    }
    if conditions.power {
        let on_battery = device.power().await.map(|power| power.on_battery);
        report.power = blocking(logger, "power", on_battery);
    }
    if conditions.screen {
        report.screen = blocking(logger, "screen", device.is_display_sleep_prevented().await);
    }
    if conditions.user {
        let logged_in = device.console_user().await.map(|user| user.is_some());
        report.user = blocking(logger, "user", logged_in);
    }
    report
}

/// One-minute load above the physical core count.
async fn cpu_is_busy<D: DeviceProbe>(device: &D) -> Result<bool> {
    let load = device.load_average().await?;
    let cores = device.physical_cores().await?;
    Ok(load > f64::from(cores))
}

fn blocking(logger: &Logger, what: &str, outcome: Result<bool>) -> bool {
    outcome.unwrap_or_else(|err| {
        logger.warn("WAIT", format!("{what} probe failed, treating as blocking: {err}"));
        true
    })
}

pub fn render(report: &WaitReport) -> String {
    let rows = [
        ("Waiting on CPU", report.cpu),
        ("Waiting on FileVault", report.filevault),
        ("Waiting on AC Power", report.power),
        ("Waiting on Screen Sleep", report.screen),
        ("Waiting on User Logout", report.user),
    ];
    rows.iter()
        .map(|(label, waiting)| {
            format!("{label:<40}{}\n", if *waiting { "[YES]" } else { "[NO]" })
        })
        .collect()
}
