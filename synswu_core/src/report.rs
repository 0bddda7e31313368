/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::report
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Render update listings, the machine summary and run
    reports as plain text or JSON documents.

  Security / Safety Notes:
    Output goes to stdout only; the console username is the
    only personal datum included.

  Dependencies:
    serde + serde_json for JSON, chrono for stamps.

  Operational Scope:
    Final step of every subcommand.

  Revision History:
    2025-11-09 COD  Adapted the manifest writer into reports.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Same fields in text and JSON renderings
    - Deterministic ordering (listing order is preserved)
============================================================*/

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::device::DeviceProbe;
use crate::error::{Result, SynswuError};
use crate::logger::Logger;
use crate::orchestrator::{RunPath, RunReport};
use crate::update::{PostInstall, UpdateRecord};

const NAME_WIDTH: usize = 59;

/// Matching updates as a JSON document.
#[derive(Debug, Serialize)]
pub struct UpdateListing<'a> {
    pub generated_at: String,
    pub count: usize,
    pub updates: &'a [UpdateRecord],
}

impl<'a> UpdateListing<'a> {
    pub fn new(updates: &'a [UpdateRecord]) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            count: updates.len(),
            updates,
        }
    }
}

/// Update counts and the machine state that gates installs.
#[derive(Debug, Default, Serialize)]
pub struct SummaryReport {
    pub count: usize,
    /// Recommended updates that need neither restart nor shutdown.
    pub recommended: usize,
    pub restart: usize,
    pub shutdown: usize,
    pub battery: Option<bool>,
    pub console_user: Option<String>,
    pub disk_space_gib: Option<u64>,
    pub encrypting: Option<bool>,
    pub prevent_sleep: Option<bool>,
    pub security_chip: Option<bool>,
}

/// Build the summary. Probe failures leave their field empty.
pub async fn summarize<D: DeviceProbe>(
    records: &[UpdateRecord],
    device: &D,
    logger: &Logger,
) -> SummaryReport {
    let mut summary = SummaryReport {
        count: records.len(),
        ..SummaryReport::default()
    };
    for record in records {
        if record.is_recommended() && !record.is_restart() && !record.is_shutdown() {
            summary.recommended += 1;
        }
        if record.is_restart() {
            summary.restart += 1;
        }
        if record.is_shutdown() {
            summary.shutdown += 1;
        }
    }

    summary.battery = probe(logger, "power", device.power().await).map(|p| p.on_battery);
    summary.console_user = probe(logger, "console user", device.console_user().await).flatten();
    summary.disk_space_gib = probe(logger, "disk space", device.free_disk_space_gib().await);
    summary.encrypting = probe(logger, "FileVault", device.is_filevault_encrypting().await);
    summary.prevent_sleep = probe(
        logger,
        "display sleep",
        device.is_display_sleep_prevented().await,
    );
    summary.security_chip = probe(logger, "security chip", device.has_security_chip().await);
    summary
}

fn probe<T>(logger: &Logger, what: &str, outcome: Result<T>) -> Option<T> {
    outcome
        .map_err(|err| logger.warn("PROBE", format!("{what} probe failed: {err}")))
        .ok()
}

pub fn to_json<T: Serialize>(document: &T) -> Result<String> {
    serde_json::to_string_pretty(document)
        .map_err(|err| SynswuError::Serialization(format!("Failed to render JSON: {err}")))
}

/// `quiet` prints identifiers only.
pub fn render_listing(records: &[UpdateRecord], quiet: bool) -> String {
    if quiet {
        return records
            .iter()
            .map(|record| format!("{}\n", record.id()))
            .collect();
    }
    if records.is_empty() {
        return "No Updates are Available.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let size = record
            .size_kib()
            .map_or_else(|| "?".to_string(), |kib| format!("{kib}K"));
        let mut tags = Vec::new();
        if record.is_recommended() {
            tags.push("[recommended]");
        }
        match record.post_install() {
            PostInstall::Restart => tags.push("[restart]"),
            PostInstall::Shutdown => tags.push("[shutdown]"),
            PostInstall::None => {}
        }
        let line = format!(
            "{:<width$} {:<14} {}",
            truncate(record.display_name(), NAME_WIDTH),
            size,
            tags.join(" "),
            width = NAME_WIDTH
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Cut `text` to at most `width` characters.
fn truncate(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn render_summary(summary: &SummaryReport) -> String {
    fn yes_no(value: Option<bool>) -> &'static str {
        match value {
            Some(true) => "Yes",
            Some(false) => "No",
            None => "Unknown",
        }
    }

    let rows = [
        ("Total Updates", summary.count.to_string()),
        ("Recommended Updates", summary.recommended.to_string()),
        ("Updates Requiring Restart", summary.restart.to_string()),
        ("Updates Requiring Shutdown", summary.shutdown.to_string()),
        (
            "Console Username",
            summary.console_user.clone().unwrap_or_default(),
        ),
        (
            "Free Disk Space",
            summary
                .disk_space_gib
                .map_or_else(|| "Unknown".to_string(), |gib| format!("{gib}GiB")),
        ),
        ("Has T2 Security Chip", yes_no(summary.security_chip).into()),
        ("On Battery Power?", yes_no(summary.battery).into()),
        ("Encryption in Progress?", yes_no(summary.encrypting).into()),
        ("Screen Sleep Prevented?", yes_no(summary.prevent_sleep).into()),
    ];
    rows.iter()
        .map(|(label, value)| format!("{label:<50}{value}\n"))
        .collect()
}

pub fn render_run(report: &RunReport) -> String {
    let mut out = String::new();
    if report.path == RunPath::Blocked {
        for failure in &report.preflight_failures {
            out.push_str(&format!("[ERROR] {failure}\n"));
        }
        return out;
    }
    if report.outcomes.is_empty() {
        out.push_str("There are no matching updates.\n");
    }
    for outcome in &report.outcomes {
        let verdict = if outcome.result.succeeded {
            "[SUCCESS]"
        } else {
            "[ERROR]"
        };
        out.push_str(&format!("{:<50}{verdict}\n", outcome.action));
        if !outcome.result.succeeded {
            for line in outcome.result.error_lines() {
                out.push_str(&format!("  {line}\n"));
            }
        }
    }
    let trailing: Vec<&String> = report
        .errors
        .iter()
        .filter(|error| {
            !report
                .outcomes
                .iter()
                .any(|outcome| outcome.result.error_lines().contains(*error))
        })
        .collect();
    for error in trailing {
        out.push_str(&format!("[ERROR] {error}\n"));
    }
    out
}
