/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::install_log
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Decide whether a "restart" update really needs a full
    shutdown on T2 machines by consulting install.log for a
    pending bridgeOS update.

  Security / Safety Notes:
    Reads /var/log/install.log (world-readable); never writes.

  Dependencies:
    std::fs only.

  Operational Scope:
    Applied to every parsed record before filtering.

  Revision History:
    2025-11-09 COD  Introduced bridgeOS shutdown detection.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Advisory lookup: failures keep the restart classification
    - Classification isolated from parsing
============================================================*/

use std::io;
use std::path::PathBuf;

use crate::update::UpdateRecord;

const BRIDGE_OS_NOTE: &str = "requires bridgeOS update";

/// Line source for the installation log.
pub trait InstallLog {
    fn lines(&self) -> io::Result<Vec<String>>;
}

/// The on-disk installation log.
#[derive(Debug, Clone)]
pub struct FileInstallLog {
    path: PathBuf,
}

impl FileInstallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InstallLog for FileInstallLog {
    fn lines(&self) -> io::Result<Vec<String>> {
        let bytes = std::fs::read(&self.path)?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// Upgrade a restart record to shutdown when the machine has a T2 chip and
/// the log says the update carries a bridgeOS payload.
pub fn reclassify_shutdown<L: InstallLog>(
    record: UpdateRecord,
    has_security_chip: bool,
    log: &L,
) -> UpdateRecord {
    if !has_security_chip || !record.is_restart() || record.is_shutdown() {
        return record;
    }
    match log.lines() {
        Ok(lines) if requires_bridgeos(&lines, record.id()) => record.into_shutdown(),
        _ => record,
    }
}

/// Look for a bridgeOS note in the latest reporting period that names `id`,
/// starting at the first mention of `id` within that period. The period is
/// the line's leading date stamp.
pub fn requires_bridgeos<S: AsRef<str>>(lines: &[S], id: &str) -> bool {
    let Some(last) = lines.iter().rposition(|line| line.as_ref().contains(id)) else {
        return false;
    };
    let period = reporting_period(lines[last].as_ref());
    let period_start = lines[..last]
        .iter()
        .rposition(|line| reporting_period(line.as_ref()) != period)
        .map_or(0, |index| index + 1);
    let anchor = (period_start..=last)
        .find(|&index| lines[index].as_ref().contains(id))
        .unwrap_or(last);

    lines[anchor..]
        .iter()
        .map(|line| line.as_ref())
        .take_while(|line| reporting_period(line) == period)
        .any(|line| line.contains(BRIDGE_OS_NOTE))
}

fn reporting_period(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}
