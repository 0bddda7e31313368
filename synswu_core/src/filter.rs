/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::filter
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Select the updates an operator asked for.

  Security / Safety Notes:
    Restart and shutdown updates must be opted into
    explicitly so unattended runs never reboot a machine
    by surprise.

  Dependencies:
    None beyond std.

  Operational Scope:
    Between catalog parsing and any list/download/install.

  Revision History:
    2025-11-09 COD  Introduced criteria filtering.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Pure, order-preserving selection
============================================================*/

use crate::update::UpdateRecord;

/// Operator-requested selection. Defaults select only updates that need
/// neither a restart nor a shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub recommended_only: bool,
    pub restart_only: bool,
    pub shutdown_only: bool,
    /// Exclude updates larger than this; unknown sizes pass.
    pub max_size_kib: Option<u64>,
}

impl FilterCriteria {
    pub fn matches(&self, record: &UpdateRecord) -> bool {
        if self.recommended_only && !record.is_recommended() {
            return false;
        }
        if record.is_shutdown() != self.shutdown_only {
            return false;
        }
        if record.is_restart() != self.restart_only {
            return false;
        }
        match (self.max_size_kib, record.size_kib()) {
            (Some(limit), Some(size)) => size <= limit,
            _ => true,
        }
    }
}

pub fn filter(records: &[UpdateRecord], criteria: &FilterCriteria) -> Vec<UpdateRecord> {
    records
        .iter()
        .filter(|record| criteria.matches(record))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<UpdateRecord> {
        vec![
            UpdateRecord::new("XProtect-2149").unwrap().with_size_kib(Some(900)),
            UpdateRecord::new("Safari14.1Update")
                .unwrap()
                .with_recommended(true)
                .with_restart(true),
            UpdateRecord::new("MRTConfigData-1.93")
                .unwrap()
                .with_recommended(true)
                .with_size_kib(Some(4000)),
            UpdateRecord::new("Firmware-1.0")
                .unwrap()
                .with_recommended(true)
                .with_shutdown(true),
            UpdateRecord::new("Gatekeeper-181").unwrap(),
        ]
    }

    fn ids(records: &[UpdateRecord]) -> Vec<&str> {
        records.iter().map(UpdateRecord::id).collect()
    }

    #[test]
    fn default_criteria_exclude_restart_and_shutdown() {
        let selected = filter(&catalog(), &FilterCriteria::default());
        assert_eq!(ids(&selected), ["XProtect-2149", "MRTConfigData-1.93", "Gatekeeper-181"]);
        assert!(selected.iter().all(|r| !r.is_restart() && !r.is_shutdown()));
    }

    #[test]
    fn restart_only_selects_restart_records() {
        let criteria = FilterCriteria {
            restart_only: true,
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&filter(&catalog(), &criteria)), ["Safari14.1Update"]);
    }

    #[test]
    fn shutdown_only_selects_shutdown_records() {
        let criteria = FilterCriteria {
            shutdown_only: true,
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&filter(&catalog(), &criteria)), ["Firmware-1.0"]);
    }

    #[test]
    fn recommended_only_combines_with_equality_rules() {
        let criteria = FilterCriteria {
            recommended_only: true,
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&filter(&catalog(), &criteria)), ["MRTConfigData-1.93"]);
    }

    #[test]
    fn size_ceiling_lets_unknown_sizes_through() {
        let criteria = FilterCriteria {
            max_size_kib: Some(1000),
            ..FilterCriteria::default()
        };
        assert_eq!(ids(&filter(&catalog(), &criteria)), ["XProtect-2149", "Gatekeeper-181"]);
    }

    #[test]
    fn filtering_is_idempotent() {
        let records = catalog();
        let criteria = FilterCriteria {
            recommended_only: true,
            restart_only: true,
            ..FilterCriteria::default()
        };
        let once = filter(&records, &criteria);
        let twice = filter(&records, &criteria);
        assert_eq!(once, twice);
        assert_eq!(filter(&once, &criteria), once);
    }
}
