/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::update
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    The UpdateRecord entity: one available system update as
    reported by softwareupdate.

  Security / Safety Notes:
    Pure data container; no I/O performed in this module.

  Dependencies:
    serde for report serialization.

  Operational Scope:
    Built by the parser, read by the filter, orchestrator and
    report renderers.

  Revision History:
    2025-11-09 COD  Introduced UpdateRecord.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Identity fixed at construction
    - Unknown size kept distinct from zero size
============================================================*/

use serde::Serialize;

/// Post-install action an update demands from the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostInstall {
    None,
    Restart,
    Shutdown,
}

/// One available update.
///
/// Fields are only settable through the consuming `with_*` builders used while
/// parsing; once handed to the filter a record is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRecord {
    id: String,
    name: Option<String>,
    size_kib: Option<u64>,
    recommended: bool,
    restart: bool,
    shutdown: bool,
}

impl UpdateRecord {
    /// Start a record for `id`. Blank identifiers are rejected.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            name: None,
            size_kib: None,
            recommended: false,
            restart: false,
            shutdown: false,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into().trim().to_string();
        if !name.is_empty() {
            self.name = Some(name);
        }
        self
    }

    pub fn with_size_kib(mut self, size: Option<u64>) -> Self {
        self.size_kib = size;
        self
    }

    pub fn with_recommended(mut self, recommended: bool) -> Self {
        self.recommended = recommended;
        self
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_shutdown(mut self, shutdown: bool) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Swap a restart classification for a shutdown one.
    pub fn into_shutdown(self) -> Self {
        self.with_restart(false).with_shutdown(true)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name for display, falling back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn size_kib(&self) -> Option<u64> {
        self.size_kib
    }

    pub fn is_recommended(&self) -> bool {
        self.recommended
    }

    pub fn is_restart(&self) -> bool {
        self.restart
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Shutdown wins when both flags are somehow set.
    pub fn post_install(&self) -> PostInstall {
        if self.shutdown {
            PostInstall::Shutdown
        } else if self.restart {
            PostInstall::Restart
        } else {
            PostInstall::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identifier_is_rejected() {
        assert!(UpdateRecord::new("   ").is_none());
        assert!(UpdateRecord::new("").is_none());
    }

    #[test]
    fn fresh_record_has_unknown_size_and_no_flags() {
        let record = UpdateRecord::new("MRTConfigData_10_15-1.93").unwrap();
        assert_eq!(record.size_kib(), None);
        assert_eq!(record.post_install(), PostInstall::None);
        assert!(!record.is_recommended());
        assert_eq!(record.display_name(), "MRTConfigData_10_15-1.93");
    }

    #[test]
    fn into_shutdown_clears_restart() {
        let record = UpdateRecord::new("macOS 11.4")
            .unwrap()
            .with_restart(true)
            .into_shutdown();
        assert!(record.is_shutdown());
        assert!(!record.is_restart());
        assert_eq!(record.post_install(), PostInstall::Shutdown);
    }

    #[test]
    fn serializes_with_flat_fields() {
        let record = UpdateRecord::new("Safari14.1Update")
            .unwrap()
            .with_name("Safari")
            .with_size_kib(Some(204800));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], "Safari14.1Update");
        assert_eq!(json["size_kib"], 204800);
        assert_eq!(json["shutdown"], false);
    }
}
