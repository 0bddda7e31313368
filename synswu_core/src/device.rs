/*============================================================
  Synavera Project: Syn-SWU
  Module: synswu_core::device
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Host probes consulted around softwareupdate runs: OS
    version, T2 presence, free disk, power source, console
    user, FileVault state, display sleep and CPU load.

  Security / Safety Notes:
    Read-only queries through sw_vers, system_profiler,
    pmset, stat and fdesetup; statvfs via libc; core count and
    load average via sysinfo.

  Dependencies:
    libc for statvfs, sysinfo for cores and load, regex for
    pmset parsing.

  Operational Scope:
    Layout selection, preflight gates, disk-space reporting,
    the summary report and the wait loop.

  Revision History:
    2025-11-09 COD  Introduced macOS device probes.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Every text parser is a pure function
    - Probe commands share the driver's process runner
============================================================*/

use std::ffi::CString;
use std::fmt;
use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use sysinfo::System;

use crate::error::{Result, SynswuError};
use crate::parser::FormatVariant;
use crate::process::{display_argv, ProcessRunner};

const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
const GIB: u64 = 1024 * 1024 * 1024;

lazy_static! {
    static ref BATTERY_PERCENT_REGEX: Regex = Regex::new(r"(\d{1,3})%").unwrap();
    static ref BATTERY_REMAINING_REGEX: Regex = Regex::new(r"(\d+:\d{2}) remaining").unwrap();
}

/// `major.minor.revision` as reported by `sw_vers -productVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl OsVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts.next().and_then(|p| p.trim().parse().ok()).unwrap_or(0);
        let revision = parts.next().and_then(|p| p.trim().parse().ok()).unwrap_or(0);
        Some(Self {
            major,
            minor,
            revision,
        })
    }

    /// 10.15 introduced the `Label:` listing layout.
    pub fn format_variant(&self) -> FormatVariant {
        if self.major > 10 || (self.major == 10 && self.minor >= 15) {
            FormatVariant::Modern
        } else {
            FormatVariant::Legacy
        }
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Power source and battery state from `pmset -g batt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PowerStatus {
    pub on_battery: bool,
    pub battery_present: bool,
    pub percentage: Option<u8>,
    pub time_remaining: Option<String>,
}

/// Host facts needed around update runs.
#[allow(async_fn_in_trait)]
pub trait DeviceProbe {
    async fn os_version(&self) -> Result<OsVersion>;
    async fn has_security_chip(&self) -> Result<bool>;
    async fn free_disk_space_gib(&self) -> Result<u64>;
    async fn physical_cores(&self) -> Result<u32>;
    async fn power(&self) -> Result<PowerStatus>;
    async fn is_display_sleep_prevented(&self) -> Result<bool>;
    async fn console_user(&self) -> Result<Option<String>>;
    async fn is_filevault_encrypting(&self) -> Result<bool>;
    async fn load_average(&self) -> Result<f64>;
}

/// Probes backed by the stock macOS utilities.
pub struct MacDevice<'a, R: ProcessRunner> {
    runner: &'a R,
}

impl<'a, R: ProcessRunner> MacDevice<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    async fn capture(&self, argv: &[&str]) -> Result<String> {
        let argv: Vec<String> = argv.iter().map(|arg| arg.to_string()).collect();
        let output = self.runner.execute(&argv, PROBE_TIMEOUT).await?;
        if !output.success() {
            return Err(SynswuError::CommandFailure {
                command: display_argv(&argv),
                status: output.exit_code.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl<R: ProcessRunner> DeviceProbe for MacDevice<'_, R> {
    async fn os_version(&self) -> Result<OsVersion> {
        let raw = self.capture(&["sw_vers", "-productVersion"]).await?;
        OsVersion::parse(&raw).ok_or_else(|| {
            SynswuError::Serialization(format!("Unrecognised macOS version `{}`", raw.trim()))
        })
    }

    async fn has_security_chip(&self) -> Result<bool> {
        let raw = self
            .capture(&["system_profiler", "SPiBridgeDataType"])
            .await?;
        Ok(parse_security_chip(&raw))
    }

    async fn free_disk_space_gib(&self) -> Result<u64> {
        statvfs_free_gib("/")
    }

    async fn physical_cores(&self) -> Result<u32> {
        let cores = System::new()
            .physical_core_count()
            .ok_or_else(|| SynswuError::Runtime("Unable to read the physical core count".into()))?;
        u32::try_from(cores)
            .map_err(|err| SynswuError::Runtime(format!("Core count {cores} out of range: {err}")))
    }

    async fn power(&self) -> Result<PowerStatus> {
        let raw = self.capture(&["pmset", "-g", "batt"]).await?;
        Ok(parse_power_status(&raw))
    }

    async fn is_display_sleep_prevented(&self) -> Result<bool> {
        let raw = self.capture(&["pmset", "-g", "assertions"]).await?;
        Ok(parse_display_sleep_prevented(&raw))
    }

    async fn console_user(&self) -> Result<Option<String>> {
        let raw = self
            .capture(&["stat", "-f", "%Su", "/dev/console"])
            .await?;
        Ok(parse_console_user(&raw))
    }

    async fn is_filevault_encrypting(&self) -> Result<bool> {
        let raw = self.capture(&["fdesetup", "status"]).await?;
        Ok(raw.contains("Encryption in progress"))
    }

    async fn load_average(&self) -> Result<f64> {
        Ok(System::load_average().one)
    }
}

fn parse_security_chip(raw: &str) -> bool {
    raw.lines()
        .any(|line| line.contains("Model Name:") && line.contains("T2"))
}

fn parse_power_status(raw: &str) -> PowerStatus {
    let mut status = PowerStatus {
        on_battery: raw.contains("'Battery Power'"),
        ..PowerStatus::default()
    };
    if let Some(line) = raw.lines().find(|line| line.contains("InternalBattery")) {
        status.battery_present = true;
        status.percentage = BATTERY_PERCENT_REGEX
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());
        status.time_remaining = BATTERY_REMAINING_REGEX
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
    }
    status
}

fn parse_display_sleep_prevented(raw: &str) -> bool {
    raw.lines().any(|line| {
        let mut tokens = line.split_whitespace();
        tokens.next() == Some("PreventUserIdleDisplaySleep") && tokens.next() == Some("1")
    })
}

fn parse_console_user(raw: &str) -> Option<String> {
    let user = raw.trim();
    match user {
        "" | "root" | "loginwindow" | "_mbsetupuser" => None,
        other => Some(other.to_string()),
    }
}

#[allow(clippy::unnecessary_cast)]
fn statvfs_free_gib(path: &str) -> Result<u64> {
    let c_path = CString::new(path)
        .map_err(|err| SynswuError::Runtime(format!("Invalid mount path {path}: {err}")))?;
    let mut stats = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: `c_path` is NUL-terminated and `stats` is valid for writes.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), stats.as_mut_ptr()) };
    if rc != 0 {
        return Err(SynswuError::Io(io::Error::last_os_error()));
    }
    // SAFETY: statvfs returned 0, so the struct is initialised.
    let stats = unsafe { stats.assume_init() };
    let bytes = (stats.f_bavail as u64).saturating_mul(stats.f_frsize as u64);
    Ok(bytes / GIB)
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// Fixed-answer probe for orchestrator and report tests.
    #[derive(Debug, Clone)]
    pub struct FakeDevice {
        pub version: OsVersion,
        pub security_chip: bool,
        pub free_gib: u64,
        pub cores: u32,
        pub power: PowerStatus,
        pub display_sleep_prevented: bool,
        pub console_user: Option<String>,
        pub encrypting: bool,
        pub load: f64,
    }

    impl Default for FakeDevice {
        fn default() -> Self {
            Self {
                version: OsVersion {
                    major: 11,
                    minor: 4,
                    revision: 0,
                },
                security_chip: false,
                free_gib: 120,
                cores: 4,
                power: PowerStatus::default(),
                display_sleep_prevented: false,
                console_user: None,
                encrypting: false,
                load: 0.5,
            }
        }
    }

    impl DeviceProbe for FakeDevice {
        async fn os_version(&self) -> Result<OsVersion> {
            Ok(self.version)
        }
        async fn has_security_chip(&self) -> Result<bool> {
            Ok(self.security_chip)
        }
        async fn free_disk_space_gib(&self) -> Result<u64> {
            Ok(self.free_gib)
        }
        async fn physical_cores(&self) -> Result<u32> {
            Ok(self.cores)
        }
        async fn power(&self) -> Result<PowerStatus> {
            Ok(self.power.clone())
        }
        async fn is_display_sleep_prevented(&self) -> Result<bool> {
            Ok(self.display_sleep_prevented)
        }
        async fn console_user(&self) -> Result<Option<String>> {
            Ok(self.console_user.clone())
        }
        async fn is_filevault_encrypting(&self) -> Result<bool> {
            Ok(self.encrypting)
        }
        async fn load_average(&self) -> Result<f64> {
            Ok(self.load)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;

    #[test]
    fn version_parsing_and_layout_selection() {
        let catalina = OsVersion::parse("10.15.7\n").unwrap();
        assert_eq!(catalina.to_string(), "10.15.7");
        assert_eq!(catalina.format_variant(), FormatVariant::Modern);

        let mojave = OsVersion::parse("10.14.6").unwrap();
        assert_eq!(mojave.format_variant(), FormatVariant::Legacy);

        let big_sur = OsVersion::parse("11.4").unwrap();
        assert_eq!(big_sur.revision, 0);
        assert_eq!(big_sur.format_variant(), FormatVariant::Modern);

        assert!(OsVersion::parse("").is_none());
    }

    #[test]
    fn pmset_on_battery() {
        let raw = "Now drawing from 'Battery Power'\n -InternalBattery-0 (id=4653155)\t85%; discharging; 3:12 remaining present: true\n";
        let status = parse_power_status(raw);
        assert!(status.on_battery);
        assert!(status.battery_present);
        assert_eq!(status.percentage, Some(85));
        assert_eq!(status.time_remaining.as_deref(), Some("3:12"));
    }

    #[test]
    fn pmset_on_desktop_ac() {
        let status = parse_power_status("Now drawing from 'AC Power'\n");
        assert_eq!(status, PowerStatus::default());
    }

    #[test]
    fn display_assertions() {
        let raw = "Assertion status system-wide:\n   BackgroundTask                 0\n   PreventUserIdleDisplaySleep    1\n";
        assert!(parse_display_sleep_prevented(raw));
        assert!(!parse_display_sleep_prevented(
            "   PreventUserIdleDisplaySleep    0\n"
        ));
    }

    #[test]
    fn console_user_placeholders_mean_nobody() {
        assert_eq!(parse_console_user("root\n"), None);
        assert_eq!(parse_console_user("_mbsetupuser"), None);
        assert_eq!(parse_console_user("jdoe\n"), Some("jdoe".into()));
    }

    #[test]
    fn t2_detection() {
        assert!(parse_security_chip(
            "Controller Information:\n      Model Name: Apple T2 Security Chip\n"
        ));
        assert!(!parse_security_chip(""));
    }

    #[test]
    fn free_space_of_root_is_readable() {
        assert!(statvfs_free_gib("/").is_ok());
    }

    #[tokio::test]
    async fn cores_and_load_come_from_the_host() {
        let runner = ScriptedRunner::default();
        let device = MacDevice::new(&runner);
        if let Ok(cores) = device.physical_cores().await {
            assert!(cores >= 1);
        }
        assert!(device.load_average().await.unwrap() >= 0.0);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn probes_go_through_the_runner() {
        let runner = ScriptedRunner::default();
        runner.push(0, "10.15.7\n", "");
        runner.push(0, "FileVault is Off.\nEncryption in progress: Percent completed = 12\n", "");
        runner.push(1, "", "stat: /dev/console: No such file");
        let device = MacDevice::new(&runner);

        assert_eq!(device.os_version().await.unwrap().minor, 15);
        assert!(device.is_filevault_encrypting().await.unwrap());
        let err = device.console_user().await.unwrap_err();
        assert!(matches!(err, SynswuError::CommandFailure { status: 1, .. }));

        let calls = runner.calls.borrow();
        assert_eq!(calls[0], vec!["sw_vers", "-productVersion"]);
        assert_eq!(calls[1], vec!["fdesetup", "status"]);
    }
}
