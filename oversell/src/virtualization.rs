//! Virtualization detector
//!
//! Tries `systemd-detect-virt` first, then DMI vendor strings from
//! `dmidecode`. An unrecognized vendor (or no tool at all) is settled by the
//! `hypervisor` CPU flag: without it the host is bare metal, otherwise the
//! answer stays [`VirtualizationKind::Unknown`]. Unknown is a normal outcome
//! and never an error.

use log::{debug, info, warn};

use crate::capability::{CapabilitySet, DMIDECODE, SYSTEMD_DETECT_VIRT};
use crate::domain::{ProbeResult, ProbeStatus, ProbeValue, VirtualizationKind};
use crate::parse::{classify_dmi_strings, parse_detect_virt};
use crate::tools::{HostPaths, ToolRunner};

pub const KEY: &str = "virtualization";

/// Detected kind plus how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtDetection {
    pub kind: VirtualizationKind,
    pub method: &'static str,
    pub raw: String,
}

impl VirtDetection {
    fn unknown() -> Self {
        Self { kind: VirtualizationKind::Unknown, method: "no detection tool", raw: String::new() }
    }

    pub fn to_result(&self) -> ProbeResult {
        let message = if self.raw.is_empty() {
            format!("{} via {}", self.kind, self.method)
        } else {
            format!("{} via {} (reported '{}')", self.kind, self.method, self.raw)
        };
        ProbeResult::new(KEY, ProbeStatus::Ok, ProbeValue::Category(self.kind.to_string()), message)
    }
}

async fn via_systemd<R: ToolRunner>(runner: &R) -> Option<VirtDetection> {
    // Exits 1 when it prints "none", so the status code is not meaningful
    let out = match runner.run(SYSTEMD_DETECT_VIRT, &[]).await {
        Ok(out) => out,
        Err(e) => {
            warn!("{SYSTEMD_DETECT_VIRT} failed: {e}");
            return None;
        }
    };
    let kind = parse_detect_virt(&out.stdout)?;
    Some(VirtDetection { kind, method: SYSTEMD_DETECT_VIRT, raw: out.stdout.trim().to_string() })
}

async fn via_dmidecode<R: ToolRunner>(runner: &R) -> Option<VirtDetection> {
    let mut strings = Vec::new();
    for field in ["system-product-name", "system-manufacturer"] {
        let args = ["-s".to_string(), field.to_string()];
        match runner.run(DMIDECODE, &args).await.and_then(|o| o.check(DMIDECODE)) {
            Ok(out) => strings.push(out.stdout),
            Err(e) => debug!("dmidecode -s {field}: {e}"),
        }
    }
    let refs: Vec<&str> = strings.iter().map(String::as_str).collect();
    let kind = classify_dmi_strings(&refs)?;
    let raw = refs
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" / ");
    Some(VirtDetection { kind, method: DMIDECODE, raw })
}

/// Whether `/proc/cpuinfo` carries the `hypervisor` flag; `None` when the
/// file is unreadable or has no x86 `flags` lines
pub fn hypervisor_flag(host: &HostPaths) -> Option<bool> {
    let cpuinfo = std::fs::read_to_string(host.path("/proc/cpuinfo")).ok()?;
    let mut flag_lines = cpuinfo
        .lines()
        .filter(|l| l.split(':').next().is_some_and(|k| k.trim() == "flags"))
        .peekable();
    flag_lines.peek()?;
    Some(flag_lines.any(|l| l.split_whitespace().any(|f| f == "hypervisor")))
}

/// Settle an unknown answer with the CPU flag
fn refine_with_cpu_flag(detection: VirtDetection, host: &HostPaths) -> VirtDetection {
    if detection.kind != VirtualizationKind::Unknown {
        return detection;
    }
    match hypervisor_flag(host) {
        Some(false) => {
            debug!("no hypervisor CPU flag, treating host as bare metal");
            let method = if detection.raw.is_empty() {
                "cpuinfo flags"
            } else {
                "dmidecode + cpuinfo flags"
            };
            VirtDetection { kind: VirtualizationKind::None, method, raw: detection.raw }
        }
        _ => detection,
    }
}

/// Determine the hosting technology using whichever tools are available
pub async fn detect<R: ToolRunner>(
    runner: &R,
    host: &HostPaths,
    caps: &CapabilitySet,
) -> VirtDetection {
    let mut detection = None;
    if caps.has(SYSTEMD_DETECT_VIRT) {
        detection = via_systemd(runner).await;
    }
    if detection.is_none() && caps.has(DMIDECODE) {
        detection = via_dmidecode(runner).await;
    }
    let detection = match detection {
        // systemd-detect-virt already consulted the CPU flag itself
        Some(d) if d.method == SYSTEMD_DETECT_VIRT => d,
        Some(d) => refine_with_cpu_flag(d, host),
        None => refine_with_cpu_flag(VirtDetection::unknown(), host),
    };
    info!("virtualization: {} ({})", detection.kind, detection.method);
    detection
}
