//! Balloon-driver probe
//!
//! A loaded `virtio_balloon` module means the host can reclaim guest memory
//! on demand. That capability is the signal: it warns whether or not the
//! balloon is currently inflated, and missing counters never downgrade it.

use log::{debug, info};
use std::path::Path;

use crate::domain::{ProbeError, ProbeResult, ProbeStatus, ProbeValue};
use crate::tools::{HostPaths, ToolRunner};

use super::ProbeContext;

pub const KEY: &str = "balloon_driver";

const MODULE: &str = "virtio_balloon";
const DRIVER_DIR: &str = "/sys/bus/virtio/drivers/virtio_balloon";

/// Current and target allocation exposed by one balloon device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalloonCounters {
    pub device: String,
    pub current: u64,
    pub target: u64,
}

fn read_u64(path: &Path) -> Option<u64> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Whether the module is loaded (or built in)
fn module_loaded(host: &HostPaths) -> Result<bool, ProbeError> {
    let builtin = host.exists(format!("/sys/module/{MODULE}"));
    match std::fs::read_to_string(host.path("/proc/modules")) {
        Ok(modules) => {
            let listed = modules.lines().any(|l| l.split_whitespace().next() == Some(MODULE));
            Ok(listed || builtin)
        }
        Err(_) if builtin || host.exists("/sys/module") => Ok(builtin),
        Err(e) => Err(ProbeError::UnsupportedEnvironment(format!(
            "cannot list kernel modules: /proc/modules: {e}"
        ))),
    }
}

/// Per-device counters, for devices that expose both values
pub fn read_counters(host: &HostPaths) -> Vec<BalloonCounters> {
    let Ok(entries) = std::fs::read_dir(host.path(DRIVER_DIR)) else {
        return Vec::new();
    };
    let mut counters: Vec<BalloonCounters> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("virtio"))
        .filter_map(|e| {
            let dir = e.path();
            let current = read_u64(&dir.join("current"))?;
            let target = read_u64(&dir.join("target"))?;
            Some(BalloonCounters {
                device: e.file_name().to_string_lossy().into_owned(),
                current,
                target,
            })
        })
        .collect();
    counters.sort_by(|a, b| a.device.cmp(&b.device));
    counters
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BalloonProbe;

impl BalloonProbe {
    #[allow(clippy::unused_async)] // uniform with the tool-driven probes
    pub async fn measure<R: ToolRunner>(&self, ctx: &ProbeContext<'_, R>) -> ProbeResult {
        if !ctx.virt.supports_balloon() {
            return ProbeResult::not_applicable(
                KEY,
                format!("balloon checks only apply to kvm/qemu guests (detected: {})", ctx.virt),
            );
        }
        self.inspect(ctx.host).unwrap_or_else(|e| ProbeResult::from_error(KEY, &e))
    }

    fn inspect(&self, host: &HostPaths) -> Result<ProbeResult, ProbeError> {
        if !module_loaded(host)? {
            return Ok(ProbeResult::new(
                KEY,
                ProbeStatus::Ok,
                ProbeValue::Flag(false),
                format!("{MODULE} is not loaded"),
            ));
        }

        let counters = read_counters(host);
        debug!("balloon counters: {counters:?}");
        let message = if counters.is_empty() {
            format!(
                "{MODULE} is loaded; the host can reclaim guest memory on demand \
                 (current/target counters unavailable)"
            )
        } else {
            let detail = counters
                .iter()
                .map(|c| format!("{} current={} target={}", c.device, c.current, c.target))
                .collect::<Vec<_>>()
                .join(", ");
            if counters.iter().any(|c| c.current != c.target) {
                format!("{MODULE} is loaded and actively reclaiming memory ({detail})")
            } else {
                format!(
                    "{MODULE} is loaded; the host can reclaim guest memory on demand ({detail})"
                )
            }
        };
        info!("balloon probe: {message}");

        Ok(ProbeResult::new(KEY, ProbeStatus::Warning, ProbeValue::Flag(true), message))
    }
}
