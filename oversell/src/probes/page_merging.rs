//! Kernel same-page merging (KSM) probe
//!
//! An enabled KSM daemon means identical pages are being deduplicated,
//! typical of hosts packing more guests than their RAM. If the control file
//! is absent the feature is not built in, which counts as "not in use".

use log::info;

use crate::domain::{ProbeError, ProbeResult, ProbeStatus, ProbeValue};
use crate::os;
use crate::tools::{HostPaths, ToolRunner};

use super::ProbeContext;

pub const KEY: &str = "page_merging";

const KSM_DIR: &str = "/sys/kernel/mm/ksm";

/// Merging counters read while KSM is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KsmStats {
    /// Distinct shared pages in use
    pub pages_shared: u64,
    /// Additional mappings pointing at shared pages, i.e. pages saved
    pub pages_sharing: u64,
}

impl KsmStats {
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn saved_mib(&self, page_size: u64) -> f64 {
        (self.pages_sharing * page_size) as f64 / (1024.0 * 1024.0)
    }
}

fn read_counter(host: &HostPaths, name: &str) -> Option<u64> {
    host.read_trimmed(format!("{KSM_DIR}/{name}")).ok()?.parse().ok()
}

#[derive(Debug, Clone, Copy)]
pub struct PageMergingProbe {
    pub page_size: u64,
}

impl Default for PageMergingProbe {
    fn default() -> Self {
        Self { page_size: os::page_size() }
    }
}

impl PageMergingProbe {
    #[allow(clippy::unused_async)] // uniform with the tool-driven probes
    pub async fn measure<R: ToolRunner>(&self, ctx: &ProbeContext<'_, R>) -> ProbeResult {
        self.inspect(ctx.host).unwrap_or_else(|e| ProbeResult::from_error(KEY, &e))
    }

    fn inspect(&self, host: &HostPaths) -> Result<ProbeResult, ProbeError> {
        let run_path = format!("{KSM_DIR}/run");
        if !host.exists(&run_path) {
            return Ok(ProbeResult::new(
                KEY,
                ProbeStatus::Ok,
                ProbeValue::Flag(false),
                "KSM is not supported by this kernel",
            ));
        }

        let run = host.read_trimmed(&run_path)?;
        match run.as_str() {
            "1" => {}
            // 0 = stopped, 2 = stopped and unmerging
            "0" | "2" => {
                return Ok(ProbeResult::new(
                    KEY,
                    ProbeStatus::Ok,
                    ProbeValue::Flag(false),
                    format!("KSM is present but not running (run={run})"),
                ))
            }
            other => {
                let detail = format!("unexpected run value '{other}'");
                return Err(ProbeError::unparseable("ksm", detail));
            }
        }

        let stats = KsmStats {
            pages_shared: read_counter(host, "pages_shared").unwrap_or(0),
            pages_sharing: read_counter(host, "pages_sharing").unwrap_or(0),
        };
        let message = format!(
            "KSM is running: {} shared pages, {} merged mappings, ~{:.1} MiB saved",
            stats.pages_shared,
            stats.pages_sharing,
            stats.saved_mib(self.page_size)
        );
        info!("page merging probe: {message}");

        Ok(ProbeResult::new(KEY, ProbeStatus::Warning, ProbeValue::Flag(true), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::domain::VirtualizationKind;
    use crate::tools::fake::ScriptedRunner;
    use std::path::Path;

    fn write_ksm(root: &Path, run: &str, shared: &str, sharing: &str) {
        let dir = root.join("sys/kernel/mm/ksm");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("run"), run).unwrap();
        std::fs::write(dir.join("pages_shared"), shared).unwrap();
        std::fs::write(dir.join("pages_sharing"), sharing).unwrap();
    }

    async fn measure(root: &Path) -> ProbeResult {
        let runner = ScriptedRunner::new();
        let caps = CapabilitySet::default();
        let host = HostPaths::with_root(root);
        // Page merging is checked regardless of the hypervisor
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Lxc,
        };
        PageMergingProbe { page_size: 4096 }.measure(&ctx).await
    }

    #[test]
    fn test_saved_estimate() {
        let stats = KsmStats { pages_shared: 10, pages_sharing: 2560 };
        assert!((stats.saved_mib(4096) - 10.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_enabled_warns_with_savings() {
        let root = tempfile::tempdir().unwrap();
        write_ksm(root.path(), "1\n", "512\n", "2560\n");
        let result = measure(root.path()).await;
        assert_eq!(result.status, ProbeStatus::Warning);
        assert_eq!(result.value, Some(ProbeValue::Flag(true)));
        assert!(result.message.contains("512 shared pages"));
        assert!(result.message.contains("~10.0 MiB saved"));
    }

    #[tokio::test]
    async fn test_stopped_is_ok() {
        let root = tempfile::tempdir().unwrap();
        write_ksm(root.path(), "0\n", "0\n", "0\n");
        assert_eq!(measure(root.path()).await.status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn test_absent_control_file_is_ok() {
        let root = tempfile::tempdir().unwrap();
        let result = measure(root.path()).await;
        assert_eq!(result.status, ProbeStatus::Ok);
        assert_eq!(result.value, Some(ProbeValue::Flag(false)));
    }

    #[tokio::test]
    async fn test_garbage_run_value_is_error() {
        let root = tempfile::tempdir().unwrap();
        write_ksm(root.path(), "yes\n", "0\n", "0\n");
        assert_eq!(measure(root.path()).await.status, ProbeStatus::Error);
    }
}
