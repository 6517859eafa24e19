//! Memory throughput probe
//!
//! Writes a fixed-size file with `dd` into tmpfs (`/dev/shm`). A host that
//! has swapped or throttled the guest's RAM shows up as a slow in-memory
//! write. When tmpfs is unusable the write falls back to the temp
//! directory, and the number is then reported without a verdict.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

use crate::capability::DD;
use crate::domain::{ProbeError, ProbeResult, ProbeStatus, Threshold};
use crate::os;
use crate::parse::parse_dd_rate;
use crate::tools::{HostPaths, ToolRunner};

use super::ProbeContext;

pub const KEY: &str = "memory_mbps";

const SHM_DIR: &str = "/dev/shm";
const FILE_PREFIX: &str = ".oversell-mem-";

#[derive(Debug, Clone)]
pub struct MemoryProbe {
    pub size_mib: u64,
    pub threshold: Threshold,
    pub fallback_dir: PathBuf,
}

/// Benchmark file, deleted when dropped on any exit path
#[derive(Debug)]
struct WriteTarget {
    file: NamedTempFile,
    in_memory: bool,
    fallback_reason: Option<String>,
}

/// Check that `/dev/shm` is a tmpfs with room for the benchmark
fn shm_problem(host: &HostPaths, size_bytes: u64) -> Option<String> {
    let shm = host.path(SHM_DIR);
    if !shm.is_dir() {
        return Some(format!("{SHM_DIR} does not exist"));
    }

    // Without /proc/mounts we cannot tell, so trust the directory
    if let Ok(mounts) = std::fs::read_to_string(host.path("/proc/mounts")) {
        let is_tmpfs = mounts.lines().any(|line| {
            let mut fields = line.split_whitespace().skip(1);
            fields.next() == Some(SHM_DIR) && fields.next() == Some("tmpfs")
        });
        if !is_tmpfs {
            return Some(format!("{SHM_DIR} is not a tmpfs mount"));
        }
    }

    if let Some(free) = os::free_bytes(&shm) {
        if free < size_bytes {
            return Some(format!(
                "{SHM_DIR} has only {} MiB free, need {} MiB",
                free / (1024 * 1024),
                size_bytes / (1024 * 1024)
            ));
        }
    }
    None
}

fn create_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    Builder::new().prefix(FILE_PREFIX).tempfile_in(dir)
}

fn select_target(
    host: &HostPaths,
    size_bytes: u64,
    fallback_dir: &Path,
) -> Result<WriteTarget, ProbeError> {
    let reason = match shm_problem(host, size_bytes) {
        None => match create_in(&host.path(SHM_DIR)) {
            Ok(file) => return Ok(WriteTarget { file, in_memory: true, fallback_reason: None }),
            Err(e) => format!("{SHM_DIR} is not writable: {e}"),
        },
        Some(reason) => reason,
    };

    warn!("memory probe: {reason}; falling back to {}", fallback_dir.display());
    let file = create_in(fallback_dir).map_err(|e| {
        ProbeError::UnsupportedEnvironment(format!(
            "{reason}, and {} is not writable either: {e}",
            fallback_dir.display()
        ))
    })?;
    Ok(WriteTarget { file, in_memory: false, fallback_reason: Some(reason) })
}

impl MemoryProbe {
    pub async fn measure<R: ToolRunner>(&self, ctx: &ProbeContext<'_, R>) -> ProbeResult {
        self.try_measure(ctx).await.unwrap_or_else(|e| ProbeResult::from_error(KEY, &e))
    }

    async fn try_measure<R: ToolRunner>(
        &self,
        ctx: &ProbeContext<'_, R>,
    ) -> Result<ProbeResult, ProbeError> {
        ctx.caps.require(DD)?;

        let target = select_target(ctx.host, self.size_mib * 1024 * 1024, &self.fallback_dir)?;
        let location = target.file.path().parent().map(Path::to_path_buf).unwrap_or_default();
        info!("memory probe: writing {} MiB to {}", self.size_mib, location.display());

        let args = vec![
            "if=/dev/zero".to_string(),
            format!("of={}", target.file.path().display()),
            "bs=1M".to_string(),
            format!("count={}", self.size_mib),
            "conv=fsync".to_string(),
        ];
        let output = ctx.runner.run(DD, &args).await;

        // Discard the file before looking at the outcome
        let WriteTarget { file, in_memory, fallback_reason } = target;
        if let Err(e) = file.close() {
            warn!("memory probe: failed to remove benchmark file: {e}");
        }

        let output = output?.check(DD)?;
        debug!("dd stderr: {}", output.stderr.trim());
        let mbps = parse_dd_rate(&output.stderr)?.conclusive(DD)?;

        Ok(self.classify(mbps, in_memory, fallback_reason.as_deref(), &location))
    }

    #[allow(clippy::cast_precision_loss)]
    fn classify(
        &self,
        mbps: u64,
        in_memory: bool,
        fallback_reason: Option<&str>,
        location: &Path,
    ) -> ProbeResult {
        let threshold = self.threshold.effective();
        let value = mbps as f64;

        if !in_memory {
            return ProbeResult::measured(
                KEY,
                ProbeStatus::Ok,
                value,
                "MB/s",
                format!(
                    "dd wrote {} MiB to {} ({}); \
                     result may be disk-bound, so no swap verdict is made",
                    self.size_mib,
                    location.display(),
                    fallback_reason.unwrap_or("tmpfs unavailable"),
                ),
            );
        }

        if value < threshold {
            ProbeResult::measured(
                KEY,
                ProbeStatus::Warning,
                value,
                "MB/s",
                format!(
                    "in-memory write below {threshold} MB/s; \
                     guest RAM may be swapped or throttled by the host"
                ),
            )
        } else {
            ProbeResult::measured(
                KEY,
                ProbeStatus::Ok,
                value,
                "MB/s",
                format!(
                    "dd wrote {} MiB to {SHM_DIR} (tmpfs); threshold {threshold} MB/s",
                    self.size_mib
                ),
            )
        }
    }
}
