//! Disk throughput probe
//!
//! Runs a fixed-duration 4 KiB random-write `fio` job with direct I/O on
//! the working volume. There is no fallback to `dd`: sequential writes do
//! not expose the small random-write starvation typical of oversold storage.
//!
//! Extended mode adds four standalone variants (small random read/write,
//! large sequential read/write), each reported under its own key.

use log::{debug, info, warn};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tempfile::Builder;

use crate::capability::FIO;
use crate::config::disk_default_for;
use crate::domain::{MediaKind, ProbeError, ProbeResult, ProbeStatus, Threshold};
use crate::os;
use crate::parse::{parse_fio_bandwidth, Direction};
use crate::tools::{HostPaths, ToolRunner};

use super::ProbeContext;

pub const KEY: &str = "disk_mbps";

const FILE_PREFIX: &str = ".oversell-fio-";

/// One fio benchmark shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FioJob {
    pub key: &'static str,
    pub label: &'static str,
    pub rw: &'static str,
    pub block_size: &'static str,
    pub direction: Direction,
}

/// The classified benchmark
pub const PRIMARY_JOB: FioJob = FioJob {
    key: KEY,
    label: "4 KiB random write",
    rw: "randwrite",
    block_size: "4k",
    direction: Direction::Write,
};

pub const EXTENDED_JOBS: [FioJob; 4] = [
    FioJob {
        key: "disk_randread_4k_mbps",
        label: "4 KiB random read",
        rw: "randread",
        block_size: "4k",
        direction: Direction::Read,
    },
    FioJob {
        key: "disk_randwrite_4k_mbps",
        label: "4 KiB random write",
        rw: "randwrite",
        block_size: "4k",
        direction: Direction::Write,
    },
    FioJob {
        key: "disk_seqread_1m_mbps",
        label: "1 MiB sequential read",
        rw: "read",
        block_size: "1M",
        direction: Direction::Read,
    },
    FioJob {
        key: "disk_seqwrite_1m_mbps",
        label: "1 MiB sequential write",
        rw: "write",
        block_size: "1M",
        direction: Direction::Write,
    },
];

/// Keys this probe emits for the given mode
pub fn keys(extended: bool) -> Vec<&'static str> {
    let mut keys = vec![PRIMARY_JOB.key];
    if extended {
        keys.extend(EXTENDED_JOBS.iter().map(|j| j.key));
    }
    keys
}

/// Read `queue/rotational` for a block device, trying the parent for partitions
pub fn media_from_sysfs(host: &HostPaths, major: u64, minor: u64) -> Option<MediaKind> {
    let base = host.path(format!("/sys/dev/block/{major}:{minor}"));
    for candidate in [base.join("queue/rotational"), base.join("../queue/rotational")] {
        match std::fs::read_to_string(&candidate).map(|s| s.trim().to_string()).as_deref() {
            Ok("1") => return Some(MediaKind::Rotational),
            Ok("0") => return Some(MediaKind::SolidState),
            Ok(other) => debug!("{}: unexpected '{other}'", candidate.display()),
            Err(_) => {}
        }
    }
    None
}

/// Best-effort media type of the volume holding `dir`
pub fn detect_media(host: &HostPaths, dir: &Path) -> Option<MediaKind> {
    let dev = std::fs::metadata(dir).ok()?.dev();
    let (major, minor) = os::split_dev(dev);
    if major == 0 {
        // Anonymous device: overlayfs, tmpfs, btrfs subvolume, ...
        debug!("{} sits on an anonymous device, media unknown", dir.display());
        return None;
    }
    media_from_sysfs(host, major, minor)
}

#[derive(Debug, Clone)]
pub struct DiskProbe {
    pub threshold: Threshold,
    pub work_dir: PathBuf,
    pub file_mib: u64,
    pub runtime_secs: u32,
    pub iodepth: u32,
    pub extended: bool,
}

impl DiskProbe {
    /// One result for the primary job, plus one per variant in extended mode
    pub async fn measure<R: ToolRunner>(&self, ctx: &ProbeContext<'_, R>) -> Vec<ProbeResult> {
        if let Err(e) = ctx.caps.require(FIO) {
            return keys(self.extended)
                .into_iter()
                .map(|k| ProbeResult::from_error(k, &e))
                .collect();
        }

        let mut results = vec![self.measure_primary(ctx).await];
        if self.extended {
            for job in &EXTENDED_JOBS {
                let result = match self.run_job(ctx, job).await {
                    Ok(mbps) => self.describe_variant(job, mbps),
                    Err(e) => ProbeResult::from_error(job.key, &e),
                };
                results.push(result);
            }
        }
        results
    }

    async fn measure_primary<R: ToolRunner>(&self, ctx: &ProbeContext<'_, R>) -> ProbeResult {
        let detected = detect_media(ctx.host, &self.work_dir);
        let media = detected.unwrap_or(MediaKind::Rotational);
        let threshold = self.threshold.with_default(disk_default_for(media));
        info!(
            "disk probe: media {media}{}, threshold {} MB/s",
            if detected.is_none() { " (assumed)" } else { "" },
            threshold.effective()
        );

        match self.run_job(ctx, &PRIMARY_JOB).await {
            Ok(mbps) => classify(mbps, &threshold, media, detected.is_some(), self.iodepth),
            Err(e) => ProbeResult::from_error(KEY, &e),
        }
    }

    fn fio_args(&self, job: &FioJob, path: &Path, engine: &str) -> Vec<String> {
        vec![
            format!("--name=oversell-{}", job.rw),
            format!("--filename={}", path.display()),
            format!("--rw={}", job.rw),
            format!("--bs={}", job.block_size),
            format!("--iodepth={}", self.iodepth),
            format!("--ioengine={engine}"),
            "--direct=1".to_string(),
            format!("--size={}M", self.file_mib),
            format!("--runtime={}", self.runtime_secs),
            "--time_based".to_string(),
            "--numjobs=1".to_string(),
            "--group_reporting".to_string(),
        ]
    }

    /// Run one fio job against a scratch file that is removed afterwards
    async fn run_job<R: ToolRunner>(
        &self,
        ctx: &ProbeContext<'_, R>,
        job: &FioJob,
    ) -> Result<u64, ProbeError> {
        let work_dir = self.work_dir.display();
        let file = Builder::new()
            .prefix(FILE_PREFIX)
            .tempfile_in(&self.work_dir)
            .map_err(|e| {
                ProbeError::UnsupportedEnvironment(format!("{work_dir} is not writable: {e}"))
            })?;
        info!("disk probe: fio {} for {}s on {work_dir}", job.label, self.runtime_secs);

        let mut output = ctx.runner.run(FIO, &self.fio_args(job, file.path(), "libaio")).await;
        let libaio_missing = matches!(
            &output,
            Ok(out) if !out.success
                && (out.stderr.contains("libaio") || out.stdout.contains("libaio"))
        );
        if libaio_missing {
            warn!("disk probe: libaio engine unavailable, retrying with psync");
            output = ctx.runner.run(FIO, &self.fio_args(job, file.path(), "psync")).await;
        }

        if let Err(e) = file.close() {
            warn!("disk probe: failed to remove benchmark file: {e}");
        }

        let output = output?.check(FIO)?;
        parse_fio_bandwidth(&output.stdout, job.direction)?.conclusive(FIO)
    }

    #[allow(clippy::cast_precision_loss)]
    fn describe_variant(&self, job: &FioJob, mbps: u64) -> ProbeResult {
        ProbeResult::measured(
            job.key,
            ProbeStatus::Ok,
            mbps as f64,
            "MB/s",
            format!("fio {}, direct I/O, {}s", job.label, self.runtime_secs),
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn classify(
    mbps: u64,
    threshold: &Threshold,
    media: MediaKind,
    media_known: bool,
    iodepth: u32,
) -> ProbeResult {
    let limit = threshold.effective();
    let source = if threshold.is_overridden() {
        "user-set".to_string()
    } else if media_known {
        format!("{media} default")
    } else {
        format!("{media} default, media undetermined")
    };
    let value = mbps as f64;

    if value < limit {
        ProbeResult::measured(
            KEY,
            ProbeStatus::Warning,
            value,
            "MB/s",
            format!(
                "4 KiB random writes below {limit} MB/s ({source}); \
                 storage may be oversold or throttled"
            ),
        )
    } else {
        ProbeResult::measured(
            KEY,
            ProbeStatus::Ok,
            value,
            "MB/s",
            format!(
                "fio 4 KiB random write, iodepth {iodepth}, direct I/O; \
                 threshold {limit} MB/s ({source})"
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::domain::{FailureKind, ProbeValue, VirtualizationKind};
    use crate::tools::fake::ScriptedRunner;

    const FIO_OUT: &str = "\
Run status group 0 (all jobs):
   READ: bw=120MiB/s (126MB/s), 120MiB/s-120MiB/s (126MB/s-126MB/s), io=1200MiB
  WRITE: bw=40.0MiB/s (41.9MB/s), 40.0MiB/s-40.0MiB/s (41.9MB/s-41.9MB/s), io=400MiB
";

    fn probe(work_dir: &Path, extended: bool, override_mbps: Option<f64>) -> DiskProbe {
        DiskProbe {
            threshold: Threshold::new("disk", 10.0, override_mbps),
            work_dir: work_dir.to_path_buf(),
            file_mib: 1,
            runtime_secs: 1,
            iodepth: 64,
            extended,
        }
    }

    #[test]
    fn test_media_from_sysfs_partition_uses_parent_queue() {
        let root = tempfile::tempdir().unwrap();
        // /sys/dev/block/8:1 -> .../sda/sda1, queue lives on sda
        let disk = root.path().join("sys/devices/sda");
        std::fs::create_dir_all(disk.join("sda1")).unwrap();
        std::fs::create_dir_all(disk.join("queue")).unwrap();
        std::fs::write(disk.join("queue/rotational"), "0\n").unwrap();
        std::fs::create_dir_all(root.path().join("sys/dev/block")).unwrap();
        let link = root.path().join("sys/dev/block/8:1");
        std::os::unix::fs::symlink(disk.join("sda1"), link).unwrap();

        let host = HostPaths::with_root(root.path());
        assert_eq!(media_from_sysfs(&host, 8, 1), Some(MediaKind::SolidState));
        assert_eq!(media_from_sysfs(&host, 8, 2), None);
    }

    #[test]
    fn test_media_from_sysfs_whole_disk() {
        let root = tempfile::tempdir().unwrap();
        let dev = root.path().join("sys/dev/block/253:0/queue");
        std::fs::create_dir_all(&dev).unwrap();
        std::fs::write(dev.join("rotational"), "1\n").unwrap();

        let host = HostPaths::with_root(root.path());
        assert_eq!(media_from_sysfs(&host, 253, 0), Some(MediaKind::Rotational));
    }

    #[test]
    fn test_classify_auto_threshold() {
        let auto = Threshold::new("disk", 10.0, None);
        let solid = auto.with_default(disk_default_for(MediaKind::SolidState));
        let status = classify(40, &solid, MediaKind::SolidState, true, 64).status;
        assert_eq!(status, ProbeStatus::Warning);
        assert_eq!(classify(50, &solid, MediaKind::SolidState, true, 64).status, ProbeStatus::Ok);

        let spinning = auto.with_default(disk_default_for(MediaKind::Rotational));
        let status = classify(40, &spinning, MediaKind::Rotational, false, 64).status;
        assert_eq!(status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn test_missing_fio_is_error_for_every_key() {
        let work = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        let caps = CapabilitySet::from_pairs([(FIO, false)]);
        let host = HostPaths::with_root(work.path());
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };

        let results = probe(work.path(), true, None).measure(&ctx).await;
        assert_eq!(results.len(), 5);
        for r in &results {
            assert_eq!(r.status, ProbeStatus::Error);
            assert_eq!(r.failure, Some(FailureKind::ToolMissing));
            assert!(r.message.contains("fio"));
        }
        assert_eq!(results[0].key, KEY);
    }

    #[tokio::test]
    async fn test_override_threshold_and_cleanup() {
        let work = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().stdout(FIO, FIO_OUT);
        let caps = CapabilitySet::from_pairs([(FIO, true)]);
        let host = HostPaths::with_root(work.path());
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };

        let results = probe(work.path(), false, Some(100.0)).measure(&ctx).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, ProbeStatus::Warning);
        assert_eq!(results[0].value, Some(ProbeValue::Number(40.0)));
        assert!(results[0].message.contains("user-set"));

        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].1.contains(&"--direct=1".to_string()));
        assert!(calls[0].1.contains(&"--rw=randwrite".to_string()));
        drop(calls);
        assert!(std::fs::read_dir(work.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_extended_variants_stand_alone() {
        let work = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().stdout(FIO, FIO_OUT);
        let caps = CapabilitySet::from_pairs([(FIO, true)]);
        let host = HostPaths::with_root(work.path());
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };

        let results = probe(work.path(), true, Some(100.0)).measure(&ctx).await;
        let keys: Vec<_> = results.iter().map(|r| r.key).collect();
        assert_eq!(keys, super::keys(true));
        // Variants carry no verdict of their own
        for r in &results[1..] {
            assert_eq!(r.status, ProbeStatus::Ok);
        }
        assert_eq!(results[1].value, Some(ProbeValue::Number(120.0)));
        assert_eq!(results[4].value, Some(ProbeValue::Number(40.0)));
        assert_eq!(runner.call_count(FIO), 5);
    }

    #[tokio::test]
    async fn test_libaio_fallback_to_psync() {
        let work = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new().failing(FIO, 1, "fio: engine libaio not loadable\n");
        let caps = CapabilitySet::from_pairs([(FIO, true)]);
        let host = HostPaths::with_root(work.path());
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };

        let results = probe(work.path(), false, None).measure(&ctx).await;
        assert_eq!(results[0].status, ProbeStatus::Error);
        assert_eq!(runner.call_count(FIO), 2);
        let calls = runner.calls.lock().unwrap();
        assert!(calls[1].1.contains(&"--ioengine=psync".to_string()));
    }

    #[tokio::test]
    async fn test_sub_megabyte_random_write_warns() {
        let work = tempfile::tempdir().unwrap();
        let stdout = "Run status group 0 (all jobs):\n  WRITE: bw=400KiB/s (410kB/s), io=4000KiB\n";
        let runner = ScriptedRunner::new().stdout(FIO, stdout);
        let caps = CapabilitySet::from_pairs([(FIO, true)]);
        let host = HostPaths::with_root(work.path());
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };

        let results = probe(work.path(), false, None).measure(&ctx).await;
        assert_eq!(results[0].status, ProbeStatus::Warning);
        assert_eq!(results[0].value, Some(ProbeValue::Number(0.0)));
        assert!(results[0].failure.is_none());
    }
}
