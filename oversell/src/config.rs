//! Run configuration
//!
//! Built once from the command line and never mutated afterwards.

use std::path::PathBuf;

use crate::domain::{MediaKind, Threshold};

pub const DEFAULT_MEMORY_WARN_MBPS: f64 = 500.0;
pub const DEFAULT_STEAL_WARN_PERCENT: f64 = 5.0;

/// 4 KiB random-write floor for spinning disks
pub const ROTATIONAL_DISK_WARN_MBPS: f64 = 10.0;
/// 4 KiB random-write floor for SSD/NVMe
pub const SOLID_STATE_DISK_WARN_MBPS: f64 = 50.0;

/// Large enough to get past caches on small guests
pub const MEMORY_BENCH_MIB: u64 = 256;
pub const DISK_BENCH_FILE_MIB: u64 = 256;
pub const DISK_BENCH_RUNTIME_SECS: u32 = 10;
pub const DISK_BENCH_IODEPTH: u32 = 64;

pub const STEAL_SAMPLES: u32 = 5;
pub const STEAL_SAMPLES_FULL: u32 = 10;
pub const STEAL_INTERVAL_SECS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Narrative,
    Json,
}

/// Disk default for the given media
#[must_use]
pub fn disk_default_for(media: MediaKind) -> f64 {
    match media {
        MediaKind::Rotational => ROTATIONAL_DISK_WARN_MBPS,
        MediaKind::SolidState => SOLID_STATE_DISK_WARN_MBPS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub memory_mbps: Threshold,
    /// Default is replaced by the media-specific one unless overridden
    pub disk_mbps: Threshold,
    pub steal_percent: Threshold,
}

impl Thresholds {
    /// A `disk` override of 0 means auto-detect
    pub fn new(memory: Option<f64>, disk: Option<f64>, steal: Option<f64>) -> Self {
        Self {
            memory_mbps: Threshold::new("memory", DEFAULT_MEMORY_WARN_MBPS, memory),
            disk_mbps: Threshold::new(
                "disk",
                ROTATIONAL_DISK_WARN_MBPS,
                disk.filter(|d| *d > 0.0),
            ),
            steal_percent: Threshold::new("cpu steal", DEFAULT_STEAL_WARN_PERCENT, steal),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub thresholds: Thresholds,
    pub full_test: bool,
    pub skip_io: bool,
    pub format: OutputFormat,
    /// Volume the disk benchmark runs on
    pub work_dir: PathBuf,
    /// Where the memory benchmark goes when /dev/shm is unusable
    pub fallback_dir: PathBuf,
    pub memory_mib: u64,
    pub disk_file_mib: u64,
    pub disk_runtime_secs: u32,
    pub steal_samples: u32,
}

impl ProbeConfig {
    pub fn new(thresholds: Thresholds, work_dir: PathBuf) -> Self {
        Self {
            thresholds,
            full_test: false,
            skip_io: false,
            format: OutputFormat::Narrative,
            work_dir,
            fallback_dir: std::env::temp_dir(),
            memory_mib: MEMORY_BENCH_MIB,
            disk_file_mib: DISK_BENCH_FILE_MIB,
            disk_runtime_secs: DISK_BENCH_RUNTIME_SECS,
            steal_samples: STEAL_SAMPLES,
        }
    }

    /// Extended benchmarking: disk variants and a longer steal window
    #[must_use]
    pub fn with_full_test(mut self, full_test: bool) -> Self {
        self.full_test = full_test;
        self.steal_samples = if full_test { STEAL_SAMPLES_FULL } else { STEAL_SAMPLES };
        self
    }

    #[must_use]
    pub fn with_skip_io(mut self, skip_io: bool) -> Self {
        self.skip_io = skip_io;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}
