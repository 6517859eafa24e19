//! Probe orchestration
//!
//! Runs every probe one at a time in a fixed order. Throughput and steal
//! measurement windows must never overlap.

use log::info;
use std::time::Instant;

use crate::capability::CapabilitySet;
use crate::config::{ProbeConfig, DISK_BENCH_IODEPTH, STEAL_INTERVAL_SECS};
use crate::domain::{ProbeResult, ProbeStatus};
use crate::probes::{
    disk, memory, BalloonProbe, DiskProbe, MemoryProbe, PageMergingProbe, ProbeContext, StealProbe,
};
use crate::report::Report;
use crate::tools::{HostPaths, ToolRunner};
use crate::virtualization;

const SKIPPED: &str = "skipped (--skip-io)";

/// Owns the configuration and the seams probes run through
#[derive(Debug)]
pub struct Engine<R: ToolRunner> {
    runner: R,
    host: HostPaths,
    config: ProbeConfig,
}

impl<R: ToolRunner> Engine<R> {
    pub fn new(runner: R, host: HostPaths, config: ProbeConfig) -> Self {
        Self { runner, host, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    fn memory_probe(&self) -> MemoryProbe {
        MemoryProbe {
            size_mib: self.config.memory_mib,
            threshold: self.config.thresholds.memory_mbps,
            fallback_dir: self.config.fallback_dir.clone(),
        }
    }

    fn disk_probe(&self) -> DiskProbe {
        DiskProbe {
            threshold: self.config.thresholds.disk_mbps,
            work_dir: self.config.work_dir.clone(),
            file_mib: self.config.disk_file_mib,
            runtime_secs: self.config.disk_runtime_secs,
            iodepth: DISK_BENCH_IODEPTH,
            extended: self.config.full_test,
        }
    }

    fn steal_probe(&self) -> StealProbe {
        StealProbe {
            threshold: self.config.thresholds.steal_percent,
            interval_secs: STEAL_INTERVAL_SECS,
            samples: self.config.steal_samples,
        }
    }

    /// Run all probes against an already-resolved capability set
    ///
    /// The returned report holds exactly one result per scheduled key.
    pub async fn run(&self, caps: &CapabilitySet) -> Report {
        let started = Instant::now();
        let mut report = Report::default();

        let detection = virtualization::detect(&self.runner, &self.host, caps).await;
        report.push(detection.to_result());

        let ctx = ProbeContext {
            runner: &self.runner,
            caps,
            host: &self.host,
            virt: detection.kind,
        };

        if self.config.skip_io {
            info!("skipping memory and disk throughput probes");
            report.push(ProbeResult::not_applicable(memory::KEY, SKIPPED));
            report.extend(
                disk::keys(self.config.full_test)
                    .into_iter()
                    .map(|k| ProbeResult::not_applicable(k, SKIPPED)),
            );
        } else {
            report.push(self.memory_probe().measure(&ctx).await);
            report.extend(self.disk_probe().measure(&ctx).await);
        }

        report.push(BalloonProbe.measure(&ctx).await);
        report.push(PageMergingProbe::default().measure(&ctx).await);
        report.push(self.steal_probe().measure(&ctx).await);

        info!(
            "probes finished in {:.1}s: {} warning(s), {} error(s)",
            started.elapsed().as_secs_f64(),
            report.count(ProbeStatus::Warning),
            report.count(ProbeStatus::Error)
        );
        report
    }
}

/// Every key a run with these flags will emit, in order
pub fn scheduled_keys(full_test: bool) -> Vec<&'static str> {
    let mut keys = vec![virtualization::KEY, memory::KEY];
    keys.extend(disk::keys(full_test));
    keys.extend([
        crate::probes::balloon::KEY,
        crate::probes::page_merging::KEY,
        crate::probes::steal::KEY,
    ]);
    keys
}
