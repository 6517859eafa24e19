//! CPU steal probe
//!
//! Samples `mpstat` at 1-second intervals and reads the steal percentage
//! from its closing `Average:` row.

use log::info;

use crate::capability::MPSTAT;
use crate::domain::{ProbeError, ProbeResult, ProbeStatus, Threshold};
use crate::parse::parse_average_steal;
use crate::tools::ToolRunner;

use super::ProbeContext;

pub const KEY: &str = "cpu_steal_percent";

/// An average needs at least two samples
const MIN_SAMPLES: u32 = 2;

#[derive(Debug, Clone)]
pub struct StealProbe {
    pub threshold: Threshold,
    pub interval_secs: u32,
    pub samples: u32,
}

impl StealProbe {
    pub async fn measure<R: ToolRunner>(&self, ctx: &ProbeContext<'_, R>) -> ProbeResult {
        self.try_measure(ctx).await.unwrap_or_else(|e| ProbeResult::from_error(KEY, &e))
    }

    async fn try_measure<R: ToolRunner>(
        &self,
        ctx: &ProbeContext<'_, R>,
    ) -> Result<ProbeResult, ProbeError> {
        ctx.caps.require(MPSTAT)?;

        let samples = self.samples.max(MIN_SAMPLES);
        let interval = self.interval_secs.max(1);
        info!("steal probe: {samples} samples at {interval}s");

        let args = [interval.to_string(), samples.to_string()];
        let output = ctx.runner.run(MPSTAT, &args).await?.check(MPSTAT)?;
        let steal = parse_average_steal(&output.stdout)?;

        Ok(self.classify(steal, samples))
    }

    fn classify(&self, steal: f64, samples: u32) -> ProbeResult {
        let limit = self.threshold.effective();
        // Must exceed the threshold to trigger
        if steal > limit {
            ProbeResult::measured(
                KEY,
                ProbeStatus::Warning,
                steal,
                "%",
                format!(
                    "average steal over {samples} samples exceeds {limit}%; \
                     the hypervisor is handing this vCPU's time to other tenants"
                ),
            )
        } else {
            ProbeResult::measured(
                KEY,
                ProbeStatus::Ok,
                steal,
                "%",
                format!("mpstat average over {samples} samples; threshold {limit}%"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::domain::{FailureKind, ProbeValue, VirtualizationKind};
    use crate::tools::fake::ScriptedRunner;
    use crate::tools::HostPaths;

    fn mpstat_with(steal: &str) -> String {
        format!(
            "Linux 6.1.0 (vps)  10/17/26  _x86_64_  (2 CPU)\n\n\
             Average:     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle\n\
             Average:     all    1.00    0.00    0.50    0.00    0.00    0.00 {steal:>7}    0.00    0.00   90.00\n"
        )
    }

    fn probe() -> StealProbe {
        StealProbe {
            threshold: Threshold::new("cpu steal", 5.0, None),
            interval_secs: 1,
            samples: 5,
        }
    }

    async fn run_with(stdout: &str) -> (ProbeResult, ScriptedRunner) {
        let runner = ScriptedRunner::new().stdout(MPSTAT, stdout);
        let caps = CapabilitySet::from_pairs([(MPSTAT, true)]);
        let host = HostPaths::system();
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };
        let result = probe().measure(&ctx).await;
        (result, runner)
    }

    #[tokio::test]
    async fn test_above_threshold_warns() {
        let (result, runner) = run_with(&mpstat_with("7.20")).await;
        assert_eq!(result.status, ProbeStatus::Warning);
        assert_eq!(result.value, Some(ProbeValue::Number(7.2)));
        assert_eq!(result.unit, Some("%"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].1, vec!["1".to_string(), "5".to_string()]);
    }

    #[tokio::test]
    async fn test_equal_to_threshold_is_ok() {
        let (result, _) = run_with(&mpstat_with("5.00")).await;
        assert_eq!(result.status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn test_garbage_output_is_error() {
        let (result, _) = run_with("mpstat: command failed\n").await;
        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.failure, Some(FailureKind::ToolExecution));
    }

    #[tokio::test]
    async fn test_missing_mpstat() {
        let runner = ScriptedRunner::new();
        let caps = CapabilitySet::default();
        let host = HostPaths::system();
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };
        let result = probe().measure(&ctx).await;
        assert_eq!(result.failure, Some(FailureKind::ToolMissing));
    }

    #[tokio::test]
    async fn test_sample_count_floor() {
        let runner = ScriptedRunner::new().stdout(MPSTAT, &mpstat_with("0.00"));
        let caps = CapabilitySet::from_pairs([(MPSTAT, true)]);
        let host = HostPaths::system();
        let ctx = ProbeContext {
            runner: &runner,
            caps: &caps,
            host: &host,
            virt: VirtualizationKind::Kvm,
        };
        let single = StealProbe { samples: 1, ..probe() };
        single.measure(&ctx).await;
        assert_eq!(runner.calls.lock().unwrap()[0].1[1], "2");
    }
}
