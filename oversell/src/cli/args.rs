//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::{OutputFormat, ProbeConfig, Thresholds};

#[derive(Parser, Debug)]
#[command(
    name = "oversell",
    version,
    about = "Check whether this VPS runs on an oversold host",
    after_help = "\
EXAMPLES:
    oversell                              Run every probe with default thresholds
    oversell --json > report.json         Machine-readable report
    oversell --skip-io                    Only virtualization, balloon, KSM and steal checks
    oversell --full-test                  Add disk read/write variants and a longer steal window

Warnings are indicators, not proof. Exit status is 0 when the run completes,
69 when a probe could not run because its tool is missing (the report is still
printed), 2 on bad arguments and 130 when interrupted."
)]
pub struct Args {
    /// Disk throughput warning threshold in MB/s (0 = pick by media type)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub disk_warn_mbps: u64,

    /// Memory throughput warning threshold in MB/s [default: 500]
    #[arg(long, value_name = "N")]
    pub mem_warn_mbps: Option<u64>,

    /// CPU steal warning threshold in percent [default: 5]
    #[arg(long, value_name = "N", value_parser = parse_percent)]
    pub steal_warn_percent: Option<f64>,

    /// Run extended multi-variant throughput benchmarks
    #[arg(long)]
    pub full_test: bool,

    /// Skip memory and disk throughput probes
    #[arg(long)]
    pub skip_io: bool,

    /// Emit a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

fn parse_percent(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("{value} is not between 0 and 100"));
    }
    Ok(value)
}

impl Args {
    /// Freeze the parsed flags into the run configuration
    #[allow(clippy::cast_precision_loss)]
    pub fn to_config(&self, work_dir: PathBuf) -> ProbeConfig {
        let thresholds = Thresholds::new(
            self.mem_warn_mbps.map(|v| v as f64),
            Some(self.disk_warn_mbps as f64),
            self.steal_warn_percent,
        );
        let format = if self.json { OutputFormat::Json } else { OutputFormat::Narrative };
        ProbeConfig::new(thresholds, work_dir)
            .with_full_test(self.full_test)
            .with_skip_io(self.skip_io)
            .with_format(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["oversell"]).unwrap();
        let cfg = args.to_config(PathBuf::from("."));
        assert!((cfg.thresholds.memory_mbps.effective() - 500.0).abs() < f64::EPSILON);
        assert!((cfg.thresholds.steal_percent.effective() - 5.0).abs() < f64::EPSILON);
        assert!(!cfg.thresholds.disk_mbps.is_overridden());
        assert_eq!(cfg.format, OutputFormat::Narrative);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "oversell",
            "--disk-warn-mbps",
            "80",
            "--mem-warn-mbps",
            "900",
            "--steal-warn-percent",
            "2.5",
            "--full-test",
            "--json",
        ])
        .unwrap();
        let cfg = args.to_config(PathBuf::from("."));
        assert!((cfg.thresholds.disk_mbps.effective() - 80.0).abs() < f64::EPSILON);
        assert!((cfg.thresholds.memory_mbps.effective() - 900.0).abs() < f64::EPSILON);
        assert!((cfg.thresholds.steal_percent.effective() - 2.5).abs() < f64::EPSILON);
        assert!(cfg.full_test);
        assert_eq!(cfg.format, OutputFormat::Json);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Args::try_parse_from(["oversell", "--turbo"]).is_err());
        assert!(Args::try_parse_from(["oversell", "--steal-warn-percent", "150"]).is_err());
    }
}
