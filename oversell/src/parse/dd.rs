//! `dd` transfer summary
//!
//! GNU coreutils: `268435456 bytes (268 MB, 256 MiB) copied, 0.0987 s, 2.7 GB/s`
//! BusyBox:       `268435456 bytes (256.0MB) copied, 0.123 seconds, 2.0GB/s`

use crate::domain::ProbeError;
use crate::units::{normalize, split_figure, Throughput};

/// Extract the rate from `dd`'s final summary line (written to stderr)
pub fn parse_dd_rate(stderr: &str) -> Result<Throughput, ProbeError> {
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.contains("copied"))
        .ok_or_else(|| ProbeError::unparseable("dd", "no transfer summary line"))?;

    let rate = line
        .rsplit(',')
        .next()
        .ok_or_else(|| ProbeError::unparseable("dd", format!("no rate in: {line}")))?;

    let (value, unit) = split_figure(rate)
        .ok_or_else(|| ProbeError::unparseable("dd", format!("bad rate '{}'", rate.trim())))?;

    Ok(normalize(value, unit))
}
