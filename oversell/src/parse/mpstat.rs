//! `mpstat` (sysstat) aggregate line
//!
//! ```text
//! Average:     CPU    %usr   %nice    %sys %iowait    %irq   %soft  %steal  %guest  %gnice   %idle
//! Average:     all    0.25    0.00    0.25    0.00    0.00    0.00    7.20    0.00    0.00   92.30
//! ```
//!
//! Only the `Average:` row is used; the per-second rows are too noisy.

use crate::domain::ProbeError;

/// Steal percentage from the `Average: all` row
pub fn parse_average_steal(stdout: &str) -> Result<f64, ProbeError> {
    let lines: Vec<Vec<&str>> = stdout.lines().map(|l| l.split_whitespace().collect()).collect();

    // Prefer the Average header; fall back to any header row
    let header = lines
        .iter()
        .filter(|t| t.contains(&"%steal"))
        .find(|t| t.first() == Some(&"Average:"))
        .or_else(|| lines.iter().find(|t| t.contains(&"%steal")))
        .ok_or_else(|| ProbeError::unparseable("mpstat", "no %steal column"))?;

    let column = header.iter().position(|t| *t == "%steal").unwrap_or_default();
    // Count from the right: time-of-day columns may carry an AM/PM token
    let from_end = header.len() - column;

    let row = lines
        .iter()
        .find(|t| t.first() == Some(&"Average:") && t.get(1) == Some(&"all"))
        .ok_or_else(|| ProbeError::unparseable("mpstat", "no 'Average: all' row"))?;

    let idx = row
        .len()
        .checked_sub(from_end)
        .ok_or_else(|| ProbeError::unparseable("mpstat", "Average row shorter than header"))?;

    let raw = row[idx];
    raw.replace(',', ".")
        .parse::<f64>()
        .map_err(|_| ProbeError::unparseable("mpstat", format!("bad %steal value '{raw}'")))
}
