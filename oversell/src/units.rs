//! Throughput unit normalization
//!
//! Benchmark tools disagree on units (`dd` prints SI `kB/s`/`MB/s`/`GB/s`,
//! `fio` prints binary `KiB/s`/`MiB/s`). Every figure is folded into whole
//! MB/s, treating decimal and binary megabytes as the same unit. Values are
//! rounded half-to-even.

use crate::domain::ProbeError;

/// A throughput figure folded into whole MB/s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throughput {
    pub mbps: u64,
    /// Set when the unit was not recognized; `mbps` is then 0
    pub unparsed: bool,
}

impl Throughput {
    /// Accept the figure only if the unit was recognized.
    ///
    /// A known unit that rounds to 0 is a real sub-1 MB/s reading and is
    /// kept; only an unrecognized unit is inconclusive.
    pub fn conclusive(self, tool: &str) -> Result<u64, ProbeError> {
        if self.unparsed {
            return Err(ProbeError::Inconclusive(format!("{tool} reported an unrecognized unit")));
        }
        Ok(self.mbps)
    }
}

/// Multiplier from `unit` to MB/s, if the unit is known
fn unit_factor(unit: &str) -> Option<f64> {
    match unit {
        "GB/s" | "GiB/s" => Some(1024.0),
        "MB/s" | "MiB/s" => Some(1.0),
        "kB/s" | "KB/s" | "KiB/s" => Some(1.0 / 1024.0),
        "B/s" => Some(1.0 / (1024.0 * 1024.0)),
        _ => None,
    }
}

/// Normalize a raw (value, unit) pair to whole MB/s
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize(raw_value: f64, raw_unit: &str) -> Throughput {
    let Some(factor) = unit_factor(raw_unit.trim()) else {
        return Throughput { mbps: 0, unparsed: true };
    };
    if !raw_value.is_finite() || raw_value < 0.0 {
        return Throughput { mbps: 0, unparsed: true };
    }
    Throughput { mbps: (raw_value * factor).round_ties_even() as u64, unparsed: false }
}

/// Split a figure such as `"97.7MiB/s"` or `"2.1 GB/s"` into value and unit
#[must_use]
pub fn split_figure(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let end = text.find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))?;
    if end == 0 {
        return None;
    }
    // Some locales leak a decimal comma even under LC_ALL=C wrappers
    let value: f64 = text[..end].replace(',', ".").parse().ok()?;
    Some((value, text[end..].trim()))
}
