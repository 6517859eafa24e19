//! `fio` group status lines
//!
//! Modern: `  WRITE: bw=97.7MiB/s (102MB/s), 97.7MiB/s-97.7MiB/s ..., io=977MiB ...`
//! Legacy: `  WRITE: io=1024.0MB, aggrb=104857KB/s, minb=104857KB/s, ...`

use crate::domain::ProbeError;
use crate::units::{normalize, split_figure, Throughput};

/// Which side of the group status to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Read => "READ:",
            Direction::Write => "WRITE:",
        }
    }
}

fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest.find(|c: char| c == ',' || c.is_whitespace()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Extract aggregate bandwidth for `direction` from fio's normal output
pub fn parse_fio_bandwidth(stdout: &str, direction: Direction) -> Result<Throughput, ProbeError> {
    let label = direction.label();
    let line = stdout
        .lines()
        .map(str::trim_start)
        .find(|l| l.starts_with(label))
        .ok_or_else(|| ProbeError::unparseable("fio", format!("no '{label}' group status line")))?;

    let figure = field(line, "bw=")
        .or_else(|| field(line, "aggrb="))
        .ok_or_else(|| ProbeError::unparseable("fio", format!("no bandwidth in: {line}")))?;

    let (value, unit) = split_figure(figure)
        .ok_or_else(|| ProbeError::unparseable("fio", format!("bad bandwidth '{figure}'")))?;

    Ok(normalize(value, unit))
}
