//! Human-readable report
//!
//! One labeled section per result in probe order, colored when writing to
//! a terminal.

use crossterm::style::{style, Color, Stylize};
use std::borrow::Cow;
use std::io::{self, Write};

use crate::domain::{ProbeResult, ProbeStatus};
use crate::probes::{balloon, disk, memory, page_merging, steal};
use crate::virtualization;

use super::Report;

/// Section title for a result key
pub fn describe(key: &str) -> Cow<'static, str> {
    match key {
        k if k == virtualization::KEY => "Virtualization technology".into(),
        k if k == memory::KEY => "Memory write throughput".into(),
        k if k == disk::KEY => "Disk random-write throughput".into(),
        k if k == balloon::KEY => "Memory balloon driver".into(),
        k if k == page_merging::KEY => "Kernel same-page merging (KSM)".into(),
        k if k == steal::KEY => "CPU steal time".into(),
        k => disk::EXTENDED_JOBS
            .iter()
            .find(|j| j.key == k)
            .map_or_else(|| Cow::Owned(k.to_string()), |j| Cow::Owned(format!("Disk {}", j.label))),
    }
}

fn paint(text: &str, color: Color, bold: bool, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    let styled = style(text).with(color);
    if bold {
        styled.bold().to_string()
    } else {
        styled.to_string()
    }
}

fn write_section<W: Write>(out: &mut W, result: &ProbeResult, color: bool) -> io::Result<()> {
    let title = format!("{} [{}]", describe(result.key), result.key);
    writeln!(out, "{}", paint(&title, Color::Cyan, true, color))?;

    match (&result.value, result.unit) {
        (Some(value), Some(unit)) => writeln!(out, "  value:  {value} {unit}")?,
        (Some(value), None) => writeln!(out, "  value:  {value}")?,
        (None, _) => writeln!(out, "  value:  -")?,
    }

    match result.status {
        ProbeStatus::Ok => {
            writeln!(out, "  status: {}", paint("ok", Color::Green, false, color))?;
            writeln!(out, "  {}", result.message)?;
        }
        ProbeStatus::Warning => {
            writeln!(out, "  status: {}", paint("warning", Color::Yellow, true, color))?;
            let line = format!("WARNING: {}", result.message);
            writeln!(out, "  {}", paint(&line, Color::Yellow, false, color))?;
        }
        ProbeStatus::NotApplicable => {
            writeln!(out, "  status: {}", paint("not applicable", Color::DarkGrey, false, color))?;
            writeln!(out, "  {}", result.message)?;
        }
        ProbeStatus::Error => {
            writeln!(out, "  status: {}", paint("error", Color::Red, true, color))?;
            let line = format!("ERROR: {}", result.message);
            writeln!(out, "  {}", paint(&line, Color::Red, false, color))?;
        }
    }
    writeln!(out)
}

/// Write every section followed by a one-line summary
pub fn render_narrative<W: Write>(report: &Report, out: &mut W, color: bool) -> io::Result<()> {
    for result in report.results() {
        write_section(out, result, color)?;
    }

    let warnings = report.count(ProbeStatus::Warning);
    let errors = report.count(ProbeStatus::Error);
    let summary = format!(
        "{} signals: {warnings} warning(s), {errors} error(s)",
        report.results().len()
    );
    let summary_color = if warnings > 0 { Color::Yellow } else { Color::Green };
    writeln!(out, "{}", paint(&summary, summary_color, true, color))?;
    if warnings > 0 {
        writeln!(out, "Warnings are indicators of overselling, not proof.")?;
    }
    Ok(())
}
