//! Result aggregation and rendering
//!
//! The [`Report`] is the only collection of results and has a single
//! writer, the engine. It keeps probe order for the narrative view and
//! serializes as a key → result mapping for the structured view.

pub mod narrative;

use log::warn;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::io::Write;

use crate::domain::{FailureKind, ProbeResult, ProbeStatus, RenderError};

pub use narrative::{describe, render_narrative};

/// Ordered, key-unique collection of probe results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    results: Vec<ProbeResult>,
}

/// Collect results in execution order
pub fn aggregate(results: impl IntoIterator<Item = ProbeResult>) -> Report {
    let mut report = Report::default();
    for result in results {
        report.push(result);
    }
    report
}

impl Report {
    /// Append a result; a repeated key replaces the earlier entry in place
    pub fn push(&mut self, result: ProbeResult) {
        if let Some(existing) = self.results.iter_mut().find(|r| r.key == result.key) {
            warn!("duplicate result for {}, keeping the latest", result.key);
            *existing = result;
        } else {
            self.results.push(result);
        }
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = ProbeResult>) {
        for result in results {
            self.push(result);
        }
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn get(&self, key: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.results.iter().map(|r| r.key)
    }

    #[must_use]
    pub fn count(&self, status: ProbeStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// True when some probe could not run for lack of its tool
    #[must_use]
    pub fn has_missing_tool(&self) -> bool {
        self.results.iter().any(|r| r.failure == Some(FailureKind::ToolMissing))
    }

    pub fn to_json(&self) -> Result<String, RenderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<(), RenderError> {
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| RenderError::SerializationFailed(e.to_string()))?;
        writeln!(writer)?;
        Ok(())
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for result in &self.results {
            map.serialize_entry(result.key, result)?;
        }
        map.end()
    }
}
