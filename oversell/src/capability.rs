//! Capability probe: which measurement tools can be resolved on `PATH`
//!
//! Computed once before any probe runs and passed down read-only. Nothing
//! is installed here; a missing tool simply reads as `false`.

use log::{debug, info};
use std::collections::BTreeMap;
use std::ffi::OsString;

use crate::domain::ProbeError;

pub const DD: &str = "dd";
pub const FIO: &str = "fio";
pub const MPSTAT: &str = "mpstat";
pub const SYSTEMD_DETECT_VIRT: &str = "systemd-detect-virt";
pub const DMIDECODE: &str = "dmidecode";

/// Every tool any probe may ask for
pub const KNOWN_TOOLS: &[&str] = &[DD, FIO, MPSTAT, SYSTEMD_DETECT_VIRT, DMIDECODE];

/// Tool name → availability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    tools: BTreeMap<String, bool>,
}

impl CapabilitySet {
    /// Build a fixed set, e.g. for tests or a pre-provisioned host
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        Self { tools: pairs.into_iter().map(|(t, ok)| (t.to_string(), ok)).collect() }
    }

    #[must_use]
    pub fn has(&self, tool: &str) -> bool {
        self.tools.get(tool).copied().unwrap_or(false)
    }

    /// Fail with `ToolMissing` unless `tool` is available
    pub fn require(&self, tool: &str) -> Result<(), ProbeError> {
        if self.has(tool) {
            Ok(())
        } else {
            Err(ProbeError::ToolMissing(tool.to_string()))
        }
    }

    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().filter(|(_, ok)| !**ok).map(|(t, _)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.tools.iter().map(|(t, ok)| (t.as_str(), *ok))
    }
}

/// Resolve each tool against the process `PATH`
pub fn detect(tools: &[&str]) -> CapabilitySet {
    detect_in(tools, std::env::var_os("PATH"))
}

/// Resolve each tool against an explicit search path
pub fn detect_in(tools: &[&str], search_path: Option<OsString>) -> CapabilitySet {
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir());
    let set = CapabilitySet {
        tools: tools
            .iter()
            .map(|tool| {
                let found = which::which_in(tool, search_path.as_ref(), &cwd);
                if let Ok(ref path) = found {
                    debug!("capability: {tool} -> {}", path.display());
                }
                ((*tool).to_string(), found.is_ok())
            })
            .collect(),
    };
    info!(
        "capabilities: {}",
        set.iter()
            .map(|(t, ok)| format!("{t}={}", if ok { "yes" } else { "no" }))
            .collect::<Vec<_>>()
            .join(" ")
    );
    set
}
