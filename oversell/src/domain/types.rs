//! Domain types shared by every probe
//!
//! A probe never hands raw tool text to its caller: it returns one
//! [`ProbeResult`] per logical signal, with a typed [`ProbeValue`].

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

use super::errors::ProbeError;

/// Verdict attached to a single signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ok,
    Warning,
    NotApplicable,
    Error,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeStatus::Ok => "ok",
            ProbeStatus::Warning => "warning",
            ProbeStatus::NotApplicable => "not_applicable",
            ProbeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Measured value of a signal. Exactly one kind is populated.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ProbeValue {
    Number(f64),
    Flag(bool),
    Category(String),
}

impl fmt::Display for ProbeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Whole numbers read better without a trailing ".0"
            ProbeValue::Number(n) if n.fract() == 0.0 => write!(f, "{n:.0}"),
            ProbeValue::Number(n) => write!(f, "{n:.2}"),
            ProbeValue::Flag(true) => f.write_str("yes"),
            ProbeValue::Flag(false) => f.write_str("no"),
            ProbeValue::Category(s) => f.write_str(s),
        }
    }
}

/// Why a probe ended in `error`, kept out of the rendered report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ToolMissing,
    ToolExecution,
    Inconclusive,
    Environment,
}

/// The universal unit of output
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub key: &'static str,
    pub status: ProbeStatus,
    pub value: Option<ProbeValue>,
    pub unit: Option<&'static str>,
    pub message: String,
    pub failure: Option<FailureKind>,
}

impl ProbeResult {
    pub fn new(
        key: &'static str,
        status: ProbeStatus,
        value: ProbeValue,
        message: impl Into<String>,
    ) -> Self {
        Self { key, status, value: Some(value), unit: None, message: message.into(), failure: None }
    }

    /// Numeric measurement with a unit (MB/s, %)
    pub fn measured(
        key: &'static str,
        status: ProbeStatus,
        value: f64,
        unit: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key,
            status,
            value: Some(ProbeValue::Number(value)),
            unit: Some(unit),
            message: message.into(),
            failure: None,
        }
    }

    pub fn not_applicable(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            status: ProbeStatus::NotApplicable,
            value: None,
            unit: None,
            message: message.into(),
            failure: None,
        }
    }

    /// Convert a probe failure into a result; the value is always absent
    pub fn from_error(key: &'static str, err: &ProbeError) -> Self {
        Self {
            key,
            status: ProbeStatus::Error,
            value: None,
            unit: None,
            message: err.to_string(),
            failure: Some(err.kind()),
        }
    }
}

impl Serialize for ProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut fields = 2;
        if self.value.is_some() {
            fields += 1;
        }
        if self.unit.is_some() {
            fields += 1;
        }
        let mut s = serializer.serialize_struct("ProbeResult", fields)?;
        s.serialize_field("status", &self.status)?;
        if let Some(ref value) = self.value {
            s.serialize_field("value", value)?;
        }
        if let Some(unit) = self.unit {
            s.serialize_field("unit", unit)?;
        }
        s.serialize_field("message", &self.message)?;
        s.end()
    }
}

/// Hypervisor or container technology hosting this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualizationKind {
    Kvm,
    Qemu,
    Lxc,
    OpenVz,
    Xen,
    Docker,
    None,
    Unknown,
}

impl VirtualizationKind {
    /// Kinds whose guests can carry a virtio memory balloon
    #[must_use]
    pub fn supports_balloon(self) -> bool {
        matches!(self, VirtualizationKind::Kvm | VirtualizationKind::Qemu)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VirtualizationKind::Kvm => "kvm",
            VirtualizationKind::Qemu => "qemu",
            VirtualizationKind::Lxc => "lxc",
            VirtualizationKind::OpenVz => "openvz",
            VirtualizationKind::Xen => "xen",
            VirtualizationKind::Docker => "docker",
            VirtualizationKind::None => "none",
            VirtualizationKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VirtualizationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage media backing the working volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Rotational,
    SolidState,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Rotational => f.write_str("rotational"),
            MediaKind::SolidState => f.write_str("solid-state"),
        }
    }
}

/// A named numeric boundary with a default and an optional override
///
/// Set once at startup from the command line and only read afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub name: &'static str,
    pub default: f64,
    pub override_value: Option<f64>,
}

impl Threshold {
    pub fn new(name: &'static str, default: f64, override_value: Option<f64>) -> Self {
        Self { name, default, override_value }
    }

    #[must_use]
    pub fn effective(&self) -> f64 {
        self.override_value.unwrap_or(self.default)
    }

    #[must_use]
    pub fn is_overridden(&self) -> bool {
        self.override_value.is_some()
    }

    /// Same threshold with a default picked later (e.g. from media type)
    #[must_use]
    pub fn with_default(self, default: f64) -> Self {
        Self { default, ..self }
    }
}
