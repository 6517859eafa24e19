//! Signal probes
//!
//! Every probe returns its [`ProbeResult`](crate::domain::ProbeResult) by
//! value; failures are folded into `status=error` results here and never
//! escape as `Err`. Probes share nothing except the read-only
//! [`ProbeContext`].

pub mod balloon;
pub mod disk;
pub mod memory;
pub mod page_merging;
pub mod steal;

use crate::capability::CapabilitySet;
use crate::domain::VirtualizationKind;
use crate::tools::{HostPaths, ToolRunner};

pub use balloon::BalloonProbe;
pub use disk::{DiskProbe, FioJob};
pub use memory::MemoryProbe;
pub use page_merging::PageMergingProbe;
pub use steal::StealProbe;

/// Facts resolved once at startup and handed to every probe
#[derive(Debug)]
pub struct ProbeContext<'a, R: ToolRunner> {
    pub runner: &'a R,
    pub caps: &'a CapabilitySet,
    pub host: &'a HostPaths,
    pub virt: VirtualizationKind,
}
