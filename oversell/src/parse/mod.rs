//! Tool output parsers
//!
//! Each submodule owns the text format of exactly one tool and returns a
//! typed value or [`ProbeError::Unparseable`](crate::domain::ProbeError).
//! Raw tool text does not leave this module.

pub mod dd;
pub mod fio;
pub mod mpstat;
pub mod virt;

pub use dd::parse_dd_rate;
pub use fio::{parse_fio_bandwidth, Direction};
pub use mpstat::parse_average_steal;
pub use virt::{classify_dmi_strings, parse_detect_virt};
