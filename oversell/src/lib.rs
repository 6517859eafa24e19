//! # oversell - VPS host oversell diagnostics
//!
//! Runs a fixed set of probes from inside a Linux guest and reports the
//! signals that hint the underlying host is oversubscribed: slow memory and
//! disk throughput, an active balloon driver, kernel same-page merging and
//! CPU steal time.
//!
//! ## Flow
//!
//! ```text
//! capability::detect ──▶ engine::Engine::run ──▶ report::Report
//!                          │                      │
//!                          ├─ virtualization       ├─ render_narrative
//!                          ├─ probes::memory       └─ to_json
//!                          ├─ probes::disk
//!                          ├─ probes::balloon
//!                          ├─ probes::page_merging
//!                          └─ probes::steal
//! ```
//!
//! External commands go through [`tools::ToolRunner`] and kernel files
//! through [`tools::HostPaths`], so every probe can be exercised against
//! scripted output and a fake `/proc` + `/sys` tree.
//!
//! Each signal is an indicator, not proof of oversubscription.

pub mod capability;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod os;
pub mod parse;
pub mod preflight;
pub mod probes;
pub mod report;
pub mod tools;
pub mod units;
pub mod virtualization;
