//! Pre-flight checks for oversell
//!
//! Validates that the host can be inspected before any probe runs and
//! prints actionable hints for missing tools. Nothing is installed here.

use anyhow::{bail, Context, Result};
use log::info;

use crate::capability::{CapabilitySet, DD, MPSTAT, SYSTEMD_DETECT_VIRT};
use crate::os;
use crate::tools::HostPaths;

/// Steal accounting appeared in 2.6.11; anything older cannot report it
const MIN_KERNEL_VERSION: (u32, u32) = (2, 6);

/// Package managers we know how to phrase an install hint for
const PACKAGE_MANAGERS: &[&str] = &["apt-get", "dnf", "yum", "zypper", "apk"];

/// Run all pre-flight checks before probing
pub fn run_preflight_checks(host: &HostPaths, caps: &CapabilitySet, quiet: bool) -> Result<()> {
    check_platform(host)?;
    check_kernel_version(host, quiet)?;
    if !quiet {
        check_privileges();
        report_missing_tools(caps);
    }
    Ok(())
}

/// Every probe reads Linux kernel interfaces
fn check_platform(host: &HostPaths) -> Result<()> {
    let stat = host.path("/proc/stat");
    std::fs::read_to_string(&stat).with_context(|| {
        format!(
            "Cannot read {}\n\n\
             oversell inspects Linux kernel interfaces and must run inside a Linux guest\n\
             with /proc mounted.",
            stat.display()
        )
    })?;
    Ok(())
}

/// Parse "Linux version 5.15.0-generic ..." into (major, minor, release)
fn parse_kernel_release(version_str: &str) -> Option<(u32, u32, &str)> {
    let release = version_str.split_whitespace().nth(2)?;
    let mut parts = release.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor, release))
}

fn check_kernel_version(host: &HostPaths, quiet: bool) -> Result<()> {
    let version_str = host
        .read_trimmed("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    let Some((major, minor, release)) = parse_kernel_release(&version_str) else {
        // Can't parse, assume it's fine
        return Ok(());
    };
    info!("kernel release {release}");

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {major}.{minor} is too old.\n\n\
             oversell requires Linux {}.{} or newer for CPU steal accounting.\n\
             Current kernel: {release}",
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }
    if !quiet && host.read_trimmed("/proc/stat").is_ok_and(|s| !has_steal_column(&s)) {
        eprintln!("warning: /proc/stat has no steal column, steal time will read as 0");
    }
    Ok(())
}

/// The aggregate `cpu` line has a steal field (8th value) since 2.6.11
fn has_steal_column(proc_stat: &str) -> bool {
    proc_stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .is_some_and(|l| l.split_whitespace().count() > 8)
}

fn check_privileges() {
    if !os::is_root() {
        eprintln!(
            "warning: not running as root, dmidecode and some kernel counters may be unreadable"
        );
    }
}

/// Distribution package that ships a tool
fn package_for(tool: &str) -> &str {
    match tool {
        DD => "coreutils",
        MPSTAT => "sysstat",
        SYSTEMD_DETECT_VIRT => "systemd",
        other => other,
    }
}

fn detect_package_manager() -> Option<&'static str> {
    PACKAGE_MANAGERS.iter().copied().find(|pm| which::which(pm).is_ok())
}

/// Install command hint for the missing tools, if any are missing
fn install_hint(missing: &[&str], package_manager: Option<&str>) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let mut packages: Vec<&str> = missing.iter().map(|t| package_for(t)).collect();
    packages.dedup();
    let verb = match package_manager {
        Some("apk") => "add",
        _ => "install",
    };
    Some(match package_manager {
        Some(pm) => format!("{pm} {verb} {}", packages.join(" ")),
        None => format!("install packages: {}", packages.join(" ")),
    })
}

fn report_missing_tools(caps: &CapabilitySet) {
    let missing: Vec<&str> = caps.missing().collect();
    if let Some(hint) = install_hint(&missing, detect_package_manager()) {
        eprintln!("warning: missing tools: {}", missing.join(", "));
        eprintln!("  the affected probes will report an error; to enable them run: {hint}");
    }
}
