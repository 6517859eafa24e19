//! Virtualization tool answers
//!
//! `systemd-detect-virt` prints a single identifier (`kvm`, `lxc`, `none`,
//! ...). `dmidecode -s` prints firmware vendor strings that have to be
//! matched loosely.

use crate::domain::VirtualizationKind;

/// Map a `systemd-detect-virt` identifier; `None` if the output is empty
#[must_use]
pub fn parse_detect_virt(stdout: &str) -> Option<VirtualizationKind> {
    let id = stdout.lines().next()?.trim();
    if id.is_empty() {
        return None;
    }
    Some(match id {
        "kvm" => VirtualizationKind::Kvm,
        "qemu" => VirtualizationKind::Qemu,
        "lxc" | "lxc-libvirt" => VirtualizationKind::Lxc,
        "openvz" => VirtualizationKind::OpenVz,
        "xen" => VirtualizationKind::Xen,
        "docker" => VirtualizationKind::Docker,
        "none" => VirtualizationKind::None,
        _ => VirtualizationKind::Unknown,
    })
}

/// Vendor strings of KVM-based clouds that do not name the hypervisor
const KVM_CLOUDS: &[&str] =
    &["digitalocean", "droplet", "hetzner", "google compute engine", "amazon ec2"];

/// Classify DMI product/manufacturer strings; `None` if there is nothing to go on
///
/// Strings that match no known hypervisor give `Unknown`: plenty of VPS
/// brands ship their own vendor string, so DMI alone never proves bare metal.
#[must_use]
pub fn classify_dmi_strings(strings: &[&str]) -> Option<VirtualizationKind> {
    let joined = strings
        .iter()
        .flat_map(|s| s.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if joined.is_empty() {
        return None;
    }

    let kind = if joined.contains("kvm")
        || joined.contains("openstack")
        || KVM_CLOUDS.iter().any(|c| joined.contains(c))
    {
        VirtualizationKind::Kvm
    } else if joined.contains("qemu") || joined.contains("bochs") {
        VirtualizationKind::Qemu
    } else if joined.contains("xen") || joined.contains("hvm domu") {
        VirtualizationKind::Xen
    } else {
        // vmware, hyperv, branded clouds and bare metal all land here
        VirtualizationKind::Unknown
    };
    Some(kind)
}
