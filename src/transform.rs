//! # SSD Transform
//!
//! Marks every SATA disk of a domain as non-rotational by passing
//! `-set device.ua-<alias>.rotation_rate=1` to QEMU through the libvirt
//! command-line extension.
//!
//! ```text
//!   vmi JSON ──► annotations ──► trigger present? ──no──► domain bytes (untouched)
//!                                      │
//!                                     yes
//!                                      ▼
//!   domain XML ──► DomainDocument ──► append 2 args per SATA disk
//!                                      │
//!                                      ▼
//!                    args non-empty? ──► declare xmlns:qemu ──► XML bytes
//! ```
//!
//! The transform is pure: no I/O, no logging, no shared state. It is not
//! idempotent. Feeding its own output back in with the trigger present
//! appends a second pair of arguments per SATA disk.

use std::borrow::Cow;

use crate::constants::{
    QEMU_NAMESPACE_URI, QEMU_SET_FLAG, ROTATION_RATE_PROPERTY, SSD_DISK_ANNOTATION,
    USER_ALIAS_PREFIX,
};
use crate::domain::{Arg, DomainDocument};
use crate::error::{Error, Result};
use crate::vmi::VirtualMachineInstance;

/// What a transform did to the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Trigger annotation absent; the input was returned as-is.
    Unchanged,
    /// The domain was parsed and re-serialized.
    Patched {
        /// Number of SATA disks that received arguments.
        sata_disks: usize,
    },
}

/// Transforms a domain for the given VMI.
///
/// Without the trigger annotation the domain bytes are returned borrowed and
/// never parsed.
///
/// # Errors
///
/// - [`Error::InvalidVmi`] if `vmi` does not decode
/// - [`Error::InvalidDomain`] if `domain_xml` does not decode
/// - [`Error::MissingDiskAlias`] if a SATA disk has no alias
/// - [`Error::Serialization`] if the updated domain cannot be written
pub fn transform_domain<'a>(vmi: &[u8], domain_xml: &'a [u8]) -> Result<Cow<'a, [u8]>> {
    transform_domain_with_outcome(vmi, domain_xml).map(|(bytes, _)| bytes)
}

/// Like [`transform_domain`], also reporting what was done.
///
/// # Errors
///
/// See [`transform_domain`].
pub fn transform_domain_with_outcome<'a>(
    vmi: &[u8],
    domain_xml: &'a [u8],
) -> Result<(Cow<'a, [u8]>, Outcome)> {
    let vmi = VirtualMachineInstance::from_json(vmi)?;
    if !vmi.has_annotation(SSD_DISK_ANNOTATION) {
        return Ok((Cow::Borrowed(domain_xml), Outcome::Unchanged));
    }

    let mut domain = DomainDocument::from_xml(domain_xml)?;
    let sata_disks = mark_sata_disks_as_ssd(&mut domain)?;
    let bytes = domain.to_xml()?;

    Ok((Cow::Owned(bytes), Outcome::Patched { sata_disks }))
}

/// Appends the rotation-rate arguments for every SATA disk, in disk order.
///
/// Creates the command-line extension if absent and declares the QEMU
/// namespace once it has any entry. Returns the number of SATA disks found.
///
/// # Errors
///
/// Returns [`Error::MissingDiskAlias`] if a SATA disk has no alias. The
/// document is left unmodified in that case.
pub fn mark_sata_disks_as_ssd(domain: &mut DomainDocument) -> Result<usize> {
    let mut args = Vec::new();
    for (index, disk) in domain.disks().iter().enumerate() {
        if !disk.is_sata() {
            continue;
        }
        let alias = disk.alias.as_ref().ok_or(Error::MissingDiskAlias { index })?;
        args.push(Arg::new(QEMU_SET_FLAG));
        args.push(Arg::new(rotation_rate_arg(alias.name())));
    }
    let sata_disks = args.len() / 2;

    let commandline = domain.ensure_commandline();
    commandline.args.extend(args);
    if !commandline.is_empty() {
        domain.set_qemu_namespace(QEMU_NAMESPACE_URI);
    }

    Ok(sata_disks)
}

/// Formats the `-set` value for a disk alias name.
#[must_use]
pub fn rotation_rate_arg(alias: &str) -> String {
    format!("device.{USER_ALIAS_PREFIX}{alias}.{ROTATION_RATE_PROPERTY}")
}
