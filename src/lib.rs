//! # ssd-hook
//!
//! **KubeVirt hook sidecar that presents SATA disks as SSDs**
//!
//! QEMU reports every emulated SATA disk as rotational unless the device's
//! `rotation_rate` property is set to `1`. This crate rewrites the libvirt
//! domain that virt-launcher is about to define so that each SATA disk gets
//!
//! ```text
//! <qemu:commandline>
//!   <qemu:arg value="-set"/>
//!   <qemu:arg value="device.ua-<alias>.rotation_rate=1"/>
//! </qemu:commandline>
//! ```
//!
//! The rewrite only happens for VMIs annotated with
//! `ssd.vm.kubevirt.io/ssd-patcher`. Without it the domain is returned
//! byte-for-byte.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            ssd-hook                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │  hooks: gRPC HookServer on a Unix socket                    │    │
//! │  │    info │ on_define_domain (v1alpha1, v1alpha2)             │    │
//! │  │         │ pre_cloud_init_iso (v1alpha2)                     │    │
//! │  └─────────────────────────────┬───────────────────────────────┘    │
//! │                                │                                    │
//! │  ┌─────────────────────────────┼───────────────────────────────┐    │
//! │  │  transform: transform_domain(vmi, domain) → domain          │    │
//! │  │  pure │ no I/O │ no logging │ borrowed passthrough           │    │
//! │  └─────────────────────────────┼───────────────────────────────┘    │
//! │                                │                                    │
//! │  ┌──────────────────┐   ┌──────┴───────────────────────────────┐    │
//! │  │  vmi             │   │  domain                              │    │
//! │  │  annotations     │   │  disks │ qemu:commandline │ xmlns    │    │
//! │  └──────────────────┘   └──────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Error Model
//!
//! Malformed input never takes the sidecar down. Every failure is an
//! [`Error`] returned for the call that caused it, and the server answers it
//! with a gRPC status on that call.
//!
//! # Example
//!
//! ```rust
//! let vmi = br#"{"metadata":{"annotations":{"ssd.vm.kubevirt.io/ssd-patcher":"true"}}}"#;
//! let domain = br#"<domain type="kvm"><devices><disk type="file" device="disk"><target dev="sda" bus="sata"/><alias name="ua-disk0"/></disk></devices></domain>"#;
//!
//! let out = ssd_hook::transform_domain(vmi, domain).unwrap();
//! let out = std::str::from_utf8(&out).unwrap();
//! assert!(out.contains(r#"<qemu:arg value="device.ua-disk0.rotation_rate=1"/>"#));
//! ```

pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod transform;
pub mod vmi;

// Re-exports
pub use config::{Cli, SidecarConfig};
pub use constants::*;
pub use domain::{Alias, Arg, Commandline, Disk, DiskBus, DomainDocument};
pub use error::{Error, Result};
pub use hooks::{HookClient, HookServer, HookSocket, HookVersion};
pub use transform::{
    mark_sata_disks_as_ssd, transform_domain, transform_domain_with_outcome, Outcome,
};
pub use vmi::VirtualMachineInstance;
