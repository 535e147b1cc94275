//! # Hook Sidecar Constants
//!
//! Annotation keys, XML namespaces, hook registration values and transport
//! limits. These constants are the single source of truth for every value
//! that is part of an external contract: changing any of the first two groups
//! changes what the virt-launcher and QEMU observe.
//!
//! ## Cross-References
//!
//! - [`crate::transform`]: trigger annotation, argument format, namespace
//! - [`crate::domain`]: element names and alias prefix
//! - [`crate::hooks`]: hook name, versions, socket path and limits

use std::time::Duration;

// =============================================================================
// Trigger Contract
// =============================================================================

/// VMI annotation whose presence enables the rewrite. The value is ignored.
pub const SSD_DISK_ANNOTATION: &str = "ssd.vm.kubevirt.io/ssd-patcher";

/// Literal flag argument emitted before every per-disk value argument.
pub const QEMU_SET_FLAG: &str = "-set";

/// Prefix libvirt and KubeVirt use for user-defined device aliases.
pub const USER_ALIAS_PREFIX: &str = "ua-";

/// Property appended to each SATA device id.
pub const ROTATION_RATE_PROPERTY: &str = "rotation_rate=1";

// =============================================================================
// Domain XML
// =============================================================================

/// Namespace URI for the libvirt QEMU command-line extension.
pub const QEMU_NAMESPACE_URI: &str = "http://libvirt.org/schemas/domain/qemu/1.0";

/// Prefix bound to [`QEMU_NAMESPACE_URI`] on the `<domain>` element.
pub const QEMU_NAMESPACE_PREFIX: &str = "qemu";

/// Bus name identifying SATA disks.
pub const DISK_BUS_SATA: &str = "sata";

// =============================================================================
// Hook Registration
// =============================================================================

/// Name reported by the `Info` call.
pub const HOOK_NAME: &str = "ssd";

/// Hook point this sidecar participates in.
pub const ON_DEFINE_DOMAIN_HOOK_POINT: &str = "OnDefineDomain";

/// Priority reported for [`ON_DEFINE_DOMAIN_HOOK_POINT`].
pub const ON_DEFINE_DOMAIN_PRIORITY: i32 = 0;

/// Protocol version advertised when none is configured.
pub const DEFAULT_HOOK_VERSION: &str = "v1alpha2";

// =============================================================================
// Transport
// =============================================================================

/// Directory shared between virt-launcher and hook sidecars.
pub const HOOK_SOCKETS_SHARED_DIRECTORY: &str = "/var/run/kubevirt-hooks";

/// Socket file name inside [`HOOK_SOCKETS_SHARED_DIRECTORY`].
pub const DEFAULT_SOCKET_NAME: &str = "ssd.sock";

/// Largest gRPC message accepted or sent (16 MiB).
///
/// A request carries a full VMI and a full domain XML; both are usually a
/// few tens of KiB, so this bound only rejects pathological payloads.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Time allowed for one hook call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum concurrent hook connections.
pub const MAX_CONNECTIONS: usize = 16;
