//! Hook wire protocol.
//!
//! virt-launcher talks to sidecars over gRPC on a Unix socket in the shared
//! hooks directory. The services come from KubeVirt's hook API definitions
//! under `proto/`:
//!
//! | Service                             | Methods                             |
//! |-------------------------------------|-------------------------------------|
//! | `kubevirt.hooks.info.Info`          | `Info`                              |
//! | `kubevirt.hooks.v1alpha1.Callbacks` | `OnDefineDomain`                    |
//! | `kubevirt.hooks.v1alpha2.Callbacks` | `OnDefineDomain`, `PreCloudInitIso` |
//!
//! Payloads are opaque bytes: the VMI as JSON, the domain as XML and the
//! cloud-init data as JSON.
//!
//! # Error Mapping
//!
//! | [`Error`]                                          | gRPC code          |
//! |----------------------------------------------------|--------------------|
//! | `InvalidVmi`, `InvalidDomain`, `MissingDiskAlias`  | `INVALID_ARGUMENT` |
//! | `UnsupportedVersion`                               | `UNIMPLEMENTED`    |
//! | `Remote`                                           | carried through    |
//! | anything else                                      | `INTERNAL`         |

use std::fmt;

use tonic::{Code, Status};

use crate::error::Error;

/// `kubevirt.hooks.info`
pub mod info {
    tonic::include_proto!("kubevirt.hooks.info");
}

/// `kubevirt.hooks.v1alpha1`
pub mod v1alpha1 {
    tonic::include_proto!("kubevirt.hooks.v1alpha1");
}

/// `kubevirt.hooks.v1alpha2`
pub mod v1alpha2 {
    tonic::include_proto!("kubevirt.hooks.v1alpha2");
}

// =============================================================================
// Versions
// =============================================================================

/// Hook callback protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookVersion {
    V1alpha1,
    V1alpha2,
}

impl HookVersion {
    /// All versions this sidecar serves.
    pub const ALL: [HookVersion; 2] = [HookVersion::V1alpha1, HookVersion::V1alpha2];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1alpha1 => "v1alpha1",
            Self::V1alpha2 => "v1alpha2",
        }
    }

    /// Parses a version name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedVersion`] for unknown names.
    pub fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "v1alpha1" => Ok(Self::V1alpha1),
            "v1alpha2" => Ok(Self::V1alpha2),
            other => Err(Error::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for HookVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Status Mapping
// =============================================================================

/// Returns the gRPC code a failed call is answered with.
#[must_use]
pub fn status_code(err: &Error) -> Code {
    match err {
        Error::InvalidVmi(_) | Error::InvalidDomain(_) | Error::MissingDiskAlias { .. } => {
            Code::InvalidArgument
        }
        Error::UnsupportedVersion(_) => Code::Unimplemented,
        Error::Remote { code, .. } => *code,
        Error::Serialization(_)
        | Error::Transport(_)
        | Error::Config(_)
        | Error::Bind { .. }
        | Error::Io(_) => Code::Internal,
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        Status::new(status_code(&err), err.to_string())
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Error::Remote {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}
