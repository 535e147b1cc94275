//! KubeVirt hook sidecar service.
//!
//! virt-launcher discovers sidecars through the shared hooks directory,
//! asks each one for `Info`, and calls back at the hook points they
//! registered for.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ virt-launcher pod                                            │
//! │  ┌────────────────┐   /var/run/kubevirt-hooks/ssd.sock       │
//! │  │ virt-launcher  │──────── gRPC ┐                           │
//! │  └────────────────┘              ▼                           │
//! │                        ┌────────────────────────────────┐    │
//! │                        │ ssd-hook-sidecar               │    │
//! │                        │  HookServer                    │    │
//! │                        │   ├─ info        → InfoService │    │
//! │                        │   ├─ v1alpha1    → callbacks   │    │
//! │                        │   └─ v1alpha2    → callbacks   │    │
//! │                        │           │                    │    │
//! │                        │           ▼                    │    │
//! │                        │   callbacks::on_define_domain  │    │
//! │                        └────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod callbacks;
pub mod client;
pub mod protocol;
pub mod server;

pub use callbacks::{on_define_domain, InfoService, V1alpha1Callbacks, V1alpha2Callbacks};
pub use client::HookClient;
pub use protocol::{info, status_code, v1alpha1, v1alpha2, HookVersion};
pub use server::{HookServer, HookSocket};
