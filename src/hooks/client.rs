//! Hook client.
//!
//! Async gRPC client for the sidecar's Unix socket. Used by integration
//! tests and by tooling that wants to call a running sidecar the way
//! virt-launcher does.
//!
//! # Example
//!
//! ```rust,ignore
//! use ssd_hook::hooks::{HookClient, HookVersion};
//!
//! let client = HookClient::connect("/var/run/kubevirt-hooks/ssd.sock").await?;
//! let info = client.info().await?;
//! let domain = client
//!     .on_define_domain(HookVersion::V1alpha2, vmi_json, domain_xml)
//!     .await?;
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use super::protocol::{info, v1alpha1, v1alpha2, HookVersion};
use crate::constants::MAX_MESSAGE_SIZE;
use crate::error::Result;

/// Default timeout for connecting and for each hook call (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Placeholder authority; the connector always dials the socket path.
const SOCKET_ENDPOINT: &str = "http://localhost";

/// Client for a hook sidecar socket.
#[derive(Debug, Clone)]
pub struct HookClient {
    path: PathBuf,
    channel: Channel,
}

impl HookClient {
    /// Connects to the socket at `path` with [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the socket cannot be reached.
    pub async fn connect(path: impl Into<PathBuf>) -> Result<Self> {
        Self::connect_with_timeout(path, DEFAULT_TIMEOUT).await
    }

    /// Connects to the socket at `path`, bounding the connect and every call
    /// by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transport`] if the socket cannot be reached.
    pub async fn connect_with_timeout(
        path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let path = path.into();
        let socket = path.clone();

        let channel = Endpoint::from_static(SOCKET_ENDPOINT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .connect_with_connector(service_fn(move |_: Uri| {
                let socket = socket.clone();
                async move {
                    let stream = UnixStream::connect(socket).await?;
                    Ok::<_, io::Error>(TokioIo::new(stream))
                }
            }))
            .await?;

        Ok(Self { path, channel })
    }

    /// Socket path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Calls `Info`, announcing every version this client speaks.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Remote`] for an error status.
    pub async fn info(&self) -> Result<info::InfoResult> {
        let params = info::InfoParams {
            supported_hook_versions: HookVersion::ALL
                .iter()
                .map(|v| v.as_str().to_string())
                .collect(),
        };

        let result = info::info_client::InfoClient::new(self.channel.clone())
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .info(params)
            .await?;
        Ok(result.into_inner())
    }

    /// Calls `OnDefineDomain` of `version` and returns the domain XML.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Remote`] for an error status, e.g.
    /// `INVALID_ARGUMENT` for undecodable input.
    pub async fn on_define_domain(
        &self,
        version: HookVersion,
        vmi: impl Into<Vec<u8>>,
        domain_xml: impl Into<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let (vmi, domain_xml) = (vmi.into(), domain_xml.into());

        let domain_xml = match version {
            HookVersion::V1alpha1 => {
                v1alpha1::callbacks_client::CallbacksClient::new(self.channel.clone())
                    .max_decoding_message_size(MAX_MESSAGE_SIZE)
                    .on_define_domain(v1alpha1::OnDefineDomainParams { domain_xml, vmi })
                    .await?
                    .into_inner()
                    .domain_xml
            }
            HookVersion::V1alpha2 => {
                v1alpha2::callbacks_client::CallbacksClient::new(self.channel.clone())
                    .max_decoding_message_size(MAX_MESSAGE_SIZE)
                    .on_define_domain(v1alpha2::OnDefineDomainParams { domain_xml, vmi })
                    .await?
                    .into_inner()
                    .domain_xml
            }
        };

        Ok(domain_xml)
    }

    /// Calls `v1alpha2` `PreCloudInitIso` and returns the cloud-init data.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Remote`] for an error status.
    pub async fn pre_cloud_init_iso(
        &self,
        vmi: impl Into<Vec<u8>>,
        cloud_init_data: impl Into<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let params = v1alpha2::PreCloudInitIsoParams {
            cloud_init_data: cloud_init_data.into(),
            vmi: vmi.into(),
        };

        let result = v1alpha2::callbacks_client::CallbacksClient::new(self.channel.clone())
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .pre_cloud_init_iso(params)
            .await?;
        Ok(result.into_inner().cloud_init_data)
    }
}
