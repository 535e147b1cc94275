//! Hook gRPC services.
//!
//! Each protocol version is a thin adapter that maps its own request and
//! result messages onto one shared `OnDefineDomain` body, which in turn
//! calls [`crate::transform::transform_domain_with_outcome`]. The adapters
//! are the only place the transform meets logging.

use async_trait::async_trait;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use super::protocol::{info as info_api, v1alpha1, v1alpha2, HookVersion};
use crate::constants::{HOOK_NAME, ON_DEFINE_DOMAIN_HOOK_POINT, ON_DEFINE_DOMAIN_PRIORITY};
use crate::error::Result;
use crate::transform::{transform_domain_with_outcome, Outcome};

// =============================================================================
// Shared Callback
// =============================================================================

/// `OnDefineDomain` body shared by every version.
///
/// Returns `domain_xml` itself when the VMI does not ask for the rewrite.
///
/// # Errors
///
/// Returns the transform's call-scoped error for undecodable input.
pub fn on_define_domain(
    version: HookVersion,
    vmi: &[u8],
    domain_xml: Vec<u8>,
) -> Result<Vec<u8>> {
    info!(version = %version, "hook's OnDefineDomain callback method has been called");

    let (patched, sata_disks) = match transform_domain_with_outcome(vmi, &domain_xml)? {
        (_, Outcome::Unchanged) => (None, 0),
        (out, Outcome::Patched { sata_disks }) => (Some(out.into_owned()), sata_disks),
    };

    match patched {
        None => {
            info!("ssd hook sidecar was requested, but no annotation provided, returning original domain spec");
            Ok(domain_xml)
        }
        Some(out) => {
            debug!(original = %String::from_utf8_lossy(&domain_xml), "domain xml");
            info!(
                sata_disks,
                "successfully updated original domain spec with requested disk attributes"
            );
            Ok(out)
        }
    }
}

fn answer<T>(version: HookVersion, result: Result<T>) -> std::result::Result<Response<T>, Status> {
    result.map(Response::new).map_err(|e| {
        warn!(version = %version, error = %e, "hook call failed");
        Status::from(e)
    })
}

// =============================================================================
// Versioned Adapters
// =============================================================================

/// `v1alpha1` callbacks: `OnDefineDomain` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1alpha1Callbacks;

/// `v1alpha2` callbacks: `OnDefineDomain` and a passthrough `PreCloudInitIso`.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1alpha2Callbacks;

#[async_trait]
impl v1alpha1::callbacks_server::Callbacks for V1alpha1Callbacks {
    async fn on_define_domain(
        &self,
        request: Request<v1alpha1::OnDefineDomainParams>,
    ) -> std::result::Result<Response<v1alpha1::OnDefineDomainResult>, Status> {
        let params = request.into_inner();
        let version = HookVersion::V1alpha1;
        answer(
            version,
            on_define_domain(version, &params.vmi, params.domain_xml)
                .map(|domain_xml| v1alpha1::OnDefineDomainResult { domain_xml }),
        )
    }
}

#[async_trait]
impl v1alpha2::callbacks_server::Callbacks for V1alpha2Callbacks {
    async fn on_define_domain(
        &self,
        request: Request<v1alpha2::OnDefineDomainParams>,
    ) -> std::result::Result<Response<v1alpha2::OnDefineDomainResult>, Status> {
        let params = request.into_inner();
        let version = HookVersion::V1alpha2;
        answer(
            version,
            on_define_domain(version, &params.vmi, params.domain_xml)
                .map(|domain_xml| v1alpha2::OnDefineDomainResult { domain_xml }),
        )
    }

    async fn pre_cloud_init_iso(
        &self,
        request: Request<v1alpha2::PreCloudInitIsoParams>,
    ) -> std::result::Result<Response<v1alpha2::PreCloudInitIsoResult>, Status> {
        let params = request.into_inner();
        Ok(Response::new(v1alpha2::PreCloudInitIsoResult {
            cloud_init_data: params.cloud_init_data,
        }))
    }
}

// =============================================================================
// Info
// =============================================================================

/// Serves the capability discovery call.
#[derive(Debug, Clone)]
pub struct InfoService {
    versions: Vec<HookVersion>,
}

impl InfoService {
    /// Creates an info service advertising `versions`.
    #[must_use]
    pub fn new(versions: Vec<HookVersion>) -> Self {
        Self { versions }
    }

    /// Returns the advertised versions.
    #[must_use]
    pub fn versions(&self) -> &[HookVersion] {
        &self.versions
    }

    /// Builds the `Info` result.
    #[must_use]
    pub fn info_result(&self) -> info_api::InfoResult {
        info_api::InfoResult {
            name: HOOK_NAME.to_string(),
            versions: self.versions.iter().map(|v| v.as_str().to_string()).collect(),
            hook_points: vec![info_api::HookPoint {
                name: ON_DEFINE_DOMAIN_HOOK_POINT.to_string(),
                priority: ON_DEFINE_DOMAIN_PRIORITY,
            }],
        }
    }
}

#[async_trait]
impl info_api::info_server::Info for InfoService {
    async fn info(
        &self,
        request: Request<info_api::InfoParams>,
    ) -> std::result::Result<Response<info_api::InfoResult>, Status> {
        info!(
            launcher_versions = ?request.get_ref().supported_hook_versions,
            "hook's Info method has been called"
        );
        Ok(Response::new(self.info_result()))
    }
}
