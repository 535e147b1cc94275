//! Tests for the hook server and client.
//!
//! Runs a real gRPC server on a Unix socket in a temporary directory and
//! talks to it through [`HookClient`].

use std::path::PathBuf;
use std::time::Duration;

use ssd_hook::hooks::{HookClient, HookServer, HookSocket, HookVersion, InfoService};
use ssd_hook::{DomainDocument, Error};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::Code;

// =============================================================================
// Fixtures
// =============================================================================

const TRIGGER_VMI: &str =
    r#"{"metadata":{"annotations":{"ssd.vm.kubevirt.io/ssd-patcher":"true"}}}"#;

const DOMAIN: &str = r#"<domain type="kvm"><devices><disk type="file" device="disk"><target bus="sata" dev="sda"/><alias name="ua-disk0"/></disk><disk type="file" device="disk"><target bus="virtio" dev="vda"/><alias name="ua-disk1"/></disk></devices></domain>"#;

struct TestServer {
    _dir: TempDir,
    path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<ssd_hook::Result<()>>,
}

impl TestServer {
    fn start(server: HookServer) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ssd.sock");
        let socket = HookSocket::bind(&path).unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(server.serve(socket, async move {
            let _ = rx.await;
        }));

        Self {
            _dir: dir,
            path,
            shutdown: Some(tx),
            handle,
        }
    }

    async fn client(&self) -> HookClient {
        HookClient::connect_with_timeout(&self.path, Duration::from_secs(5))
            .await
            .unwrap()
    }

    async fn stop(mut self) -> PathBuf {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await.unwrap().unwrap();
        self.path.clone()
    }
}

fn remote_code(err: &Error) -> Option<Code> {
    match err {
        Error::Remote { code, .. } => Some(*code),
        _ => None,
    }
}

// =============================================================================
// Info
// =============================================================================

#[tokio::test]
async fn test_info_reports_registration() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2));
    let info = server.client().await.info().await.unwrap();

    assert_eq!(info.name, "ssd");
    assert_eq!(info.versions, vec!["v1alpha2".to_string()]);
    assert_eq!(info.hook_points.len(), 1);
    assert_eq!(info.hook_points[0].name, "OnDefineDomain");
    assert_eq!(info.hook_points[0].priority, 0);

    server.stop().await;
}

// =============================================================================
// OnDefineDomain
// =============================================================================

#[tokio::test]
async fn test_on_define_domain_both_versions() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2));
    let client = server.client().await;

    for version in HookVersion::ALL {
        let xml = client
            .on_define_domain(version, TRIGGER_VMI, DOMAIN)
            .await
            .unwrap();
        let doc = DomainDocument::from_xml(&xml).unwrap();
        assert_eq!(
            doc.commandline().unwrap().arg_values(),
            vec!["-set", "device.ua-disk0.rotation_rate=1"],
            "version {version}"
        );
    }

    server.stop().await;
}

#[tokio::test]
async fn test_on_define_domain_passthrough() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2));
    let xml = server
        .client()
        .await
        .on_define_domain(HookVersion::V1alpha2, r#"{"metadata":{}}"#, DOMAIN)
        .await
        .unwrap();

    assert_eq!(xml, DOMAIN.as_bytes());
    server.stop().await;
}

#[tokio::test]
async fn test_bad_input_is_call_scoped() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2));
    let client = server.client().await;

    let err = client
        .on_define_domain(HookVersion::V1alpha2, "{not json", DOMAIN)
        .await
        .unwrap_err();
    assert_eq!(remote_code(&err), Some(Code::InvalidArgument));

    let err = client
        .on_define_domain(HookVersion::V1alpha1, TRIGGER_VMI, "<domain><devices>")
        .await
        .unwrap_err();
    assert_eq!(remote_code(&err), Some(Code::InvalidArgument));

    // Same connection, still serving.
    assert!(client.info().await.is_ok());
    assert!(client
        .on_define_domain(HookVersion::V1alpha2, TRIGGER_VMI, DOMAIN)
        .await
        .is_ok());
    server.stop().await;
}

#[tokio::test]
async fn test_unserved_version_unimplemented() {
    let server = TestServer::start(
        HookServer::new(InfoService::new(vec![HookVersion::V1alpha2]))
            .with_version(HookVersion::V1alpha2),
    );

    let err = server
        .client()
        .await
        .on_define_domain(HookVersion::V1alpha1, TRIGGER_VMI, DOMAIN)
        .await
        .unwrap_err();
    assert_eq!(remote_code(&err), Some(Code::Unimplemented));

    server.stop().await;
}

// =============================================================================
// PreCloudInitIso
// =============================================================================

#[tokio::test]
async fn test_pre_cloud_init_iso_passthrough() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2));
    let data = r##"{"dataSource":"noCloud","noCloud":{"userData":"#cloud-config"}}"##;

    let out = server
        .client()
        .await
        .pre_cloud_init_iso(TRIGGER_VMI, data)
        .await
        .unwrap();
    assert_eq!(out, data.as_bytes());

    server.stop().await;
}

// =============================================================================
// Transport Limits
// =============================================================================

#[tokio::test]
async fn test_oversized_message_rejected() {
    let server =
        TestServer::start(HookServer::ssd(HookVersion::V1alpha2).with_max_message_size(1024));
    let client = server.client().await;
    let padded = format!("{DOMAIN}<!--{}-->", "x".repeat(4096));

    let err = client
        .on_define_domain(HookVersion::V1alpha2, TRIGGER_VMI, padded)
        .await
        .unwrap_err();
    assert_eq!(remote_code(&err), Some(Code::OutOfRange));

    // Requests under the limit still go through.
    assert!(client
        .on_define_domain(HookVersion::V1alpha2, TRIGGER_VMI, DOMAIN)
        .await
        .is_ok());
    server.stop().await;
}

#[tokio::test]
async fn test_connections_over_limit_dropped() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2).with_max_connections(1));

    let first = server.client().await;
    assert!(first.info().await.is_ok());

    // The only slot is taken: the second connection is closed on accept.
    let second = HookClient::connect_with_timeout(&server.path, Duration::from_secs(2)).await;
    match second {
        Ok(client) => assert!(client.info().await.is_err()),
        Err(err) => assert!(matches!(err, Error::Transport(_))),
    }
    assert!(first.info().await.is_ok(), "admitted connection keeps working");

    // Closing the first connection frees the slot.
    drop(first);
    let mut admitted = false;
    for _ in 0..100 {
        if let Ok(client) =
            HookClient::connect_with_timeout(&server.path, Duration::from_secs(1)).await
        {
            if client.info().await.is_ok() {
                admitted = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(admitted, "slot not released after the connection closed");

    server.stop().await;
}

// =============================================================================
// Socket Lifecycle
// =============================================================================

#[tokio::test]
async fn test_shutdown_removes_socket() {
    let server = TestServer::start(HookServer::ssd(HookVersion::V1alpha2));
    assert!(server.path.exists());

    let path = server.stop().await;
    assert!(!path.exists());
}

#[tokio::test]
async fn test_stale_socket_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ssd.sock");
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let socket = HookSocket::bind(&path).unwrap();
    assert_eq!(socket.path(), path.as_path());
}

#[tokio::test]
async fn test_regular_file_not_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ssd.sock");
    std::fs::write(&path, b"keep me").unwrap();

    let err = HookSocket::bind(&path).unwrap_err();
    assert!(matches!(err, Error::Bind { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
}

#[tokio::test]
async fn test_client_reports_unreachable_socket() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.sock");
    let err = HookClient::connect_with_timeout(path, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
