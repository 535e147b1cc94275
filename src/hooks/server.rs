//! Hook server.
//!
//! Serves the KubeVirt hook gRPC services on the hook socket. Every call
//! error is answered as a gRPC status on the call that caused it; nothing a
//! caller sends can stop the server.
//!
//! ```text
//! accept ──► permit? ──no──► drop connection
//!              │
//!             yes
//!              ▼
//!        HTTP/2 connection (permit held until it closes)
//!              │
//!              ├─ kubevirt.hooks.info.Info          → InfoService
//!              ├─ kubevirt.hooks.v1alpha1.Callbacks → V1alpha1Callbacks
//!              └─ kubevirt.hooks.v1alpha2.Callbacks → V1alpha2Callbacks
//! ```

use std::future::Future;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_stream::wrappers::UnixListenerStream;
use tokio_stream::StreamExt;
use tonic::transport::server::{Connected, UdsConnectInfo};
use tonic::transport::Server;
use tracing::{debug, info, warn};

use super::callbacks::{InfoService, V1alpha1Callbacks, V1alpha2Callbacks};
use super::protocol::{info, v1alpha1, v1alpha2, HookVersion};
use crate::constants::{MAX_CONNECTIONS, MAX_MESSAGE_SIZE, REQUEST_TIMEOUT};
use crate::error::{Error, Result};

// =============================================================================
// Socket
// =============================================================================

/// Listening hook socket. The socket file is removed on drop.
#[derive(Debug)]
pub struct HookSocket {
    listener: Option<UnixListener>,
    path: PathBuf,
}

impl HookSocket {
    /// Binds the hook socket at `path`.
    ///
    /// A stale socket left at `path` by a previous run is removed first;
    /// any other kind of file is left alone and binding fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] if the path is taken or the directory does
    /// not exist.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Ok(meta) = std::fs::symlink_metadata(&path) {
            if meta.file_type().is_socket() {
                std::fs::remove_file(&path).map_err(|source| Error::Bind {
                    path: path.clone(),
                    source,
                })?;
                warn!(socket = %path.display(), "removed stale hook socket");
            }
        }

        let listener = UnixListener::bind(&path).map_err(|source| Error::Bind {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            listener: Some(listener),
            path,
        })
    }

    /// Socket file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for HookSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(socket = %self.path.display(), error = %e, "failed to remove hook socket");
        }
    }
}

// =============================================================================
// Connection Limit
// =============================================================================

/// Accepted connection holding one slot of the connection limit.
struct PermittedStream {
    inner: UnixStream,
    _permit: OwnedSemaphorePermit,
}

impl Connected for PermittedStream {
    type ConnectInfo = UdsConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.inner.connect_info()
    }
}

impl AsyncRead for PermittedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for PermittedStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

// =============================================================================
// Server
// =============================================================================

/// Hook services plus transport limits.
#[derive(Debug, Clone)]
pub struct HookServer {
    info: InfoService,
    versions: Vec<HookVersion>,
    request_timeout: Duration,
    max_connections: usize,
    max_message_size: usize,
}

impl HookServer {
    /// Creates a server answering `Info` only.
    #[must_use]
    pub fn new(info: InfoService) -> Self {
        Self {
            info,
            versions: Vec::new(),
            request_timeout: REQUEST_TIMEOUT,
            max_connections: MAX_CONNECTIONS,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Creates the SSD sidecar server.
    ///
    /// Both callback versions are served; `advertised` is the version
    /// reported by `Info`.
    #[must_use]
    pub fn ssd(advertised: HookVersion) -> Self {
        HookVersion::ALL
            .into_iter()
            .fold(Self::new(InfoService::new(vec![advertised])), Self::with_version)
    }

    /// Serves the callbacks of `version`.
    #[must_use]
    pub fn with_version(mut self, version: HookVersion) -> Self {
        if !self.versions.contains(&version) {
            self.versions.push(version);
        }
        self
    }

    /// Sets the time allowed for one call.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Sets the maximum number of concurrent connections.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Sets the largest request message accepted, in bytes.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Returns the versions whose callbacks are served.
    #[must_use]
    pub fn served_versions(&self) -> &[HookVersion] {
        &self.versions
    }

    fn serves(&self, version: HookVersion) -> bool {
        self.versions.contains(&version)
    }

    /// Serves connections on `socket` until `shutdown` completes.
    ///
    /// Accept errors and connections over the limit are logged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the socket was already served, or
    /// [`Error::Transport`] if the gRPC server fails.
    pub async fn serve<F>(self, mut socket: HookSocket, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = socket
            .listener
            .take()
            .ok_or_else(|| Error::Config("hook socket is already being served".into()))?;

        info!(
            socket = %socket.path().display(),
            versions = ?self.versions,
            "starting hook server exposing 'info' and callback services"
        );

        let permits = Arc::new(Semaphore::new(self.max_connections));
        let max_connections = self.max_connections;
        let incoming = UnixListenerStream::new(listener).filter_map(move |conn| match conn {
            Ok(inner) => match Arc::clone(&permits).try_acquire_owned() {
                Ok(permit) => {
                    debug!("hook connection accepted");
                    Some(Ok::<_, io::Error>(PermittedStream {
                        inner,
                        _permit: permit,
                    }))
                }
                Err(_) => {
                    warn!(max = max_connections, "connection rejected: limit reached");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                None
            }
        });

        let limit = self.max_message_size;
        let v1alpha1 = self.serves(HookVersion::V1alpha1).then(|| {
            v1alpha1::callbacks_server::CallbacksServer::new(V1alpha1Callbacks)
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit)
        });
        let v1alpha2 = self.serves(HookVersion::V1alpha2).then(|| {
            v1alpha2::callbacks_server::CallbacksServer::new(V1alpha2Callbacks)
                .max_decoding_message_size(limit)
                .max_encoding_message_size(limit)
        });

        Server::builder()
            .timeout(self.request_timeout)
            .add_service(
                info::info_server::InfoServer::new(self.info)
                    .max_decoding_message_size(limit),
            )
            .add_optional_service(v1alpha1)
            .add_optional_service(v1alpha2)
            .serve_with_incoming_shutdown(incoming, async {
                shutdown.await;
                info!("shutdown requested, closing hook socket");
            })
            .await?;

        // The socket file goes with `socket` here.
        drop(socket);
        Ok(())
    }
}
