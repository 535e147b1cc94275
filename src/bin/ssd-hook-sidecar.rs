//! # ssd-hook-sidecar
//!
//! Runs next to virt-launcher in the VMI pod and serves the SSD hook on
//! `/var/run/kubevirt-hooks/ssd.sock`.
//!
//! ## Usage
//!
//! ```sh
//! ssd-hook-sidecar [--socket-dir <dir>] [--socket-name <name>]
//!                  [--version-advertised v1alpha1|v1alpha2] [--log-level <filter>]
//! ```
//!
//! ## Exit Codes
//!
//! | Code | Meaning                                 |
//! |------|-----------------------------------------|
//! | 0    | Clean shutdown on SIGTERM/SIGINT        |
//! | 1    | Invalid configuration or logging setup  |
//! | 2    | Hook socket could not be bound          |

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use ssd_hook::hooks::{HookServer, HookSocket};
use ssd_hook::{logging, Cli, SidecarConfig};

const EXIT_SUCCESS: u8 = 0;
const EXIT_INIT_FAILED: u8 = 1;
const EXIT_BIND_FAILED: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match SidecarConfig::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ssd-hook-sidecar: {e}");
            return ExitCode::from(EXIT_INIT_FAILED);
        }
    };

    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("ssd-hook-sidecar: {e}");
        return ExitCode::from(EXIT_INIT_FAILED);
    }

    info!(
        component = logging::COMPONENT,
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "sidecar starting"
    );

    let socket = match HookSocket::bind(&config.socket_path) {
        Ok(socket) => socket,
        Err(e) => {
            error!(error = %e, "failed to initialize hook socket");
            error!(
                "check whether the given directory exists and the socket name is not already taken by another file"
            );
            return ExitCode::from(EXIT_BIND_FAILED);
        }
    };

    match run(config, socket).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!(error = %e, "hook server failed");
            ExitCode::from(EXIT_INIT_FAILED)
        }
    }
}

async fn run(config: SidecarConfig, socket: HookSocket) -> anyhow::Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
    };

    HookServer::ssd(config.hook_version)
        .serve(socket, shutdown)
        .await
        .context("hook server stopped unexpectedly")
}
