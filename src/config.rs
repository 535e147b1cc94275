//! Sidecar configuration.
//!
//! Every setting comes from a command-line flag with an environment
//! fallback, so the sidecar container can be configured from its pod spec
//! without a wrapper script.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::constants::{DEFAULT_HOOK_VERSION, DEFAULT_SOCKET_NAME, HOOK_SOCKETS_SHARED_DIRECTORY};
use crate::error::{Error, Result};
use crate::hooks::HookVersion;

/// Command-line interface of the sidecar binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ssd-hook-sidecar",
    version,
    about = "KubeVirt hook sidecar marking SATA disks as SSDs"
)]
pub struct Cli {
    /// Directory shared with virt-launcher for hook sockets.
    #[arg(long, env = "SSD_HOOK_SOCKET_DIR", default_value = HOOK_SOCKETS_SHARED_DIRECTORY)]
    pub socket_dir: PathBuf,

    /// Socket file name inside the socket directory.
    #[arg(long, env = "SSD_HOOK_SOCKET_NAME", default_value = DEFAULT_SOCKET_NAME)]
    pub socket_name: String,

    /// Callback version reported by Info.
    #[arg(
        long = "version-advertised",
        env = "SSD_HOOK_VERSION",
        default_value = DEFAULT_HOOK_VERSION
    )]
    pub hook_version: String,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, env = "SSD_HOOK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated sidecar configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    /// Full socket path.
    pub socket_path: PathBuf,
    /// Callback version reported by Info.
    pub hook_version: HookVersion,
    /// Default log filter.
    pub log_level: String,
}

impl SidecarConfig {
    /// Validates CLI input into a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the socket name is not a bare file name
    /// or the version is not served.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let name = Path::new(&cli.socket_name);
        let is_bare = name.file_name().is_some_and(|f| f == name.as_os_str());
        if cli.socket_name.is_empty() || !is_bare {
            return Err(Error::Config(format!(
                "socket name '{}' must be a plain file name",
                cli.socket_name
            )));
        }

        let hook_version =
            HookVersion::parse(&cli.hook_version).map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            socket_path: cli.socket_dir.join(&cli.socket_name),
            hook_version,
            log_level: cli.log_level,
        })
    }
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            socket_path: Path::new(HOOK_SOCKETS_SHARED_DIRECTORY).join(DEFAULT_SOCKET_NAME),
            hook_version: HookVersion::V1alpha2,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["ssd-hook-sidecar"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_kubevirt_layout() {
        let config = SidecarConfig::from_cli(cli(&[])).unwrap();
        assert_eq!(config, SidecarConfig::default());
        assert_eq!(
            config.socket_path,
            PathBuf::from("/var/run/kubevirt-hooks/ssd.sock")
        );
    }

    #[test]
    fn test_socket_name_must_be_bare() {
        let err = SidecarConfig::from_cli(cli(&["--socket-name", "../escape.sock"])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let err =
            SidecarConfig::from_cli(cli(&["--version-advertised", "v1beta1"])).unwrap_err();
        assert!(err.to_string().contains("v1beta1"));
    }
}
