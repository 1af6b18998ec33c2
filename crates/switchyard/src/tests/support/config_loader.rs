//! Test configuration loaders for scenarios covering success and failure paths.
//!
//! The successful loader writes a configuration file into a temporary
//! directory and loads it through the same layered path the daemon uses.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::sync::Arc;

use ortho_config::OrthoError;
use tempfile::TempDir;
use switchyard_config::{Config, Endpoint};

use crate::bootstrap::ConfigLoader;

/// Adapter name written by [`TestConfigLoader`].
pub const TEST_ADAPTER_NAME: &str = "switchyard-test";

/// Loader that provisions a configuration file under a temporary directory.
pub struct TestConfigLoader {
    config_dir: TempDir,
    discovery: bool,
    locator: Option<Endpoint>,
}

impl TestConfigLoader {
    /// Loader binding the adapter to an ephemeral loopback port with
    /// discovery switched off.
    #[must_use]
    pub fn new() -> Self {
        let config_dir =
            TempDir::new().expect("failed to create temporary directory for configuration");
        Self {
            config_dir,
            discovery: false,
            locator: None,
        }
    }

    /// Enables discovery against a loopback group.
    #[must_use]
    pub fn with_discovery(mut self) -> Self {
        self.discovery = true;
        self
    }

    /// Configures an explicit locator endpoint.
    #[must_use]
    pub fn with_locator(mut self, locator: Endpoint) -> Self {
        self.locator = Some(locator);
        self
    }

    fn render(&self) -> String {
        let mut contents = String::new();
        writeln!(contents, "adapter_name = \"{TEST_ADAPTER_NAME}\"").ok();
        writeln!(
            contents,
            "adapter_endpoint = {{ transport = \"tcp\", host = \"127.0.0.1\", port = 0 }}"
        )
        .ok();
        writeln!(contents, "discovery_enabled = {}", self.discovery).ok();
        writeln!(contents, "discovery_multicast_address = \"127.0.0.1\"").ok();
        writeln!(contents, "log_filter = \"switchyard=debug,warn\"").ok();
        if let Some(locator) = &self.locator {
            let transport = match locator {
                Endpoint::Tcp { .. } => "tcp",
                Endpoint::Udp { .. } => "udp",
            };
            writeln!(
                contents,
                "locator = {{ transport = \"{transport}\", host = \"{}\", port = {} }}",
                locator.host(),
                locator.port()
            )
            .ok();
        }
        contents
    }
}

impl Default for TestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let path = self.config_dir.path().join("switchyard.toml");
        fs::write(&path, self.render()).expect("failed to write test configuration");
        Config::load_from_iter([
            OsString::from("switchyardd"),
            OsString::from("--config-path"),
            path.into_os_string(),
        ])
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("switchyardd"),
            OsString::from("--registration-policy"),
            OsString::from("merge"),
        ];
        Config::load_from_iter(args)
    }
}
