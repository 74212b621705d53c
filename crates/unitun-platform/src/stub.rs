//! Stub platform for targets without a TUN backend

use crate::error::{PlatformError, Result};
use crate::handle::{NetworkInterface, TunHandle};
use crate::options::{PerAppMode, TunOptions};
use crate::Platform;
use tracing::debug;

/// Platform that refuses every operation that needs the OS.
#[derive(Debug, Clone)]
pub struct StubPlatform {
    name: String,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::named("stub")
    }

    /// Stub reporting a specific platform name
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StubPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_privileges(&self) -> bool {
        false
    }

    fn open_tun(&self, options: &TunOptions) -> Result<TunHandle> {
        debug!("{}: refusing to open {}", self.name, options.name);
        Err(PlatformError::not_supported(&self.name, "open_tun"))
    }

    fn close_tun(&self, _handle: &TunHandle) {}

    fn setup_routes(&self, _options: &TunOptions) -> Result<()> {
        Err(PlatformError::not_supported(&self.name, "setup_routes"))
    }

    fn setup_per_app_proxy(&self, _packages: &[String], _mode: PerAppMode) -> Result<()> {
        Err(PlatformError::not_supported(&self.name, "setup_per_app_proxy"))
    }

    fn clear_dns_cache(&self) {}

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        Vec::new()
    }
}
