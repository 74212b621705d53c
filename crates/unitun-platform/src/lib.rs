//! Unitun Platform - TUN Device Capability Contract
//!
//! The engine never talks to an operating system directly. Everything it
//! needs from the host (privileges, a TUN device, routes, per-app rules,
//! DNS cache control, interface enumeration) goes through the
//! [`Platform`] trait defined here.
//!
//! # Implementations
//!
//! - [`StubPlatform`]: refuses everything; the default until a real
//!   platform layer is plugged in by the host application
//! - [`MemoryPlatform`]: in-memory fake that hands out fake descriptors
//!   and records every call, for development and tests
//!
//! Production implementations (VpnService, NetworkExtension, WinTun,
//! `/dev/net/tun`) live with the host application.

mod error;
mod handle;
mod memory;
mod options;
mod stub;

use std::sync::Arc;

pub use error::{PlatformError, Result};
pub use handle::{NetworkInterface, RawTunFd, TunHandle};
pub use memory::{MemoryPlatform, PerAppCall};
pub use options::{OptionsError, PerAppMode, PerAppProxy, TunOptions, MIN_MTU};
pub use stub::StubPlatform;

/// Platform-specific TUN operations
///
/// Calls are synchronous: when a method returns, the platform is done.
pub trait Platform: Send + Sync {
    /// Platform name ("android", "linux", "memory", ...)
    fn name(&self) -> &str;

    /// Check that the process may create devices and touch routes
    fn check_privileges(&self) -> bool;

    /// Open a TUN device.
    ///
    /// A failure is either an `Err` or an invalid handle; callers must
    /// treat both the same way.
    fn open_tun(&self, options: &TunOptions) -> Result<TunHandle>;

    /// Close a TUN device. A no-op for an invalid handle.
    fn close_tun(&self, handle: &TunHandle);

    /// Install routes through the device
    fn setup_routes(&self, options: &TunOptions) -> Result<()>;

    /// Apply per-app proxy rules
    fn setup_per_app_proxy(&self, packages: &[String], mode: PerAppMode) -> Result<()>;

    /// Flush the system DNS cache, where the platform has one
    fn clear_dns_cache(&self);

    /// Enumerate network interfaces
    fn network_interfaces(&self) -> Vec<NetworkInterface>;
}

/// Platform for the current target.
///
/// No OS backend ships with this crate, so this is the refusing stub
/// carrying the target's name.
pub fn current() -> Arc<dyn Platform> {
    Arc::new(StubPlatform::named(std::env::consts::OS))
}

/// Platform by name. `"memory"` gives a fresh [`MemoryPlatform`],
/// anything else a [`StubPlatform`] reporting that name.
pub fn for_name(name: &str) -> Arc<dyn Platform> {
    match name.to_ascii_lowercase().as_str() {
        "memory" => Arc::new(MemoryPlatform::new()),
        _ => Arc::new(StubPlatform::named(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_name() {
        assert_eq!(for_name("memory").name(), "memory");
        assert_eq!(for_name("Memory").name(), "memory");

        let ios = for_name("ios");
        assert_eq!(ios.name(), "ios");
        assert!(!ios.check_privileges());
    }

    #[test]
    fn test_current_is_stub() {
        let platform = current();
        assert_eq!(platform.name(), std::env::consts::OS);
        assert!(platform.open_tun(&TunOptions::default()).is_err());
    }
}
