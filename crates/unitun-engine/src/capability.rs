//! Core and Driver Capabilities
//!
//! The protocol cores and SOCKS drivers are external engines. The
//! orchestrator only sees them through these traits and creates them
//! through the provider traits, so a host application plugs in whatever
//! cores it was built with.
//!
//! Providers are blanket-implemented for closures:
//!
//! ```rust,ignore
//! let cores = |kind: CoreKind| -> Option<Box<dyn Core>> {
//!     match kind {
//!         CoreKind::SingBox => Some(Box::new(SingBoxCore::new())),
//!         _ => None,
//!     }
//! };
//! ```

use crate::config::{CoreConfig, DriverConfig};
use crate::kind::{CoreKind, DriverKind};
use crate::status::ConnectionStats;

/// Detached liveness check, run off the control thread
pub type LivenessProbe = Box<dyn FnOnce() -> bool + Send + 'static>;

/// A protocol core
pub trait Core: Send {
    /// Prepare the core. Nothing runs yet.
    fn initialize(&mut self, config: &CoreConfig) -> anyhow::Result<()>;

    /// Start processing traffic
    fn start(&mut self) -> anyhow::Result<()>;

    /// Stop processing traffic. Safe to call when not started.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    fn version(&self) -> String;

    /// Traffic counters since start
    fn stats(&self) -> ConnectionStats {
        ConnectionStats::default()
    }

    /// A check that the tunnel actually passes traffic.
    ///
    /// The probe must not borrow the core: it runs on a worker thread and
    /// may be abandoned if it outlives its timeout.
    fn liveness_probe(&self) -> Option<LivenessProbe> {
        None
    }
}

/// A SOCKS driver bridging the TUN device to a core's SOCKS inbound
pub trait Driver: Send {
    fn initialize(&mut self, config: &DriverConfig) -> anyhow::Result<()>;

    fn start(&mut self) -> anyhow::Result<()>;

    /// Safe to call when not started.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Creates cores on demand
pub trait CoreProvider: Send + Sync {
    /// Create a fresh core, or `None` if this kind is not available
    fn create_core(&self, kind: CoreKind) -> Option<Box<dyn Core>>;

    /// Whether `create_core` can ever succeed for this kind
    fn supports(&self, _kind: CoreKind) -> bool {
        true
    }
}

impl<F> CoreProvider for F
where
    F: Fn(CoreKind) -> Option<Box<dyn Core>> + Send + Sync,
{
    fn create_core(&self, kind: CoreKind) -> Option<Box<dyn Core>> {
        self(kind)
    }
}

/// Creates drivers on demand
pub trait DriverProvider: Send + Sync {
    /// Create a fresh driver, or `None` if this kind is not available
    fn create_driver(&self, kind: DriverKind) -> Option<Box<dyn Driver>>;
}

impl<F> DriverProvider for F
where
    F: Fn(DriverKind) -> Option<Box<dyn Driver>> + Send + Sync,
{
    fn create_driver(&self, kind: DriverKind) -> Option<Box<dyn Driver>> {
        self(kind)
    }
}

/// Provider with no drivers, for hosts that only run native-TUN cores
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDrivers;

impl DriverProvider for NoDrivers {
    fn create_driver(&self, _kind: DriverKind) -> Option<Box<dyn Driver>> {
        None
    }
}
