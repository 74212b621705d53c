//! Engine Factory
//!
//! Maps a core selection to an [`Engine`] and answers the driver
//! questions a caller needs before building a configuration.

use crate::capability::{CoreProvider, DriverProvider};
use crate::engine::Engine;
use crate::kind::{CoreKind, DriverKind};
use std::sync::Arc;
use tracing::debug;

/// Creates engines wired to the host's cores and drivers
#[derive(Clone)]
pub struct EngineFactory {
    cores: Arc<dyn CoreProvider>,
    drivers: Arc<dyn DriverProvider>,
}

impl EngineFactory {
    pub fn new(
        cores: impl CoreProvider + 'static,
        drivers: impl DriverProvider + 'static,
    ) -> Self {
        Self {
            cores: Arc::new(cores),
            drivers: Arc::new(drivers),
        }
    }

    /// Create an engine, or `None` if the host has no core of this kind
    pub fn create(&self, kind: CoreKind) -> Option<Engine> {
        if !self.cores.supports(kind) {
            debug!("No {} core available", kind);
            return None;
        }
        Some(Engine::new(
            kind.descriptor(),
            self.cores.clone(),
            self.drivers.clone(),
        ))
    }

    /// Create an engine by core name; `None` for unknown names
    pub fn create_named(&self, name: &str) -> Option<Engine> {
        match name.parse::<CoreKind>() {
            Ok(kind) => self.create(kind),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    /// Whether the core needs a SOCKS driver in front of it
    pub fn requires_driver(kind: CoreKind) -> bool {
        kind.descriptor().needs_driver
    }

    /// Unknown names need a driver: assume the most setup, not the least
    pub fn requires_driver_named(name: &str) -> bool {
        name.parse::<CoreKind>()
            .map_or(true, Self::requires_driver)
    }

    /// Driver to use when the caller has no preference
    pub fn recommended_driver(kind: CoreKind) -> DriverKind {
        if Self::requires_driver(kind) {
            kind.descriptor().default_driver
        } else {
            DriverKind::None
        }
    }

    pub fn recommended_driver_named(name: &str) -> DriverKind {
        match name.parse::<CoreKind>() {
            Ok(kind) => Self::recommended_driver(kind),
            Err(_) => DriverKind::RECOMMENDED,
        }
    }
}

impl std::fmt::Debug for EngineFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let supported: Vec<_> = CoreKind::all()
            .iter()
            .filter(|kind| self.cores.supports(**kind))
            .collect();
        f.debug_struct("EngineFactory")
            .field("cores", &supported)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Core, NoDrivers};
    use crate::status::ConnectionStatus;

    /// Provider for a host built without the WireGuard core
    struct NoWireGuard;

    impl CoreProvider for NoWireGuard {
        fn create_core(&self, _kind: CoreKind) -> Option<Box<dyn Core>> {
            None
        }

        fn supports(&self, kind: CoreKind) -> bool {
            kind != CoreKind::WireGuard
        }
    }

    #[test]
    fn test_requires_driver() {
        assert!(!EngineFactory::requires_driver(CoreKind::SingBox));
        assert!(EngineFactory::requires_driver(CoreKind::LibXray));
        assert!(EngineFactory::requires_driver(CoreKind::V2Ray));
        assert!(EngineFactory::requires_driver(CoreKind::WireGuard));

        let native = CoreKind::all()
            .iter()
            .filter(|kind| !EngineFactory::requires_driver(**kind))
            .count();
        assert_eq!(native, 1);
    }

    #[test]
    fn test_unknown_names_require_driver() {
        assert!(EngineFactory::requires_driver_named("hysteria"));
        assert!(!EngineFactory::requires_driver_named("sing-box"));
        assert_eq!(
            EngineFactory::recommended_driver_named("hysteria"),
            DriverKind::HevSocks5
        );
    }

    #[test]
    fn test_recommended_driver() {
        assert_eq!(EngineFactory::recommended_driver(CoreKind::SingBox), DriverKind::None);
        for kind in [CoreKind::LibXray, CoreKind::V2Ray, CoreKind::WireGuard] {
            assert_eq!(EngineFactory::recommended_driver(kind), DriverKind::HevSocks5);
        }
    }

    #[test]
    fn test_create() {
        let factory = EngineFactory::new(NoWireGuard, NoDrivers);

        let engine = factory.create(CoreKind::V2Ray).unwrap();
        assert_eq!(engine.name(), "V2Ray");
        assert_eq!(engine.status(), ConnectionStatus::Disconnected);

        assert!(factory.create(CoreKind::WireGuard).is_none());
        assert!(factory.create_named("libxray").is_some());
        assert!(factory.create_named("hysteria").is_none());
    }

    #[test]
    fn test_debug_lists_supported_cores() {
        let factory = EngineFactory::new(NoWireGuard, NoDrivers);
        assert_eq!(
            format!("{:?}", factory),
            "EngineFactory { cores: [SingBox, LibXray, V2Ray] }"
        );
    }
}
