//! Engine errors

use crate::config::ConfigError;
use crate::kind::{CoreKind, DriverKind};
use unitun_platform::PlatformError;

/// Result type alias for engine lifecycle operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which kind of failure an error represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Called in the wrong state or with unusable input; nothing changed
    Precondition,
    /// A resource could not be acquired; everything acquired earlier in
    /// the same call was released
    Acquisition,
    /// Driver or core failed to start; status is `Error` and anything
    /// started earlier in the same call was stopped
    Activation,
}

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration is for {actual}, engine runs {expected}")]
    CoreMismatch { expected: CoreKind, actual: CoreKind },

    #[error("Engine already initialized")]
    AlreadyInitialized,

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Engine already running")]
    AlreadyRunning,

    #[error("Insufficient privileges on {0}")]
    PrivilegesRequired(String),

    #[error("TUN open failed: {0}")]
    TunOpen(#[source] PlatformError),

    #[error("Platform {0} returned an invalid TUN handle")]
    InvalidTunHandle(String),

    #[error("Route setup failed: {0}")]
    Routes(#[source] PlatformError),

    #[error("Driver {0} is not available")]
    DriverUnavailable(DriverKind),

    #[error("Driver initialization failed: {0:#}")]
    DriverInit(anyhow::Error),

    #[error("Core {0} is not available")]
    CoreUnavailable(CoreKind),

    #[error("Core initialization failed: {0:#}")]
    CoreInit(anyhow::Error),

    #[error("Driver failed to start: {0:#}")]
    DriverStart(anyhow::Error),

    #[error("Core failed to start: {0:#}")]
    CoreStart(anyhow::Error),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Config(_)
            | EngineError::CoreMismatch { .. }
            | EngineError::AlreadyInitialized
            | EngineError::NotInitialized
            | EngineError::AlreadyRunning => ErrorClass::Precondition,

            EngineError::PrivilegesRequired(_)
            | EngineError::TunOpen(_)
            | EngineError::InvalidTunHandle(_)
            | EngineError::Routes(_)
            | EngineError::DriverUnavailable(_)
            | EngineError::DriverInit(_)
            | EngineError::CoreUnavailable(_)
            | EngineError::CoreInit(_) => ErrorClass::Acquisition,

            EngineError::DriverStart(_) | EngineError::CoreStart(_) => ErrorClass::Activation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(EngineError::NotInitialized.class(), ErrorClass::Precondition);
        assert_eq!(
            EngineError::PrivilegesRequired("memory".into()).class(),
            ErrorClass::Acquisition
        );
        assert_eq!(
            EngineError::CoreStart(anyhow::anyhow!("bind failed")).class(),
            ErrorClass::Activation
        );
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::CoreMismatch {
            expected: CoreKind::SingBox,
            actual: CoreKind::V2Ray,
        };
        assert_eq!(err.to_string(), "Configuration is for V2Ray, engine runs SingBox");

        let err = EngineError::DriverInit(
            anyhow::anyhow!("socket busy").context("binding 127.0.0.1:1080"),
        );
        assert_eq!(
            err.to_string(),
            "Driver initialization failed: binding 127.0.0.1:1080: socket busy"
        );
    }
}
