//! Engine Configuration
//!
//! [`EngineSettings`] is the declarative part (core, opaque core payload,
//! TUN options, driver, policies) and can be decoded from TOML or JSON.
//! [`EngineConfig`] adds the caller's observer callbacks on top.
//!
//! The engine projects these into the per-collaborator configs,
//! [`CoreConfig`] and [`DriverConfig`].

use crate::kind::{CoreKind, DriverKind};
use crate::status::{ConnectionStats, ConnectionStatus};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use unitun_platform::{OptionsError, RawTunFd, TunOptions};

/// `log(tag, message)`
pub type LogCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// `status(new_status)`
pub type StatusCallback = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;
/// `stats(snapshot)`
pub type StatsCallback = Arc<dyn Fn(&ConnectionStats) + Send + Sync>;

fn default_probe_timeout_ms() -> u64 {
    5_000
}

/// Declarative engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Core variant
    pub core: CoreKind,
    /// Core configuration, passed through untouched
    #[serde(default)]
    pub core_config: String,
    /// TUN device options
    #[serde(default)]
    pub tun: TunOptions,
    /// Requested driver (only used by cores that need one)
    #[serde(default)]
    pub driver: DriverKind,
    /// Upper bound for a connection test (milliseconds)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Treat route setup failure as fatal instead of advisory
    #[serde(default)]
    pub require_routes: bool,
}

impl EngineSettings {
    /// Settings for a core with default everything else
    pub fn new(core: CoreKind) -> Self {
        Self {
            core,
            core_config: String::new(),
            tun: TunOptions::default(),
            driver: DriverKind::None,
            probe_timeout_ms: default_probe_timeout_ms(),
            require_routes: false,
        }
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tun.validate()?;
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }
        Ok(())
    }
}

/// Observer callbacks, invoked synchronously on the thread running the
/// lifecycle method
#[derive(Clone, Default)]
pub struct Callbacks {
    pub log: Option<LogCallback>,
    pub status: Option<StatusCallback>,
    pub stats: Option<StatsCallback>,
}

impl Callbacks {
    pub fn on_log(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.log = Some(Arc::new(f));
        self
    }

    pub fn on_status(mut self, f: impl Fn(ConnectionStatus) + Send + Sync + 'static) -> Self {
        self.status = Some(Arc::new(f));
        self
    }

    pub fn on_stats(mut self, f: impl Fn(&ConnectionStats) + Send + Sync + 'static) -> Self {
        self.stats = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("log", &self.log.is_some())
            .field("status", &self.status.is_some())
            .field("stats", &self.stats.is_some())
            .finish()
    }
}

/// Complete engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub settings: EngineSettings,
    pub callbacks: Callbacks,
}

impl EngineConfig {
    /// Configuration for a core with default settings and no callbacks
    pub fn new(core: CoreKind) -> Self {
        Self::from_settings(EngineSettings::new(core))
    }

    pub fn from_settings(settings: EngineSettings) -> Self {
        Self {
            settings,
            callbacks: Callbacks::default(),
        }
    }

    pub fn with_core_config(mut self, payload: impl Into<String>) -> Self {
        self.settings.core_config = payload.into();
        self
    }

    pub fn with_tun(mut self, tun: TunOptions) -> Self {
        self.settings.tun = tun;
        self
    }

    pub fn with_driver(mut self, driver: DriverKind) -> Self {
        self.settings.driver = driver;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn core(&self) -> CoreKind {
        self.settings.core
    }

    pub fn tun(&self) -> &TunOptions {
        &self.settings.tun
    }
}

/// Configuration handed to a core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Opaque core payload
    pub payload: String,
    pub enable_logging: bool,
    /// Raw TUN descriptor, for cores that read the device themselves
    pub tun_fd: Option<RawTunFd>,
}

impl CoreConfig {
    pub fn new(payload: impl Into<String>, tun_fd: Option<RawTunFd>) -> Self {
        Self {
            payload: payload.into(),
            enable_logging: true,
            tun_fd,
        }
    }
}

/// Configuration handed to a SOCKS driver, projected from the TUN options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub kind: DriverKind,
    /// Opaque core payload (drivers read the SOCKS inbound from it)
    pub payload: String,
    pub mtu: u16,
    pub tun_name: String,
    pub tun_address: Option<Ipv4Addr>,
    pub tun_gateway: Option<Ipv4Addr>,
    pub tun_netmask: Option<Ipv4Addr>,
    pub dns_server: Option<IpAddr>,
}

impl DriverConfig {
    pub fn project(kind: DriverKind, tun: &TunOptions, payload: &str) -> Self {
        Self {
            kind,
            payload: payload.to_string(),
            mtu: tun.mtu,
            tun_name: tun.name.clone(),
            tun_address: tun.ipv4_address,
            tun_gateway: tun.ipv4_gateway,
            tun_netmask: tun.ipv4_netmask,
            dns_server: tun.primary_dns(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TUN options: {0}")]
    Tun(#[from] OptionsError),

    #[error("Probe timeout must be non-zero")]
    ZeroProbeTimeout,

    #[error("Parse error: {0}")]
    Parse(String),
}
