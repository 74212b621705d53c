//! Unitun Engine - Tunnel Lifecycle Orchestration
//!
//! Brings a TUN-backed tunnel up and down from three replaceable parts:
//! a protocol core, an optional SOCKS driver, and a platform-owned TUN
//! device. Which core runs is configuration; how it is brought up is the
//! same for all of them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │                                                              │
//! │  ┌────────────┐   ┌─────────────────┐   ┌─────────────────┐  │
//! │  │  Platform  │──▶│  SOCKS Driver   │──▶│   Protocol Core │  │
//! │  │ (TUN, fd)  │   │ (hev-socks5,    │   │ (LibXray, V2Ray,│  │
//! │  │            │   │  tun2socks)     │   │  WireGuard)     │  │
//! │  └─────┬──────┘   └─────────────────┘   └─────────────────┘  │
//! │        │                                                     │
//! │        └──────────── fd ───────────────▶ SingBox (native)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - **No leaks**: a failed `initialize` releases everything it acquired
//! - **Ordered**: driver starts before core; teardown is the exact reverse
//!   of acquisition
//! - **Uniform**: status, stats and callbacks behave the same for every core

mod capability;
mod config;
mod engine;
mod error;
mod factory;
mod kind;
mod status;

pub use capability::{Core, CoreProvider, Driver, DriverProvider, LivenessProbe, NoDrivers};
pub use config::{
    Callbacks, ConfigError, CoreConfig, DriverConfig, EngineConfig, EngineSettings, LogCallback,
    StatsCallback, StatusCallback,
};
pub use engine::{Engine, UNKNOWN_VERSION};
pub use error::{EngineError, ErrorClass, Result};
pub use factory::EngineFactory;
pub use kind::{CoreKind, DriverKind, KindError, VariantDescriptor};
pub use status::{ConnectionStats, ConnectionStatus, EngineMonitor};

pub use unitun_platform as platform;
