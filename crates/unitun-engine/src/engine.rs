//! Engine
//!
//! One orchestrator for every core variant. It binds a platform TUN
//! device, an optional SOCKS driver and a protocol core under a single
//! lifecycle; the [`VariantDescriptor`] decides whether the driver step
//! happens at all.
//!
//! # Lifecycle
//!
//! ```text
//!            initialize              start                      stop
//! (nothing) -----------> Disconnected -----> Connecting -> Connected ---> Disconnecting -> Disconnected
//!                        (resources held)         |                          ^
//!                                                 +--> Error ----------------+
//! ```
//!
//! Acquisition order is privileges, TUN, driver, core, then advisory
//! routes and per-app rules. Activation order is driver, then core.
//! Teardown is core, driver, TUN.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut engine = factory.create(CoreKind::LibXray).unwrap();
//! engine.initialize(config, platform)?;
//! engine.start()?;
//!
//! let monitor = engine.monitor(); // hand this to an observer thread
//!
//! engine.stop();
//! ```

use crate::capability::{Core, CoreProvider, Driver, DriverProvider, LivenessProbe};
use crate::config::{Callbacks, CoreConfig, DriverConfig, EngineConfig, EngineSettings};
use crate::error::{EngineError, Result};
use crate::kind::VariantDescriptor;
use crate::status::{ConnectionStats, ConnectionStatus, EngineMonitor, SharedState};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use unitun_platform::{Platform, TunHandle};

/// Version reported when no core is loaded
pub const UNKNOWN_VERSION: &str = "unknown";

/// Tunnel engine for one core variant
pub struct Engine {
    descriptor: VariantDescriptor,
    cores: Arc<dyn CoreProvider>,
    drivers: Arc<dyn DriverProvider>,
    /// Status and stats, readable from monitors
    shared: Arc<SharedState>,
    /// Observers from the last `initialize`
    callbacks: Callbacks,
    /// Settings from the last successful `initialize`
    settings: Option<EngineSettings>,

    // Held resources, all present or all absent between calls
    platform: Option<Arc<dyn Platform>>,
    tun: Option<TunHandle>,
    driver: Option<Box<dyn Driver>>,
    core: Option<Box<dyn Core>>,
}

impl Engine {
    /// Create an idle engine
    pub fn new(
        descriptor: VariantDescriptor,
        cores: Arc<dyn CoreProvider>,
        drivers: Arc<dyn DriverProvider>,
    ) -> Self {
        Self {
            descriptor,
            cores,
            drivers,
            shared: Arc::new(SharedState::default()),
            callbacks: Callbacks::default(),
            settings: None,
            platform: None,
            tun: None,
            driver: None,
            core: None,
        }
    }

    pub fn descriptor(&self) -> VariantDescriptor {
        self.descriptor
    }

    /// Engine name
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Core version, or [`UNKNOWN_VERSION`] when no core is loaded
    pub fn version(&self) -> String {
        self.core
            .as_ref()
            .map(|core| core.version())
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.read()
    }

    /// Last stats snapshot
    pub fn stats(&self) -> ConnectionStats {
        *self.shared.stats.read()
    }

    /// Read-only handle for observer threads
    pub fn monitor(&self) -> EngineMonitor {
        EngineMonitor::new(self.name(), self.shared.clone())
    }

    /// Settings in effect, if initialized
    pub fn settings(&self) -> Option<&EngineSettings> {
        self.settings.as_ref()
    }

    /// Whether any resource is held
    pub fn is_initialized(&self) -> bool {
        self.core.is_some() || self.driver.is_some() || self.tun.is_some()
    }

    /// Core active, driver active (if needed), device open
    pub fn is_running(&self) -> bool {
        let core_running = self.core.as_ref().is_some_and(|core| core.is_running());
        let driver_running = !self.descriptor.needs_driver
            || self.driver.as_ref().is_some_and(|driver| driver.is_running());
        let tun_open = self.tun.as_ref().is_some_and(TunHandle::is_valid);

        core_running && driver_running && tun_open
    }

    /// Acquire the TUN device, driver and core.
    ///
    /// On failure every resource acquired by this call is released again
    /// and the engine is left as if `initialize` had never been called.
    pub fn initialize(&mut self, config: EngineConfig, platform: Arc<dyn Platform>) -> Result<()> {
        if self.is_initialized() {
            return Err(EngineError::AlreadyInitialized);
        }
        if config.core() != self.descriptor.kind {
            return Err(EngineError::CoreMismatch {
                expected: self.descriptor.kind,
                actual: config.core(),
            });
        }
        config.settings.validate()?;

        let EngineConfig { settings, callbacks } = config;
        self.callbacks = callbacks;
        self.platform = Some(platform.clone());

        match self.acquire(&settings, platform.as_ref()) {
            Ok(()) => {
                self.emit(
                    Level::INFO,
                    &format!(
                        "Initialized on {} ({})",
                        platform.name(),
                        self.tun.as_ref().map(ToString::to_string).unwrap_or_default()
                    ),
                );
                self.settings = Some(settings);
                Ok(())
            }
            Err(e) => {
                self.emit(Level::ERROR, &format!("Initialization failed: {}", e));
                self.release_all();
                self.callbacks = Callbacks::default();
                Err(e)
            }
        }
    }

    fn acquire(&mut self, settings: &EngineSettings, platform: &dyn Platform) -> Result<()> {
        if !platform.check_privileges() {
            return Err(EngineError::PrivilegesRequired(platform.name().to_string()));
        }

        let tun = platform.open_tun(&settings.tun).map_err(EngineError::TunOpen)?;
        if !tun.is_valid() {
            return Err(EngineError::InvalidTunHandle(platform.name().to_string()));
        }
        debug!("{}: opened {}", self.name(), tun);
        let tun_fd = tun.fd();
        self.tun = Some(tun);

        match self.descriptor.resolve_driver(settings.driver) {
            Some(kind) => {
                let driver_config = DriverConfig::project(kind, &settings.tun, &settings.core_config);
                let mut driver = self
                    .drivers
                    .create_driver(kind)
                    .ok_or(EngineError::DriverUnavailable(kind))?;
                driver
                    .initialize(&driver_config)
                    .map_err(EngineError::DriverInit)?;
                self.driver = Some(driver);
                debug!("{}: driver {} ready", self.name(), kind);
            }
            None if !settings.driver.is_none() => {
                debug!(
                    "{}: reads the TUN device natively, ignoring driver {}",
                    self.name(),
                    settings.driver
                );
            }
            None => {}
        }

        let native_fd = (!self.descriptor.needs_driver).then_some(tun_fd);
        let core_config = CoreConfig::new(settings.core_config.clone(), native_fd);
        let mut core = self
            .cores
            .create_core(self.descriptor.kind)
            .ok_or(EngineError::CoreUnavailable(self.descriptor.kind))?;
        core.initialize(&core_config).map_err(EngineError::CoreInit)?;
        *self.shared.version.write() = Some(core.version());
        self.core = Some(core);

        if settings.tun.auto_route {
            match platform.setup_routes(&settings.tun) {
                Ok(()) => debug!("{}: routes installed", self.name()),
                Err(e) if settings.require_routes => return Err(EngineError::Routes(e)),
                Err(e) => self.emit(Level::WARN, &format!("Route setup failed, continuing: {}", e)),
            }
        }

        if let Some((packages, mode)) = settings.tun.per_app.selection() {
            if let Err(e) = platform.setup_per_app_proxy(packages, mode) {
                self.emit(
                    Level::WARN,
                    &format!("Per-app proxy ({}) not applied: {}", mode, e),
                );
            }
        }

        Ok(())
    }

    /// Start the driver (if any), then the core.
    pub fn start(&mut self) -> Result<()> {
        let driver_ready = !self.descriptor.needs_driver || self.driver.is_some();
        let tun_ready = self.tun.as_ref().is_some_and(TunHandle::is_valid);
        if self.core.is_none() || !driver_ready || !tun_ready {
            return Err(EngineError::NotInitialized);
        }
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }

        info!("{}: connecting", self.name());
        *self.shared.stats.write() = ConnectionStats::default();
        self.set_status(ConnectionStatus::Connecting);

        let driver_started = match self.driver.as_mut() {
            Some(driver) => driver.start(),
            None => Ok(()),
        };
        if let Err(e) = driver_started {
            let err = EngineError::DriverStart(e);
            self.emit(Level::ERROR, &err.to_string());
            self.set_status(ConnectionStatus::Error);
            return Err(err);
        }

        let core_started = match self.core.as_mut() {
            Some(core) => core.start(),
            None => Err(anyhow::anyhow!("core released during start")),
        };
        if let Err(e) = core_started {
            // The core routes through the driver's endpoint; without it the driver is useless
            if let Some(driver) = self.driver.as_mut() {
                driver.stop();
            }
            let err = EngineError::CoreStart(e);
            self.emit(Level::ERROR, &err.to_string());
            self.set_status(ConnectionStatus::Error);
            return Err(err);
        }

        self.set_status(ConnectionStatus::Connected);
        self.emit(Level::INFO, &format!("Connected ({})", self.version()));
        self.fire_stats(&self.stats());
        Ok(())
    }

    /// Tear everything down: core, driver, then the TUN device.
    ///
    /// A no-op when nothing is held; safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.is_initialized() {
            return;
        }

        if self.status().is_connected() {
            self.refresh_stats();
        }

        info!("{}: disconnecting", self.name());
        self.set_status(ConnectionStatus::Disconnecting);

        if let Some(platform) = self.release_all() {
            platform.clear_dns_cache();
        }
        self.settings = None;

        self.set_status(ConnectionStatus::Disconnected);
        self.emit(Level::INFO, "Disconnected");
    }

    /// Pull fresh counters from the core while connected.
    ///
    /// Counters in the snapshot never decrease; outside `Connected` the
    /// snapshot is frozen and returned unchanged.
    pub fn refresh_stats(&self) -> ConnectionStats {
        if !self.status().is_connected() {
            return self.stats();
        }
        let Some(core) = self.core.as_ref() else {
            return self.stats();
        };

        let reading = core.stats();
        let snapshot = {
            let mut stats = self.shared.stats.write();
            stats.advance(&reading);
            *stats
        };
        self.fire_stats(&snapshot);
        snapshot
    }

    /// Best-effort check that the tunnel passes traffic, bounded by the
    /// configured probe timeout. Never changes the lifecycle state.
    pub fn test_connection(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(probe) = self.core.as_ref().and_then(|core| core.liveness_probe()) else {
            debug!("{}: core offers no liveness probe", self.name());
            return false;
        };
        let timeout = self
            .settings
            .as_ref()
            .map(EngineSettings::probe_timeout)
            .unwrap_or(Duration::from_secs(5));

        run_probe(self.name(), probe, timeout)
    }

    /// Release core, driver and TUN in that order. Returns the platform
    /// the engine was bound to.
    fn release_all(&mut self) -> Option<Arc<dyn Platform>> {
        if let Some(mut core) = self.core.take() {
            core.stop();
        }
        *self.shared.version.write() = None;
        if let Some(mut driver) = self.driver.take() {
            driver.stop();
        }

        let platform = self.platform.take();
        if let Some(tun) = self.tun.take() {
            match platform.as_ref() {
                Some(platform) => {
                    platform.close_tun(&tun);
                    debug!("{}: closed {}", self.name(), tun);
                }
                None => error!("{}: no platform to close {}", self.name(), tun),
            }
        }
        platform
    }

    /// Update status, then tell the observer. The lock is released
    /// before the callback runs, so the callback may read the status.
    fn set_status(&self, status: ConnectionStatus) {
        *self.shared.status.write() = status;
        if let Some(callback) = &self.callbacks.status {
            callback(status);
        }
    }

    fn fire_stats(&self, stats: &ConnectionStats) {
        if let Some(callback) = &self.callbacks.stats {
            callback(stats);
        }
    }

    /// Log through tracing and the log callback
    fn emit(&self, level: Level, message: &str) {
        let name = self.name();
        match level {
            Level::ERROR => error!("{}: {}", name, message),
            Level::WARN => warn!("{}: {}", name, message),
            Level::INFO => info!("{}: {}", name, message),
            _ => debug!("{}: {}", name, message),
        }
        if let Some(callback) = &self.callbacks.log {
            callback(name, message);
        }
    }
}

fn run_probe(name: &str, probe: LivenessProbe, timeout: Duration) -> bool {
    let (tx, rx) = crossbeam_channel::bounded(1);

    let spawned = thread::Builder::new()
        .name("liveness-probe".to_string())
        .spawn(move || {
            let _ = tx.send(probe());
        });
    if let Err(e) = spawned {
        warn!("{}: could not spawn liveness probe: {}", name, e);
        return false;
    }

    match rx.recv_timeout(timeout) {
        Ok(alive) => alive,
        Err(RecvTimeoutError::Timeout) => {
            warn!("{}: liveness probe timed out after {:?}", name, timeout);
            false
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!("{}: liveness probe aborted", name);
            false
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // No device, driver or core may outlive the engine
        self.stop();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name())
            .field("status", &self.status())
            .field("tun", &self.tun)
            .field("driver", &self.driver.is_some())
            .field("core", &self.core.is_some())
            .finish()
    }
}
