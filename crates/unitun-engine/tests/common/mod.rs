//! Fakes shared by the engine integration tests.
//!
//! Every fake writes to one journal so tests can assert the exact order in
//! which the engine touched the TUN device, the driver and the core.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use unitun_engine::platform::{
    MemoryPlatform, NetworkInterface, PerAppMode, Platform, PlatformError, TunHandle, TunOptions,
};
use unitun_engine::{
    ConnectionStats, Core, CoreConfig, CoreKind, Driver, DriverConfig, DriverKind, Engine,
    EngineFactory,
};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .try_init();
}

/// What a fake core or driver should do when called
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Provider returns `None`
    pub missing: bool,
    pub fail_init: bool,
    pub fail_start: bool,
}

pub struct FakeCore {
    journal: Journal,
    script: Script,
    running: bool,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl Core for FakeCore {
    fn initialize(&mut self, _config: &CoreConfig) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push("core:init".into());
        if self.script.fail_init {
            anyhow::bail!("core rejected its configuration");
        }
        Ok(())
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push("core:start".into());
        if self.script.fail_start {
            anyhow::bail!("core could not bind its inbound");
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.lock().unwrap().push("core:stop".into());
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn version(&self) -> String {
        "fake-core 2.0.1".to_string()
    }

    fn stats(&self) -> ConnectionStats {
        *self.stats.lock().unwrap()
    }
}

pub struct FakeDriver {
    journal: Journal,
    script: Script,
    running: bool,
}

impl Driver for FakeDriver {
    fn initialize(&mut self, _config: &DriverConfig) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push("driver:init".into());
        if self.script.fail_init {
            anyhow::bail!("driver rejected its configuration");
        }
        Ok(())
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push("driver:start".into());
        if self.script.fail_start {
            anyhow::bail!("driver could not attach to the device");
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.lock().unwrap().push("driver:stop".into());
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Memory platform that also journals opens and closes
pub struct JournalPlatform {
    pub inner: Arc<MemoryPlatform>,
    journal: Journal,
    /// Hand out invalid handles instead of failing
    pub invalid_handles: AtomicBool,
}

impl Platform for JournalPlatform {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn check_privileges(&self) -> bool {
        self.inner.check_privileges()
    }

    fn open_tun(&self, options: &TunOptions) -> Result<TunHandle, PlatformError> {
        if self.invalid_handles.load(Ordering::SeqCst) {
            return Ok(TunHandle::invalid(self.name()));
        }
        let handle = self.inner.open_tun(options)?;
        self.journal.lock().unwrap().push("tun:open".into());
        Ok(handle)
    }

    fn close_tun(&self, handle: &TunHandle) {
        if handle.is_valid() {
            self.journal.lock().unwrap().push("tun:close".into());
        }
        self.inner.close_tun(handle);
    }

    fn setup_routes(&self, options: &TunOptions) -> Result<(), PlatformError> {
        self.inner.setup_routes(options)
    }

    fn setup_per_app_proxy(
        &self,
        packages: &[String],
        mode: PerAppMode,
    ) -> Result<(), PlatformError> {
        self.inner.setup_per_app_proxy(packages, mode)
    }

    fn clear_dns_cache(&self) {
        self.inner.clear_dns_cache();
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        self.inner.network_interfaces()
    }
}

/// Fakes plus the spies needed to inspect them
pub struct Harness {
    pub journal: Journal,
    pub core_script: Arc<Mutex<Script>>,
    pub driver_script: Arc<Mutex<Script>>,
    pub core_stats: Arc<Mutex<ConnectionStats>>,
    pub core_configs: Arc<Mutex<Vec<CoreConfig>>>,
    pub driver_configs: Arc<Mutex<Vec<DriverConfig>>>,
    pub driver_requests: Arc<Mutex<Vec<DriverKind>>>,
    pub driver_factory_calls: Arc<AtomicUsize>,
    pub memory: Arc<MemoryPlatform>,
    pub platform: Arc<JournalPlatform>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();

        let journal: Journal = Arc::default();
        let memory = Arc::new(MemoryPlatform::new());
        let platform = Arc::new(JournalPlatform {
            inner: memory.clone(),
            journal: journal.clone(),
            invalid_handles: AtomicBool::new(false),
        });

        Self {
            journal,
            core_script: Arc::default(),
            driver_script: Arc::default(),
            core_stats: Arc::default(),
            core_configs: Arc::default(),
            driver_configs: Arc::default(),
            driver_requests: Arc::default(),
            driver_factory_calls: Arc::default(),
            memory,
            platform,
        }
    }

    pub fn factory(&self) -> EngineFactory {
        let journal = self.journal.clone();
        let script = self.core_script.clone();
        let stats = self.core_stats.clone();
        let configs = self.core_configs.clone();
        let cores = move |_kind: CoreKind| -> Option<Box<dyn Core>> {
            let script = script.lock().unwrap().clone();
            if script.missing {
                return None;
            }
            Some(Box::new(RecordingCore {
                configs: configs.clone(),
                inner: FakeCore {
                    journal: journal.clone(),
                    script,
                    running: false,
                    stats: stats.clone(),
                },
            }))
        };

        let journal = self.journal.clone();
        let script = self.driver_script.clone();
        let calls = self.driver_factory_calls.clone();
        let requests = self.driver_requests.clone();
        let configs = self.driver_configs.clone();
        let drivers = move |kind: DriverKind| -> Option<Box<dyn Driver>> {
            calls.fetch_add(1, Ordering::SeqCst);
            requests.lock().unwrap().push(kind);
            let script = script.lock().unwrap().clone();
            if script.missing {
                return None;
            }
            Some(Box::new(RecordingDriver {
                configs: configs.clone(),
                inner: FakeDriver {
                    journal: journal.clone(),
                    script,
                    running: false,
                },
            }))
        };

        EngineFactory::new(cores, drivers)
    }

    pub fn engine(&self, kind: CoreKind) -> Engine {
        self.factory()
            .create(kind)
            .expect("every core kind is available in the harness")
    }

    pub fn platform(&self) -> Arc<dyn Platform> {
        self.platform.clone()
    }

    pub fn entries(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.lock().unwrap().clear();
    }

    pub fn script_core(&self, script: Script) {
        *self.core_script.lock().unwrap() = script;
    }

    pub fn script_driver(&self, script: Script) {
        *self.driver_script.lock().unwrap() = script;
    }
}

/// Captures the config a core was initialized with
struct RecordingCore {
    configs: Arc<Mutex<Vec<CoreConfig>>>,
    inner: FakeCore,
}

impl Core for RecordingCore {
    fn initialize(&mut self, config: &CoreConfig) -> anyhow::Result<()> {
        self.configs.lock().unwrap().push(config.clone());
        self.inner.initialize(config)
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.inner.start()
    }

    fn stop(&mut self) {
        self.inner.stop()
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    fn version(&self) -> String {
        self.inner.version()
    }

    fn stats(&self) -> ConnectionStats {
        self.inner.stats()
    }
}

/// Captures the config a driver was initialized with
struct RecordingDriver {
    configs: Arc<Mutex<Vec<DriverConfig>>>,
    inner: FakeDriver,
}

impl Driver for RecordingDriver {
    fn initialize(&mut self, config: &DriverConfig) -> anyhow::Result<()> {
        self.configs.lock().unwrap().push(config.clone());
        self.inner.initialize(config)
    }

    fn start(&mut self) -> anyhow::Result<()> {
        self.inner.start()
    }

    fn stop(&mut self) {
        self.inner.stop()
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}
