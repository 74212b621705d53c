//! In-memory Platform
//!
//! A fake platform for development and tests. It hands out increasing
//! fake descriptors, tracks which are open, and counts every call so a
//! test can assert exactly what the engine did to the host.
//!
//! # Usage
//!
//! ```rust,ignore
//! let platform = Arc::new(MemoryPlatform::new().failing_routes());
//!
//! // ... run an engine against it ...
//!
//! assert_eq!(platform.open_handles(), 0);
//! assert_eq!(platform.double_closes(), 0);
//! ```

use crate::error::{PlatformError, Result};
use crate::handle::{NetworkInterface, RawTunFd, TunHandle};
use crate::options::{PerAppMode, TunOptions};
use crate::Platform;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use tracing::{debug, warn};

const PLATFORM_NAME: &str = "memory";

/// Descriptors start here so they look like real ones
const FIRST_FD: RawTunFd = 10;

/// An open fake device
#[derive(Debug, Clone)]
struct OpenDevice {
    name: String,
    mtu: u16,
    address: Option<IpAddr>,
}

/// Recorded per-app proxy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerAppCall {
    pub packages: Vec<String>,
    pub mode: PerAppMode,
}

/// In-memory fake platform
pub struct MemoryPlatform {
    /// Scripted behaviour
    privileged: AtomicBool,
    fail_open: AtomicBool,
    fail_routes: AtomicBool,
    /// Next descriptor to hand out
    next_fd: AtomicI32,
    /// Open devices by descriptor
    devices: Mutex<HashMap<RawTunFd, OpenDevice>>,
    /// Per-app requests, in order
    per_app_calls: Mutex<Vec<PerAppCall>>,
    /// Options passed to the last open
    last_options: Mutex<Option<TunOptions>>,
    /// Counters
    opened: AtomicU64,
    closed: AtomicU64,
    double_closes: AtomicU64,
    route_calls: AtomicU64,
    dns_flushes: AtomicU64,
}

impl MemoryPlatform {
    /// Create a privileged platform where everything succeeds
    pub fn new() -> Self {
        Self {
            privileged: AtomicBool::new(true),
            fail_open: AtomicBool::new(false),
            fail_routes: AtomicBool::new(false),
            next_fd: AtomicI32::new(FIRST_FD),
            devices: Mutex::new(HashMap::new()),
            per_app_calls: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            double_closes: AtomicU64::new(0),
            route_calls: AtomicU64::new(0),
            dns_flushes: AtomicU64::new(0),
        }
    }

    /// Report missing privileges
    pub fn without_privileges(self) -> Self {
        self.set_privileged(false);
        self
    }

    /// Fail every device open
    pub fn failing_open(self) -> Self {
        self.set_fail_open(true);
        self
    }

    /// Fail every route setup
    pub fn failing_routes(self) -> Self {
        self.set_fail_routes(true);
        self
    }

    pub fn set_privileged(&self, privileged: bool) {
        self.privileged.store(privileged, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_routes(&self, fail: bool) {
        self.fail_routes.store(fail, Ordering::SeqCst);
    }

    /// Number of devices currently open
    pub fn open_handles(&self) -> usize {
        self.devices.lock().len()
    }

    /// Number of successful opens
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of valid handles closed
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::SeqCst)
    }

    /// Closes of a descriptor that was not open
    pub fn double_closes(&self) -> u64 {
        self.double_closes.load(Ordering::SeqCst)
    }

    pub fn route_calls(&self) -> u64 {
        self.route_calls.load(Ordering::SeqCst)
    }

    pub fn dns_flushes(&self) -> u64 {
        self.dns_flushes.load(Ordering::SeqCst)
    }

    pub fn per_app_calls(&self) -> Vec<PerAppCall> {
        self.per_app_calls.lock().clone()
    }

    /// Options passed to the most recent open attempt
    pub fn last_options(&self) -> Option<TunOptions> {
        self.last_options.lock().clone()
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MemoryPlatform {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    fn check_privileges(&self) -> bool {
        self.privileged.load(Ordering::SeqCst)
    }

    fn open_tun(&self, options: &TunOptions) -> Result<TunHandle> {
        *self.last_options.lock() = Some(options.clone());

        if !self.privileged.load(Ordering::SeqCst) {
            return Err(PlatformError::PermissionDenied(format!(
                "opening {} needs network admin rights",
                options.name
            )));
        }
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PlatformError::DeviceOpen(format!(
                "{} is scripted to fail",
                options.name
            )));
        }

        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
        self.devices.lock().insert(
            fd,
            OpenDevice {
                name: options.name.clone(),
                mtu: options.mtu,
                address: options.ipv4_address.map(IpAddr::V4),
            },
        );
        self.opened.fetch_add(1, Ordering::SeqCst);

        debug!("memory: opened {} as fd {}", options.name, fd);
        Ok(TunHandle::new(fd, PLATFORM_NAME))
    }

    fn close_tun(&self, handle: &TunHandle) {
        if !handle.is_valid() {
            return;
        }

        match self.devices.lock().remove(&handle.fd()) {
            Some(device) => {
                self.closed.fetch_add(1, Ordering::SeqCst);
                debug!("memory: closed {} (fd {})", device.name, handle.fd());
            }
            None => {
                self.double_closes.fetch_add(1, Ordering::SeqCst);
                warn!("memory: fd {} closed but not open", handle.fd());
            }
        }
    }

    fn setup_routes(&self, options: &TunOptions) -> Result<()> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_routes.load(Ordering::SeqCst) {
            return Err(PlatformError::Route(format!(
                "no route through {}",
                options.name
            )));
        }
        Ok(())
    }

    fn setup_per_app_proxy(&self, packages: &[String], mode: PerAppMode) -> Result<()> {
        self.per_app_calls.lock().push(PerAppCall {
            packages: packages.to_vec(),
            mode,
        });
        Ok(())
    }

    fn clear_dns_cache(&self) {
        self.dns_flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        let loopback = NetworkInterface {
            name: "lo".to_string(),
            address: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            index: 1,
            mtu: 65535,
            is_up: true,
        };

        let devices = self.devices.lock();
        let mut fds: Vec<_> = devices.keys().copied().collect();
        fds.sort_unstable();

        std::iter::once(loopback)
            .chain(fds.into_iter().filter_map(|fd| {
                devices.get(&fd).map(|device| NetworkInterface {
                    name: device.name.clone(),
                    address: device.address,
                    index: fd as u32,
                    mtu: device.mtu,
                    is_up: true,
                })
            }))
            .collect()
    }
}
