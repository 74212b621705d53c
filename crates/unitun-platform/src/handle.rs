//! TUN handles and interface descriptors

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Raw platform identifier of an open device (a file descriptor on unix).
pub type RawTunFd = i32;

const INVALID_FD: RawTunFd = -1;

/// An open virtual network device.
///
/// Owned by whoever opened it until it is handed back to
/// [`Platform::close_tun`](crate::Platform::close_tun). The handle is
/// deliberately not `Clone`: two owners would mean two closes.
#[derive(Debug, PartialEq, Eq)]
pub struct TunHandle {
    fd: RawTunFd,
    platform: String,
}

impl TunHandle {
    /// Wrap a raw identifier produced by `platform`
    pub fn new(fd: RawTunFd, platform: impl Into<String>) -> Self {
        Self {
            fd,
            platform: platform.into(),
        }
    }

    /// A handle that refers to nothing
    pub fn invalid(platform: impl Into<String>) -> Self {
        Self::new(INVALID_FD, platform)
    }

    /// Valid iff the identifier is non-negative
    pub fn is_valid(&self) -> bool {
        self.fd >= 0
    }

    pub fn fd(&self) -> RawTunFd {
        self.fd
    }

    /// Name of the platform that opened the device
    pub fn platform(&self) -> &str {
        &self.platform
    }
}

impl std::fmt::Display for TunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}:fd{}", self.platform, self.fd)
        } else {
            write!(f, "{}:invalid", self.platform)
        }
    }
}

/// Network interface as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub address: Option<IpAddr>,
    pub index: u32,
    pub mtu: u16,
    pub is_up: bool,
}
