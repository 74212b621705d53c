//! TUN Device Options
//!
//! Describes the virtual network device the platform is asked to open:
//! MTU, interface name, addressing, DNS, routing flags and the per-app
//! proxy lists (honoured only where the platform supports them).

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Smallest MTU an IPv4 host is required to accept.
pub const MIN_MTU: u16 = 576;

/// Per-app proxy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerAppMode {
    /// Only the listed applications use the tunnel
    Include,
    /// Every application except the listed ones uses the tunnel
    Exclude,
}

impl PerAppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerAppMode::Include => "include",
            PerAppMode::Exclude => "exclude",
        }
    }
}

impl std::fmt::Display for PerAppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PerAppMode {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "include" => Ok(PerAppMode::Include),
            "exclude" => Ok(PerAppMode::Exclude),
            _ => Err(OptionsError::InvalidPerAppMode(s.to_string())),
        }
    }
}

/// Per-app proxy lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerAppProxy {
    /// Apply the lists at all?
    pub enabled: bool,
    /// Package names routed through the tunnel
    pub include: Vec<String>,
    /// Package names kept off the tunnel
    pub exclude: Vec<String>,
}

impl PerAppProxy {
    /// The list to hand to the platform, if any.
    ///
    /// The include list wins when both are set; `validate` rejects that
    /// combination before it gets here.
    pub fn selection(&self) -> Option<(&[String], PerAppMode)> {
        if !self.enabled {
            return None;
        }
        if !self.include.is_empty() {
            Some((&self.include, PerAppMode::Include))
        } else if !self.exclude.is_empty() {
            Some((&self.exclude, PerAppMode::Exclude))
        } else {
            None
        }
    }
}

/// Options for opening a TUN device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunOptions {
    /// Device MTU
    pub mtu: u16,
    /// Interface name
    pub name: String,

    /// IPv4 address of the device
    pub ipv4_address: Option<Ipv4Addr>,
    /// IPv4 netmask
    pub ipv4_netmask: Option<Ipv4Addr>,
    /// IPv4 gateway
    pub ipv4_gateway: Option<Ipv4Addr>,

    /// IPv6 address of the device
    pub ipv6_address: Option<Ipv6Addr>,
    /// IPv6 prefix length
    pub ipv6_prefix: u8,

    /// DNS servers, in order of preference
    pub dns_servers: Vec<IpAddr>,

    /// Install routes through the device after opening it
    pub auto_route: bool,
    /// Refuse traffic that would bypass the device
    pub strict_route: bool,
    /// Route IPv6 through the device
    pub enable_ipv6: bool,

    /// Per-app proxy (platform dependent)
    pub per_app: PerAppProxy,
}

impl Default for TunOptions {
    fn default() -> Self {
        Self {
            mtu: 1500,
            name: "tun0".to_string(),
            ipv4_address: None,
            ipv4_netmask: None,
            ipv4_gateway: None,
            ipv6_address: None,
            ipv6_prefix: 64,
            dns_servers: Vec::new(),
            auto_route: true,
            strict_route: false,
            enable_ipv6: false,
            per_app: PerAppProxy::default(),
        }
    }
}

impl TunOptions {
    /// Create options for the named device with default settings
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First configured DNS server
    pub fn primary_dns(&self) -> Option<IpAddr> {
        self.dns_servers.first().copied()
    }

    /// Validate options before handing them to a platform
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.mtu < MIN_MTU {
            return Err(OptionsError::MtuTooSmall(self.mtu));
        }
        if self.name.trim().is_empty() {
            return Err(OptionsError::EmptyName);
        }
        if self.ipv6_prefix > 128 {
            return Err(OptionsError::InvalidIpv6Prefix(self.ipv6_prefix));
        }
        if self.enable_ipv6 && self.ipv6_address.is_none() {
            return Err(OptionsError::MissingIpv6Address);
        }
        if self.per_app.enabled
            && !self.per_app.include.is_empty()
            && !self.per_app.exclude.is_empty()
        {
            return Err(OptionsError::ConflictingPerAppLists);
        }
        Ok(())
    }
}

/// TUN option errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("MTU {0} is below the minimum of {MIN_MTU}")]
    MtuTooSmall(u16),

    #[error("Device name is empty")]
    EmptyName,

    #[error("IPv6 prefix /{0} is out of range")]
    InvalidIpv6Prefix(u8),

    #[error("IPv6 enabled without an IPv6 address")]
    MissingIpv6Address,

    #[error("Per-app proxy cannot include and exclude at the same time")]
    ConflictingPerAppLists,

    #[error("Unknown per-app mode: {0}")]
    InvalidPerAppMode(String),
}
