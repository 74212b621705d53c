//! Core and Driver Kinds
//!
//! Which protocol core runs the tunnel, and which SOCKS driver (if any)
//! bridges the TUN device to it. Everything that differs between core
//! variants at the orchestration level is captured by a
//! [`VariantDescriptor`]: the lifecycle itself is the same for all.

use serde::{Deserialize, Serialize};

/// Protocol core variant
///
/// Serialized in lowercase; decoding accepts every name `FromStr` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum CoreKind {
    /// sing-box, reads the TUN device itself
    SingBox,
    /// Xray as a library, SOCKS inbound only
    LibXray,
    /// V2Ray, SOCKS inbound only
    V2Ray,
    /// WireGuard userspace core, SOCKS inbound only
    WireGuard,
}

impl CoreKind {
    /// Get all core kinds
    pub fn all() -> &'static [CoreKind] {
        &[
            CoreKind::SingBox,
            CoreKind::LibXray,
            CoreKind::V2Ray,
            CoreKind::WireGuard,
        ]
    }

    /// Orchestration properties of this variant
    pub fn descriptor(&self) -> VariantDescriptor {
        match self {
            CoreKind::SingBox => VariantDescriptor {
                kind: *self,
                name: "SingBox",
                needs_driver: false,
                default_driver: DriverKind::None,
            },
            CoreKind::LibXray => VariantDescriptor::socks_bridged(*self, "LibXray"),
            CoreKind::V2Ray => VariantDescriptor::socks_bridged(*self, "V2Ray"),
            CoreKind::WireGuard => VariantDescriptor::socks_bridged(*self, "WireGuard"),
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }
}

impl std::fmt::Display for CoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CoreKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "singbox" | "sing-box" | "sing_box" => Ok(CoreKind::SingBox),
            "libxray" | "xray" => Ok(CoreKind::LibXray),
            "v2ray" => Ok(CoreKind::V2Ray),
            "wireguard" | "wg" => Ok(CoreKind::WireGuard),
            _ => Err(KindError::UnknownCore(s.to_string())),
        }
    }
}

impl TryFrom<String> for CoreKind {
    type Error = KindError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// SOCKS driver variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum DriverKind {
    /// No driver
    #[default]
    None,
    /// hev-socks5-tunnel
    HevSocks5,
    /// tun2socks
    #[serde(rename = "tun2socks")]
    Tun2Socks,
}

impl DriverKind {
    /// Driver recommended for cores that need one
    pub const RECOMMENDED: DriverKind = DriverKind::HevSocks5;

    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::None => "none",
            DriverKind::HevSocks5 => "hev-socks5",
            DriverKind::Tun2Socks => "tun2socks",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DriverKind::None)
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for DriverKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(DriverKind::None),
            "hev-socks5" | "hev_socks5" | "hevsocks5" => Ok(DriverKind::HevSocks5),
            "tun2socks" => Ok(DriverKind::Tun2Socks),
            _ => Err(KindError::UnknownDriver(s.to_string())),
        }
    }
}

impl TryFrom<String> for DriverKind {
    type Error = KindError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// What the orchestrator needs to know about a core variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub kind: CoreKind,
    /// Engine name reported to callers
    pub name: &'static str,
    /// Core lacks native TUN I/O and needs a SOCKS driver in front
    pub needs_driver: bool,
    /// Driver used when the configuration does not pick one
    pub default_driver: DriverKind,
}

impl VariantDescriptor {
    fn socks_bridged(kind: CoreKind, name: &'static str) -> Self {
        Self {
            kind,
            name,
            needs_driver: true,
            default_driver: DriverKind::RECOMMENDED,
        }
    }

    /// Driver to instantiate for a requested kind, or `None` when this
    /// variant runs without one
    pub fn resolve_driver(&self, requested: DriverKind) -> Option<DriverKind> {
        if !self.needs_driver {
            None
        } else if requested.is_none() {
            Some(self.default_driver)
        } else {
            Some(requested)
        }
    }
}

/// Kind parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KindError {
    #[error("Unknown core: {0}")]
    UnknownCore(String),

    #[error("Unknown driver: {0}")]
    UnknownDriver(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_singbox_is_native() {
        let native: Vec<_> = CoreKind::all()
            .iter()
            .filter(|kind| !kind.descriptor().needs_driver)
            .collect();

        assert_eq!(native, [&CoreKind::SingBox]);
    }

    #[test]
    fn test_names() {
        assert_eq!(CoreKind::SingBox.to_string(), "SingBox");
        assert_eq!(CoreKind::LibXray.name(), "LibXray");
        assert_eq!(DriverKind::HevSocks5.to_string(), "hev-socks5");
    }

    #[test]
    fn test_parse_core() {
        assert_eq!("sing-box".parse::<CoreKind>().unwrap(), CoreKind::SingBox);
        assert_eq!("XRAY".parse::<CoreKind>().unwrap(), CoreKind::LibXray);
        assert_eq!("wg".parse::<CoreKind>().unwrap(), CoreKind::WireGuard);
        assert_eq!(
            "hysteria".parse::<CoreKind>(),
            Err(KindError::UnknownCore("hysteria".into()))
        );
    }

    #[test]
    fn test_parse_driver() {
        assert_eq!("hev_socks5".parse::<DriverKind>().unwrap(), DriverKind::HevSocks5);
        assert_eq!("tun2socks".parse::<DriverKind>().unwrap(), DriverKind::Tun2Socks);
        assert_eq!("none".parse::<DriverKind>().unwrap(), DriverKind::None);
        assert!("badvpn".parse::<DriverKind>().is_err());
    }

    #[test]
    fn test_resolve_driver() {
        let native = CoreKind::SingBox.descriptor();
        assert_eq!(native.resolve_driver(DriverKind::Tun2Socks), None);

        let bridged = CoreKind::V2Ray.descriptor();
        assert_eq!(bridged.resolve_driver(DriverKind::None), Some(DriverKind::HevSocks5));
        assert_eq!(bridged.resolve_driver(DriverKind::Tun2Socks), Some(DriverKind::Tun2Socks));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&CoreKind::WireGuard).unwrap(), "\"wireguard\"");
        assert_eq!(serde_json::to_string(&DriverKind::HevSocks5).unwrap(), "\"hev-socks5\"");
        assert_eq!(serde_json::to_string(&DriverKind::Tun2Socks).unwrap(), "\"tun2socks\"");
    }

    #[test]
    fn test_deserialize_accepts_aliases() {
        let core: CoreKind = serde_json::from_str("\"SingBox\"").unwrap();
        assert_eq!(core, CoreKind::SingBox);
        let core: CoreKind = serde_json::from_str("\"wg\"").unwrap();
        assert_eq!(core, CoreKind::WireGuard);
        let driver: DriverKind = serde_json::from_str("\"hev_socks5\"").unwrap();
        assert_eq!(driver, DriverKind::HevSocks5);

        let err = serde_json::from_str::<CoreKind>("\"hysteria\"").unwrap_err();
        assert!(err.to_string().contains("Unknown core: hysteria"));
    }
}
