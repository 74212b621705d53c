//! Connection status and statistics

use crate::engine::UNKNOWN_VERSION;
use parking_lot::RwLock;
use std::sync::Arc;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Not connected (resources may be held after initialize)
    #[default]
    Disconnected,
    /// Driver and core are being started
    Connecting,
    /// Tunnel is up
    Connected,
    /// Tearing down
    Disconnecting,
    /// Activation failed
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Between two stable states
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting | ConnectionStatus::Disconnecting
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionStatus::Error)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnecting => "Disconnecting...",
            ConnectionStatus::Error => "Error",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Connection statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Bytes sent through the tunnel
    pub bytes_sent: u64,
    /// Bytes received through the tunnel
    pub bytes_received: u64,
    /// Packets sent
    pub packets_sent: u64,
    /// Packets received
    pub packets_received: u64,
    /// Latest latency measurement (milliseconds)
    pub latency_ms: u32,
}

impl ConnectionStats {
    /// Merge a fresh reading into this snapshot without letting any
    /// counter go backwards. Latency is a gauge and is taken as is.
    pub fn advance(&mut self, reading: &ConnectionStats) {
        self.bytes_sent = self.bytes_sent.max(reading.bytes_sent);
        self.bytes_received = self.bytes_received.max(reading.bytes_received);
        self.packets_sent = self.packets_sent.max(reading.packets_sent);
        self.packets_received = self.packets_received.max(reading.packets_received);
        self.latency_ms = reading.latency_ms;
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_sent.saturating_add(self.bytes_received)
    }

    /// Format as human-readable string
    pub fn format(&self) -> String {
        format!(
            "TX: {:.2}MB ({} pkts), RX: {:.2}MB ({} pkts), latency: {}ms",
            self.bytes_sent as f64 / (1024.0 * 1024.0),
            self.packets_sent,
            self.bytes_received as f64 / (1024.0 * 1024.0),
            self.packets_received,
            self.latency_ms
        )
    }
}

/// Status and stats shared between an engine and its monitors
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) status: RwLock<ConnectionStatus>,
    pub(crate) stats: RwLock<ConnectionStats>,
    /// Version of the loaded core, if any
    pub(crate) version: RwLock<Option<String>>,
}

/// Read-only view of an engine, usable from other threads
///
/// Lifecycle methods take `&mut Engine`, so an observer thread cannot hold
/// the engine itself while the control thread drives it; it holds one of
/// these instead.
#[derive(Debug, Clone)]
pub struct EngineMonitor {
    name: &'static str,
    shared: Arc<SharedState>,
}

impl EngineMonitor {
    pub(crate) fn new(name: &'static str, shared: Arc<SharedState>) -> Self {
        Self { name, shared }
    }

    /// Name of the engine being watched
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.read()
    }

    pub fn stats(&self) -> ConnectionStats {
        *self.shared.stats.read()
    }

    /// Version of the loaded core, or [`UNKNOWN_VERSION`]
    pub fn version(&self) -> String {
        self.shared
            .version
            .read()
            .clone()
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }
}
