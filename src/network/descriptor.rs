//! Network descriptors and capabilities

use std::fmt;

pub use cloudlet_shared::state_machine::NetworkHandle;

/// Physical transport a network runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Cellular,
    WiFi,
    Bluetooth,
    Ethernet,
    WiFiAware,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Cellular => write!(f, "Cellular"),
            TransportKind::WiFi => write!(f, "WiFi"),
            TransportKind::Bluetooth => write!(f, "Bluetooth"),
            TransportKind::Ethernet => write!(f, "Ethernet"),
            TransportKind::WiFiAware => write!(f, "WiFi-Aware"),
        }
    }
}

/// Capability a requested network must offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    InternetReachable,
}

/// Capabilities the OS reports for a concrete network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkCapabilities {
    pub transports: Vec<TransportKind>,
    pub internet: bool,
    /// False while the network is roaming
    pub not_roaming: bool,
}

impl NetworkCapabilities {
    /// Capabilities of a home (non-roaming) internet network on one transport
    pub fn internet(transport: TransportKind) -> Self {
        Self {
            transports: vec![transport],
            internet: true,
            not_roaming: true,
        }
    }

    pub fn has_transport(&self, transport: TransportKind) -> bool {
        self.transports.contains(&transport)
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::InternetReachable => self.internet,
        }
    }
}

/// Immutable description of the network a call needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkDescriptor {
    pub transport: TransportKind,
    pub capability: Capability,
}

impl NetworkDescriptor {
    pub fn new(transport: TransportKind, capability: Capability) -> Self {
        Self {
            transport,
            capability,
        }
    }

    /// Cellular data with internet access, the transport matching-engine calls need
    pub fn cellular() -> Self {
        Self::new(TransportKind::Cellular, Capability::InternetReachable)
    }

    pub fn wifi() -> Self {
        Self::new(TransportKind::WiFi, Capability::InternetReachable)
    }

    pub fn bluetooth() -> Self {
        Self::new(TransportKind::Bluetooth, Capability::InternetReachable)
    }

    pub fn ethernet() -> Self {
        Self::new(TransportKind::Ethernet, Capability::InternetReachable)
    }

    /// WiFi-Aware request; plain WiFi or cellular networks also qualify
    pub fn wifi_aware() -> Self {
        Self::new(TransportKind::WiFiAware, Capability::InternetReachable)
    }

    /// Transports accepted for this descriptor
    pub fn accepted_transports(&self) -> &'static [TransportKind] {
        match self.transport {
            TransportKind::Cellular => &[TransportKind::Cellular],
            TransportKind::WiFi => &[TransportKind::WiFi],
            TransportKind::Bluetooth => &[TransportKind::Bluetooth],
            TransportKind::Ethernet => &[TransportKind::Ethernet],
            TransportKind::WiFiAware => &[
                TransportKind::WiFiAware,
                TransportKind::WiFi,
                TransportKind::Cellular,
            ],
        }
    }

    /// Check whether a network with these capabilities satisfies the descriptor
    pub fn satisfied_by(&self, caps: &NetworkCapabilities) -> bool {
        caps.has_capability(self.capability)
            && self
                .accepted_transports()
                .iter()
                .any(|t| caps.has_transport(*t))
    }
}

impl fmt::Display for NetworkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+internet", self.transport)
    }
}
