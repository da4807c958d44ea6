//! Network selection and switching
//!
//! This module handles:
//! - Describing the network a call needs (transport + capability)
//! - The platform connectivity seam and its callbacks
//! - Serialised switching with timeouts and default-route restoration
//! - A scriptable in-process connectivity service

mod coordinator;
pub mod connectivity;
pub mod descriptor;
pub mod simulated;

pub use connectivity::{
    ActiveNetworkListener, CallbackId, Connectivity, ListenerId, NetworkCallback,
};
pub use coordinator::{NetworkCoordinator, SwitchConfig, SwitchOutcome};
pub use descriptor::{
    Capability, NetworkCapabilities, NetworkDescriptor, NetworkHandle, TransportKind,
};
pub use simulated::{ConnectivityEvent, SimulatedConnectivity, SimulatedNetwork};
