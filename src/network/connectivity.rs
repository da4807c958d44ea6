//! OS connectivity abstraction
//!
//! The coordinator never talks to the platform directly. It goes through
//! `Connectivity`, whose callbacks may fire on any thread the platform
//! chooses.

use super::descriptor::{NetworkCapabilities, NetworkDescriptor, NetworkHandle};
use std::sync::Arc;

/// Identifies a registered network request callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// Identifies a registered active-network listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Notifications about a requested network
pub trait NetworkCallback: Send + Sync {
    /// A network satisfying the request is available
    fn on_available(&self, network: NetworkHandle);

    /// Capabilities of the network changed
    fn on_capabilities_changed(&self, _network: NetworkHandle, _capabilities: &NetworkCapabilities) {}

    /// Link properties (addresses, routes) settled or changed
    fn on_link_properties_changed(&self, network: NetworkHandle);

    /// The network is about to be lost
    fn on_losing(&self, _network: NetworkHandle, _max_ms_to_live: u32) {}

    /// The network is gone
    fn on_lost(&self, network: NetworkHandle);
}

/// Notification that the OS default network changed
pub trait ActiveNetworkListener: Send + Sync {
    fn on_active_network_changed(&self);
}

/// Platform connectivity service
pub trait Connectivity: Send + Sync {
    /// Ask the OS for a network matching `descriptor`
    fn request_network(
        &self,
        descriptor: NetworkDescriptor,
        callback: Arc<dyn NetworkCallback>,
    ) -> CallbackId;

    /// Withdraw a request made with `request_network`
    fn unregister_network_callback(&self, id: CallbackId);

    /// Route all process traffic through `network`, or back to OS default routing on `None`
    fn bind_process_to_network(&self, network: Option<NetworkHandle>) -> bool;

    /// Network the process is currently bound to
    fn bound_network_for_process(&self) -> Option<NetworkHandle>;

    /// Network carrying the OS default route
    fn active_network(&self) -> Option<NetworkHandle>;

    /// Capabilities of a known network
    fn network_capabilities(&self, network: NetworkHandle) -> Option<NetworkCapabilities>;

    fn add_active_network_listener(&self, listener: Arc<dyn ActiveNetworkListener>) -> ListenerId;

    fn remove_active_network_listener(&self, id: ListenerId);
}

/// Unregisters a network callback when dropped
pub struct CallbackRegistration {
    connectivity: Arc<dyn Connectivity>,
    id: CallbackId,
}

impl CallbackRegistration {
    pub fn new(connectivity: Arc<dyn Connectivity>, id: CallbackId) -> Self {
        Self { connectivity, id }
    }
}

impl Drop for CallbackRegistration {
    fn drop(&mut self) {
        self.connectivity.unregister_network_callback(self.id);
    }
}

/// Removes an active-network listener when dropped
pub struct ListenerRegistration {
    connectivity: Arc<dyn Connectivity>,
    id: ListenerId,
}

impl ListenerRegistration {
    pub fn new(connectivity: Arc<dyn Connectivity>, id: ListenerId) -> Self {
        Self { connectivity, id }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.connectivity.remove_active_network_listener(self.id);
    }
}
