//! Simulated connectivity service
//!
//! A scriptable stand-in for the platform connectivity manager. Each network
//! carries a timeline (when it becomes available, when its link settles, when
//! it becomes the active default) and callbacks are delivered from a
//! dedicated thread, the way a platform delivers them from its own looper.
//! Everything the coordinator asks of it is recorded for inspection.

use super::connectivity::{
    ActiveNetworkListener, CallbackId, Connectivity, ListenerId, NetworkCallback,
};
use super::descriptor::{NetworkCapabilities, NetworkDescriptor, NetworkHandle, TransportKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// A network the simulated OS can offer
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    pub handle: NetworkHandle,
    pub capabilities: NetworkCapabilities,
    /// Delay before the network is offered; `None` means it never is
    pub available_after: Option<Duration>,
    /// Delay between availability and settled link properties
    pub link_after: Duration,
    /// Delay after settlement before it carries the default route; `None` means never
    pub active_after: Option<Duration>,
}

impl SimulatedNetwork {
    /// An internet network that is offered, settles and activates immediately
    pub fn new(id: u64, transport: TransportKind) -> Self {
        Self {
            handle: NetworkHandle(id),
            capabilities: NetworkCapabilities::internet(transport),
            available_after: Some(Duration::ZERO),
            link_after: Duration::ZERO,
            active_after: Some(Duration::ZERO),
        }
    }

    pub fn available_after(mut self, delay: Duration) -> Self {
        self.available_after = Some(delay);
        self
    }

    pub fn never_available(mut self) -> Self {
        self.available_after = None;
        self
    }

    pub fn link_after(mut self, delay: Duration) -> Self {
        self.link_after = delay;
        self
    }

    pub fn active_after(mut self, delay: Duration) -> Self {
        self.active_after = Some(delay);
        self
    }

    pub fn never_active(mut self) -> Self {
        self.active_after = None;
        self
    }

    pub fn roaming(mut self) -> Self {
        self.capabilities.not_roaming = false;
        self
    }
}

/// Recorded interaction with the simulated OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityEvent {
    NetworkRequested {
        descriptor: NetworkDescriptor,
        callback: CallbackId,
    },
    CallbackUnregistered(CallbackId),
    ProcessBound(Option<NetworkHandle>),
    ListenerAdded(ListenerId),
    ListenerRemoved(ListenerId),
    ActiveChanged(Option<NetworkHandle>),
}

#[derive(Default)]
struct SimState {
    networks: Vec<SimulatedNetwork>,
    active: Option<NetworkHandle>,
    /// Default route to fall back to once the process releases a promoted network
    baseline: Option<NetworkHandle>,
    bound: Option<NetworkHandle>,
    callbacks: HashMap<CallbackId, Arc<dyn NetworkCallback>>,
    listeners: HashMap<ListenerId, Arc<dyn ActiveNetworkListener>>,
    events: Vec<ConnectivityEvent>,
    next_id: u64,
}

/// In-process connectivity service with scripted networks
#[derive(Clone, Default)]
pub struct SimulatedConnectivity {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedConnectivity {
    /// Create an empty simulated OS with no networks
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a network the OS can offer
    pub fn with_network(self, network: SimulatedNetwork) -> Self {
        self.state().networks.push(network);
        self
    }

    /// Make `network` the current default route
    pub fn with_active(self, network: NetworkHandle) -> Self {
        {
            let mut state = self.state();
            state.active = Some(network);
            state.baseline = Some(network);
        }
        self
    }

    /// Everything recorded so far, oldest first
    pub fn events(&self) -> Vec<ConnectivityEvent> {
        self.state().events.clone()
    }

    /// Number of `request_network` calls made
    pub fn request_count(&self) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, ConnectivityEvent::NetworkRequested { .. }))
            .count()
    }

    /// Callbacks still registered
    pub fn registered_callbacks(&self) -> usize {
        self.state().callbacks.len()
    }

    /// Active-network listeners still registered
    pub fn registered_listeners(&self) -> usize {
        self.state().listeners.len()
    }

    /// Report `network` as lost to every registered callback
    pub fn lose_network(&self, network: NetworkHandle) {
        let callbacks: Vec<_> = self.state().callbacks.values().cloned().collect();
        for callback in callbacks {
            callback.on_lost(network);
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        // A panicking callback thread must not wedge the simulation
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn callback(&self, id: CallbackId) -> Option<Arc<dyn NetworkCallback>> {
        self.state().callbacks.get(&id).cloned()
    }

    fn promote(&self, network: NetworkHandle) {
        let listeners: Vec<_> = {
            let mut state = self.state();
            if state.active == Some(network) {
                return;
            }
            state.active = Some(network);
            state.events.push(ConnectivityEvent::ActiveChanged(Some(network)));
            state.listeners.values().cloned().collect()
        };
        debug!("[SIM] {} is now the active network", network);
        for listener in listeners {
            listener.on_active_network_changed();
        }
    }

    /// Deliver the scripted timeline for one request on its own thread
    fn spawn_timeline(&self, id: CallbackId, network: SimulatedNetwork, available_after: Duration) {
        let sim = self.clone();
        thread::spawn(move || {
            thread::sleep(available_after);
            let Some(callback) = sim.callback(id) else {
                return;
            };
            callback.on_available(network.handle);
            callback.on_capabilities_changed(network.handle, &network.capabilities);

            thread::sleep(network.link_after);
            let Some(callback) = sim.callback(id) else {
                return;
            };
            callback.on_link_properties_changed(network.handle);

            if let Some(active_after) = network.active_after {
                thread::sleep(active_after);
                sim.promote(network.handle);
            }
        });
    }
}

impl Connectivity for SimulatedConnectivity {
    fn request_network(
        &self,
        descriptor: NetworkDescriptor,
        callback: Arc<dyn NetworkCallback>,
    ) -> CallbackId {
        let (id, offer) = {
            let mut state = self.state();
            state.next_id += 1;
            let id = CallbackId(state.next_id);
            state.callbacks.insert(id, callback);
            state.events.push(ConnectivityEvent::NetworkRequested {
                descriptor,
                callback: id,
            });
            let offer = state
                .networks
                .iter()
                .find(|n| descriptor.satisfied_by(&n.capabilities))
                .cloned();
            (id, offer)
        };

        match offer {
            Some(network) => match network.available_after {
                Some(delay) => self.spawn_timeline(id, network, delay),
                None => debug!("[SIM] {} will never be offered", network.handle),
            },
            None => debug!("[SIM] no network satisfies {}", descriptor),
        }
        id
    }

    fn unregister_network_callback(&self, id: CallbackId) {
        let mut state = self.state();
        if state.callbacks.remove(&id).is_some() {
            state.events.push(ConnectivityEvent::CallbackUnregistered(id));
        }
    }

    fn bind_process_to_network(&self, network: Option<NetworkHandle>) -> bool {
        let mut state = self.state();
        state.bound = network;
        state.events.push(ConnectivityEvent::ProcessBound(network));
        if network.is_none() && state.active != state.baseline {
            let baseline = state.baseline;
            state.active = baseline;
            state.events.push(ConnectivityEvent::ActiveChanged(baseline));
        }
        true
    }

    fn bound_network_for_process(&self) -> Option<NetworkHandle> {
        self.state().bound
    }

    fn active_network(&self) -> Option<NetworkHandle> {
        self.state().active
    }

    fn network_capabilities(&self, network: NetworkHandle) -> Option<NetworkCapabilities> {
        self.state()
            .networks
            .iter()
            .find(|n| n.handle == network)
            .map(|n| n.capabilities.clone())
    }

    fn add_active_network_listener(&self, listener: Arc<dyn ActiveNetworkListener>) -> ListenerId {
        let mut state = self.state();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.insert(id, listener);
        state.events.push(ConnectivityEvent::ListenerAdded(id));
        id
    }

    fn remove_active_network_listener(&self, id: ListenerId) {
        let mut state = self.state();
        if state.listeners.remove(&id).is_some() {
            state.events.push(ConnectivityEvent::ListenerRemoved(id));
        }
    }
}
