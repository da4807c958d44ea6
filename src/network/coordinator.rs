//! Network-switch coordinator
//!
//! Binds the process to a requested network for the duration of a call and
//! puts default routing back afterwards. Connectivity callbacks arrive on
//! platform threads; they are folded into a watch channel that async waiters
//! observe, and the phase transitions come from
//! `cloudlet_shared::state_machine`.

use super::connectivity::{
    ActiveNetworkListener, CallbackRegistration, Connectivity, ListenerRegistration,
    NetworkCallback,
};
use super::descriptor::{NetworkDescriptor, NetworkHandle};
use crate::dispatch::{CallHandle, Dispatcher};
use crate::error::{EngineError, Result};
use cloudlet_shared::defaults;
use cloudlet_shared::state_machine::{
    SwitchEvent, SwitchPhase, SwitchStateMachine, TransitionResult,
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Configuration for network switching
#[derive(Debug, Clone)]
pub struct SwitchConfig {
    /// Budget for the requested network to become available and settle
    pub switch_timeout: Duration,
    /// How long to wait for a settled network to carry the default route
    pub active_timeout: Duration,
    /// Kill switch; when false every switch is a no-op
    pub enabled: bool,
    /// Network to switch back to on reset; `None` unbinds the process
    pub default_descriptor: Option<NetworkDescriptor>,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            switch_timeout: Duration::from_millis(defaults::SWITCH_TIMEOUT_MS),
            active_timeout: Duration::from_millis(defaults::ACTIVE_TIMEOUT_MS),
            enabled: true,
            default_descriptor: None,
        }
    }
}

/// What a switch request ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Switching is turned off
    Disabled,
    /// The active network already satisfies the request
    AlreadySatisfied,
    /// The process is now bound to this network
    Switched(NetworkHandle),
}

impl SwitchOutcome {
    /// Only a real switch has to be undone
    pub fn needs_reset(&self) -> bool {
        matches!(self, SwitchOutcome::Switched(_))
    }

    pub fn network(&self) -> Option<NetworkHandle> {
        match self {
            SwitchOutcome::Switched(network) => Some(*network),
            _ => None,
        }
    }
}

/// Registrations kept alive while the process is bound
struct Registrations {
    _request: CallbackRegistration,
    _listener: ListenerRegistration,
}

/// Switch state shared between waiters and connectivity callbacks
struct SwitchState {
    machine: SwitchStateMachine,
    bound: Option<NetworkHandle>,
    default_descriptor: Option<NetworkDescriptor>,
    /// Incremented for every switch; callbacks from older attempts are dropped
    attempt: u64,
    /// Binding in place before the current attempt
    prior: Option<NetworkHandle>,
    switch_timeout: Duration,
    active_timeout: Duration,
    enabled: bool,
    registrations: Option<Registrations>,
}

impl SwitchState {
    fn new(config: SwitchConfig) -> Self {
        Self {
            machine: SwitchStateMachine::new(),
            bound: None,
            default_descriptor: config.default_descriptor,
            attempt: 0,
            prior: None,
            switch_timeout: config.switch_timeout,
            active_timeout: config.active_timeout,
            enabled: config.enabled,
            registrations: None,
        }
    }

    fn phase(&self) -> SwitchPhase {
        self.machine.phase()
    }

    fn apply(&mut self, event: SwitchEvent) -> TransitionResult {
        let result = self.machine.process_event(event);
        if let TransitionResult::Invalid { from, event } = &result {
            debug!("[NET] Ignoring {:?} in phase {:?}", event, from);
        }
        result
    }

    /// Back to idle, handing out whatever registrations were held
    fn clear(&mut self) -> Option<Registrations> {
        self.bound = None;
        self.apply(SwitchEvent::Reset);
        self.registrations.take()
    }
}

/// Bridges connectivity callbacks of one attempt into the switch state
struct SwitchCallback {
    state: Arc<watch::Sender<SwitchState>>,
    connectivity: Arc<dyn Connectivity>,
    attempt: u64,
}

impl SwitchCallback {
    fn update(&self, f: impl FnOnce(&mut SwitchState) -> bool) {
        let attempt = self.attempt;
        self.state
            .send_if_modified(|state| state.attempt == attempt && f(state));
    }
}

impl NetworkCallback for SwitchCallback {
    fn on_available(&self, network: NetworkHandle) {
        let connectivity = &self.connectivity;
        self.update(|state| match state.apply(SwitchEvent::Available(network)) {
            TransitionResult::Success(_) => {
                connectivity.bind_process_to_network(Some(network));
                state.bound = Some(network);
                debug!("[NET] {} available, process bound", network);
                true
            }
            _ => false,
        });
    }

    fn on_link_properties_changed(&self, network: NetworkHandle) {
        let connectivity = &self.connectivity;
        self.update(
            |state| match state.apply(SwitchEvent::LinkPropertiesChanged(network)) {
                TransitionResult::Success(_) => {
                    if connectivity.active_network() == Some(network) {
                        state.apply(SwitchEvent::AlreadyActive);
                    }
                    true
                }
                _ => false,
            },
        );
    }

    fn on_lost(&self, network: NetworkHandle) {
        let connectivity = &self.connectivity;
        self.update(|state| match state.apply(SwitchEvent::Lost(network)) {
            TransitionResult::NetworkLost { network } => {
                warn!("[NET] {} lost before the switch settled", network);
                connectivity.bind_process_to_network(state.prior);
                state.bound = None;
                true
            }
            _ => false,
        });
    }
}

impl ActiveNetworkListener for SwitchCallback {
    fn on_active_network_changed(&self) {
        self.update(|state| {
            state.phase().is_waiting_for_active()
                && matches!(
                    state.apply(SwitchEvent::ActiveNetworkChanged),
                    TransitionResult::Success(_)
                )
        });
    }
}

/// Undoes an attempt that was dropped before it finished
struct AttemptGuard<'a> {
    coordinator: &'a NetworkCoordinator,
    attempt: u64,
    registrations: Option<Registrations>,
}

impl AttemptGuard<'_> {
    fn complete(mut self) -> Option<Registrations> {
        self.registrations.take()
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if let Some(registrations) = self.registrations.take() {
            debug!("[NET] Attempt {} abandoned", self.attempt);
            self.coordinator.abandon(self.attempt);
            drop(registrations);
        }
    }
}

/// Releases the binding if a managed section is dropped mid-call
struct SectionGuard<'a> {
    coordinator: &'a NetworkCoordinator,
    armed: bool,
}

impl Drop for SectionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.release();
        }
    }
}

/// Serialised owner of the process network binding
pub struct NetworkCoordinator {
    connectivity: Arc<dyn Connectivity>,
    state: Arc<watch::Sender<SwitchState>>,
    /// FIFO lock held across every switch and managed section
    switch_lock: Mutex<()>,
    runtime: Option<Handle>,
}

impl NetworkCoordinator {
    pub fn new(connectivity: Arc<dyn Connectivity>, config: SwitchConfig) -> Self {
        let (state, _) = watch::channel(SwitchState::new(config));
        Self {
            connectivity,
            state: Arc::new(state),
            switch_lock: Mutex::new(()),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.connectivity
    }

    /// Set the switch budget; zero is rejected
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(EngineError::InvalidArgument(
                "Network switching timeout must be positive".into(),
            ));
        }
        self.state.send_modify(|state| state.switch_timeout = timeout);
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.state.borrow().switch_timeout
    }

    /// Set how long to wait for activation; zero skips the wait
    pub fn set_active_timeout(&self, timeout: Duration) {
        self.state.send_modify(|state| state.active_timeout = timeout);
    }

    pub fn set_default_descriptor(&self, descriptor: Option<NetworkDescriptor>) {
        self.state
            .send_modify(|state| state.default_descriptor = descriptor);
    }

    pub fn set_switching_enabled(&self, enabled: bool) {
        self.state.send_modify(|state| state.enabled = enabled);
    }

    pub fn is_switching_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    pub fn phase(&self) -> SwitchPhase {
        self.state.borrow().phase()
    }

    /// Network the coordinator bound the process to, if any
    pub fn bound_network(&self) -> Option<NetworkHandle> {
        self.state.borrow().bound
    }

    /// Active network is cellular with internet access
    pub fn is_current_network_cellular_internet(&self) -> bool {
        self.active_satisfies(&NetworkDescriptor::cellular())
    }

    /// Active network reports itself as roaming
    pub fn is_roaming(&self) -> bool {
        self.connectivity
            .active_network()
            .and_then(|network| self.connectivity.network_capabilities(network))
            .map(|caps| !caps.not_roaming)
            .unwrap_or(false)
    }

    fn active_satisfies(&self, descriptor: &NetworkDescriptor) -> bool {
        self.connectivity
            .active_network()
            .and_then(|network| self.connectivity.network_capabilities(network))
            .map(|caps| descriptor.satisfied_by(&caps))
            .unwrap_or(false)
    }

    /// Bind the process to a network matching `descriptor`
    ///
    /// The binding stays in place until `reset_to_default`.
    pub async fn switch_to(&self, descriptor: NetworkDescriptor) -> Result<SwitchOutcome> {
        let _lock = self.switch_lock.lock().await;
        self.switch_locked(descriptor).await
    }

    /// Blocking form of `switch_to` for plain OS threads
    ///
    /// Refused on any thread that has entered the runtime.
    pub fn switch_to_blocking(&self, descriptor: NetworkDescriptor) -> Result<SwitchOutcome> {
        if Handle::try_current().is_ok() {
            return Err(EngineError::InvalidArgument(
                "switch_to_blocking must not be called from inside the async runtime".into(),
            ));
        }
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            EngineError::InvalidArgument("coordinator was created outside a tokio runtime".into())
        })?;
        runtime.block_on(self.switch_to(descriptor))
    }

    /// Run `switch_to` on the call dispatcher
    pub async fn switch_to_future(
        self: &Arc<Self>,
        dispatcher: &Dispatcher,
        descriptor: NetworkDescriptor,
    ) -> Result<CallHandle<SwitchOutcome>> {
        let coordinator = Arc::clone(self);
        dispatcher
            .submit(async move { coordinator.switch_to(descriptor).await })
            .await
    }

    /// Undo the current binding
    ///
    /// Switches to the default descriptor when one is configured, otherwise
    /// hands routing back to the OS.
    pub async fn reset_to_default(&self) -> Result<()> {
        let _lock = self.switch_lock.lock().await;
        self.reset_locked().await
    }

    /// Switch, run `body`, then restore the default network
    ///
    /// The coordinator lock is held for the whole section, so no other
    /// caller can move the binding while `body` runs.
    pub async fn run_on_network<T, F, Fut>(&self, descriptor: NetworkDescriptor, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _lock = self.switch_lock.lock().await;
        let outcome = self.switch_locked(descriptor).await?;
        let mut section = SectionGuard {
            coordinator: self,
            armed: outcome.needs_reset(),
        };

        let result = body().await;

        section.armed = false;
        if outcome.needs_reset() {
            if let Err(e) = self.restore_locked().await {
                warn!("[NET] Restoring default network failed: {}", e);
            }
        }
        result
    }

    async fn switch_locked(&self, descriptor: NetworkDescriptor) -> Result<SwitchOutcome> {
        let (enabled, switch_timeout, active_timeout) = {
            let state = self.state.borrow();
            (state.enabled, state.switch_timeout, state.active_timeout)
        };
        if !enabled {
            debug!("[NET] Switching disabled, staying on current network");
            return Ok(SwitchOutcome::Disabled);
        }
        if self.active_satisfies(&descriptor) {
            debug!("[NET] Active network already satisfies {}", descriptor);
            return Ok(SwitchOutcome::AlreadySatisfied);
        }

        let prior = self.connectivity.bound_network_for_process();
        let started = Instant::now();
        let mut attempt = 0;
        let mut stale = None;
        self.state.send_modify(|state| {
            stale = state.clear();
            state.attempt += 1;
            attempt = state.attempt;
            state.prior = prior;
            state.apply(SwitchEvent::RequestIssued);
        });
        drop(stale);

        info!("[NET] Requesting {} network (attempt {})", descriptor, attempt);
        let callback = Arc::new(SwitchCallback {
            state: self.state.clone(),
            connectivity: self.connectivity.clone(),
            attempt,
        });
        // Listen before requesting so an early activation is not missed
        let listener_id = self.connectivity.add_active_network_listener(callback.clone());
        let listener = ListenerRegistration::new(self.connectivity.clone(), listener_id);
        let request_id = self.connectivity.request_network(descriptor, callback);
        let request = CallbackRegistration::new(self.connectivity.clone(), request_id);
        let guard = AttemptGuard {
            coordinator: self,
            attempt,
            registrations: Some(Registrations {
                _request: request,
                _listener: listener,
            }),
        };

        let mut rx = self.state.subscribe();
        loop {
            let (current, phase) = {
                let state = self.state.borrow();
                (state.attempt, state.phase())
            };
            if current != attempt {
                return Err(EngineError::Cancelled);
            }

            match phase {
                SwitchPhase::Bound(network) => {
                    let registrations = guard.complete();
                    self.state
                        .send_modify(|state| state.registrations = registrations);
                    info!(
                        "[NET] Switched to {} in {}ms",
                        network,
                        started.elapsed().as_millis()
                    );
                    return Ok(SwitchOutcome::Switched(network));
                }
                SwitchPhase::ActivePending(network) => {
                    let activated = tokio::time::timeout(
                        active_timeout,
                        rx.wait_for(|s| s.attempt != attempt || !s.phase().is_waiting_for_active()),
                    )
                    .await
                    .is_ok();
                    if !activated {
                        debug!(
                            "[NET] {} not active after {}ms, proceeding",
                            network,
                            active_timeout.as_millis()
                        );
                        self.state.send_if_modified(|state| {
                            state.attempt == attempt
                                && matches!(
                                    state.apply(SwitchEvent::ActiveWaitElapsed),
                                    TransitionResult::Success(_)
                                )
                        });
                    }
                }
                SwitchPhase::Requesting | SwitchPhase::LinkPending(_) => {
                    let remaining = switch_timeout.saturating_sub(started.elapsed());
                    let settled = tokio::time::timeout(
                        remaining,
                        rx.wait_for(|s| s.attempt != attempt || !s.phase().is_waiting_for_link()),
                    )
                    .await
                    .is_ok();
                    if !settled && self.expire(attempt) {
                        drop(guard.complete());
                        let elapsed = started.elapsed();
                        warn!(
                            "[NET] No {} network after {}ms, giving up",
                            descriptor,
                            elapsed.as_millis()
                        );
                        return Err(EngineError::NetworkRequestTimeout { elapsed });
                    }
                }
                SwitchPhase::Idle | SwitchPhase::TimedOut => return Err(EngineError::Cancelled),
            }
        }
    }

    /// Kill switch only skips the reset when nothing is held
    async fn reset_locked(&self) -> Result<()> {
        let (enabled, holding) = {
            let state = self.state.borrow();
            (
                state.enabled,
                state.bound.is_some() || state.registrations.is_some(),
            )
        };
        if !enabled && !holding {
            return Ok(());
        }
        self.restore_locked().await
    }

    /// Release the binding, then switch to the default descriptor if one is set
    async fn restore_locked(&self) -> Result<()> {
        self.release();
        let default_descriptor = self.state.borrow().default_descriptor;
        match default_descriptor {
            Some(descriptor) => {
                debug!("[NET] Switching back to default {}", descriptor);
                self.switch_locked(descriptor).await.map(|_| ())
            }
            None => {
                debug!("[NET] Default routing restored");
                Ok(())
            }
        }
    }

    /// Drop held registrations and unbind the process
    fn release(&self) {
        let mut held = None;
        self.state.send_modify(|state| held = state.clear());
        drop(held);
        self.connectivity.bind_process_to_network(None);
    }

    /// Time out `attempt` if it is still waiting for a link
    fn expire(&self, attempt: u64) -> bool {
        let connectivity = &self.connectivity;
        let mut expired = false;
        self.state.send_if_modified(|state| {
            if state.attempt != attempt || !state.phase().is_waiting_for_link() {
                return false;
            }
            if let TransitionResult::TimedOut { bound } = state.apply(SwitchEvent::SwitchTimeout) {
                if let Some(network) = bound {
                    debug!("[NET] Releasing {} after timeout", network);
                }
                connectivity.bind_process_to_network(state.prior);
                expired = true;
            }
            state.clear();
            true
        });
        expired
    }

    /// Restore the pre-attempt binding of an abandoned attempt
    fn abandon(&self, attempt: u64) {
        let connectivity = &self.connectivity;
        self.state.send_if_modified(|state| {
            if state.attempt != attempt {
                return false;
            }
            connectivity.bind_process_to_network(state.prior);
            state.clear();
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::descriptor::TransportKind;
    use crate::network::simulated::{ConnectivityEvent, SimulatedConnectivity, SimulatedNetwork};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WIFI: NetworkHandle = NetworkHandle(1);
    const CELL: NetworkHandle = NetworkHandle(2);

    fn wifi_home(cellular: SimulatedNetwork) -> Arc<SimulatedConnectivity> {
        Arc::new(
            SimulatedConnectivity::new()
                .with_network(SimulatedNetwork::new(WIFI.0, TransportKind::WiFi))
                .with_network(cellular)
                .with_active(WIFI),
        )
    }

    fn coordinator(sim: &Arc<SimulatedConnectivity>) -> NetworkCoordinator {
        NetworkCoordinator::new(sim.clone(), SwitchConfig::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fast_path_when_already_cellular() {
        let sim = Arc::new(
            SimulatedConnectivity::new()
                .with_network(SimulatedNetwork::new(CELL.0, TransportKind::Cellular))
                .with_active(CELL),
        );
        let coordinator = coordinator(&sim);

        let outcome = coordinator.switch_to(NetworkDescriptor::cellular()).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::AlreadySatisfied);
        assert_eq!(sim.request_count(), 0);
        assert!(coordinator.is_current_network_cellular_internet());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disabled_switching_makes_no_request() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);
        coordinator.set_switching_enabled(false);

        let outcome = coordinator.switch_to(NetworkDescriptor::cellular()).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Disabled);
        coordinator.reset_to_default().await.unwrap();
        assert!(sim.events().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_switch_waits_for_link_and_activation() {
        let sim = wifi_home(
            SimulatedNetwork::new(CELL.0, TransportKind::Cellular)
                .available_after(Duration::from_millis(50))
                .active_after(Duration::from_millis(100)),
        );
        let coordinator = coordinator(&sim);

        let start = Instant::now();
        let outcome = coordinator.switch_to(NetworkDescriptor::cellular()).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcome, SwitchOutcome::Switched(CELL));
        assert!(elapsed >= Duration::from_millis(140), "returned after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "returned after {:?}", elapsed);
        assert_eq!(coordinator.phase(), SwitchPhase::Bound(CELL));
        assert_eq!(coordinator.bound_network(), Some(CELL));
        assert_eq!(sim.bound_network_for_process(), Some(CELL));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_never_available_times_out_and_leaves_binding() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular).never_available());
        let coordinator = coordinator(&sim);
        coordinator.set_timeout(Duration::from_millis(200)).unwrap();

        let start = Instant::now();
        let err = coordinator
            .switch_to(NetworkDescriptor::cellular())
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, EngineError::NetworkRequestTimeout { .. }));
        assert!(elapsed >= Duration::from_millis(190), "timed out after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "timed out after {:?}", elapsed);
        assert_eq!(sim.bound_network_for_process(), None);
        assert_eq!(coordinator.bound_network(), None);
        assert_eq!(coordinator.phase(), SwitchPhase::Idle);
        assert_eq!(sim.registered_callbacks(), 0);
        assert_eq!(sim.registered_listeners(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inactive_network_is_used_after_active_wait() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular).never_active());
        let coordinator = coordinator(&sim);
        coordinator.set_active_timeout(Duration::from_millis(50));

        let outcome = coordinator.switch_to(NetworkDescriptor::cellular()).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Switched(CELL));
        assert_eq!(sim.active_network(), Some(WIFI));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zero_timeout_rejected() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);

        assert!(matches!(
            coordinator.set_timeout(Duration::ZERO),
            Err(EngineError::InvalidArgument(_))
        ));
        assert_eq!(
            coordinator.timeout(),
            Duration::from_millis(defaults::SWITCH_TIMEOUT_MS)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_managed_section_restores_default() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);
        let before = sim.active_network();

        let seen = coordinator
            .run_on_network(NetworkDescriptor::cellular(), || async {
                Ok(sim.bound_network_for_process())
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(CELL));
        assert_eq!(sim.active_network(), before);
        assert_eq!(sim.bound_network_for_process(), None);
        assert_eq!(coordinator.phase(), SwitchPhase::Idle);
        assert_eq!(sim.registered_callbacks(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_managed_section_restores_after_failed_body() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);

        let result: Result<()> = coordinator
            .run_on_network(NetworkDescriptor::cellular(), || async {
                Err(EngineError::LocationUnavailable)
            })
            .await;

        assert!(matches!(result, Err(EngineError::LocationUnavailable)));
        assert_eq!(sim.bound_network_for_process(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_section_restores_after_switching_disabled_mid_body() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);

        let during = coordinator
            .run_on_network(NetworkDescriptor::cellular(), || async {
                coordinator.set_switching_enabled(false);
                Ok(sim.bound_network_for_process())
            })
            .await
            .unwrap();

        assert_eq!(during, Some(CELL));
        assert_eq!(sim.bound_network_for_process(), None);
        assert_eq!(sim.active_network(), Some(WIFI));
        assert_eq!(coordinator.phase(), SwitchPhase::Idle);
        assert_eq!(sim.registered_callbacks(), 0);
        assert_eq!(sim.registered_listeners(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reset_releases_held_binding_when_disabled() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);

        let outcome = coordinator.switch_to(NetworkDescriptor::cellular()).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Switched(CELL));
        coordinator.set_switching_enabled(false);
        coordinator.reset_to_default().await.unwrap();

        assert_eq!(sim.bound_network_for_process(), None);
        assert_eq!(sim.registered_callbacks(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sections_run_sequentially() {
        let sim = wifi_home(
            SimulatedNetwork::new(CELL.0, TransportKind::Cellular)
                .available_after(Duration::from_millis(10)),
        );
        let coordinator = Arc::new(coordinator(&sim));
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            let inside = inside.clone();
            let overlap = overlap.clone();
            tasks.push(tokio::spawn(async move {
                coordinator
                    .run_on_network(NetworkDescriptor::cellular(), || async {
                        if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert_eq!(sim.request_count(), 3);

        // Every request is followed by an unbind before the next one
        let mut open = false;
        for event in sim.events() {
            match event {
                ConnectivityEvent::NetworkRequested { .. } => {
                    assert!(!open, "switch started inside another section");
                    open = true;
                }
                ConnectivityEvent::ProcessBound(None) => open = false,
                _ => {}
            }
        }
        assert!(!open);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lost_network_is_unbound() {
        let sim = wifi_home(
            SimulatedNetwork::new(CELL.0, TransportKind::Cellular)
                .link_after(Duration::from_millis(300)),
        );
        let coordinator = Arc::new(coordinator(&sim));
        coordinator.set_timeout(Duration::from_millis(200)).unwrap();

        let switching = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.switch_to(NetworkDescriptor::cellular()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(coordinator.phase(), SwitchPhase::LinkPending(CELL));

        sim.lose_network(CELL);
        assert_eq!(coordinator.phase(), SwitchPhase::Requesting);
        assert_eq!(coordinator.bound_network(), None);

        let err = switching.await.unwrap().unwrap_err();
        assert!(matches!(err, EngineError::NetworkRequestTimeout { .. }));
        assert_eq!(sim.bound_network_for_process(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reset_switches_to_default_descriptor() {
        let sim = Arc::new(
            SimulatedConnectivity::new()
                .with_network(SimulatedNetwork::new(WIFI.0, TransportKind::WiFi).never_active())
                .with_network(SimulatedNetwork::new(CELL.0, TransportKind::Cellular))
                .with_active(CELL),
        );
        let coordinator = coordinator(&sim);
        coordinator.set_active_timeout(Duration::ZERO);

        let outcome = coordinator.switch_to(NetworkDescriptor::wifi()).await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Switched(WIFI));

        coordinator.set_default_descriptor(Some(NetworkDescriptor::cellular()));
        coordinator.reset_to_default().await.unwrap();
        assert_eq!(sim.bound_network_for_process(), None);
        assert_eq!(coordinator.phase(), SwitchPhase::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_switch_inside_runtime_is_rejected() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = coordinator(&sim);
        assert!(matches!(
            coordinator.switch_to_blocking(NetworkDescriptor::cellular()),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_switch_from_plain_thread() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular));
        let coordinator = Arc::new(coordinator(&sim));

        let caller = std::thread::spawn({
            let coordinator = coordinator.clone();
            move || coordinator.switch_to_blocking(NetworkDescriptor::cellular())
        });
        let outcome = tokio::task::spawn_blocking(move || caller.join())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, SwitchOutcome::Switched(CELL));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_switch_times_out_without_binding() {
        let sim = wifi_home(SimulatedNetwork::new(CELL.0, TransportKind::Cellular).never_available());
        let coordinator = Arc::new(coordinator(&sim));
        coordinator.set_timeout(Duration::from_millis(200)).unwrap();

        let caller = std::thread::spawn({
            let coordinator = coordinator.clone();
            move || {
                let start = Instant::now();
                let result = coordinator.switch_to_blocking(NetworkDescriptor::cellular());
                (result, start.elapsed())
            }
        });
        let (result, elapsed) = tokio::task::spawn_blocking(move || caller.join())
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(result, Err(EngineError::NetworkRequestTimeout { .. })));
        assert!(elapsed >= Duration::from_millis(190), "timed out after {:?}", elapsed);
        assert_eq!(sim.bound_network_for_process(), None);
        assert_eq!(coordinator.bound_network(), None);
        assert_eq!(sim.registered_callbacks(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_roaming_reported_from_active_network() {
        let sim = Arc::new(
            SimulatedConnectivity::new()
                .with_network(SimulatedNetwork::new(CELL.0, TransportKind::Cellular).roaming())
                .with_active(CELL),
        );
        let coordinator = coordinator(&sim);
        assert!(coordinator.is_roaming());
    }
}
