//! Network Switch State Machine
//!
//! Defines the valid phase transitions of a single network switch, from the
//! initial request through link settlement and activation to either a bound
//! network or a timeout.

use std::fmt;

/// Opaque handle to a network owned by the OS connectivity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkHandle(pub u64);

impl fmt::Display for NetworkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net:{}", self.0)
    }
}

/// Phase of the switch currently owned by a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchPhase {
    /// No switch in progress
    #[default]
    Idle,
    /// Network requested, waiting for the OS to offer one
    Requesting,
    /// Network offered and bound, waiting for link properties to settle
    LinkPending(NetworkHandle),
    /// Link settled, waiting for the network to carry the default route
    ActivePending(NetworkHandle),
    /// Switch finished; the process is bound to this network
    Bound(NetworkHandle),
    /// Switch gave up before the link settled
    TimedOut,
}

impl SwitchPhase {
    /// Still waiting for the OS to offer a network or settle its link
    pub fn is_waiting_for_link(&self) -> bool {
        matches!(self, SwitchPhase::Requesting | SwitchPhase::LinkPending(_))
    }

    /// Link settled, still waiting for activation
    pub fn is_waiting_for_active(&self) -> bool {
        matches!(self, SwitchPhase::ActivePending(_))
    }

    /// Network this phase refers to, if any
    pub fn network(&self) -> Option<NetworkHandle> {
        match self {
            SwitchPhase::LinkPending(h) | SwitchPhase::ActivePending(h) | SwitchPhase::Bound(h) => {
                Some(*h)
            }
            _ => None,
        }
    }
}

/// Events that can trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEvent {
    /// A network request was handed to the OS
    RequestIssued,
    /// The OS offered a network satisfying the request
    Available(NetworkHandle),
    /// Link properties of the offered network settled
    LinkPropertiesChanged(NetworkHandle),
    /// The OS reported a change of the active default network
    ActiveNetworkChanged,
    /// The settled network already carries the default route
    AlreadyActive,
    /// Waiting for activation ran out; proceed with the bound network
    ActiveWaitElapsed,
    /// The offered network went away
    Lost(NetworkHandle),
    /// The overall switch budget elapsed
    SwitchTimeout,
    /// Managed section finished, back to idle
    Reset,
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and the phase changed
    Success(SwitchPhase),
    /// Event does not apply in the current phase and was ignored
    Invalid { from: SwitchPhase, event: SwitchEvent },
    /// The offered network was lost; the caller must unbind it
    NetworkLost { network: NetworkHandle },
    /// The switch timed out; the caller must release everything it holds
    TimedOut { bound: Option<NetworkHandle> },
}

/// Drives a single coordinator's switch phases
#[derive(Debug, Default)]
pub struct SwitchStateMachine {
    phase: SwitchPhase,
}

impl SwitchStateMachine {
    /// Create a new state machine in Idle phase
    pub fn new() -> Self {
        Self {
            phase: SwitchPhase::Idle,
        }
    }

    /// Get current phase
    pub fn phase(&self) -> SwitchPhase {
        self.phase
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SwitchEvent) -> TransitionResult {
        use SwitchEvent::*;
        use SwitchPhase::*;

        match (self.phase, event) {
            (_, Reset) => {
                self.phase = Idle;
                TransitionResult::Success(Idle)
            }
            (Requesting | LinkPending(_) | ActivePending(_), SwitchTimeout) => {
                let bound = self.phase.network();
                self.phase = TimedOut;
                TransitionResult::TimedOut { bound }
            }
            (LinkPending(h) | ActivePending(h), Lost(lost)) if h == lost => {
                self.phase = Requesting;
                TransitionResult::NetworkLost { network: lost }
            }
            _ => match self.next_phase(&event) {
                Some(phase) => {
                    self.phase = phase;
                    TransitionResult::Success(phase)
                }
                None => TransitionResult::Invalid {
                    from: self.phase,
                    event,
                },
            },
        }
    }

    /// Get the next phase for a given event, if the transition is valid
    fn next_phase(&self, event: &SwitchEvent) -> Option<SwitchPhase> {
        use SwitchEvent::*;
        use SwitchPhase::*;

        match (self.phase, *event) {
            // A new switch may start from any settled phase
            (Idle | Bound(_) | TimedOut, RequestIssued) => Some(Requesting),

            (Requesting, Available(h)) => Some(LinkPending(h)),

            // Settlement only counts for the network we bound
            (LinkPending(h), LinkPropertiesChanged(settled)) if h == settled => {
                Some(ActivePending(h))
            }

            (ActivePending(h), ActiveNetworkChanged | AlreadyActive | ActiveWaitElapsed) => {
                Some(Bound(h))
            }

            _ => None,
        }
    }
}
