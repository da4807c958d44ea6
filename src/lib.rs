//! Cloudlet Client
//!
//! Client library for a distributed matching engine. Calls are pinned to a
//! cellular network through a coordinator that serialises network switches
//! and restores the default route afterwards.

pub mod call;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod location;
pub mod network;
pub mod transport;

pub use call::{CallWrapper, Endpoint, RpcOperation, StreamHandle};
pub use config::EngineConfig;
pub use dispatch::{CallHandle, Dispatcher, DispatcherConfig};
pub use engine::{generate_dme_host, MatchingEngine, Session};
pub use error::{EngineError, Result, RpcStatus, TransportError};
pub use location::{FixedLocation, GeoLocation, LocationProvider};
pub use network::{
    Connectivity, NetworkCoordinator, NetworkDescriptor, NetworkHandle, SwitchConfig,
    SwitchOutcome,
};
