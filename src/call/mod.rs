//! Matching-engine call infrastructure
//!
//! This module handles:
//! - Validating and storing a request for one call
//! - Running the call on the right network under a deadline
//! - Converting replies into typed results
//! - Server-stream results that own their channel

pub mod ops;
mod stream;
mod wrapper;

pub use stream::StreamHandle;
pub use wrapper::CallWrapper;

use crate::error::Result;
use crate::network::{NetworkCoordinator, NetworkDescriptor};
use crate::transport::{ChannelFactory, MatchEngineStub, RpcChannel};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Where a call is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    /// 0 selects the engine's configured port
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Request stored by `CallWrapper::set_request`, consumed by `execute`
#[derive(Debug, Clone)]
pub struct PendingCall<R> {
    pub request: R,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

/// Collaborators every call needs
#[derive(Clone)]
pub struct CallContext {
    pub coordinator: Arc<NetworkCoordinator>,
    pub channels: Arc<dyn ChannelFactory>,
    /// Policy gate; calls are not prepared while false
    pub location_enabled: bool,
    pub default_port: u16,
}

/// One remote operation of the matching-engine API
#[async_trait]
pub trait RpcOperation: Send + Sync + 'static {
    type Request: Send + Sync + 'static;
    type Output: Send + 'static;

    /// Operation name used in errors and logs
    const NAME: &'static str;

    /// The output keeps reading from the channel after `invoke` returns
    const KEEPS_CHANNEL: bool = false;

    /// Network the call has to run on; `None` uses whatever is current
    fn network() -> Option<NetworkDescriptor> {
        Some(NetworkDescriptor::cellular())
    }

    /// Operation-specific request checks
    fn validate(_request: &Self::Request) -> Result<()> {
        Ok(())
    }

    /// Perform the call and convert its reply
    async fn invoke(
        stub: &MatchEngineStub,
        channel: Arc<dyn RpcChannel>,
        request: Self::Request,
    ) -> Result<Self::Output>;
}
