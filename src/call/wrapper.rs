//! Single-use call wrapper shared by every operation

use super::{CallContext, Endpoint, PendingCall, RpcOperation};
use crate::error::{EngineError, Result};
use crate::transport::MatchEngineStub;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

/// Prepares and performs exactly one call of `Op`
pub struct CallWrapper<Op: RpcOperation> {
    context: CallContext,
    pending: Option<PendingCall<Op::Request>>,
    _op: PhantomData<fn() -> Op>,
}

impl<Op: RpcOperation> CallWrapper<Op> {
    pub fn new(context: CallContext) -> Self {
        Self {
            context,
            pending: None,
            _op: PhantomData,
        }
    }

    /// Store the request to send
    ///
    /// Returns `Ok(false)` without storing anything when location services
    /// are disabled. A port of 0 selects the engine's configured port.
    pub fn set_request(
        &mut self,
        request: Op::Request,
        endpoint: Endpoint,
        timeout: Duration,
    ) -> Result<bool> {
        if !self.context.location_enabled {
            warn!("[CALL] Location services disabled, {} not prepared", Op::NAME);
            self.pending = None;
            return Ok(false);
        }
        if endpoint.host.is_empty() {
            return Err(EngineError::InvalidArgument(
                "Host destination is required".into(),
            ));
        }
        if timeout.is_zero() {
            return Err(EngineError::InvalidArgument(
                "Timeout must be positive".into(),
            ));
        }
        Op::validate(&request)?;

        let port = match endpoint.port {
            0 => self.context.default_port,
            port => port,
        };
        self.pending = Some(PendingCall {
            request,
            host: endpoint.host,
            port,
            timeout,
        });
        Ok(true)
    }

    /// A request is stored and not yet executed
    pub fn has_request(&self) -> bool {
        self.pending.is_some()
    }

    /// Perform the stored call
    ///
    /// Consumes the stored request; a second execute fails with
    /// `MissingRequest`.
    pub async fn execute(&mut self) -> Result<Op::Output> {
        let pending = self.pending.take().ok_or(EngineError::MissingRequest {
            operation: Op::NAME,
        })?;

        match Op::network() {
            Some(descriptor) => {
                let coordinator = self.context.coordinator.clone();
                coordinator
                    .run_on_network(descriptor, || self.perform(pending))
                    .await
            }
            None => self.perform(pending).await,
        }
    }

    async fn perform(&self, pending: PendingCall<Op::Request>) -> Result<Op::Output> {
        let channel = self
            .context
            .channels
            .open(&pending.host, pending.port)
            .await
            .map_err(|e| EngineError::from_transport(Op::NAME, e))?;
        debug!("[CALL] {} -> {}", Op::NAME, channel.target());

        let stub = MatchEngineStub::new(channel.clone()).with_deadline(pending.timeout);
        let result = Op::invoke(&stub, channel.clone(), pending.request).await;

        if !Op::KEEPS_CHANNEL || result.is_err() {
            if let Err(e) = channel.shutdown(pending.timeout).await {
                warn!("[CALL] Closing channel after {} failed: {}", Op::NAME, e);
            }
        }
        result
    }
}
