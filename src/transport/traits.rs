//! Transport trait abstraction for pluggable RPC backends

use crate::error::{RpcStatus, TransportError};
use async_trait::async_trait;
use cloudlet_shared::RpcMethod;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;

/// Encoded items of a server stream
pub type ItemStream = BoxStream<'static, Result<Vec<u8>, RpcStatus>>;

/// An open channel to a matching engine
#[async_trait]
pub trait RpcChannel: Send + Sync {
    /// Send one request and wait for its reply
    ///
    /// `Ok(None)` means the peer answered without a message.
    async fn unary(
        &self,
        method: RpcMethod,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<Option<Vec<u8>>, RpcStatus>;

    /// Send one request and read a stream of replies
    ///
    /// Reads are bounded by `deadline` measured from this call.
    async fn server_stream(
        &self,
        method: RpcMethod,
        payload: Vec<u8>,
        deadline: Duration,
    ) -> Result<ItemStream, RpcStatus>;

    /// Close the channel, waiting at most `wait`
    async fn shutdown(&self, wait: Duration) -> Result<(), RpcStatus>;

    /// Human-readable peer address
    fn target(&self) -> String;
}

/// Factory for opening channels
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Open a channel to `host:port`
    async fn open(&self, host: &str, port: u16) -> Result<Arc<dyn RpcChannel>, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
