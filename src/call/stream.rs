//! Streaming result handle

use crate::error::{EngineError, Result, RpcStatus};
use crate::transport::RpcChannel;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, warn};

/// Server-stream cursor that owns the channel it reads from
///
/// The channel is shut down once the stream ends or fails, when `close` is
/// called, or when the handle is dropped.
pub struct StreamHandle<T> {
    channel: Option<Arc<dyn RpcChannel>>,
    items: BoxStream<'static, std::result::Result<T, RpcStatus>>,
    exhausted: bool,
    close_wait: Duration,
}

impl<T> StreamHandle<T> {
    pub fn new(
        channel: Arc<dyn RpcChannel>,
        items: BoxStream<'static, std::result::Result<T, RpcStatus>>,
        close_wait: Duration,
    ) -> Self {
        Self {
            channel: Some(channel),
            items,
            exhausted: false,
            close_wait,
        }
    }

    /// Next item, `None` once the stream has ended
    pub async fn next(&mut self) -> Option<Result<T>> {
        StreamExt::next(self).await
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Stop reading and shut the channel down, waiting at most `wait`
    pub async fn close(mut self, wait: Duration) -> Result<()> {
        self.exhausted = true;
        match self.channel.take() {
            Some(channel) => channel.shutdown(wait).await.map_err(EngineError::from),
            None => Ok(()),
        }
    }

    /// Shut the channel down in the background
    fn release(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        let wait = self.close_wait;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = channel.shutdown(wait).await {
                        warn!("[CALL] Closing stream channel {} failed: {}", channel.target(), e);
                    }
                });
            }
            Err(_) => debug!("[CALL] No runtime to close stream channel, dropping it"),
        }
    }
}

impl<T> Stream for StreamHandle<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.exhausted {
            return Poll::Ready(None);
        }
        match self.items.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(status))) => {
                self.exhausted = true;
                self.release();
                Poll::Ready(Some(Err(status.into())))
            }
            Poll::Ready(None) => {
                self.exhausted = true;
                self.release();
                Poll::Ready(None)
            }
        }
    }
}

impl<T> Drop for StreamHandle<T> {
    fn drop(&mut self) {
        self.release();
    }
}
