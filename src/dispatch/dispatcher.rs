//! Worker pool executing submitted units of work in FIFO order

use crate::error::{EngineError, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Configuration for the call dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of worker tasks
    pub workers: usize,
    /// Queued units before `submit` starts waiting
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 64,
        }
    }
}

/// Completion handle for a submitted unit
///
/// Await it from async code or `wait()` on it from a plain thread.
pub struct CallHandle<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> CallHandle<T> {
    /// Block the current thread until the unit completes
    ///
    /// Must not be used on a runtime worker thread.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T> Future for CallHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the unit panicked or was never run
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(EngineError::Cancelled)))
    }
}

/// Shared worker pool for engine calls
pub struct Dispatcher {
    queue: RwLock<Option<mpsc::Sender<Job>>>,
    workers: usize,
}

impl Dispatcher {
    /// Start `workers` worker tasks on the current runtime
    ///
    /// Fails when called outside a tokio runtime.
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self> {
        if workers == 0 {
            return Err(EngineError::InvalidArgument(
                "Dispatcher needs at least one worker".into(),
            ));
        }
        if queue_capacity == 0 {
            return Err(EngineError::InvalidArgument(
                "Dispatcher queue capacity must be positive".into(),
            ));
        }

        let runtime = Handle::try_current().map_err(|_| {
            EngineError::InvalidArgument("Dispatcher must be created inside a tokio runtime".into())
        })?;

        let (tx, rx) = mpsc::channel::<Job>(queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        for id in 0..workers {
            runtime.spawn(worker_loop(id, rx.clone()));
        }
        debug!(
            "[DISPATCH] Started {} workers (queue capacity {})",
            workers, queue_capacity
        );

        Ok(Self {
            queue: RwLock::new(Some(tx)),
            workers,
        })
    }

    pub fn from_config(config: &DispatcherConfig) -> Result<Self> {
        Self::new(config.workers, config.queue_capacity)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a unit of work
    ///
    /// Waits for room when the queue is full.
    pub async fn submit<T, F>(&self, unit: F) -> Result<CallHandle<T>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let sender = self
            .queue
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(EngineError::DispatcherClosed)?;

        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            match AssertUnwindSafe(unit).catch_unwind().await {
                Ok(result) => {
                    // Receiver may have been dropped by an uninterested caller
                    let _ = tx.send(result);
                }
                Err(_) => error!("[DISPATCH] Unit of work panicked"),
            }
        });

        sender
            .send(job)
            .await
            .map_err(|_| EngineError::DispatcherClosed)?;
        Ok(CallHandle { rx })
    }

    /// Stop accepting work; already queued units still run
    pub fn shutdown(&self) {
        let closed = self
            .queue
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if closed.is_some() {
            debug!("[DISPATCH] Shutting down");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.queue
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

async fn worker_loop(id: usize, queue: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = queue.lock().await.recv().await;
        match job {
            Some(job) => job.await,
            None => break,
        }
    }
    debug!("[DISPATCH] Worker {} stopped", id);
}
