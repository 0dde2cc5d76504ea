//! Asynchronous loading of lazy references.
//!
//! The [`AsyncLoadService`] contract: resolve a batch of references in the
//! background and invoke the batch's completion exactly once after every
//! element has been resolved or found unresolvable. An empty batch completes
//! synchronously, before the request returns.
//!
//! # Architecture
//!
//! ```text
//! owner thread                      tokio runtime
//! ─────────────                     ─────────────
//! request_async_load(batch) ──────► resolve each ref (bounded, concurrent)
//!                                          │
//!                                          ▼ all done
//!                                   completion queue
//! pump() / flush() ◄──────────────────────┘
//!   └─► completion()                runs on the owner thread only
//! ```
//!
//! Resolution work happens off the owner thread; completions never do. The
//! owner drains them with [`StreamableLoader::pump`] or [`StreamableLoader::flush`],
//! so the state a completion touches is only ever mutated from one thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tracing::{debug, warn};

use crate::reference::LazyReference;
use crate::store::Resolver;

/// Default bound on concurrent resolutions.
pub const DEFAULT_MAX_CONCURRENT_LOADS: usize = 16;

/// Completion notification for one batch.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Background resolution of lazy references.
pub trait AsyncLoadService: Send + Sync {
    /// Resolve `references` and invoke `on_complete` exactly once when all of
    /// them are done. Must call `on_complete` before returning if the batch
    /// is empty.
    fn request_async_load(&self, references: Vec<LazyReference>, on_complete: Completion);
}

/// Configuration for [`StreamableLoader`].
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    /// Artificial I/O latency applied to each resolution.
    pub latency: Duration,

    /// Maximum resolutions running at once.
    pub max_concurrent_loads: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            max_concurrent_loads: DEFAULT_MAX_CONCURRENT_LOADS,
        }
    }
}

impl LoaderConfig {
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_max_concurrent_loads(mut self, max: usize) -> Self {
        self.max_concurrent_loads = max.max(1);
        self
    }
}

/// Tokio-backed [`AsyncLoadService`] with an owner-drained completion queue.
pub struct StreamableLoader {
    resolver: Arc<dyn Resolver>,
    config: LoaderConfig,
    runtime: Handle,
    permits: Arc<Semaphore>,
    completed_tx: mpsc::UnboundedSender<Completion>,
    completed_rx: Mutex<mpsc::UnboundedReceiver<Completion>>,
    in_flight: AtomicUsize,
}

impl StreamableLoader {
    /// Create a loader that resolves through `resolver` on `runtime`.
    pub fn new(resolver: Arc<dyn Resolver>, config: LoaderConfig, runtime: Handle) -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            resolver,
            permits: Arc::new(Semaphore::new(config.max_concurrent_loads.max(1))),
            config,
            runtime,
            completed_tx,
            completed_rx: Mutex::new(completed_rx),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Create a loader on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn on_current_runtime(resolver: Arc<dyn Resolver>, config: LoaderConfig) -> Self {
        Self::new(resolver, config, Handle::current())
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Batches whose completion has not been delivered yet.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Deliver every completion that is ready, without waiting.
    ///
    /// Returns the number of completions invoked.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = match self.completed_rx.try_lock() {
                Ok(mut rx) => rx.try_recv().ok(),
                Err(_) => None,
            };
            let Some(completion) = next else { break };
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Deliver completions until no batch is in flight.
    ///
    /// Completions that issue new requests extend the wait.
    pub async fn flush(&self) -> usize {
        let mut delivered = 0;
        while self.pending() > 0 {
            let next = {
                let mut rx = self.completed_rx.lock().await;
                rx.recv().await
            };
            match next {
                Some(completion) => {
                    self.deliver(completion);
                    delivered += 1;
                }
                None => break,
            }
        }
        delivered
    }

    fn deliver(&self, completion: Completion) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        completion();
    }
}

impl AsyncLoadService for StreamableLoader {
    fn request_async_load(&self, references: Vec<LazyReference>, on_complete: Completion) {
        if references.is_empty() {
            on_complete();
            return;
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        debug!(count = references.len(), "Async load batch queued");

        let resolver = Arc::clone(&self.resolver);
        let permits = Arc::clone(&self.permits);
        let latency = self.config.latency;
        let completed_tx = self.completed_tx.clone();

        self.runtime.spawn(async move {
            let resolutions = references.into_iter().map(|reference| {
                let resolver = Arc::clone(&resolver);
                let permits = Arc::clone(&permits);
                async move {
                    let _permit = permits.acquire().await.ok();
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    if let Err(e) = reference.load_synchronous(resolver.as_ref()) {
                        debug!(path = %reference.path(), error = %e, "Async resolution failed");
                    }
                }
            });
            join_all(resolutions).await;

            if completed_tx.send(on_complete).is_err() {
                warn!("Loader dropped before batch completion could be delivered");
            }
        });
    }
}
