//! The cache box: one ownership ledger behind load, create and release.
//!
//! A [`CacheBox`] is owned by exactly one host. Callers load resources
//! (synchronously or through the async loader), create them in the world,
//! and may release individual entries early. When the owner stops, the box
//! tears down in a fixed order:
//!
//! ```text
//!  Active ──teardown()──► TearingDown ──────────────────────► Torn
//!                          1. destroy_all  (created entries)
//!                          2. unload_all   (reset references)
//!                          3. clear ledger
//! ```
//!
//! Created instances are released before lazy references are reset, since
//! disposing an instance may still touch something that was loaded through
//! a reference.
//!
//! # Failure reporting
//!
//! Public operations return `Option`/`bool` and log. Internally every
//! operation is a `try_*` returning [`CacheBoxError`]; the public wrapper logs
//! the error at its [`severity`](CacheBoxError::severity) with the box
//! identity attached.
//!
//! # Async completion
//!
//! The callback registered with the loader captures only a weak reference to
//! the box. If the box is gone or no longer active when the batch completes,
//! the callback does nothing, including not calling the caller's completion.

mod create;
mod error;
mod load;
mod release;
mod state;

pub use error::CacheBoxError;
pub use state::BoxState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn, Level};

use crate::ledger::{LedgerStats, OwnershipLedger};
use crate::loader::AsyncLoadService;
use crate::store::Resolver;
use crate::world::World;

static NEXT_BOX_INDEX: AtomicU64 = AtomicU64::new(0);

/// Collaborators a cache box works through.
#[derive(Clone)]
pub struct BoxServices {
    pub resolver: Arc<dyn Resolver>,
    pub loader: Arc<dyn AsyncLoadService>,
    pub world: Arc<World>,
}

impl BoxServices {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        loader: Arc<dyn AsyncLoadService>,
        world: Arc<World>,
    ) -> Self {
        Self {
            resolver,
            loader,
            world,
        }
    }
}

pub(crate) struct BoxShared {
    self_name: String,
    identity: String,
    state: Mutex<BoxState>,
    ledger: Mutex<OwnershipLedger>,
    services: BoxServices,
}

impl BoxShared {
    fn state(&self) -> BoxState {
        *self.state.lock()
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), CacheBoxError> {
        let state = self.state();
        if state.is_active() {
            Ok(())
        } else {
            Err(CacheBoxError::PostTeardown { state, operation })
        }
    }

    fn report(&self, operation: &'static str, err: &CacheBoxError) {
        match err.severity() {
            Level::ERROR => error!(box_id = %self.identity, operation, error = %err, "Cache box operation failed"),
            Level::WARN => warn!(box_id = %self.identity, operation, error = %err, "Cache box operation failed"),
            _ => debug!(box_id = %self.identity, operation, error = %err, "Cache box operation skipped"),
        }
    }
}

/// Per-owner resource container.
pub struct CacheBox {
    shared: Arc<BoxShared>,
}

impl CacheBox {
    /// Create an active box for `owner_name`.
    pub fn new(owner_name: impl Into<String>, services: BoxServices) -> Self {
        let owner_name = owner_name.into();
        let self_name = format!(
            "CacheBox_{}",
            NEXT_BOX_INDEX.fetch_add(1, Ordering::Relaxed)
        );
        let identity = format!("OuterName: {} SelfName: {}", owner_name, self_name);
        info!(box_id = %identity, "Cache box created");
        Self {
            shared: Arc::new(BoxShared {
                self_name,
                identity,
                state: Mutex::new(BoxState::Active),
                ledger: Mutex::new(OwnershipLedger::new()),
                services,
            }),
        }
    }

    /// Diagnostic identity, `OuterName: <owner> SelfName: <box>`.
    pub fn identity(&self) -> &str {
        &self.shared.identity
    }

    pub fn state(&self) -> BoxState {
        self.shared.state()
    }

    pub fn stats(&self) -> LedgerStats {
        self.shared.ledger.lock().stats()
    }

    /// Run the teardown sequence.
    ///
    /// Returns true only for the call that performed it; later calls are
    /// no-ops.
    pub fn teardown(&self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if !state.can_transition_to(BoxState::TearingDown) {
                debug!(box_id = %self.shared.identity, state = %*state, "Teardown already ran");
                return false;
            }
            *state = BoxState::TearingDown;
        }

        let before = self.stats();
        let destroyed = self.destroy_all_unchecked();
        self.unload_all_unchecked();
        self.shared.ledger.lock().clear_all();
        *self.shared.state.lock() = BoxState::Torn;

        info!(
            box_id = %self.shared.identity,
            destroyed,
            released = before.loaded,
            "Cache box torn down"
        );
        true
    }
}

impl Drop for CacheBox {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for CacheBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBox")
            .field("identity", &self.shared.identity)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
