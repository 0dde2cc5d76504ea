//! Managed resources: identities, classes, instances and weak views.
//!
//! Resources live under engine-style garbage collection. A handle can become
//! invalid between two calls without anyone freeing it explicitly (a world
//! closes, an asset is evicted, an instance is marked for collection), so
//! every consumer re-checks liveness through [`Managed::is_valid`] before use.
//!
//! # Architecture
//!
//! ```text
//! ResourceClass ──(is_child_of)──► ResourceClass      type hierarchy
//!       │
//!       ▼
//!   Resource  ◄── Handle (Arc, strong)                owned by ledger/store
//!             ◄── WeakHandle (non-owning view)        handed to callers
//! ```
//!
//! The ownership ledger keeps heterogeneous entries through the tagged
//! [`Held`] variant instead of a type-erased trait object list.

mod class;
mod handle;
mod instance;

pub use class::{Category, ClassHandle, ResourceClass};
pub use handle::{Held, WeakHandle, WeakHeld};
pub use instance::{Disposal, Handle, Lifecycle, Resource};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a resource or class.
///
/// Ledger sets are keyed by this id, which stands in for pointer equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logs and diagnostics.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Common surface of everything the ledger can hold.
pub trait Managed: Send + Sync + 'static {
    /// Identity used by ledger sets.
    fn id(&self) -> ResourceId;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Liveness check. Must be consulted before every use of a handle.
    fn is_valid(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_ids_are_unique_and_increasing() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_resource_id_display() {
        let id = ResourceId(42);
        assert_eq!(id.to_string(), "#42");
        assert_eq!(id.as_u64(), 42);
    }
}
