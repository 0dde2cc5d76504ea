//! Ownership bookkeeping for a cache box.
//!
//! Four disjoint sets:
//!
//! | Set              | Holds                          | Keyed by        |
//! |------------------|--------------------------------|-----------------|
//! | `created`        | strong handles the box built   | resource id     |
//! | `loaded`         | strong resolved entries        | resource id     |
//! | `loaded_refs`    | object references to reset     | path + kind     |
//! | `loaded_type_refs` | type references to reset     | path + kind     |
//!
//! Every `record_*` is an idempotent set insertion. Nothing here destroys or
//! invalidates anything; the cache box runs those passes and then asks the
//! ledger to forget.

use std::collections::HashMap;
use std::fmt;

use crate::reference::LazyReference;
use crate::resource::{Handle, Held, Managed, ResourceId};

/// Entry counts per set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub created: usize,
    pub loaded: usize,
    pub loaded_refs: usize,
    pub loaded_type_refs: usize,
}

impl LedgerStats {
    /// Strongly held entries (created plus loaded).
    pub fn total(&self) -> usize {
        self.created + self.loaded
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.loaded_refs == 0 && self.loaded_type_refs == 0
    }
}

impl fmt::Display for LedgerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} loaded={} refs={} type_refs={}",
            self.created, self.loaded, self.loaded_refs, self.loaded_type_refs
        )
    }
}

/// The set-based ledger owned by one cache box.
#[derive(Debug, Default)]
pub struct OwnershipLedger {
    created: HashMap<ResourceId, Handle>,
    loaded: HashMap<ResourceId, Held>,
    loaded_refs: HashMap<LazyReference, ResourceId>,
    loaded_type_refs: HashMap<LazyReference, ResourceId>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the handle was already recorded.
    pub fn record_created(&mut self, handle: Handle) -> bool {
        let id = handle.id();
        if self.created.contains_key(&id) || self.loaded.contains_key(&id) {
            return false;
        }
        self.created.insert(id, handle);
        true
    }

    /// Returns false if the entry was already recorded.
    pub fn record_loaded(&mut self, held: Held) -> bool {
        let id = held.id();
        if self.loaded.contains_key(&id) || self.created.contains_key(&id) {
            return false;
        }
        self.loaded.insert(id, held);
        true
    }

    /// Remember the object reference `id` was resolved from.
    ///
    /// A reference resolved again after its target was invalidated points at
    /// the new id; the old entry is dropped unless another reference holds it.
    pub fn record_loaded_ref(&mut self, reference: LazyReference, id: ResourceId) -> bool {
        let inserted = Self::insert_ref(&mut self.loaded_refs, reference, id);
        self.forget_replaced(inserted)
    }

    /// Remember the type reference `id` was resolved from.
    pub fn record_loaded_type_ref(&mut self, reference: LazyReference, id: ResourceId) -> bool {
        let inserted = Self::insert_ref(&mut self.loaded_type_refs, reference, id);
        self.forget_replaced(inserted)
    }

    /// `None` if already mapped to `id`, otherwise the id it replaced.
    fn insert_ref(
        refs: &mut HashMap<LazyReference, ResourceId>,
        reference: LazyReference,
        id: ResourceId,
    ) -> Option<Option<ResourceId>> {
        match refs.get(&reference) {
            Some(existing) if *existing == id => None,
            _ => {
                // Re-key so the stored reference is the one that resolved.
                let previous = refs.remove(&reference);
                refs.insert(reference, id);
                Some(previous)
            }
        }
    }

    fn forget_replaced(&mut self, inserted: Option<Option<ResourceId>>) -> bool {
        match inserted {
            None => false,
            Some(previous) => {
                if let Some(old) = previous {
                    self.drop_loaded_if_unreferenced(old);
                }
                true
            }
        }
    }

    /// Remove a created entry without destroying it.
    pub fn release_created(&mut self, id: ResourceId) -> Option<Handle> {
        self.created.remove(&id)
    }

    /// Remove a loaded object and its originating reference.
    ///
    /// Returns the stored reference so the caller can reset it.
    pub fn release_loaded(
        &mut self,
        id: ResourceId,
        reference: &LazyReference,
    ) -> Option<LazyReference> {
        let stored = match self.loaded_refs.get(reference) {
            Some(recorded) if *recorded == id => self
                .loaded_refs
                .remove_entry(reference)
                .map(|(stored, _)| stored),
            _ => None,
        };
        self.drop_loaded_if_unreferenced(id);
        stored
    }

    /// Remove a loaded type reference and the class it resolved to.
    pub fn release_loaded_type(&mut self, reference: &LazyReference) -> Option<LazyReference> {
        let (stored, id) = self.loaded_type_refs.remove_entry(reference)?;
        self.drop_loaded_if_unreferenced(id);
        Some(stored)
    }

    fn drop_loaded_if_unreferenced(&mut self, id: ResourceId) {
        let still_referenced = self
            .loaded_refs
            .values()
            .chain(self.loaded_type_refs.values())
            .any(|recorded| *recorded == id);
        if !still_referenced {
            self.loaded.remove(&id);
        }
    }

    /// Id recorded for an object reference.
    pub fn loaded_ref_id(&self, reference: &LazyReference) -> Option<ResourceId> {
        self.loaded_refs.get(reference).copied()
    }

    /// Id recorded for a type reference.
    pub fn loaded_type_ref_id(&self, reference: &LazyReference) -> Option<ResourceId> {
        self.loaded_type_refs.get(reference).copied()
    }

    /// Copy of the created set, in id order.
    pub fn created_snapshot(&self) -> Vec<Handle> {
        let mut handles: Vec<_> = self.created.values().cloned().collect();
        handles.sort_by_key(|handle| handle.id());
        handles
    }

    pub fn clear_created(&mut self) {
        self.created.clear();
    }

    /// Every recorded object and type reference.
    pub fn loaded_references(&self) -> Vec<LazyReference> {
        self.loaded_refs
            .keys()
            .chain(self.loaded_type_refs.keys())
            .cloned()
            .collect()
    }

    /// Forget every loaded entry and reference.
    pub fn clear_loaded(&mut self) {
        self.loaded.clear();
        self.loaded_refs.clear();
        self.loaded_type_refs.clear();
    }

    /// Empty every set without destroying anything.
    pub fn clear_all(&mut self) {
        self.clear_created();
        self.clear_loaded();
    }

    pub fn contains_created(&self, id: ResourceId) -> bool {
        self.created.contains_key(&id)
    }

    pub fn contains_loaded(&self, id: ResourceId) -> bool {
        self.loaded.contains_key(&id)
    }

    pub fn contains_loaded_ref(&self, reference: &LazyReference) -> bool {
        self.loaded_refs.contains_key(reference)
    }

    pub fn contains_loaded_type_ref(&self, reference: &LazyReference) -> bool {
        self.loaded_type_refs.contains_key(reference)
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            created: self.created.len(),
            loaded: self.loaded.len(),
            loaded_refs: self.loaded_refs.len(),
            loaded_type_refs: self.loaded_type_refs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stats().is_empty()
    }
}
