//! Release surface and the destruction dispatch.

use tracing::debug;

use super::{BoxShared, CacheBox, CacheBoxError};
use crate::reference::LazyReference;
use crate::resource::{Category, Disposal, Managed, Resource, WeakHandle};

impl BoxShared {
    /// Apply the category's teardown strategy to a live resource.
    fn dispose(&self, resource: &Resource, pure: bool) -> Disposal {
        let world = &self.services.world;
        match resource.class().category() {
            Category::DisplayElement => world.remove_from_parent(resource),
            Category::SpawnedEntity => world.despawn(resource),
            Category::Object | Category::ParameterSet if pure => resource.destroy(),
            Category::Object | Category::ParameterSet => resource.mark_for_collection(),
        }
        let disposal = resource.disposal().unwrap_or(Disposal::Destroyed);
        debug!(box_id = %self.identity, id = %resource.id(), ?disposal, "Disposed resource");
        disposal
    }

    fn try_destroy_one(
        &self,
        handle: &WeakHandle<Resource>,
        pure: bool,
    ) -> Result<Disposal, CacheBoxError> {
        // Forget the entry before disposing so no later pass can reach it again.
        let released = self.ledger.lock().release_created(handle.id());
        let target = released
            .or_else(|| handle.upgrade())
            .filter(|resource| resource.is_valid())
            .ok_or(CacheBoxError::StaleHandle(handle.id()))?;
        Ok(self.dispose(&target, pure))
    }

    fn try_unload(
        &self,
        reference: &LazyReference,
        type_ref: bool,
    ) -> Result<(), CacheBoxError> {
        let stored = {
            let mut ledger = self.ledger.lock();
            if type_ref {
                ledger.release_loaded_type(reference)
            } else {
                match ledger.loaded_ref_id(reference) {
                    Some(id) => ledger.release_loaded(id, reference),
                    None => None,
                }
            }
        };
        let Some(stored) = stored else {
            return Err(CacheBoxError::InvalidInput(format!(
                "{} was never loaded by this box",
                reference.path()
            )));
        };
        stored.reset();
        reference.reset();
        debug!(box_id = %self.identity, path = %reference.path(), "Unloaded reference");
        Ok(())
    }
}

impl CacheBox {
    /// Release one created resource and dispose of it.
    ///
    /// Display elements are detached, entities despawned, anything else is
    /// destroyed when `pure` is set and marked for collection otherwise.
    /// Returns false if the handle was already invalid.
    pub fn destroy_one(&self, handle: &WeakHandle<Resource>, pure: bool) -> bool {
        const OP: &str = "destroy_one";
        let shared = &self.shared;
        shared
            .ensure_active(OP)
            .and_then(|()| shared.try_destroy_one(handle, pure))
            .map_err(|e| shared.report(OP, &e))
            .is_ok()
    }

    /// Dispose of every created resource and empty the created set.
    ///
    /// Returns the number of resources disposed.
    pub fn destroy_all(&self) -> usize {
        const OP: &str = "destroy_all";
        if let Err(e) = self.shared.ensure_active(OP) {
            self.shared.report(OP, &e);
            return 0;
        }
        self.destroy_all_unchecked()
    }

    pub(super) fn destroy_all_unchecked(&self) -> usize {
        let shared = &self.shared;
        let snapshot = shared.ledger.lock().created_snapshot();
        let mut disposed = 0;
        for resource in &snapshot {
            if resource.is_valid() {
                shared.dispose(resource, true);
                disposed += 1;
            } else {
                shared.report("destroy_all", &CacheBoxError::StaleHandle(resource.id()));
            }
        }
        shared.ledger.lock().clear_created();
        debug!(box_id = %shared.identity, disposed, total = snapshot.len(), "Destroyed created resources");
        disposed
    }

    /// Stop holding the object loaded through `reference` and reset it.
    pub fn unload_one(&self, reference: &LazyReference) -> bool {
        self.unload("unload_one", reference, false)
    }

    /// Stop holding the type loaded through `reference` and reset it.
    pub fn unload_type(&self, reference: &LazyReference) -> bool {
        self.unload("unload_type", reference, true)
    }

    fn unload(&self, operation: &'static str, reference: &LazyReference, type_ref: bool) -> bool {
        let shared = &self.shared;
        if let Err(e) = shared.ensure_active(operation) {
            shared.report(operation, &e);
            return false;
        }
        match shared.try_unload(reference, type_ref) {
            Ok(()) => true,
            Err(e) => {
                // Unloading something never resolved is a no-op.
                debug!(box_id = %shared.identity, operation, error = %e, "Nothing to unload");
                false
            }
        }
    }

    /// Reset every held reference and forget every loaded entry.
    ///
    /// Loaded entries are not destroyed; the box only releases its hold.
    pub fn unload_all(&self) -> usize {
        const OP: &str = "unload_all";
        if let Err(e) = self.shared.ensure_active(OP) {
            self.shared.report(OP, &e);
            return 0;
        }
        self.unload_all_unchecked()
    }

    pub(super) fn unload_all_unchecked(&self) -> usize {
        let shared = &self.shared;
        let mut ledger = shared.ledger.lock();
        let references = ledger.loaded_references();
        for reference in &references {
            reference.reset();
        }
        ledger.clear_loaded();
        debug!(box_id = %shared.identity, count = references.len(), "Unloaded all references");
        references.len()
    }
}
