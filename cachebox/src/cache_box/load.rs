//! Loading surface: synchronous and asynchronous, objects and types.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{BoxShared, CacheBox, CacheBoxError};
use crate::reference::LazyReference;
use crate::resource::{ClassHandle, Held, Managed, Resource, ResourceClass, WeakHandle};

impl BoxShared {
    fn try_load_object(
        &self,
        reference: &LazyReference,
    ) -> Result<WeakHandle<Resource>, CacheBoxError> {
        if reference.is_null() {
            return Err(CacheBoxError::InvalidInput("empty object reference".to_string()));
        }
        let held = reference
            .load_synchronous(self.services.resolver.as_ref())
            .map_err(|e| resolution(reference, e.to_string()))?;
        let Held::Object(resource) = held else {
            return Err(resolution(reference, "resolved to a type, not an object".to_string()));
        };
        if !resource.is_valid() {
            return Err(resolution(reference, "resolved object is not valid".to_string()));
        }
        self.record_object(reference, Arc::clone(&resource));
        Ok(WeakHandle::new(&resource))
    }

    fn try_load_class(
        &self,
        reference: &LazyReference,
        base: &ClassHandle,
    ) -> Result<WeakHandle<ResourceClass>, CacheBoxError> {
        if reference.is_null() {
            return Err(CacheBoxError::InvalidInput("empty class reference".to_string()));
        }
        if !base.is_valid() {
            return Err(CacheBoxError::InvalidInput(format!(
                "base class {} is not valid",
                base.name()
            )));
        }
        let held = reference
            .load_synchronous(self.services.resolver.as_ref())
            .map_err(|e| resolution(reference, e.to_string()))?;
        let Held::Type(class) = held else {
            return Err(resolution(reference, "resolved to an object, not a type".to_string()));
        };
        if !class.is_child_of(base) {
            return Err(resolution(
                reference,
                format!("{} is not a child of {}", class.name(), base.name()),
            ));
        }
        self.record_class(reference, Arc::clone(&class));
        Ok(WeakHandle::new(&class))
    }

    fn record_object(&self, reference: &LazyReference, resource: Arc<Resource>) {
        let id = resource.id();
        let mut ledger = self.ledger.lock();
        let fresh = ledger.record_loaded(Held::Object(resource));
        ledger.record_loaded_ref(reference.clone(), id);
        debug!(box_id = %self.identity, path = %reference.path(), id = %id, fresh, "Loaded object");
    }

    fn record_class(&self, reference: &LazyReference, class: ClassHandle) {
        let id = class.id();
        let mut ledger = self.ledger.lock();
        let fresh = ledger.record_loaded(Held::Type(class));
        ledger.record_loaded_type_ref(reference.clone(), id);
        debug!(box_id = %self.identity, path = %reference.path(), id = %id, fresh, "Loaded class");
    }

    /// Record the outcome of one async object element. Elements that did not
    /// resolve, or went stale before completion, are skipped.
    fn record_async_object(&self, reference: &LazyReference) -> bool {
        match reference.get() {
            Some(Held::Object(resource)) => {
                self.record_object(reference, resource);
                true
            }
            _ => {
                debug!(box_id = %self.identity, path = %reference.path(), "Async element did not resolve to a live object");
                false
            }
        }
    }

    fn record_async_class(&self, reference: &LazyReference, base: &ClassHandle) -> bool {
        match reference.get() {
            Some(Held::Type(class)) if base.is_valid() && class.is_child_of(base) => {
                self.record_class(reference, class);
                true
            }
            _ => {
                debug!(box_id = %self.identity, path = %reference.path(), base = %base.name(), "Async element did not resolve to a matching class");
                false
            }
        }
    }

    /// Drop empty references from a batch, logging each one.
    fn non_empty(&self, references: &[LazyReference], operation: &'static str) -> Vec<LazyReference> {
        references
            .iter()
            .filter(|reference| {
                if reference.is_null() {
                    warn!(box_id = %self.identity, operation, "Skipping empty reference in batch");
                    false
                } else {
                    true
                }
            })
            .cloned()
            .collect()
    }
}

fn resolution(reference: &LazyReference, reason: String) -> CacheBoxError {
    CacheBoxError::Resolution {
        path: reference.path().to_string(),
        reason,
    }
}

impl CacheBox {
    /// Resolve `reference` now and hold the resulting object.
    pub fn load_object(&self, reference: &LazyReference) -> Option<WeakHandle<Resource>> {
        const OP: &str = "load_object";
        let shared = &self.shared;
        shared
            .ensure_active(OP)
            .and_then(|()| shared.try_load_object(reference))
            .map_err(|e| shared.report(OP, &e))
            .ok()
    }

    /// Load every non-empty reference; failures are logged and skipped.
    pub fn load_objects(&self, references: &[LazyReference]) -> Vec<WeakHandle<Resource>> {
        const OP: &str = "load_objects";
        let shared = &self.shared;
        if let Err(e) = shared.ensure_active(OP) {
            shared.report(OP, &e);
            return Vec::new();
        }
        shared
            .non_empty(references, OP)
            .iter()
            .filter_map(|reference| {
                shared
                    .try_load_object(reference)
                    .map_err(|e| shared.report(OP, &e))
                    .ok()
            })
            .collect()
    }

    /// Resolve a type reference and hold it if it is a `base`.
    pub fn load_class(
        &self,
        reference: &LazyReference,
        base: &ClassHandle,
    ) -> Option<WeakHandle<ResourceClass>> {
        const OP: &str = "load_class";
        let shared = &self.shared;
        shared
            .ensure_active(OP)
            .and_then(|()| shared.try_load_class(reference, base))
            .map_err(|e| shared.report(OP, &e))
            .ok()
    }

    pub fn load_classes(
        &self,
        references: &[LazyReference],
        base: &ClassHandle,
    ) -> Vec<WeakHandle<ResourceClass>> {
        const OP: &str = "load_classes";
        let shared = &self.shared;
        if let Err(e) = shared.ensure_active(OP) {
            shared.report(OP, &e);
            return Vec::new();
        }
        shared
            .non_empty(references, OP)
            .iter()
            .filter_map(|reference| {
                shared
                    .try_load_class(reference, base)
                    .map_err(|e| shared.report(OP, &e))
                    .ok()
            })
            .collect()
    }

    /// Load one object in the background.
    ///
    /// An empty reference calls `on_complete` before returning.
    pub fn request_async_load_object<F>(&self, reference: &LazyReference, on_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.request_async_load_objects(std::slice::from_ref(reference), on_complete);
    }

    /// Load a batch of objects in the background.
    ///
    /// `on_complete` runs once, after every element of this batch has been
    /// recorded.
    pub fn request_async_load_objects<F>(&self, references: &[LazyReference], on_complete: F)
    where
        F: FnOnce() + Send + 'static,
    {
        const OP: &str = "request_async_load_objects";
        let shared = &self.shared;
        if let Err(e) = shared.ensure_active(OP) {
            shared.report(OP, &e);
            return;
        }
        let batch = shared.non_empty(references, OP);
        if batch.is_empty() {
            on_complete();
            return;
        }

        debug!(box_id = %shared.identity, count = batch.len(), "Requesting async object load");
        let weak = Arc::downgrade(&self.shared);
        let elements = batch.clone();
        shared.services.loader.request_async_load(
            batch,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else { return };
                if shared.ensure_active(OP).is_err() {
                    debug!(box_id = %shared.identity, "Async batch completed after teardown; discarded");
                    return;
                }
                let recorded = elements
                    .iter()
                    .filter(|reference| shared.record_async_object(reference))
                    .count();
                debug!(box_id = %shared.identity, recorded, requested = elements.len(), "Async object batch complete");
                on_complete();
            }),
        );
    }

    /// Load one type in the background and hold it if it is a `base`.
    pub fn request_async_load_class<F>(
        &self,
        reference: &LazyReference,
        base: &ClassHandle,
        on_complete: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        self.request_async_load_classes(std::slice::from_ref(reference), base, on_complete);
    }

    pub fn request_async_load_classes<F>(
        &self,
        references: &[LazyReference],
        base: &ClassHandle,
        on_complete: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        const OP: &str = "request_async_load_classes";
        let shared = &self.shared;
        if let Err(e) = shared.ensure_active(OP) {
            shared.report(OP, &e);
            return;
        }
        let batch = shared.non_empty(references, OP);
        if batch.is_empty() {
            on_complete();
            return;
        }

        debug!(box_id = %shared.identity, count = batch.len(), base = %base.name(), "Requesting async class load");
        let weak = Arc::downgrade(&self.shared);
        let elements = batch.clone();
        let base = Arc::clone(base);
        shared.services.loader.request_async_load(
            batch,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else { return };
                if shared.ensure_active(OP).is_err() {
                    debug!(box_id = %shared.identity, "Async batch completed after teardown; discarded");
                    return;
                }
                let recorded = elements
                    .iter()
                    .filter(|reference| shared.record_async_class(reference, &base))
                    .count();
                debug!(box_id = %shared.identity, recorded, requested = elements.len(), "Async class batch complete");
                on_complete();
            }),
        );
    }
}
