//! Creation surface.

use std::sync::Arc;

use tracing::debug;

use super::{BoxShared, CacheBox, CacheBoxError};
use crate::resource::{ClassHandle, Handle, Managed, Resource, WeakHandle};
use crate::world::{ConstructError, World};

impl BoxShared {
    fn try_create<C>(
        &self,
        class: &ClassHandle,
        construct: C,
    ) -> Result<WeakHandle<Resource>, CacheBoxError>
    where
        C: FnOnce(&World, &ClassHandle, &str) -> Result<Handle, ConstructError>,
    {
        if !class.is_valid() {
            return Err(CacheBoxError::InvalidInput(format!(
                "class {} is not valid",
                class.name()
            )));
        }
        let handle = construct(self.services.world.as_ref(), class, &self.self_name).map_err(|e| {
            CacheBoxError::Construction {
                class: class.name().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(self.record_created(handle))
    }

    fn record_created(&self, handle: Handle) -> WeakHandle<Resource> {
        let view = WeakHandle::new(&handle);
        debug!(
            box_id = %self.identity,
            id = %handle.id(),
            name = %handle.name(),
            category = %handle.class().category(),
            "Created resource"
        );
        self.ledger.lock().record_created(handle);
        view
    }
}

impl CacheBox {
    fn create_with<C>(
        &self,
        operation: &'static str,
        class: &ClassHandle,
        construct: C,
    ) -> Option<WeakHandle<Resource>>
    where
        C: FnOnce(&World, &ClassHandle, &str) -> Result<Handle, ConstructError>,
    {
        let shared = &self.shared;
        shared
            .ensure_active(operation)
            .and_then(|()| shared.try_create(class, construct))
            .map_err(|e| shared.report(operation, &e))
            .ok()
    }

    /// Construct an object of `class` and own it.
    pub fn create_resource(&self, class: &ClassHandle) -> Option<WeakHandle<Resource>> {
        self.create_with("create_resource", class, World::new_object)
    }

    /// Construct a display element attached to the world's presentation.
    pub fn create_display_element(&self, class: &ClassHandle) -> Option<WeakHandle<Resource>> {
        self.create_with("create_display_element", class, World::create_display_element)
    }

    /// Spawn an entity of `class` into the world.
    pub fn create_spawned_entity(&self, class: &ClassHandle) -> Option<WeakHandle<Resource>> {
        self.create_with("create_spawned_entity", class, World::spawn_entity)
    }

    /// Derive a parameter set from `base`, owned by `owner`.
    ///
    /// Construction itself cannot fail; only a torn-down box refuses.
    pub fn create_derived_parameter_set(
        &self,
        base: &Arc<Resource>,
        owner: &str,
    ) -> Option<WeakHandle<Resource>> {
        const OP: &str = "create_derived_parameter_set";
        let shared = &self.shared;
        if let Err(e) = shared.ensure_active(OP) {
            shared.report(OP, &e);
            return None;
        }
        let handle = shared.services.world.create_parameter_set(base, owner);
        Some(shared.record_created(handle))
    }
}
