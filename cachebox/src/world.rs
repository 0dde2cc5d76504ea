//! The owning context in which resources are constructed.
//!
//! A [`World`] constructs plain objects, display elements, spawned entities
//! and derived parameter sets on behalf of a cache box. It tracks the
//! entities it spawned and the display elements attached to it, so the
//! teardown strategies (`despawn`, `remove_from_parent`) have somewhere to
//! act. Closing the world stands in for "no world available": later
//! construction of world-bound resources fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::resource::{
    Category, ClassHandle, Handle, Managed, Resource, ResourceClass, ResourceId, WeakHandle,
};

/// Errors that can occur while constructing a resource.
#[derive(Debug, Error)]
pub enum ConstructError {
    #[error("class {0} is abstract")]
    Abstract(String),

    #[error("class {class} is not a {expected} class")]
    WrongCategory { class: String, expected: Category },

    #[error("world {0} is closed")]
    WorldClosed(String),

    #[error("class {0} is no longer valid")]
    InvalidClass(String),
}

/// Construction context for resources.
pub struct World {
    name: String,
    open: AtomicBool,
    entities: Mutex<HashMap<ResourceId, WeakHandle<Resource>>>,
    display: Mutex<HashMap<ResourceId, WeakHandle<Resource>>>,
    parameter_set_class: ClassHandle,
}

impl World {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open: AtomicBool::new(true),
            entities: Mutex::new(HashMap::new()),
            display: Mutex::new(HashMap::new()),
            parameter_set_class: Arc::new(ResourceClass::new(
                "ParameterSet",
                Category::ParameterSet,
            )),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Construct an object outside the world. Does not need an open world.
    ///
    /// Entities can only be spawned. Display elements built this way start
    /// detached.
    pub fn new_object(&self, class: &ClassHandle, outer: &str) -> Result<Handle, ConstructError> {
        check_constructible(class)?;
        if class.category() == Category::SpawnedEntity {
            return Err(ConstructError::WrongCategory {
                class: class.name().to_string(),
                expected: Category::Object,
            });
        }
        Ok(Arc::new(Resource::new(
            instance_name(class),
            class,
            outer,
        )))
    }

    /// Construct a display element and attach it to the world's presentation.
    pub fn create_display_element(
        &self,
        class: &ClassHandle,
        outer: &str,
    ) -> Result<Handle, ConstructError> {
        let resource = self.construct_bound(class, outer, Category::DisplayElement)?;
        resource.set_attached(true);
        self.display
            .lock()
            .insert(resource.id(), WeakHandle::new(&resource));
        debug!(world = %self.name, id = %resource.id(), "Display element attached");
        Ok(resource)
    }

    /// Spawn an entity into the world.
    pub fn spawn_entity(&self, class: &ClassHandle, outer: &str) -> Result<Handle, ConstructError> {
        let resource = self.construct_bound(class, outer, Category::SpawnedEntity)?;
        self.entities
            .lock()
            .insert(resource.id(), WeakHandle::new(&resource));
        debug!(world = %self.name, id = %resource.id(), "Entity spawned");
        Ok(resource)
    }

    /// Derive a parameter set from `base`. Always succeeds.
    pub fn create_parameter_set(&self, base: &Resource, outer: &str) -> Handle {
        let name = format!("{}_Params", base.name());
        Arc::new(Resource::new(name, &self.parameter_set_class, outer).with_derived_from(base.id()))
    }

    /// Despawn an entity and forget it.
    pub fn despawn(&self, resource: &Resource) {
        self.entities.lock().remove(&resource.id());
        resource.despawn();
    }

    /// Detach a display element from the presentation. It stays live.
    pub fn remove_from_parent(&self, resource: &Resource) {
        self.display.lock().remove(&resource.id());
        resource.remove_from_parent();
    }

    /// Close the world, despawning every entity and detaching every element.
    pub fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        let entities: Vec<_> = self.entities.lock().drain().map(|(_, h)| h).collect();
        for entity in entities.iter().filter_map(WeakHandle::get) {
            entity.despawn();
        }
        let elements: Vec<_> = self.display.lock().drain().map(|(_, h)| h).collect();
        for element in elements.iter().filter_map(WeakHandle::get) {
            element.remove_from_parent();
        }
        debug!(
            world = %self.name,
            entities = entities.len(),
            elements = elements.len(),
            "World closed"
        );
    }

    /// Live entities currently spawned.
    pub fn entity_count(&self) -> usize {
        self.entities.lock().values().filter(|h| h.is_valid()).count()
    }

    /// Display elements currently attached.
    pub fn attached_count(&self) -> usize {
        self.display
            .lock()
            .values()
            .filter_map(WeakHandle::get)
            .filter(|element| element.is_attached())
            .count()
    }

    fn construct_bound(
        &self,
        class: &ClassHandle,
        outer: &str,
        expected: Category,
    ) -> Result<Handle, ConstructError> {
        check_constructible(class)?;
        if class.category() != expected {
            return Err(ConstructError::WrongCategory {
                class: class.name().to_string(),
                expected,
            });
        }
        if !self.is_open() {
            return Err(ConstructError::WorldClosed(self.name.clone()));
        }
        Ok(Arc::new(Resource::new(
            instance_name(class),
            class,
            outer,
        )))
    }
}

fn check_constructible(class: &ClassHandle) -> Result<(), ConstructError> {
    if !class.is_valid() {
        return Err(ConstructError::InvalidClass(class.name().to_string()));
    }
    if class.is_abstract() {
        return Err(ConstructError::Abstract(class.name().to_string()));
    }
    Ok(())
}

fn instance_name(class: &ClassHandle) -> String {
    format!("{}_{}", class.name(), ResourceId::next().as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Disposal, Lifecycle};

    fn class(name: &str, category: Category) -> ClassHandle {
        Arc::new(ResourceClass::new(name, category))
    }

    #[test]
    fn test_new_object_rejects_abstract_and_wrong_category() {
        let world = World::new("TestWorld");
        let abstract_class =
            Arc::new(ResourceClass::new("Base", Category::Object).with_abstract(true));
        assert!(matches!(
            world.new_object(&abstract_class, "Owner"),
            Err(ConstructError::Abstract(_))
        ));
        assert!(matches!(
            world.new_object(&class("Pawn", Category::SpawnedEntity), "Owner"),
            Err(ConstructError::WrongCategory { .. })
        ));
        let menu = world
            .new_object(&class("Menu", Category::DisplayElement), "Owner")
            .unwrap();
        assert!(!menu.is_attached());
        let object = world.new_object(&class("Thing", Category::Object), "Owner").unwrap();
        assert_eq!(object.outer(), "Owner");
    }

    #[test]
    fn test_display_element_is_attached_and_detached() {
        let world = World::new("TestWorld");
        let element = world
            .create_display_element(&class("Menu", Category::DisplayElement), "Owner")
            .unwrap();
        assert!(element.is_attached());
        assert_eq!(world.attached_count(), 1);

        world.remove_from_parent(&element);
        assert!(!element.is_attached());
        assert!(element.is_valid());
        assert_eq!(world.attached_count(), 0);
    }

    #[test]
    fn test_closed_world_refuses_bound_construction() {
        let world = World::new("TestWorld");
        let entity = world
            .spawn_entity(&class("Pawn", Category::SpawnedEntity), "Owner")
            .unwrap();
        world.close();
        assert!(!world.is_open());
        assert_eq!(entity.lifecycle(), Lifecycle::Despawned);
        assert_eq!(entity.disposal(), Some(Disposal::Despawned));
        assert!(matches!(
            world.spawn_entity(&class("Pawn", Category::SpawnedEntity), "Owner"),
            Err(ConstructError::WorldClosed(_))
        ));
        // Plain objects do not need a world.
        assert!(world.new_object(&class("Thing", Category::Object), "Owner").is_ok());
    }

    #[test]
    fn test_parameter_set_records_base() {
        let world = World::new("TestWorld");
        let base = world.new_object(&class("Material", Category::Object), "Owner").unwrap();
        let params = world.create_parameter_set(&base, "Owner");
        assert_eq!(params.derived_from(), Some(base.id()));
        assert_eq!(params.class().category(), Category::ParameterSet);
    }

    #[test]
    fn test_invalid_class_is_rejected() {
        let world = World::new("TestWorld");
        let gone = class("Gone", Category::Object);
        gone.invalidate();
        assert!(matches!(
            world.new_object(&gone, "Owner"),
            Err(ConstructError::InvalidClass(_))
        ));
    }
}
