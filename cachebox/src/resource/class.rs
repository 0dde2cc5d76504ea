//! Resource classes and the is-a hierarchy.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Managed, ResourceId};

/// Shared handle to a class. Classes are themselves loadable resources.
pub type ClassHandle = Arc<ResourceClass>;

/// Teardown-relevant category of a class.
///
/// The cache box picks its destruction strategy from this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Plain object: destroyed immediately or marked for collection.
    Object,
    /// Display element: detached from its presentation parent.
    DisplayElement,
    /// Entity spawned into a world: told to despawn.
    SpawnedEntity,
    /// Parameter set derived from another resource.
    ParameterSet,
}

impl Category {
    /// Name used in catalogs and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Object => "object",
            Category::DisplayElement => "display",
            Category::SpawnedEntity => "entity",
            Category::ParameterSet => "parameter_set",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "object" => Ok(Category::Object),
            "display" | "display_element" | "widget" => Ok(Category::DisplayElement),
            "entity" | "spawned_entity" | "actor" => Ok(Category::SpawnedEntity),
            "parameter_set" | "parameters" => Ok(Category::ParameterSet),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource type.
///
/// A child class inherits its parent's category. A class is a child of
/// itself, so `is_child_of` doubles as the capability check at load time.
#[derive(Debug)]
pub struct ResourceClass {
    id: ResourceId,
    name: String,
    category: Category,
    parent: Option<ClassHandle>,
    is_abstract: bool,
    valid: AtomicBool,
}

impl ResourceClass {
    /// Create a root class.
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            id: ResourceId::next(),
            name: name.into(),
            category,
            parent: None,
            is_abstract: false,
            valid: AtomicBool::new(true),
        }
    }

    /// Create a class deriving from `parent`, inheriting its category.
    pub fn derived(name: impl Into<String>, parent: &ClassHandle) -> Self {
        Self {
            category: parent.category,
            parent: Some(Arc::clone(parent)),
            ..Self::new(name, parent.category)
        }
    }

    /// Mark the class abstract; abstract classes cannot be instantiated.
    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn parent(&self) -> Option<&ClassHandle> {
        self.parent.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Returns true if `self` is `base` or inherits from it.
    pub fn is_child_of(&self, base: &ResourceClass) -> bool {
        if self.id == base.id {
            return true;
        }
        let mut current = self.parent.as_ref();
        while let Some(class) = current {
            if class.id == base.id {
                return true;
            }
            current = class.parent.as_ref();
        }
        false
    }

    /// Invalidate the class, as when its defining asset is unloaded.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl Managed for ResourceClass {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}
