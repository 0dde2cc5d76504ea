//! Non-owning views and the tagged strong variant kept by the ledger.

use std::fmt;
use std::sync::{Arc, Weak};

use super::{ClassHandle, Handle, Managed, Resource, ResourceClass, ResourceId};

/// Non-owning view of a managed resource.
///
/// Never keeps its target alive. `get()` only yields the target while it is
/// still valid, which is the check every caller must make before use.
pub struct WeakHandle<T: Managed> {
    id: ResourceId,
    inner: Weak<T>,
}

impl<T: Managed> WeakHandle<T> {
    pub fn new(strong: &Arc<T>) -> Self {
        Self {
            id: strong.id(),
            inner: Arc::downgrade(strong),
        }
    }

    /// Identity of the target, available even after it is gone.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Upgrade regardless of validity.
    pub fn upgrade(&self) -> Option<Arc<T>> {
        self.inner.upgrade()
    }

    /// Upgrade only if the target is still valid.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.upgrade().filter(|target| target.is_valid())
    }

    pub fn is_valid(&self) -> bool {
        self.get().is_some()
    }
}

impl<T: Managed> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: Managed> PartialEq for WeakHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Managed> Eq for WeakHandle<T> {}

impl<T: Managed> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("id", &self.id)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// A strongly held loaded entry: either an instance or a class.
#[derive(Debug, Clone)]
pub enum Held {
    Object(Handle),
    Type(ClassHandle),
}

impl Held {
    pub fn id(&self) -> ResourceId {
        match self {
            Held::Object(resource) => resource.id(),
            Held::Type(class) => class.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Held::Object(resource) => resource.name(),
            Held::Type(class) => class.name(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Held::Object(resource) => resource.is_valid(),
            Held::Type(class) => class.is_valid(),
        }
    }

    pub fn downgrade(&self) -> WeakHeld {
        match self {
            Held::Object(resource) => WeakHeld::Object(WeakHandle::new(resource)),
            Held::Type(class) => WeakHeld::Type(WeakHandle::new(class)),
        }
    }
}

/// Non-owning counterpart of [`Held`], stored in lazy references.
#[derive(Debug, Clone)]
pub enum WeakHeld {
    Object(WeakHandle<Resource>),
    Type(WeakHandle<ResourceClass>),
}

impl WeakHeld {
    pub fn id(&self) -> ResourceId {
        match self {
            WeakHeld::Object(handle) => handle.id(),
            WeakHeld::Type(handle) => handle.id(),
        }
    }

    /// Upgrade to a strong entry if the target is still alive and valid.
    pub fn get(&self) -> Option<Held> {
        match self {
            WeakHeld::Object(handle) => handle.get().map(Held::Object),
            WeakHeld::Type(handle) => handle.get().map(Held::Type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Category;

    #[test]
    fn test_weak_handle_does_not_keep_target_alive() {
        let class = Arc::new(ResourceClass::new("Object", Category::Object));
        let strong = Arc::new(Resource::new("Thing", &class, "Outer"));
        let weak = WeakHandle::new(&strong);
        assert!(weak.is_valid());

        drop(strong);
        assert!(!weak.is_valid());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_weak_handle_get_filters_invalid_targets() {
        let class = Arc::new(ResourceClass::new("Object", Category::Object));
        let strong = Arc::new(Resource::new("Thing", &class, "Outer"));
        let weak = WeakHandle::new(&strong);

        strong.mark_for_collection();
        assert!(weak.upgrade().is_some());
        assert!(weak.get().is_none());
    }

    #[test]
    fn test_held_round_trip_through_weak() {
        let class = Arc::new(ResourceClass::new("Object", Category::Object));
        let held = Held::Type(Arc::clone(&class));
        let weak = held.downgrade();
        assert_eq!(weak.id(), class.id());
        assert_eq!(weak.get().map(|h| h.id()), Some(class.id()));

        class.invalidate();
        assert!(weak.get().is_none());
    }
}
