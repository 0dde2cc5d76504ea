//! Asset resolution.
//!
//! The [`Resolver`] trait is the seam through which lazy references become
//! live handles. [`AssetStore`] is the in-process implementation: it knows
//! which paths exist, memoises every resolution so the same path always
//! yields the same identity, and owns resolved assets independently of any
//! cache box. Unloading an entry from a box releases the box's hold only;
//! the store decides when an asset actually goes away (see [`AssetStore::evict`]).

mod catalog;

pub use catalog::{Catalog, CatalogError};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::reference::{AssetPath, ReferenceKind};
use crate::resource::{ClassHandle, Held, Managed, Resource, ResourceClass};

/// Errors raised while resolving an asset path.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The reference carries no path.
    #[error("empty asset path")]
    EmptyPath,

    /// Nothing is registered at the path.
    #[error("no asset registered at {0}")]
    NotFound(AssetPath),

    /// The asset exists but is not of the requested kind.
    #[error("asset {path} is not a {expected:?} asset")]
    KindMismatch {
        path: AssetPath,
        expected: ReferenceKind,
    },

    /// The asset's class was registered but is no longer valid.
    #[error("asset {0} has been invalidated")]
    Invalidated(AssetPath),
}

/// Synchronous resolution of asset paths.
pub trait Resolver: Send + Sync {
    /// Resolve `path`, loading it if needed.
    ///
    /// Resolving a path that is already loaded must return the same identity.
    fn resolve(&self, path: &AssetPath, kind: ReferenceKind) -> Result<Held, ResolveError>;

    /// Return the resolved asset without loading it.
    fn find_loaded(&self, path: &AssetPath, kind: ReferenceKind) -> Option<Held>;
}

#[derive(Debug, Clone)]
enum AssetDefinition {
    Object { class: String },
    Type { class: String },
}

impl AssetDefinition {
    fn kind(&self) -> ReferenceKind {
        match self {
            AssetDefinition::Object { .. } => ReferenceKind::Object,
            AssetDefinition::Type { .. } => ReferenceKind::Type,
        }
    }
}

/// In-process asset registry and resolver.
#[derive(Debug)]
pub struct AssetStore {
    name: String,
    classes: RwLock<HashMap<String, ClassHandle>>,
    definitions: RwLock<HashMap<AssetPath, AssetDefinition>>,
    loaded: RwLock<HashMap<AssetPath, Held>>,
    resolutions: AtomicU64,
}

impl AssetStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classes: RwLock::new(HashMap::new()),
            definitions: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashMap::new()),
            resolutions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a class by name and return its shared handle.
    pub fn register_class(&self, class: ResourceClass) -> ClassHandle {
        let class = Arc::new(class);
        self.classes
            .write()
            .insert(class.name().to_string(), Arc::clone(&class));
        class
    }

    /// Look up a registered class.
    pub fn class(&self, name: &str) -> Option<ClassHandle> {
        self.classes.read().get(name).cloned()
    }

    /// Declare an object asset at `path` whose instance is of `class`.
    pub fn register_object(&self, path: impl Into<AssetPath>, class: impl Into<String>) {
        self.definitions.write().insert(
            path.into(),
            AssetDefinition::Object {
                class: class.into(),
            },
        );
    }

    /// Declare a type asset at `path` that resolves to `class`.
    pub fn register_type(&self, path: impl Into<AssetPath>, class: impl Into<String>) {
        self.definitions.write().insert(
            path.into(),
            AssetDefinition::Type {
                class: class.into(),
            },
        );
    }

    /// Drop the resolved asset at `path` and invalidate it.
    ///
    /// Outstanding handles observe the invalidation on their next liveness
    /// check. Returns false if nothing was loaded at `path`.
    pub fn evict(&self, path: &AssetPath) -> bool {
        let Some(held) = self.loaded.write().remove(path) else {
            return false;
        };
        match &held {
            Held::Object(resource) => resource.destroy(),
            Held::Type(class) => class.invalidate(),
        }
        debug!(store = %self.name, path = %path, "Evicted asset");
        true
    }

    /// Number of assets currently resolved.
    pub fn loaded_count(&self) -> usize {
        self.loaded.read().len()
    }

    /// Number of resolutions that did real work (memo misses).
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    fn instantiate(
        &self,
        path: &AssetPath,
        definition: &AssetDefinition,
    ) -> Result<Held, ResolveError> {
        let class_name = match definition {
            AssetDefinition::Object { class } | AssetDefinition::Type { class } => class,
        };
        let class = self
            .class(class_name)
            .ok_or_else(|| ResolveError::NotFound(path.clone()))?;
        if !class.is_valid() {
            return Err(ResolveError::Invalidated(path.clone()));
        }
        Ok(match definition {
            AssetDefinition::Object { .. } => {
                Held::Object(Arc::new(Resource::new(path.asset_name(), &class, &self.name)))
            }
            AssetDefinition::Type { .. } => Held::Type(class),
        })
    }
}

impl Resolver for AssetStore {
    fn resolve(&self, path: &AssetPath, kind: ReferenceKind) -> Result<Held, ResolveError> {
        if path.is_empty() {
            return Err(ResolveError::EmptyPath);
        }
        if let Some(held) = self.find_loaded(path, kind) {
            return Ok(held);
        }

        let definition = self
            .definitions
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(path.clone()))?;
        if definition.kind() != kind {
            return Err(ResolveError::KindMismatch {
                path: path.clone(),
                expected: kind,
            });
        }

        let mut loaded = self.loaded.write();
        // Another thread may have resolved the same path while we were unlocked.
        if let Some(held) = loaded.get(path).filter(|held| held.is_valid()) {
            return Ok(held.clone());
        }
        let held = self.instantiate(path, &definition)?;
        loaded.insert(path.clone(), held.clone());
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        debug!(store = %self.name, path = %path, id = %held.id(), "Resolved asset");
        Ok(held)
    }

    fn find_loaded(&self, path: &AssetPath, kind: ReferenceKind) -> Option<Held> {
        let loaded = self.loaded.read();
        let held = loaded.get(path)?;
        let matches_kind = matches!(
            (held, kind),
            (Held::Object(_), ReferenceKind::Object) | (Held::Type(_), ReferenceKind::Type)
        );
        (matches_kind && held.is_valid()).then(|| held.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Category;

    fn store() -> AssetStore {
        let store = AssetStore::new("TestStore");
        let object = store.register_class(ResourceClass::new("Object", Category::Object));
        let widget = store.register_class(ResourceClass::new("Widget", Category::DisplayElement));
        store.register_class(ResourceClass::derived("Texture", &object));
        store.register_class(ResourceClass::derived("WBP_Menu_C", &widget));
        store.register_object("/Game/Textures/T_Grass", "Texture");
        store.register_type("/Game/UI/WBP_Menu.WBP_Menu_C", "WBP_Menu_C");
        store.register_object("/Game/Broken", "MissingClass");
        store
    }

    #[test]
    fn test_resolve_object_is_memoised() {
        let store = store();
        let path = AssetPath::from("/Game/Textures/T_Grass");
        let a = store.resolve(&path, ReferenceKind::Object).unwrap();
        let b = store.resolve(&path, ReferenceKind::Object).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(store.resolutions(), 1);
        assert_eq!(store.loaded_count(), 1);
    }

    #[test]
    fn test_resolve_type_returns_registered_class() {
        let store = store();
        let path = AssetPath::from("/Game/UI/WBP_Menu.WBP_Menu_C");
        let held = store.resolve(&path, ReferenceKind::Type).unwrap();
        let class = store.class("WBP_Menu_C").unwrap();
        assert_eq!(held.id(), class.id());
    }

    #[test]
    fn test_resolve_errors() {
        let store = store();
        assert!(matches!(
            store.resolve(&AssetPath::from(""), ReferenceKind::Object),
            Err(ResolveError::EmptyPath)
        ));
        assert!(matches!(
            store.resolve(&AssetPath::from("/Game/Foo"), ReferenceKind::Object),
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            store.resolve(&AssetPath::from("/Game/Textures/T_Grass"), ReferenceKind::Type),
            Err(ResolveError::KindMismatch { .. })
        ));
        assert!(matches!(
            store.resolve(&AssetPath::from("/Game/Broken"), ReferenceKind::Object),
            Err(ResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_evict_invalidates_and_allows_fresh_resolution() {
        let store = store();
        let path = AssetPath::from("/Game/Textures/T_Grass");
        let first = store.resolve(&path, ReferenceKind::Object).unwrap();
        assert!(store.evict(&path));
        assert!(!first.is_valid());
        assert!(store.find_loaded(&path, ReferenceKind::Object).is_none());

        let second = store.resolve(&path, ReferenceKind::Object).unwrap();
        assert_ne!(first.id(), second.id());
        assert!(!store.evict(&AssetPath::from("/Game/NotLoaded")));
    }

    #[test]
    fn test_evicted_type_cannot_be_resolved_again() {
        let store = store();
        let path = AssetPath::from("/Game/UI/WBP_Menu.WBP_Menu_C");
        store.resolve(&path, ReferenceKind::Type).unwrap();
        store.evict(&path);
        assert!(matches!(
            store.resolve(&path, ReferenceKind::Type),
            Err(ResolveError::Invalidated(_))
        ));
    }
}
