//! Lazy references to loadable assets.
//!
//! A [`LazyReference`] designates an asset by path without loading it. It
//! becomes usable once resolved, either synchronously through a [`Resolver`]
//! or in the background by an [`AsyncLoadService`](crate::loader::AsyncLoadService).
//! Clones share the same resolved state, so resetting one clone invalidates
//! them all and forces the next use to resolve again.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::resource::{Held, ResourceId, WeakHeld};
use crate::store::{ResolveError, Resolver};

/// What a reference designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Object,
    Type,
}

/// Stable asset identity, e.g. `/Game/UI/WBP_Menu.WBP_Menu_C`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPath(String);

impl AssetPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A blank path never resolves.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Short asset name: the last path segment without its package prefix.
    pub fn asset_name(&self) -> &str {
        let segment = self.0.rsplit('/').next().unwrap_or(&self.0);
        segment.rsplit('.').next().unwrap_or(segment)
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for AssetPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

struct ReferenceInner {
    path: AssetPath,
    kind: ReferenceKind,
    resolved: RwLock<Option<WeakHeld>>,
}

/// Path plus resolved/unresolved state. Does not own the asset.
///
/// Equality and hashing use the path and kind only.
#[derive(Clone)]
pub struct LazyReference {
    inner: Arc<ReferenceInner>,
}

impl LazyReference {
    fn with_kind(path: AssetPath, kind: ReferenceKind) -> Self {
        Self {
            inner: Arc::new(ReferenceInner {
                path,
                kind,
                resolved: RwLock::new(None),
            }),
        }
    }

    /// Reference to an object asset.
    pub fn object(path: impl Into<AssetPath>) -> Self {
        Self::with_kind(path.into(), ReferenceKind::Object)
    }

    /// Reference to a type (class) asset.
    pub fn class(path: impl Into<AssetPath>) -> Self {
        Self::with_kind(path.into(), ReferenceKind::Type)
    }

    /// A reference with no path.
    pub fn null(kind: ReferenceKind) -> Self {
        Self::with_kind(AssetPath::default(), kind)
    }

    pub fn path(&self) -> &AssetPath {
        &self.inner.path
    }

    pub fn kind(&self) -> ReferenceKind {
        self.inner.kind
    }

    pub fn is_null(&self) -> bool {
        self.inner.path.is_empty()
    }

    pub fn asset_name(&self) -> &str {
        self.inner.path.asset_name()
    }

    /// The resolved target, if resolved and still valid.
    pub fn get(&self) -> Option<Held> {
        self.inner.resolved.read().as_ref().and_then(WeakHeld::get)
    }

    /// Whether the reference currently points at a live target.
    pub fn is_resolved(&self) -> bool {
        self.get().is_some()
    }

    /// Identity of the last resolved target, even if it has gone stale.
    pub fn resolved_id(&self) -> Option<ResourceId> {
        self.inner.resolved.read().as_ref().map(WeakHeld::id)
    }

    /// Resolve now, reusing the existing resolution when it is still live.
    pub fn load_synchronous(&self, resolver: &dyn Resolver) -> Result<Held, ResolveError> {
        if self.is_null() {
            return Err(ResolveError::EmptyPath);
        }
        if let Some(held) = self.get() {
            return Ok(held);
        }
        let held = resolver.resolve(self.path(), self.kind())?;
        self.set_resolved(&held);
        Ok(held)
    }

    pub(crate) fn set_resolved(&self, held: &Held) {
        if self.is_null() {
            return;
        }
        *self.inner.resolved.write() = Some(held.downgrade());
    }

    /// Invalidate the resolution. The next use must resolve again.
    pub fn reset(&self) {
        *self.inner.resolved.write() = None;
    }
}

impl PartialEq for LazyReference {
    fn eq(&self, other: &Self) -> bool {
        self.inner.kind == other.inner.kind && self.inner.path == other.inner.path
    }
}

impl Eq for LazyReference {}

impl Hash for LazyReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.path.hash(state);
        self.inner.kind.hash(state);
    }
}

impl fmt::Debug for LazyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyReference")
            .field("path", &self.inner.path)
            .field("kind", &self.inner.kind)
            .field("resolved", &self.resolved_id())
            .finish()
    }
}
