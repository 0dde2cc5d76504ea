//! CacheBox - per-owner resource containers with a single teardown path
//!
//! A [`CacheBox`](cache_box::CacheBox) unifies three ways of obtaining a
//! managed resource (synchronous load, asynchronous load, in-process
//! creation) behind one ownership ledger, and releases everything it holds
//! in a fixed, idempotent order when its owner stops.
//!
//! # Architecture
//!
//! ```text
//! BoxHost ──start/stop──► CacheBox ──► OwnershipLedger
//!                            │
//!            ┌───────────────┼────────────────┐
//!            ▼               ▼                ▼
//!        Resolver     AsyncLoadService      World
//!       (AssetStore)  (StreamableLoader)  (construction)
//! ```
//!
//! Ambient pieces: [`config`] (INI settings), [`logging`] (global `tracing`
//! subscriber), and [`crypto`], a standalone AES text utility.

pub mod cache_box;
pub mod config;
pub mod crypto;
pub mod host;
pub mod ledger;
pub mod loader;
pub mod logging;
pub mod reference;
pub mod resource;
pub mod store;
pub mod world;

pub use cache_box::{BoxServices, BoxState, CacheBox, CacheBoxError};
pub use host::BoxHost;
pub use ledger::{LedgerStats, OwnershipLedger};
pub use loader::{AsyncLoadService, LoaderConfig, StreamableLoader};
pub use reference::{AssetPath, LazyReference, ReferenceKind};
pub use resource::{Category, ClassHandle, Handle, Held, Resource, ResourceClass, WeakHandle};
pub use store::{AssetStore, Catalog, Resolver};
pub use world::World;
