//! Integration tests for the cache box lifecycle.
//!
//! These tests drive a box end to end against a catalog-backed store:
//! - synchronous and asynchronous loading into the ledger
//! - creation and the per-category destruction strategies
//! - the ordered, idempotent teardown and weakly bound async completions
//!
//! Run with: `cargo test --test cache_box_lifecycle`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use cachebox::resource::{Disposal, Lifecycle, Managed};
use cachebox::{
    AssetStore, BoxHost, BoxServices, BoxState, CacheBox, Catalog, ClassHandle, LazyReference,
    LoaderConfig, ReferenceKind, StreamableLoader, World,
};

// ============================================================================
// Helper Functions
// ============================================================================

const CATALOG: &str = r#"
[class:Object]
category = object

[class:Texture]
parent = Object

[class:Widget]
category = display
abstract = true

[class:WBP_Menu_C]
parent = Widget

[class:Actor]
category = entity

[class:BP_Pawn_C]
parent = Actor

[asset:/Game/Textures/T_Grass.T_Grass]
class = Texture

[asset:/Game/Textures/T_Rock.T_Rock]
class = Texture

[asset:/Game/Textures/T_Sand.T_Sand]
class = Texture

[asset:/Game/UI/WBP_Menu.WBP_Menu_C]
class = WBP_Menu_C
kind = type

[asset:/Game/Pawns/BP_Pawn.BP_Pawn_C]
class = BP_Pawn_C
kind = type
"#;

/// Store, loader and world on a current-thread runtime that only makes
/// progress when the test blocks on it.
struct Harness {
    runtime: tokio::runtime::Runtime,
    store: Arc<AssetStore>,
    loader: Arc<StreamableLoader>,
    world: Arc<World>,
}

impl Harness {
    fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = Arc::new(Catalog::from_ini_str("TestCatalog", CATALOG).unwrap());
        let loader = Arc::new(StreamableLoader::new(
            store.clone(),
            LoaderConfig::default(),
            runtime.handle().clone(),
        ));
        Self {
            runtime,
            store,
            loader,
            world: Arc::new(World::new("TestWorld")),
        }
    }

    fn services(&self) -> BoxServices {
        BoxServices::new(self.store.clone(), self.loader.clone(), self.world.clone())
    }

    fn cache_box(&self) -> CacheBox {
        CacheBox::new("PlayerController_0", self.services())
    }

    fn class(&self, name: &str) -> ClassHandle {
        self.store.class(name).unwrap()
    }

    /// Deliver every outstanding async completion.
    fn flush(&self) -> usize {
        self.runtime.block_on(self.loader.flush())
    }

    /// Let background resolution run without delivering completions.
    fn settle(&self) {
        self.runtime
            .block_on(async { tokio::time::sleep(Duration::from_millis(20)).await });
    }
}

fn grass() -> LazyReference {
    LazyReference::object("/Game/Textures/T_Grass.T_Grass")
}

/// Counts ERROR events seen while installed.
#[derive(Clone, Default)]
struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn count_errors<F: FnOnce()>(f: F) -> usize {
    let counter = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    tracing::subscriber::with_default(subscriber, f);
    counter.count()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_loading_twice_returns_same_identity_without_duplicates() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let reference = grass();

    let first = cache_box.load_object(&reference).unwrap();
    let second = cache_box.load_object(&reference).unwrap();
    assert_eq!(first.id(), second.id());

    let stats = cache_box.stats();
    assert_eq!(stats.loaded, 1);
    assert_eq!(stats.loaded_refs, 1);
    assert_eq!(harness.store.resolutions(), 1);
}

#[test]
fn test_empty_reference_leaves_ledger_unchanged() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let empty = LazyReference::null(ReferenceKind::Object);

    assert!(cache_box.load_object(&empty).is_none());

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    cache_box.request_async_load_object(&empty, move || flag.store(true, Ordering::SeqCst));

    // Fired before the call returned, with nothing queued.
    assert!(fired.load(Ordering::SeqCst));
    assert_eq!(harness.loader.pending(), 0);
    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_batch_load_skips_empty_and_failed_elements() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let references = [
        grass(),
        LazyReference::null(ReferenceKind::Object),
        LazyReference::object("/Game/Missing"),
        LazyReference::object("/Game/Textures/T_Rock.T_Rock"),
    ];

    let loaded = cache_box.load_objects(&references);
    assert_eq!(loaded.len(), 2);
    assert_eq!(cache_box.stats().loaded, 2);
}

#[test]
fn test_unresolvable_sync_load_logs_one_error() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();

    let errors = count_errors(|| {
        assert!(cache_box
            .load_object(&LazyReference::object("/Game/Foo"))
            .is_none());
    });

    assert_eq!(errors, 1);
    assert_eq!(cache_box.stats().total(), 0);
    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_load_class_checks_base_type() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let menu = LazyReference::class("/Game/UI/WBP_Menu.WBP_Menu_C");

    let wrong_base = harness.class("Actor");
    assert!(cache_box.load_class(&menu, &wrong_base).is_none());
    assert_eq!(cache_box.stats().loaded_type_refs, 0);

    let widget = harness.class("Widget");
    let class = cache_box.load_class(&menu, &widget).unwrap();
    assert_eq!(class.get().unwrap().name(), "WBP_Menu_C");
    assert_eq!(cache_box.stats().loaded, 1);
    assert_eq!(cache_box.stats().loaded_type_refs, 1);

    let loaded = cache_box.load_classes(
        &[
            LazyReference::class("/Game/Pawns/BP_Pawn.BP_Pawn_C"),
            LazyReference::null(ReferenceKind::Type),
        ],
        &harness.class("Actor"),
    );
    assert_eq!(loaded.len(), 1);
    assert_eq!(cache_box.stats().loaded_type_refs, 2);
}

#[test]
fn test_async_batch_completes_once_with_partial_failures() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let references = [
        grass(),
        LazyReference::object("/Game/Textures/T_Rock.T_Rock"),
        LazyReference::object("/Game/Missing/A"),
        LazyReference::object("/Game/Missing/B"),
    ];

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    cache_box.request_async_load_objects(&references, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(cache_box.stats().is_empty());

    assert_eq!(harness.flush(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache_box.stats().loaded, 2);
    assert_eq!(cache_box.stats().loaded_refs, 2);
}

#[test]
fn test_async_completion_sees_ledger_updates() {
    let harness = Harness::new();
    let cache_box = Arc::new(harness.cache_box());
    let references = [grass(), LazyReference::object("/Game/Textures/T_Sand.T_Sand")];

    let seen = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&seen);
    let observer = Arc::downgrade(&cache_box);
    cache_box.request_async_load_objects(&references, move || {
        if let Some(cache_box) = observer.upgrade() {
            observed.store(cache_box.stats().loaded, Ordering::SeqCst);
        }
    });
    harness.flush();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn test_async_class_batch_records_resolved_classes() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let widget = harness.class("Widget");
    let references = [
        LazyReference::class("/Game/UI/WBP_Menu.WBP_Menu_C"),
        LazyReference::class("/Game/Pawns/BP_Pawn.BP_Pawn_C"),
    ];

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    cache_box.request_async_load_classes(&references, &widget, move || {
        flag.store(true, Ordering::SeqCst)
    });
    harness.flush();

    // The pawn class resolves but is not a widget.
    assert!(done.load(Ordering::SeqCst));
    let stats = cache_box.stats();
    assert_eq!(stats.loaded, 1);
    assert_eq!(stats.loaded_type_refs, 1);
}

#[test]
fn test_async_element_invalidated_before_completion_is_skipped() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let rock = LazyReference::object("/Game/Textures/T_Rock.T_Rock");

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    cache_box.request_async_load_objects(&[grass(), rock.clone()], move || {
        flag.store(true, Ordering::SeqCst)
    });

    harness.settle();
    assert!(rock.is_resolved());
    harness.store.evict(rock.path());

    harness.flush();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(cache_box.stats().loaded, 1);
}

#[test]
fn test_async_class_invalidated_before_completion_is_skipped() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let menu = LazyReference::class("/Game/UI/WBP_Menu.WBP_Menu_C");

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    cache_box.request_async_load_class(&menu, &harness.class("Widget"), move || {
        flag.store(true, Ordering::SeqCst)
    });

    harness.settle();
    assert!(menu.is_resolved());
    harness.class("WBP_Menu_C").invalidate();

    harness.flush();
    assert!(done.load(Ordering::SeqCst));
    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_reload_after_eviction_replaces_stale_entry() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let reference = grass();

    let first = cache_box.load_object(&reference).unwrap();
    harness.store.evict(reference.path());
    assert!(!first.is_valid());

    let second = cache_box.load_object(&reference).unwrap();
    assert_ne!(first.id(), second.id());
    let stats = cache_box.stats();
    assert_eq!(stats.loaded, 1);
    assert_eq!(stats.loaded_refs, 1);

    assert!(cache_box.unload_one(&reference));
    assert!(cache_box.stats().is_empty());
}

#[tokio::test]
async fn test_async_load_on_ambient_runtime() {
    let store = Arc::new(Catalog::from_ini_str("TestCatalog", CATALOG).unwrap());
    let loader = Arc::new(StreamableLoader::on_current_runtime(
        store.clone(),
        LoaderConfig::default().with_latency(Duration::from_millis(2)),
    ));
    let services = BoxServices::new(store, loader.clone(), Arc::new(World::new("TestWorld")));
    let cache_box = CacheBox::new("AsyncOwner", services);

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    cache_box.request_async_load_object(&grass(), move || flag.store(true, Ordering::SeqCst));
    assert_eq!(loader.flush().await, 1);

    assert!(done.load(Ordering::SeqCst));
    assert_eq!(cache_box.stats().loaded, 1);
}

// ============================================================================
// Creation and release
// ============================================================================

#[test]
fn test_destroy_one_detaches_display_element() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();

    let menu = cache_box
        .create_resource(&harness.class("WBP_Menu_C"))
        .unwrap();
    assert_eq!(cache_box.stats().created, 1);
    // The box is the only owner; keep the instance around to inspect it.
    let resource = menu.upgrade().unwrap();

    assert!(cache_box.destroy_one(&menu, false));
    assert_eq!(cache_box.stats().created, 0);
    assert_eq!(resource.disposal(), Some(Disposal::RemovedFromParent));
    assert_eq!(resource.lifecycle(), Lifecycle::Live);
}

#[test]
fn test_destroy_one_dispatches_by_category() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();

    let element = cache_box
        .create_display_element(&harness.class("WBP_Menu_C"))
        .unwrap();
    assert_eq!(harness.world.attached_count(), 1);
    let pawn = cache_box
        .create_spawned_entity(&harness.class("BP_Pawn_C"))
        .unwrap();
    assert_eq!(harness.world.entity_count(), 1);
    let pure = cache_box.create_resource(&harness.class("Texture")).unwrap();
    let deferred = cache_box.create_resource(&harness.class("Texture")).unwrap();
    let kept: Vec<_> = [&pawn, &pure, &deferred]
        .iter()
        .map(|handle| handle.upgrade().unwrap())
        .collect();

    assert!(cache_box.destroy_one(&element, false));
    assert!(cache_box.destroy_one(&pawn, false));
    assert!(cache_box.destroy_one(&pure, true));
    assert!(cache_box.destroy_one(&deferred, false));

    assert_eq!(harness.world.attached_count(), 0);
    assert_eq!(harness.world.entity_count(), 0);
    assert_eq!(kept[0].disposal(), Some(Disposal::Despawned));
    assert_eq!(kept[1].disposal(), Some(Disposal::Destroyed));
    assert_eq!(kept[2].disposal(), Some(Disposal::MarkedForCollection));
    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_destroy_one_on_stale_handle_is_silent_noop() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let pawn = cache_box
        .create_spawned_entity(&harness.class("BP_Pawn_C"))
        .unwrap();

    harness.world.close();
    assert!(!pawn.is_valid());

    let errors = count_errors(|| assert!(!cache_box.destroy_one(&pawn, true)));
    assert_eq!(errors, 0);
    assert_eq!(cache_box.stats().created, 0);
}

#[test]
fn test_creation_failures_leave_ledger_untouched() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();

    // Abstract class.
    assert!(cache_box.create_display_element(&harness.class("Widget")).is_none());
    // Wrong category.
    assert!(cache_box.create_spawned_entity(&harness.class("Texture")).is_none());
    // Invalid class.
    let gone = harness.class("Texture");
    gone.invalidate();
    assert!(cache_box.create_resource(&gone).is_none());
    // No world.
    harness.world.close();
    assert!(cache_box.create_spawned_entity(&harness.class("BP_Pawn_C")).is_none());

    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_derived_parameter_set_is_owned() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let base = cache_box.load_object(&grass()).unwrap().get().unwrap();

    let params = cache_box
        .create_derived_parameter_set(&base, "PlayerController_0")
        .unwrap();
    let params = params.get().unwrap();
    assert_eq!(params.derived_from(), Some(base.id()));
    assert_eq!(params.outer(), "PlayerController_0");
    assert_eq!(cache_box.stats().created, 1);
}

#[test]
fn test_destroy_all_then_create_never_reuses_handles() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let texture = harness.class("Texture");

    let before: Vec<_> = (0..3)
        .map(|_| cache_box.create_resource(&texture).unwrap())
        .collect();
    assert_eq!(cache_box.destroy_all(), 3);
    assert_eq!(cache_box.stats().created, 0);
    assert!(before.iter().all(|handle| !handle.is_valid()));

    let after = cache_box.create_resource(&texture).unwrap();
    assert!(before.iter().all(|handle| handle.id() != after.id()));
    assert_eq!(cache_box.stats().created, 1);
}

#[test]
fn test_unload_resets_reference() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let reference = grass();
    let menu = LazyReference::class("/Game/UI/WBP_Menu.WBP_Menu_C");

    cache_box.load_object(&reference).unwrap();
    cache_box.load_class(&menu, &harness.class("Widget")).unwrap();
    assert!(reference.is_resolved());

    assert!(cache_box.unload_one(&reference));
    assert!(!reference.is_resolved());
    assert!(cache_box.unload_type(&menu));
    assert!(!menu.is_resolved());
    assert!(cache_box.stats().is_empty());

    // Never resolved: no-op.
    assert!(!cache_box.unload_one(&LazyReference::object("/Game/Other")));
}

#[test]
fn test_unload_all_releases_without_destroying() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let reference = grass();
    let loaded = cache_box.load_object(&reference).unwrap();

    assert_eq!(cache_box.unload_all(), 1);
    assert!(cache_box.stats().is_empty());
    assert!(!reference.is_resolved());
    // The store still owns the asset.
    assert!(loaded.is_valid());
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_teardown_is_idempotent() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    let reference = grass();
    cache_box.load_object(&reference).unwrap();
    let object = cache_box
        .create_resource(&harness.class("Texture"))
        .and_then(|handle| handle.upgrade())
        .unwrap();
    let pawn = cache_box
        .create_spawned_entity(&harness.class("BP_Pawn_C"))
        .and_then(|handle| handle.upgrade())
        .unwrap();

    assert!(cache_box.teardown());
    assert_eq!(cache_box.state(), BoxState::Torn);
    assert!(cache_box.stats().is_empty());
    assert!(!reference.is_resolved());
    assert_eq!(object.disposal(), Some(Disposal::Destroyed));
    assert_eq!(pawn.disposal(), Some(Disposal::Despawned));

    assert!(!cache_box.teardown());
    assert!(cache_box.stats().is_empty());
    assert_eq!(object.disposal(), Some(Disposal::Destroyed));
}

#[test]
fn test_operations_after_teardown_degrade_to_noops() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();
    cache_box.teardown();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    let errors = count_errors(|| {
        assert!(cache_box.load_object(&grass()).is_none());
        assert!(cache_box
            .create_resource(&harness.class("Texture"))
            .is_none());
        assert_eq!(cache_box.destroy_all(), 0);
        cache_box.request_async_load_object(&grass(), move || flag.store(true, Ordering::SeqCst));
    });

    assert_eq!(errors, 4);
    assert!(!fired.load(Ordering::SeqCst));
    assert_eq!(harness.loader.pending(), 0);
    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_async_completion_after_teardown_is_inert() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    cache_box.request_async_load_object(&grass(), move || flag.store(true, Ordering::SeqCst));
    cache_box.teardown();

    assert_eq!(harness.flush(), 1);
    assert!(!fired.load(Ordering::SeqCst));
    assert!(cache_box.stats().is_empty());
}

#[test]
fn test_async_completion_after_box_dropped_is_inert() {
    let harness = Harness::new();
    let cache_box = harness.cache_box();

    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    cache_box.request_async_load_object(&grass(), move || flag.store(true, Ordering::SeqCst));
    drop(cache_box);

    assert_eq!(harness.flush(), 1);
    assert!(!fired.load(Ordering::SeqCst));
}

// ============================================================================
// Host
// ============================================================================

#[test]
fn test_host_stop_tears_down_box() {
    let harness = Harness::new();
    let mut host = BoxHost::new("PlayerController_0", harness.services());
    host.on_owner_start();

    let pawn = host
        .cache_box()
        .unwrap()
        .create_spawned_entity(&harness.class("BP_Pawn_C"))
        .unwrap();
    assert!(pawn.is_valid());

    host.on_owner_stop();
    assert!(!pawn.is_valid());
    assert!(host.cache_box().is_err());
}

#[test]
fn test_dropping_running_host_runs_stop() {
    let harness = Harness::new();
    let element = {
        let mut host = BoxHost::new("Hud", harness.services());
        host.on_owner_start();
        host.cache_box()
            .unwrap()
            .create_display_element(&harness.class("WBP_Menu_C"))
            .and_then(|handle| handle.upgrade())
            .unwrap()
    };
    assert_eq!(harness.world.attached_count(), 0);
    assert!(!element.is_attached());
    assert_eq!(element.disposal(), Some(Disposal::RemovedFromParent));
}
