//! Resource instances and their collection lifecycle.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{ClassHandle, Managed, ResourceId};

/// Strong handle to an instance.
pub type Handle = Arc<Resource>;

/// Collection state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Usable.
    Live,
    /// Marked as garbage; the collector will reclaim it.
    PendingCollection,
    /// Destroyed immediately.
    Destroyed,
    /// Despawned from its world.
    Despawned,
}

/// Teardown strategy that was applied to an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    RemovedFromParent,
    Despawned,
    Destroyed,
    MarkedForCollection,
}

#[derive(Debug)]
struct InstanceState {
    lifecycle: Lifecycle,
    attached: bool,
    disposal: Option<Disposal>,
}

/// A resource instance.
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    name: String,
    class: ClassHandle,
    outer: String,
    derived_from: Option<ResourceId>,
    state: Mutex<InstanceState>,
}

impl Resource {
    pub(crate) fn new(name: impl Into<String>, class: &ClassHandle, outer: &str) -> Self {
        Self {
            id: ResourceId::next(),
            name: name.into(),
            class: Arc::clone(class),
            outer: outer.to_string(),
            derived_from: None,
            state: Mutex::new(InstanceState {
                lifecycle: Lifecycle::Live,
                attached: false,
                disposal: None,
            }),
        }
    }

    pub(crate) fn with_derived_from(mut self, base: ResourceId) -> Self {
        self.derived_from = Some(base);
        self
    }

    pub fn class(&self) -> &ClassHandle {
        &self.class
    }

    /// Name of the object that constructed this instance.
    pub fn outer(&self) -> &str {
        &self.outer
    }

    pub fn derived_from(&self) -> Option<ResourceId> {
        self.derived_from
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    /// Whether a display element currently sits in a presentation parent.
    pub fn is_attached(&self) -> bool {
        self.state.lock().attached
    }

    /// The teardown strategy applied so far, if any.
    pub fn disposal(&self) -> Option<Disposal> {
        self.state.lock().disposal
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.state.lock().attached = attached;
    }

    /// Detach from the presentation parent. The instance stays live.
    pub(crate) fn remove_from_parent(&self) {
        let mut state = self.state.lock();
        state.attached = false;
        state.disposal = Some(Disposal::RemovedFromParent);
    }

    pub(crate) fn despawn(&self) {
        self.retire(Lifecycle::Despawned, Disposal::Despawned);
    }

    pub(crate) fn destroy(&self) {
        self.retire(Lifecycle::Destroyed, Disposal::Destroyed);
    }

    pub(crate) fn mark_for_collection(&self) {
        self.retire(Lifecycle::PendingCollection, Disposal::MarkedForCollection);
    }

    fn retire(&self, lifecycle: Lifecycle, disposal: Disposal) {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::Live {
            state.lifecycle = lifecycle;
            state.attached = false;
            state.disposal = Some(disposal);
        }
    }
}

impl Managed for Resource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid(&self) -> bool {
        self.lifecycle() == Lifecycle::Live
    }
}
