//! Binds a cache box to its owner's lifecycle.
//!
//! # Example
//!
//! ```ignore
//! let mut host = BoxHost::new("PlayerController_0", services);
//! host.on_owner_start();
//!
//! let menu = host.cache_box()?.create_display_element(&menu_class);
//!
//! // Later, when the owner detaches:
//! host.on_owner_stop();
//! ```

use tracing::{error, info, warn};

use crate::cache_box::{BoxServices, CacheBox, CacheBoxError};

/// Owns at most one [`CacheBox`] for the lifetime of an owner.
pub struct BoxHost {
    owner_name: String,
    services: BoxServices,
    cache_box: Option<CacheBox>,
}

impl BoxHost {
    pub fn new(owner_name: impl Into<String>, services: BoxServices) -> Self {
        Self {
            owner_name: owner_name.into(),
            services,
            cache_box: None,
        }
    }

    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// Create the box. A box that is already alive is kept.
    pub fn on_owner_start(&mut self) {
        if let Some(existing) = &self.cache_box {
            warn!(box_id = %existing.identity(), "Owner started twice; keeping existing cache box");
            return;
        }
        let cache_box = CacheBox::new(self.owner_name.clone(), self.services.clone());
        info!(owner = %self.owner_name, box_id = %cache_box.identity(), "Owner started");
        self.cache_box = Some(cache_box);
    }

    /// Tear the box down and discard it.
    pub fn on_owner_stop(&mut self) {
        let Some(cache_box) = self.cache_box.take() else {
            return;
        };
        cache_box.teardown();
        info!(owner = %self.owner_name, box_id = %cache_box.identity(), "Owner stopped");
    }

    /// The current box.
    ///
    /// # Errors
    ///
    /// Returns [`CacheBoxError::NoActiveBox`] before start or after stop.
    pub fn cache_box(&self) -> Result<&CacheBox, CacheBoxError> {
        self.cache_box.as_ref().ok_or_else(|| {
            error!(owner = %self.owner_name, "Cache box requested outside the owner's lifetime");
            CacheBoxError::NoActiveBox(self.owner_name.clone())
        })
    }

    pub fn is_active(&self) -> bool {
        self.cache_box.is_some()
    }
}

impl Drop for BoxHost {
    fn drop(&mut self) {
        self.on_owner_stop();
    }
}
