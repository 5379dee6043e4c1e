//! Compile-time filter registration utilities.
//!
//! A [`Plugin`] creates an object associated with a [`FilterId`].
//! Each built-in filter submits a [`FilterPlugin`](crate::filter::FilterPlugin) when its cargo feature is enabled.
//!
//! Plugins are registered at compile time using the [inventory] crate.
//! At runtime, [`FilterRegistry::with_builtin_filters`](crate::filter::FilterRegistry::with_builtin_filters) creates every submitted plugin and registers it.

use crate::filter::FilterId;

/// A plugin.
pub struct Plugin<TPlugin> {
    /// The filter identifier of the plugin.
    filter_id: FilterId,
    /// Create an implementation of this plugin.
    create_fn: fn() -> TPlugin,
}

impl<TPlugin> Plugin<TPlugin> {
    /// Create a new plugin for registration.
    pub const fn new(filter_id: FilterId, create_fn: fn() -> TPlugin) -> Self {
        Self {
            filter_id,
            create_fn,
        }
    }

    /// Create a `TPlugin` plugin.
    #[must_use]
    pub fn create(&self) -> TPlugin {
        (self.create_fn)()
    }

    /// Returns true if this plugin is associated with `filter_id`.
    #[must_use]
    pub fn match_id(&self, filter_id: FilterId) -> bool {
        self.filter_id == filter_id
    }

    /// Returns the filter identifier of the plugin.
    #[must_use]
    pub const fn filter_id(&self) -> FilterId {
        self.filter_id
    }
}

impl<TPlugin> core::fmt::Debug for Plugin<TPlugin> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Plugin")
            .field("filter_id", &self.filter_id)
            .finish_non_exhaustive()
    }
}
