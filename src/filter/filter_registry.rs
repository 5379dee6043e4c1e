use std::{collections::BTreeMap, sync::Arc, sync::OnceLock};

use thiserror::Error;

use crate::plugin::Plugin;

use super::{CodecError, CodecOptions, FilterCodecTraits, FilterFlags, FilterId, RawBytes};

/// The version of [`FilterDescriptor`] created by this crate.
pub const FILTER_DESCRIPTOR_VERSION: u32 = 1;

/// A registered filter.
#[derive(Clone, Debug)]
pub struct FilterDescriptor {
    version: u32,
    id: FilterId,
    name: &'static str,
    codec: Arc<dyn FilterCodecTraits>,
}

impl FilterDescriptor {
    /// Create a new filter descriptor for `codec`.
    ///
    /// The identifier and name of the descriptor are those of the codec.
    #[must_use]
    pub fn new(codec: Arc<dyn FilterCodecTraits>) -> Self {
        Self {
            version: FILTER_DESCRIPTOR_VERSION,
            id: codec.id(),
            name: codec.name(),
            codec,
        }
    }

    /// The descriptor version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// The filter identifier.
    #[must_use]
    pub const fn id(&self) -> FilterId {
        self.id
    }

    /// The filter name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The filter codec.
    #[must_use]
    pub fn codec(&self) -> &Arc<dyn FilterCodecTraits> {
        &self.codec
    }

    /// Decode `encoded_value` with the filter codec.
    ///
    /// # Errors
    /// Returns a [`CodecError`] if the codec fails.
    pub fn decode<'a>(
        &self,
        flags: FilterFlags,
        client_params: &[u32],
        encoded_value: RawBytes<'a>,
        buf_size: usize,
        options: &CodecOptions,
    ) -> Result<RawBytes<'a>, CodecError> {
        self.codec
            .decode(flags, client_params, encoded_value, buf_size, options)
    }
}

/// A filter plugin.
pub type FilterPlugin = Plugin<FilterDescriptor>;
inventory::collect!(FilterPlugin);

/// A filter registration error.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The filter identifier is outside the range supported by this crate.
    #[error("filter identifier {_0} is reserved for user-defined filters")]
    InvalidFilterId(FilterId),
}

/// A table of filters keyed by [`FilterId`].
///
/// Filters are registered through `&mut self` and looked up through `&self`, so a registry shared between threads is immutable.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<FilterId, FilterDescriptor>,
}

impl FilterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in filter enabled by cargo features.
    #[must_use]
    pub fn with_builtin_filters() -> Self {
        let mut registry = Self::new();
        for plugin in inventory::iter::<FilterPlugin> {
            let descriptor = plugin.create();
            if !plugin.match_id(descriptor.id()) {
                log::error!(
                    "filter plugin {} created a descriptor for filter {}",
                    plugin.filter_id(),
                    descriptor.id()
                );
                continue;
            }
            if let Err(err) = registry.register(descriptor) {
                log::error!("failed to register a built-in filter: {err}");
            }
        }
        log::debug!("registered built-in filters {:?}", registry.ids());
        registry
    }

    /// Register a filter, replacing any filter already registered with the same identifier.
    ///
    /// Returns the replaced filter, if any.
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidFilterId`] if the identifier of `descriptor` is not [library owned](FilterId::is_library_owned).
    pub fn register(
        &mut self,
        descriptor: FilterDescriptor,
    ) -> Result<Option<FilterDescriptor>, RegistryError> {
        let id = descriptor.id();
        if !id.is_library_owned() {
            return Err(RegistryError::InvalidFilterId(id));
        }
        let replaced = self.filters.insert(id, descriptor);
        if replaced.is_some() {
            log::debug!("replaced filter {id}");
        }
        Ok(replaced)
    }

    /// Look up a filter.
    #[must_use]
    pub fn lookup(&self, id: FilterId) -> Option<&FilterDescriptor> {
        self.filters.get(&id)
    }

    /// Remove every registered filter.
    pub fn teardown(&mut self) {
        self.filters.clear();
    }

    /// The number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if no filters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// The identifiers of the registered filters, in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<FilterId> {
        self.filters.keys().copied().collect()
    }
}

static REGISTRY: OnceLock<FilterRegistry> = OnceLock::new();

/// Returns the process-wide filter registry.
///
/// The registry is populated with the built-in filters on first use and is immutable afterwards.
pub fn global_registry() -> &'static FilterRegistry {
    REGISTRY.get_or_init(FilterRegistry::with_builtin_filters)
}
