//! The filter contract and the registry that resolves filter ids.
//!
//! Filters are the pluggable units of work. A chain awaits one filter's future
//! before starting the next, so resolving the future is how a filter hands
//! control back ("calls next"). Returning `Err` ends the run.

use std::collections::BTreeMap;

use futures::future::LocalBoxFuture;

use folio_shared::{FolioError, Result};

use crate::params::ProcessingParams;

/// Future returned by [`Filter::apply`]. Not `Send`: chains run on one thread.
pub type FilterFuture<'a> = LocalBoxFuture<'a, Result<()>>;

/// A pluggable transform step.
///
/// The future must resolve only after the filter's own work has completed. A
/// future that never resolves stalls its chain; there is no timeout.
pub trait Filter {
    fn apply<'a>(&'a self, params: &'a mut ProcessingParams) -> FilterFuture<'a>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds every available filter by id. Built once per run, then only read.
#[derive(Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `filter` under `id`, replacing (and returning) any previous one.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        filter: impl Filter + 'static,
    ) -> Option<Box<dyn Filter>> {
        let id = id.into();
        let previous = self.filters.insert(id.clone(), Box::new(filter));
        if previous.is_some() {
            tracing::debug!(%id, "filter overridden");
        }
        previous
    }

    /// Resolve `id`. An unknown id is a configuration error that aborts the run.
    pub fn get(&self, id: &str) -> Result<&dyn Filter> {
        self.filters
            .get(id)
            .map(Box::as_ref)
            .ok_or_else(|| FolioError::config(format!("no such filter: {id}")))
    }

    /// Like [`FilterRegistry::get`], also returning the registry's own copy of the id.
    pub fn get_entry(&self, id: &str) -> Result<(&str, &dyn Filter)> {
        self.filters
            .get_key_value(id)
            .map(|(key, filter)| (key.as_str(), filter.as_ref()))
            .ok_or_else(|| FolioError::config(format!("no such filter: {id}")))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.filters.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}
