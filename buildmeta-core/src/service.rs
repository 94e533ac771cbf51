//! Entry point for every metadata operation.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};

use crate::memory::MemoryStore;
use crate::store::MetadataStore;

/// Shared storage handle.
pub type SharedStore = Arc<dyn MetadataStore + Send + Sync>;

/// Metadata operations over a [`MetadataStore`].
///
/// The service is stateless apart from the store handle; clones share it.
/// Operations live in the `directory`, `feed`, `issues` and `telemetry`
/// modules.
#[derive(Clone)]
pub struct MetadataService {
    pub(crate) store: SharedStore,
}

impl MetadataService {
    /// Build a service over an explicit store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Build a service over a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub(crate) fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}
