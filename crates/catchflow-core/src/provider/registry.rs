//! Process-wide sharing of data sources between pipelines.
//!
//! Several modules (or several pipelines over different entities) commonly
//! point at the same forcing dataset; opening it once and sharing the handle
//! keeps the per-source caches shared too. `shutdown` drops the registry's
//! references so sources close once the last pipeline using them is gone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::errors::CoupleResult;
use crate::provider::TimeIndexedDataProvider;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: Mutex<HashMap<String, Arc<dyn TimeIndexedDataProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the already-open source for `path`, or open it with `open` and
    /// remember it.
    pub fn get_or_open<F>(&self, path: &str, open: F) -> CoupleResult<Arc<dyn TimeIndexedDataProvider>>
    where
        F: FnOnce() -> CoupleResult<Arc<dyn TimeIndexedDataProvider>>,
    {
        let mut providers = self.guard();
        if let Some(existing) = providers.get(path) {
            debug!(path = path, "reusing shared data source");
            return Ok(Arc::clone(existing));
        }
        let provider = open()?;
        providers.insert(path.to_string(), Arc::clone(&provider));
        debug!(path = path, "opened shared data source");
        Ok(provider)
    }

    pub fn open_count(&self) -> usize {
        self.guard().len()
    }

    /// Drop every held reference. Sources stay alive while pipelines still
    /// hold them and close when the last clone drops.
    pub fn shutdown(&self) {
        self.guard().clear();
        debug!("released shared data sources");
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn TimeIndexedDataProvider>>> {
        match self.providers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
