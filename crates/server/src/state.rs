//! Application state shared across handlers.

use cpedict_core::BuildInfo;
use cpedict_dictionary::DictionaryStore;
use std::sync::Arc;

/// Shared state: the opened dictionary store and the build identity.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DictionaryStore>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(store: Arc<dyn DictionaryStore>, build: BuildInfo) -> Self {
        Self { store, build }
    }
}
