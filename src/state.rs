/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Everything here is immutable after startup; Clone is cheap (Arc inside)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    auth::IdentityStore, gate::Gate, origin::OriginAllowlist, upstream::Forwarder,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub origins: Arc<OriginAllowlist>,
    pub gate: Arc<Gate>,
    pub identity: Arc<dyn IdentityStore>,
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        origins: Arc<OriginAllowlist>,
        gate: Arc<Gate>,
        identity: Arc<dyn IdentityStore>,
        forwarder: Forwarder,
    ) -> Self {
        Self {
            config,
            origins,
            gate,
            identity,
            forwarder,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("origins", &self.origins)
            .field("upstream", &self.forwarder.base().as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub type TestIdentityStore =
    crate::services::auth::CacheIdentityStore<crate::services::cache::MemoryCache>;

#[cfg(test)]
impl AppState {
    /// State backed by an in-memory identity store.
    pub fn for_tests(config: Config) -> (Self, Arc<TestIdentityStore>) {
        use crate::services::auth::CacheIdentityStore;
        use crate::services::cache::MemoryCache;

        let identity = Arc::new(CacheIdentityStore::new(MemoryCache::new()));
        let forwarder = Forwarder::new(&config).expect("upstream client");
        let origins = Arc::new(OriginAllowlist::from_config(&config));
        let state = Self::new(
            Arc::new(config),
            origins,
            Arc::new(Gate::with_default_policies()),
            identity.clone(),
            forwarder,
        );

        (state, identity)
    }
}
