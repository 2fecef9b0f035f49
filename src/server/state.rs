use super::ServerConfig;
use crate::catalog::CatalogStore;
use crate::ingestion::IngestionPipeline;
use crate::registry::StoreRegistry;
use crate::search::SearchEngine;
use crate::user::AuthService;
use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

pub type GuardedRegistry = Arc<StoreRegistry>;
pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedAuthService = Arc<AuthService>;
pub type GuardedSearchEngine = Arc<SearchEngine>;
pub type GuardedIngestionPipeline = Arc<IngestionPipeline>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub registry: GuardedRegistry,
    pub catalog_store: GuardedCatalogStore,
    pub auth: GuardedAuthService,
    pub search: GuardedSearchEngine,
    pub pipeline: GuardedIngestionPipeline,
}

impl FromRef<ServerState> for GuardedRegistry {
    fn from_ref(input: &ServerState) -> Self {
        input.registry.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthService {
    fn from_ref(input: &ServerState) -> Self {
        input.auth.clone()
    }
}

impl FromRef<ServerState> for GuardedSearchEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.search.clone()
    }
}

impl FromRef<ServerState> for GuardedIngestionPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
