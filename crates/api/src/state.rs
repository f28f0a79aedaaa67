use std::sync::Arc;

use tollsync_core::error::CoreError;
use tollsync_core::storage::{
    CandidateSource, HealthProbe, ImportSessionStore, MappingStore, TollRecordStore,
};
use tollsync_pipeline::{ImportCoordinator, MappingEngine, TollRecordService};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every service holds its collaborators behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub imports: ImportCoordinator,
    pub records: TollRecordService,
    pub mappings: MappingEngine,
    /// Storage reachability for `/health`.
    pub health: Arc<dyn HealthProbe>,
}

impl AppState {
    /// Wire every service to one store that implements all storage traits.
    pub fn new<S>(
        config: ServerConfig,
        store: Arc<S>,
        candidates: Arc<dyn CandidateSource>,
    ) -> Result<Self, CoreError>
    where
        S: TollRecordStore + MappingStore + ImportSessionStore + HealthProbe + 'static,
    {
        let pipeline = &config.pipeline;
        let imports = ImportCoordinator::new(store.clone(), store.clone(), pipeline.clone());
        let records = TollRecordService::new(store.clone(), pipeline.delete_policy);
        let mappings = MappingEngine::new(store.clone(), store.clone(), candidates, pipeline)?;

        Ok(Self {
            config: Arc::new(config),
            imports,
            records,
            mappings,
            health: store,
        })
    }
}
