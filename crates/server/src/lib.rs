pub mod config;
pub mod error;
pub mod routes;
pub mod session;

use std::sync::Arc;

use db::DBService;
use services::services::auth::AuthService;
use services::services::generation::ReviewGenerationService;
use services::services::supabase_sync::SupabaseSyncService;
use tracing::warn;

/// Shared handle passed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    auth: Arc<AuthService>,
    generation: Arc<ReviewGenerationService>,
    sync: Option<Arc<SupabaseSyncService>>,
}

impl AppState {
    pub fn new(
        db: DBService,
        auth: AuthService,
        generation: ReviewGenerationService,
        sync: Option<Arc<SupabaseSyncService>>,
    ) -> Self {
        Self {
            db,
            auth: Arc::new(auth),
            generation: Arc::new(generation),
            sync,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn generation(&self) -> &ReviewGenerationService {
        &self.generation
    }

    pub fn sync(&self) -> Option<&Arc<SupabaseSyncService>> {
        self.sync.as_ref()
    }

    /// Kick off a push pass without blocking the request that caused it.
    /// No-op when the server runs in pure local mode.
    pub fn spawn_sync(&self) {
        if let Some(sync) = self.sync.clone() {
            tokio::spawn(async move {
                if let Err(e) = sync.sync_once().await {
                    warn!("background sync failed: {}", e);
                }
            });
        }
    }
}
