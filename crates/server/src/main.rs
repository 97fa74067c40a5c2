use std::sync::Arc;
use std::time::Duration;

use db::DBService;
use db::models::generated_review::ReviewProvider;
use server::config::Config;
use server::{AppState, routes};
use services::services::auth::AuthService;
use services::services::gemini_api::GeminiApiClient;
use services::services::generation::ReviewGenerationService;
use services::services::openai_api::OpenAiApiClient;
use services::services::review_writer::ReviewWriter;
use services::services::supabase_sync::SupabaseSyncService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    config.log_summary();

    let db = DBService::new(&config.db_path).await?;

    let writers = build_writers(&config)?;
    if writers.is_empty() {
        warn!("no LLM api key configured, every review will come from the canned library");
    }
    let generation = ReviewGenerationService::new(db.pool.clone(), writers);

    let auth = AuthService::new(
        config.owner_mobile.clone(),
        config.owner_password.clone(),
        config.token_secret.clone(),
    );

    let sync = match &config.supabase {
        Some(supabase) => {
            let service = Arc::new(SupabaseSyncService::new(
                db.pool.clone(),
                &supabase.url,
                supabase.service_key.clone(),
                Duration::from_secs(config.sync_interval_secs),
            )?);
            // An unreachable remote at boot is not fatal, the local store
            // serves on its own until the push loop catches up.
            match service.hydrate().await {
                Ok(applied) => info!(applied, "hydrated from supabase"),
                Err(e) => warn!("startup hydration failed, serving from local store: {}", e),
            }
            service.clone().spawn();
            Some(service)
        }
        None => {
            info!("supabase not configured, running in pure local mode");
            None
        }
    };

    let state = AppState::new(db, auth, generation, sync);
    let app = routes::router(&state)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// One writer per configured API key, primary provider first.
fn build_writers(config: &Config) -> anyhow::Result<Vec<Arc<dyn ReviewWriter>>> {
    let mut writers: Vec<Arc<dyn ReviewWriter>> = Vec::new();
    for provider in config.provider_order() {
        match provider {
            ReviewProvider::Gemini => {
                if let Some(key) = config.gemini_api_key.clone() {
                    writers.push(Arc::new(GeminiApiClient::new(
                        key,
                        config.gemini_model.clone(),
                    )?));
                }
            }
            ReviewProvider::Openai => {
                if let Some(key) = config.openai_api_key.clone() {
                    writers.push(Arc::new(OpenAiApiClient::new(
                        key,
                        config.openai_model.clone(),
                    )?));
                }
            }
            ReviewProvider::Canned => {}
        }
    }
    Ok(writers)
}
