//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        ClaudeAdapter, ClaudeSettings, DbAdapter, HttpCaptionFetcher, RetryPolicy, YtDlpAdapter,
    },
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use lattice_core::{ConceptRange, ContentPipeline, Deriver, TranscriptAcquirer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let ytdlp = Arc::new(YtDlpAdapter::locate(
        config.ytdlp_path.clone(),
        config.tool_timeout,
    ));
    let caption_fetcher = Arc::new(
        HttpCaptionFetcher::new(config.caption_timeout)
            .map_err(|e| ApiError::Internal(format!("caption client: {}", e)))?,
    );

    if config.claude_api_key.is_none() {
        warn!("CLAUDE_API_KEY is not set; derivation stages will fail");
    }
    let claude = Arc::new(
        ClaudeAdapter::new(ClaudeSettings {
            api_key: config.claude_api_key.clone(),
            model: config.claude_model.clone(),
            base_url: config.claude_base_url.clone(),
            max_tokens: config.claude_max_tokens,
            temperature: None,
            timeout: config.claude_timeout,
            retry: RetryPolicy::default(),
        })
        .map_err(|e| ApiError::Internal(format!("messages client: {}", e)))?,
    );

    // --- 4. Assemble the Pipeline & Shared AppState ---
    let acquirer = TranscriptAcquirer::new(ytdlp, caption_fetcher);
    let deriver = Deriver::new(
        claude,
        ConceptRange {
            min: config.concepts_min,
            max: config.concepts_max,
        },
    );
    let pipeline = ContentPipeline::new(db_adapter.clone(), acquirer, deriver);

    let shutdown = CancellationToken::new();
    let app_state = Arc::new(AppState {
        repo: db_adapter,
        pipeline: Arc::new(pipeline),
        shutdown: shutdown.clone(),
    });

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let app = Router::new()
        .merge(web::router(app_state))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested; cancelling in-flight pipelines");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
