use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diamond_api::certificate::extractor::SpecExtractor;
use diamond_api::certificate::ingest::PdfTextExtractor;
use diamond_api::config::Config;
use diamond_api::db::create_pool;
use diamond_api::llm_client::{self, LlmClient};
use diamond_api::routes::build_router;
use diamond_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Diamond API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL is optional
    let db = match &config.database_url {
        Some(url) => Some(create_pool(url).await?),
        None => {
            warn!("DATABASE_URL not set; persistence endpoints will answer 503");
            None
        }
    };

    let llm = LlmClient::new(config.openai_api_key.clone(), &config.openai_base_url)?;
    if llm.is_configured() {
        info!(
            "LLM client initialized (analysis: {}, chat: {})",
            llm_client::ANALYSIS_MODEL,
            llm_client::CHAT_MODEL
        );
    } else {
        warn!("OPENAI_API_KEY not set; analysis and chat requests will fail with 500");
    }

    let state = AppState {
        db,
        llm: Arc::new(llm),
        pdf: Arc::new(PdfTextExtractor),
        spec_extractor: Arc::new(SpecExtractor::new()?),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
