use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tamasync::{
    broadcast,
    config::{ConfigError, ServerConfig},
    engine::{EngineError, MemoryEngine, PetEngine},
    llm,
    responder::LlmResponder,
    state::AppState,
};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tamasync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    tracing::info!("Starting tamasync...");

    let config = ServerConfig::from_env()?;

    let llm_config = llm::LlmConfig::from_env();
    let llm_manager = match llm_config.build_manager() {
        Ok(manager) => {
            tracing::info!("LLM providers initialized successfully");
            Some(manager)
        }
        Err(e) => {
            tracing::warn!("{}. Using canned responses.", e);
            None
        }
    };
    let responder = LlmResponder::new(
        llm_manager,
        llm_config.default_timeout,
        llm_config.default_max_tokens,
    );

    let engine = Arc::new(MemoryEngine::default());
    engine.create(&config.pet_name).await?;

    let state = Arc::new(AppState::new(engine.clone(), Arc::new(responder)));

    // Decay the pet and push fresh state to viewers in the background
    let ticker = config.tick_interval.map(|period| {
        tracing::info!("Decay tick every {:?}", period);
        broadcast::spawn_state_ticker(engine.clone(), state.broadcaster.clone(), period)
    });

    let app = tamasync::router(state)
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, run until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
