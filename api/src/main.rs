mod api_error;
mod app_state;
mod chat_relay;
mod config;
mod document_routes;
mod router;

use anyhow::Result;
use app_state::AppState;
use config::ServerConfig;
use genie::GeminiService;
use std::sync::Arc;

async fn run() -> Result<()> {
    let config = ServerConfig::from_env()?;
    let provider = GeminiService::new()?;
    log::info!("Using model {}", provider.model());

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(Arc::new(provider), config);
    document_routes::spawn_idle_cleanup(state.clone());

    let app = router::build_router(state)?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize environment variables and logging
    dotenv::dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        eprintln!("Failed to run server: {:#}", e);
        std::process::exit(1);
    }
}
