//! Apes.Win dice bot web server
//!
//! Multi-identity JSON API in front of the session registry.

use anyhow::{Context, Result};
use apeswin_bot::api::{create_app, AppState};
use apeswin_bot::services::RpcGateway;
use apeswin_bot::session::SessionRegistry;
use apeswin_bot::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Override with RUST_LOG, e.g. RUST_LOG=apeswin_bot=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let addr = config.server_addr;

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║       APES.WIN DICE BOT - WEB SERVER                         ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Chain ID: {:<50} ║", config.chain.chain_id);
    println!("║  RPC: {:<55} ║", config.chain.rpc_url);
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let gateway = Arc::new(RpcGateway::new(config.chain.clone(), config.lifecycle.receipt_timeout)?);
    let registry = SessionRegistry::new(gateway, config.clone());

    // A key from the environment preloads the "default" session
    if let Some(key) = config.private_key.as_deref() {
        let address = registry.update_credential("default", key).await?;
        info!("Loaded default session for {:?}", address);
    }

    let app = create_app(AppState::new(registry.clone()));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    // In-flight rounds finish before the process exits
    registry.shutdown().await;
    info!("All sessions stopped");
    Ok(())
}
