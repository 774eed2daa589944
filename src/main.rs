//! Stateless Chess server binary.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stateless_chess::{
    AppState, Cli, Command, GameStore, LogNotifier, MoveAuthorizer, NotificationQueue,
    ChessRules, ServerConfig, router,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            port,
            host,
            database,
            base_url,
        } => serve(port, host, database, base_url).await,
    }
}

/// Runs the HTTP server until interrupted.
async fn serve(
    port: Option<u16>,
    host: Option<String>,
    database: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let env = ServerConfig::from_env()?;
    let config = ServerConfig::new(
        env.secret().clone(),
        database.unwrap_or_else(|| env.database_url().clone()),
        base_url.unwrap_or_else(|| env.base_url().clone()),
        host.unwrap_or_else(|| env.host().clone()),
        port.unwrap_or(*env.port()),
    );

    let store = GameStore::new(config.database_url().clone())?;
    let (notifications, rx) = NotificationQueue::channel();
    NotificationQueue::spawn_worker(rx, Arc::new(LogNotifier));

    let authorizer = Arc::new(MoveAuthorizer::new(
        &config,
        Arc::new(ChessRules::new()),
        notifications,
    ));
    let app = router(AppState {
        authorizer,
        store,
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, base_url = %config.base_url(), "Server ready");

    axum::serve(listener, app).await?;
    Ok(())
}
