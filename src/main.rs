use fintab_db_rust::config::AppConfig;
use fintab_db_rust::{router_for_store, MemoryStore, PostgresStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with explicit filter to suppress sqlx debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .init();

    println!("FINTAB-DB: Dynamic Table Server");

    // Load configuration
    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let app = match config.database_url() {
        Some(database_url) => {
            println!("Connecting to PostgreSQL...");
            let max_connections = config.database.max_connections.unwrap_or(20);
            let postgres_store = PostgresStore::new(&database_url, max_connections).await?;

            println!("Running database migrations...");
            postgres_store.migrate().await?;
            println!("Database ready");

            router_for_store(Arc::new(postgres_store)).await?
        }
        None => {
            println!("No database configured, using the in-memory store");
            router_for_store(Arc::new(MemoryStore::new())).await?
        }
    };

    run_server(app, &config).await?;

    Ok(())
}

async fn run_server(app: axum::Router, config: &AppConfig) -> anyhow::Result<()> {
    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    println!("FINTAB-DB server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
