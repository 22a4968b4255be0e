pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{
    ContactGraph, OpenContacts, QueryFacade, StaticContacts, TableContent, TableLocks,
    TableMutator,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PostgresStore, Store};

use crate::api::handlers::AppContext;
use std::sync::Arc;

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with INFO level only (suppress DEBUG logs)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    // Load configuration
    let config = crate::config::AppConfig::load()?;

    let app = match config.database_url() {
        Some(database_url) => {
            let max_connections = config.database.max_connections.unwrap_or(20);
            let postgres_store = PostgresStore::new(&database_url, max_connections).await?;
            postgres_store.migrate().await?;
            router_for_store(Arc::new(postgres_store)).await?
        }
        None => router_for_store(Arc::new(MemoryStore::new())).await?,
    };

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router for a store, loading seed data when requested.
pub async fn router_for_store<S: Store + 'static>(store: Arc<S>) -> anyhow::Result<axum::Router> {
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        seed::load_seed_data(&*store).await?;
    }

    // The open contact graph stands in for the user service's friends
    // list until one is wired up.
    let contacts: Arc<dyn ContactGraph> = Arc::new(OpenContacts);
    let state = Arc::new(AppContext::new(store, contacts));

    Ok(crate::api::routes::create_router().with_state(state))
}
