use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    // The browser frontend calls this API directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/tables", get(handlers::list_tables::<S>))
        .route("/tables", post(handlers::create_table::<S>))
        .route("/tables/search", get(handlers::search_tables::<S>))
        .route("/tables/stats", get(handlers::get_all_statistics::<S>))
        .route("/tables/:table_id", delete(handlers::delete_table::<S>))
        .route("/tables/:table_id", patch(handlers::update_table_metadata::<S>))
        .route(
            "/tables/:table_id/stats",
            get(handlers::get_table_statistics::<S>),
        )
        .route("/tables/:table_id/share", post(handlers::share_table::<S>))
        // Content
        .route("/table-contents", get(handlers::get_all_table_contents::<S>))
        .route(
            "/table-contents/:table_id",
            get(handlers::get_table_content::<S>),
        )
        // Columns
        .route("/tables/:table_id/columns", post(handlers::add_column::<S>))
        .route("/tables/:table_id/columns", patch(handlers::rename_column::<S>))
        .route("/tables/:table_id/columns", put(handlers::delete_columns::<S>))
        .route(
            "/tables/:table_id/columns/:header",
            delete(handlers::delete_column::<S>),
        )
        // Rows
        .route("/tables/:table_id/rows", post(handlers::add_row::<S>))
        .route(
            "/tables/:table_id/rows/:locator",
            patch(handlers::update_row::<S>),
        )
        .route(
            "/tables/:table_id/rows/:locator",
            delete(handlers::delete_row::<S>),
        )
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
}
