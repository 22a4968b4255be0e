use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::api::principal::Principal;
use crate::logic::contacts::ContactGraph;
use crate::logic::mutator::TableMutator;
use crate::logic::query::{QueryFacade, TableContent};
use crate::model::{Id, NewTable, ShareAction, Table, TableError, TableStats, TableUpdate};
use crate::store::traits::Store;

/// Shared application context: one mutator and one read facade over the
/// same store.
pub struct AppContext<S> {
    pub mutator: TableMutator<S>,
    pub facade: QueryFacade<S>,
}

impl<S: Store> AppContext<S> {
    pub fn new(store: Arc<S>, contacts: Arc<dyn ContactGraph>) -> Self {
        Self {
            mutator: TableMutator::new(store.clone(), contacts),
            facade: QueryFacade::new(store),
        }
    }
}

pub type AppState<S> = Arc<AppContext<S>>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

/// Error body carrying the structured detail an automated caller needs to
/// self-correct (current headers on schema violations, offending keys on
/// unknown columns).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_headers: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(kind: &str, message: &str) -> Self {
        Self {
            error: message.to_string(),
            kind: kind.to_string(),
            unknown_columns: None,
            expected_headers: None,
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: TableError) -> ApiError {
    let status = match &err {
        TableError::InvalidInput(_) | TableError::NoChange => StatusCode::BAD_REQUEST,
        TableError::Forbidden => StatusCode::FORBIDDEN,
        TableError::TableNotFound(_)
        | TableError::HeaderNotFound(_)
        | TableError::RowNotFound(_) => StatusCode::NOT_FOUND,
        TableError::DuplicateHeader(_) | TableError::UnknownColumns { .. } => StatusCode::CONFLICT,
        TableError::Storage(e) => {
            log::error!("storage failure: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut body = ErrorResponse::new(err.kind(), &err.to_string());
    if let TableError::UnknownColumns {
        unknown,
        expected_headers,
    } = err
    {
        body.unknown_columns = Some(unknown);
        body.expected_headers = Some(expected_headers);
    }
    (status, Json(body))
}

// ---- Catalog ----

pub async fn list_tables<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
) -> Result<Json<ListResponse<Table>>, ApiError> {
    match state.facade.list_accessible(&principal.id).await {
        Ok(tables) => Ok(Json(ListResponse::new(tables))),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn search_tables<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListResponse<Table>>, ApiError> {
    match state.facade.search(&principal.id, &query.q).await {
        Ok(tables) => Ok(Json(ListResponse::new(tables))),
        Err(e) => Err(error_response(e)),
    }
}

// ---- Table lifecycle ----

#[derive(Debug, Serialize)]
pub struct CreateTableResponse {
    pub table_id: Id,
    pub name: String,
    pub headers: Vec<String>,
}

pub async fn create_table<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    RequestJson(new_table): RequestJson<NewTable>,
) -> Result<(StatusCode, Json<CreateTableResponse>), ApiError> {
    match state.mutator.create_table(&principal.id, new_table).await {
        Ok(aggregate) => Ok((
            StatusCode::CREATED,
            Json(CreateTableResponse {
                table_id: aggregate.table.id,
                name: aggregate.table.name,
                headers: aggregate.schema.headers,
            }),
        )),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteTableResponse {
    pub deleted_table: String,
}

pub async fn delete_table<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
) -> Result<Json<DeleteTableResponse>, ApiError> {
    match state.mutator.delete_table(&principal.id, &table_id).await {
        Ok(name) => Ok(Json(DeleteTableResponse {
            deleted_table: name,
        })),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn update_table_metadata<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
    RequestJson(update): RequestJson<TableUpdate>,
) -> Result<Json<Table>, ApiError> {
    match state
        .mutator
        .update_metadata(&principal.id, &table_id, update)
        .await
    {
        Ok(table) => Ok(Json(table)),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub principal_ids: Vec<Id>,
    pub action: ShareAction,
}

pub async fn share_table<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
    RequestJson(request): RequestJson<ShareRequest>,
) -> Result<Json<Table>, ApiError> {
    match state
        .mutator
        .share(&principal.id, &table_id, request.principal_ids, request.action)
        .await
    {
        Ok(table) => Ok(Json(table)),
        Err(e) => Err(error_response(e)),
    }
}

// ---- Content reads ----

pub async fn get_all_table_contents<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
) -> Result<Json<ListResponse<TableContent>>, ApiError> {
    match state.facade.get_content(&principal.id, None).await {
        Ok(contents) => Ok(Json(ListResponse::new(contents))),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn get_table_content<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
) -> Result<Json<TableContent>, ApiError> {
    match state.facade.get_content(&principal.id, Some(&table_id)).await {
        Ok(mut contents) => Ok(Json(contents.remove(0))),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn get_all_statistics<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
) -> Result<Json<ListResponse<TableStats>>, ApiError> {
    match state.facade.get_statistics(&principal.id, None).await {
        Ok(stats) => Ok(Json(ListResponse::new(stats))),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn get_table_statistics<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
) -> Result<Json<TableStats>, ApiError> {
    match state
        .facade
        .get_statistics(&principal.id, Some(&table_id))
        .await
    {
        Ok(mut stats) => Ok(Json(stats.remove(0))),
        Err(e) => Err(error_response(e)),
    }
}

// ---- Columns ----

#[derive(Debug, Serialize)]
pub struct HeadersResponse {
    pub headers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddColumnRequest {
    pub header: String,
}

pub async fn add_column<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
    RequestJson(request): RequestJson<AddColumnRequest>,
) -> Result<Json<HeadersResponse>, ApiError> {
    match state
        .mutator
        .add_column(&principal.id, &table_id, &request.header)
        .await
    {
        Ok(headers) => Ok(Json(HeadersResponse { headers })),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct RenameColumnRequest {
    pub old_header: String,
    pub new_header: String,
}

pub async fn rename_column<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
    RequestJson(request): RequestJson<RenameColumnRequest>,
) -> Result<Json<HeadersResponse>, ApiError> {
    match state
        .mutator
        .rename_column(&principal.id, &table_id, &request.old_header, &request.new_header)
        .await
    {
        Ok(headers) => Ok(Json(HeadersResponse { headers })),
        Err(e) => Err(error_response(e)),
    }
}

/// Headers the caller wants to keep; everything else is removed.
#[derive(Debug, Deserialize)]
pub struct DeleteColumnsRequest {
    pub headers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteColumnsResponse {
    pub headers: Vec<String>,
    pub removed: Vec<String>,
}

pub async fn delete_columns<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
    RequestJson(request): RequestJson<DeleteColumnsRequest>,
) -> Result<Json<DeleteColumnsResponse>, ApiError> {
    match state
        .mutator
        .delete_columns(&principal.id, &table_id, request.headers)
        .await
    {
        Ok((headers, removed)) => Ok(Json(DeleteColumnsResponse { headers, removed })),
        Err(e) => Err(error_response(e)),
    }
}

pub async fn delete_column<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path((table_id, header)): Path<(Id, String)>,
) -> Result<Json<HeadersResponse>, ApiError> {
    match state
        .mutator
        .delete_column(&principal.id, &table_id, &header)
        .await
    {
        Ok(headers) => Ok(Json(HeadersResponse { headers })),
        Err(e) => Err(error_response(e)),
    }
}

// ---- Rows ----

#[derive(Debug, Deserialize)]
pub struct AddRowRequest {
    pub row: Map<String, Value>,
}

pub async fn add_row<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(table_id): Path<Id>,
    RequestJson(request): RequestJson<AddRowRequest>,
) -> Result<(StatusCode, Json<Map<String, Value>>), ApiError> {
    match state.mutator.add_row(&principal.id, &table_id, request.row).await {
        Ok(row) => Ok((StatusCode::CREATED, Json(row.annotated_data()))),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRowRequest {
    pub new_row: Map<String, Value>,
}

pub async fn update_row<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path((table_id, locator)): Path<(Id, String)>,
    RequestJson(request): RequestJson<UpdateRowRequest>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    match state
        .mutator
        .update_row(&principal.id, &table_id, &locator, request.new_row)
        .await
    {
        Ok(row) => Ok(Json(row.annotated_data())),
        Err(e) => Err(error_response(e)),
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteRowResponse {
    pub deleted_row_id: Id,
}

pub async fn delete_row<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path((table_id, locator)): Path<(Id, String)>,
) -> Result<Json<DeleteRowResponse>, ApiError> {
    match state
        .mutator
        .delete_row(&principal.id, &table_id, &locator)
        .await
    {
        Ok(row) => Ok(Json(DeleteRowResponse {
            deleted_row_id: row.row_id,
        })),
        Err(e) => Err(error_response(e)),
    }
}
