use crate::api::handlers::ErrorResponse;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::Json,
};

/// The authenticated caller, taken from the `X-User-Id` header.
///
/// Authentication itself (JWT verification, cookie handling) is an
/// external collaborator: the gateway in front of this service validates
/// the token and forwards the principal id in the header. A request
/// without one is rejected before any handler runs.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match extract_header_value(&parts.headers, "x-user-id") {
            Some(id) if !id.trim().is_empty() => Ok(Principal { id }),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "unauthorized",
                    "Authentication credentials were not provided or are invalid.",
                )),
            )),
        }
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}
