use crate::AppState;
use crate::api::error::AppError;
use crate::services::auth::AuthDecision;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

pub const UPLOAD_TOKEN_HEADER: &str = "x-upload-token";

/// Rejects the request before its body is read unless it carries the
/// configured upload token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let decision = state.auth.verify(presented_token(req.headers()));
    match decision {
        AuthDecision::Authorized => Ok(next.run(req).await),
        AuthDecision::Unauthorized => {
            tracing::warn!("Rejected {} {}: bad or missing upload token", req.method(), req.uri());
            Err(AppError::Unauthorized(
                "Missing or invalid upload token".to_string(),
            ))
        }
    }
}

/// `X-Upload-Token` wins over `Authorization: Bearer`.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(UPLOAD_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_presented_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(presented_token(&headers), Some("abc"));

        headers.insert(UPLOAD_TOKEN_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_token(&headers), Some("xyz"));
    }

    #[test]
    fn test_non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(presented_token(&headers), None);
    }
}
