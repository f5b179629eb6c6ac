use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;
use crate::db::SessionRepository;
use crate::error::AppError;

pub const SESSION_COOKIE: &str = "session_token";

/// Authentication middleware - resolves the session cookie to a user id and
/// stores it in request extensions for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&request)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;

    let session = SessionRepository::get_by_token(&state.db, &token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(session.user_id);

    Ok(next.run(request).await)
}

/// Pull the session token out of the Cookie header.
fn session_token(request: &Request) -> Option<String> {
    let header = request.headers().get("Cookie")?.to_str().ok()?;

    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == SESSION_COOKIE && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_cookie(value: &str) -> Request {
        Request::builder()
            .header("Cookie", value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extracts_session_token() {
        let req = request_with_cookie("session_token=abc-123");
        assert_eq!(session_token(&req).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_finds_token_among_other_cookies() {
        let req = request_with_cookie("theme=dark; session_token=abc-123; lang=da");
        assert_eq!(session_token(&req).as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        let req = request_with_cookie("theme=dark");
        assert_eq!(session_token(&req), None);

        let req = request_with_cookie("session_token=");
        assert_eq!(session_token(&req), None);
    }
}
