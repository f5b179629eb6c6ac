use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::SESSION_COOKIE;
use crate::api::state::AppState;
use crate::crypto::{hash_password, verify_password_timing_safe};
use crate::db::{SessionRepository, UserRepository};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub created_at: String,
}

impl From<crate::db::User> for UserResponse {
    fn from(user: crate::db::User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Validate and sanitize username
fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();

    if trimmed.len() < 3 || trimmed.len() > 32 {
        return Err(AppError::Validation(
            "Username must be 3-32 characters".to_string(),
        ));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation(
            "Username must be alphanumeric, underscore, or hyphen".to_string(),
        ));
    }

    Ok(trimmed.to_lowercase())
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = validate_username(&req.username)?;

    if req.password.len() < 12 {
        return Err(AppError::Validation(
            "Password must be at least 12 characters".to_string(),
        ));
    }

    let email = match req.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if email.is_empty() {
                None
            } else if !email.contains('@') {
                return Err(AppError::Validation("Invalid email address".to_string()));
            } else {
                Some(email)
            }
        }
        None => None,
    };

    let password_hash = hash_password(&req.password)?;
    let user = UserRepository::create(&state.db, username, &password_hash, email).await?;

    // Log the new user in right away
    let session =
        SessionRepository::create(&state.db, &user.id, state.config.session_expiry_hours).await?;
    let cookie = session_cookie(&session.token, state.config.session_expiry_hours * 3600);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(UserResponse::from(user)),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = validate_username(&req.username)
        .map_err(|_| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let user = UserRepository::get_by_username(&state.db, &username).await?;

    // Verify against a dummy hash when the user is unknown so both paths take
    // comparable time.
    let verified = verify_password_timing_safe(
        &req.password,
        user.as_ref().map(|u| u.password_hash.as_str()),
    )?;
    let user = match (user, verified) {
        (Some(user), true) => user,
        _ => return Err(AppError::Unauthorized("Invalid credentials".to_string())),
    };

    let session =
        SessionRepository::create(&state.db, &user.id, state.config.session_expiry_hours).await?;
    let cookie = session_cookie(&session.token, state.config.session_expiry_hours * 3600);

    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(UserResponse::from(user)),
    ))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, AppError> {
    // Best effort: drop the session row if the cookie is present
    if let Some(header) = request.headers().get("Cookie").and_then(|h| h.to_str().ok()) {
        if let Some(token) = header.split(';').find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_string())
        }) {
            SessionRepository::delete(&state.db, &token).await?;
        }
    }

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie("", 0))]),
        Json(serde_json::json!({"status": "logged_out"})),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user_id): Extension<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = UserRepository::get_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid session".to_string()))?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_normalized() {
        assert_eq!(validate_username("  Alice_1 ").unwrap(), "alice_1");
    }

    #[test]
    fn test_username_length_bounds() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(33)).is_err());
        assert!(validate_username(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_username_rejects_special_characters() {
        assert!(validate_username("alice!").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("alice-1_2").is_ok());
    }
}
