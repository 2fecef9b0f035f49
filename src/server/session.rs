//! Session extraction for authorized routes.

use super::state::ServerState;
use crate::user::{AuthError, Session};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use tracing::debug;

pub const COOKIE_SESSION_TOKEN_KEY: &str = "session_token";
pub const HEADER_SESSION_TOKEN_KEY: &str = "Authorization";

/// A request-scoped admin session. Extracting it is the only way an
/// authorized handler runs, there is no ambient authentication state.
#[derive(Debug)]
pub struct AdminSession(pub Session);

pub enum SessionExtractionError {
    /// No token was supplied, or the token is not recognized.
    AccessDenied,
    /// The token was recognized but is past its TTL.
    Expired,
    InternalError,
}

impl IntoResponse for SessionExtractionError {
    fn into_response(self) -> axum::response::Response {
        // Invalid and expired are both unauthenticated; the category is
        // distinct so the client can say "log in again" for the latter.
        match self {
            SessionExtractionError::AccessDenied => {
                (StatusCode::FORBIDDEN, Json(json!({"error": "invalid_token"}))).into_response()
            }
            SessionExtractionError::Expired => {
                (StatusCode::FORBIDDEN, Json(json!({"error": "expired_token"}))).into_response()
            }
            SessionExtractionError::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn extract_session_token_from_cookies(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Option<String> {
    CookieJar::from_request_parts(parts, ctx)
        .await
        .ok()?
        .get(COOKIE_SESSION_TOKEN_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

fn extract_session_token_from_headers(parts: &mut Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SESSION_TOKEN_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).to_string())
}

impl FromRequestParts<ServerState> for AdminSession {
    type Rejection = SessionExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token_from_cookies(parts, ctx)
            .await
            .or_else(|| extract_session_token_from_headers(parts))
            .ok_or_else(|| {
                debug!("No session token in cookies nor headers.");
                SessionExtractionError::AccessDenied
            })?;

        match ctx.auth.validate(&token) {
            Ok(session) => Ok(AdminSession(session)),
            Err(AuthError::ExpiredToken) => {
                debug!("Rejected request with expired session token");
                Err(SessionExtractionError::Expired)
            }
            Err(AuthError::InvalidToken) | Err(AuthError::InvalidCredentials) => {
                debug!("Rejected request with unknown session token");
                Err(SessionExtractionError::AccessDenied)
            }
            Err(AuthError::Storage(err)) => {
                debug!("Failed to resolve session token: {}", err);
                Err(SessionExtractionError::InternalError)
            }
        }
    }
}
