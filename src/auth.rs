//! HTTP Basic authentication against the seeded API key table.
//!
//! Mirrors `BasicAuthAuthenticationPolicy`/`check_credentials` in the
//! original: the username is the numeric user id, the password is that
//! user's API key. There is no session or token refresh — every request
//! re-authenticates.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde_json::json;

use crate::state::AppState;

pub struct AuthError(StatusCode, &'static str);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

/// The authenticated caller's user id. Handlers taking `AuthUser` as an
/// extractor argument get a request that has already passed credential
/// checks; there is no anonymous path to the order endpoints.
pub struct AuthUser(pub u64);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError(StatusCode::UNAUTHORIZED, "missing credentials"))?
            .to_str()
            .map_err(|_| AuthError(StatusCode::UNAUTHORIZED, "malformed credentials"))?;

        let encoded = header
            .strip_prefix("Basic ")
            .ok_or(AuthError(StatusCode::UNAUTHORIZED, "expected basic auth"))?;

        let decoded = B64
            .decode(encoded)
            .map_err(|_| AuthError(StatusCode::UNAUTHORIZED, "malformed credentials"))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| AuthError(StatusCode::UNAUTHORIZED, "malformed credentials"))?;

        let (user_id, key) = decoded
            .split_once(':')
            .ok_or(AuthError(StatusCode::UNAUTHORIZED, "malformed credentials"))?;
        let user_id: u64 = user_id
            .parse()
            .map_err(|_| AuthError(StatusCode::UNAUTHORIZED, "malformed credentials"))?;

        let store = state.store.lock().await;
        match store.authenticate(user_id, key) {
            Ok(Some(id)) => Ok(AuthUser(id)),
            Ok(None) => Err(AuthError(StatusCode::UNAUTHORIZED, "invalid credentials")),
            Err(_) => Err(AuthError(StatusCode::INTERNAL_SERVER_ERROR, "store error")),
        }
    }
}
