//! Bearer token middleware for `/api` routes

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::authn::jwt::{bearer_token, UserClaims};
use crate::errors::AuthError;
use crate::server::state::ServerState;

/// Reject requests without a valid token.
///
/// Browsers cannot set headers on WebSocket upgrades, so a `token` query
/// parameter is accepted as well. Verified claims are stored as a request
/// extension.
pub async fn require_auth(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request_token(&request) {
        Some(token) => token,
        None => return unauthorized(AuthError::MissingToken),
    };

    match state.verifier.verify(&token) {
        Ok(claims) => {
            request.extensions_mut().insert::<UserClaims>(claims);
            next.run(request).await
        }
        Err(e) => unauthorized(e),
    }
}

fn request_token(request: &Request) -> Option<String> {
    if let Some(header) = request.headers().get(AUTHORIZATION) {
        return header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .map(str::to_string);
    }

    request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    })
}

fn unauthorized(err: AuthError) -> Response {
    debug!("Rejected request: {}", err);
    let message = match err {
        AuthError::MissingToken => "Missing or invalid Authorization header",
        AuthError::InvalidToken(_) => "Invalid or expired token",
    };
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
