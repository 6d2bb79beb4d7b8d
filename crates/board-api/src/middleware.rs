use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use board_types::api::{ADMIN_ROLE, Claims};

use crate::error::ApiError;
use crate::state::AppState;

/// Validate the bearer token in `headers` as an admin session.
pub fn session_from_headers(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let bearer = headers.typed_get::<Authorization<Bearer>>()?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    (token_data.claims.role == ADMIN_ROLE).then_some(token_data.claims)
}

/// Extractor for handlers that only an admin may call.
pub struct AdminSession(pub Claims);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session_from_headers(&parts.headers, &state.config.jwt_secret)
            .map(AdminSession)
            .ok_or(ApiError::Unauthorized("Admin session required"))
    }
}

/// Admin claims when a valid session is presented; never rejects.
pub struct MaybeAdmin(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeAdmin(session_from_headers(
            &parts.headers,
            &state.config.jwt_secret,
        )))
    }
}

/// Best-effort caller address: first `X-Forwarded-For` hop, else the peer.
pub struct ClientIp(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Ok(ClientIp(forwarded.or_else(peer)))
    }
}

/// Reject requests without the configured public API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config.public_api_key {
        let presented = req.headers().get("apikey").and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized("Missing or invalid API key"));
        }
    }
    Ok(next.run(req).await)
}
