use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Deserialize;
use tracing::{info, warn};

use board_guard::fingerprint::{self, Fingerprint};
use board_types::api::{
    ADMIN_ROLE, Claims, CreateSessionRequest, SessionResponse, SessionStatus,
};
use board_types::signals::FingerprintSignals;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{ClientIp, MaybeAdmin};
use crate::state::{AppState, blocking};

#[derive(Debug, Deserialize)]
pub struct RateLimitQuery {
    pub fingerprint: Option<String>,
}

/// POST /auth/session: exchange the admin password for a session token.
///
/// The throttle is consulted first; a denied fingerprint never reaches the
/// password comparison. Allowed attempts wait out the suggested delay.
pub async fn create_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    WithRejection(Json(req), _): WithRejection<Json<CreateSessionRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let fp = resolve_fingerprint(req.fingerprint.as_deref(), req.signals.as_ref(), &headers)?;

    let check_fp = fp.clone();
    let decision = blocking(&state, move |s| Ok(s.limiter.check(&check_fp))).await?;
    if !decision.allowed {
        warn!(fingerprint = %fp, "Login attempt denied by rate limiter");
        return Err(ApiError::RateLimited(decision));
    }

    if let Some(ms) = decision.wait_time_ms.filter(|ms| *ms > 0) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let record_fp = fp.clone();
    let password = req.password;
    let ok = blocking(&state, move |s| {
        let ok = verify_password(&s.config.admin_password_hash, &password)?;
        s.limiter.record(&record_fp, ok, ip);
        Ok(ok)
    })
    .await?;

    if !ok {
        warn!(fingerprint = %fp, "Failed admin login");
        return Err(ApiError::InvalidPassword {
            remaining_attempts: decision.remaining_attempts.map(|n| n.saturating_sub(1)),
        });
    }

    let expires_at = Utc::now() + state.config.session_ttl;
    let token = create_token(&state.config.jwt_secret, expires_at)?;

    info!(fingerprint = %fp, "Admin session issued");
    Ok(Json(SessionResponse { token, expires_at }))
}

/// GET /auth/session: whether the presented token is a live admin session.
pub async fn session_status(MaybeAdmin(claims): MaybeAdmin) -> Json<SessionStatus> {
    Json(SessionStatus {
        admin: claims.is_some(),
        expires_at: claims.and_then(|c| DateTime::from_timestamp(c.exp as i64, 0)),
    })
}

/// GET /auth/rate-limit: current throttle decision without recording an attempt.
pub async fn rate_limit_status(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<RateLimitQuery>, ApiError>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let fp = resolve_fingerprint(query.fingerprint.as_deref(), None, &headers)?;
    let decision = blocking(&state, move |s| Ok(s.limiter.check(&fp))).await?;
    Ok(Json(decision))
}

/// Explicit fingerprint, else one generated from reported signals, else a
/// degraded one from request headers.
pub fn resolve_fingerprint(
    explicit: Option<&str>,
    signals: Option<&FingerprintSignals>,
    headers: &HeaderMap,
) -> ApiResult<Fingerprint> {
    if let Some(raw) = explicit {
        return Fingerprint::parse(raw).map_err(|e| ApiError::BadRequest(e.to_string()));
    }

    if let Some(signals) = signals {
        return Ok(fingerprint::generate(signals));
    }

    let header_str = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    let signals = fingerprint::signals_from_headers(
        header_str(header::USER_AGENT),
        header_str(header::ACCEPT_LANGUAGE),
    );
    Ok(fingerprint::generate(&signals))
}

/// Hash a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// A malformed stored hash is an error; a wrong password is `Ok(false)`.
pub fn verify_password(phc_hash: &str, password: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(phc_hash).map_err(|e| anyhow::anyhow!("Bad admin password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(secret: &str, expires_at: DateTime<Utc>) -> anyhow::Result<String> {
    let claims = Claims {
        sub: ADMIN_ROLE.to_string(),
        role: ADMIN_ROLE.to_string(),
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
