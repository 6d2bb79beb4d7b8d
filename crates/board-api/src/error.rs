use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use board_guard::sanitize::InvalidInput;
use board_types::api::{ErrorBody, RateLimitDecision};
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] InvalidInput),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Invalid password")]
    InvalidPassword { remaining_attempts: Option<u32> },

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Too many failed attempts")]
    RateLimited(RateLimitDecision),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::InvalidPassword { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Extractor rejections become JSON 400s like every other client error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            // The throttle decision is the body so clients can show the wait.
            Self::RateLimited(decision) => return (status, Json(decision)).into_response(),
            Self::Validation(invalid) => ErrorBody {
                error: "Invalid input".to_string(),
                details: invalid.messages(),
            },
            Self::InvalidPassword { remaining_attempts } => ErrorBody {
                error: "Invalid password".to_string(),
                details: remaining_attempts
                    .map(|n| vec![format!("{} attempts remaining", n)])
                    .unwrap_or_default(),
            },
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: vec![],
                }
            }
            other => ErrorBody {
                error: other.to_string(),
                details: vec![],
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use board_guard::sanitize::ValidationError;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::NotFound("Post").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::RateLimited(RateLimitDecision::default()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Validation(InvalidInput { errors: vec![ValidationError::Title] }).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(ApiError::NotFound("Comment").to_string(), "Comment not found");
    }
}
