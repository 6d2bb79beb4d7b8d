use board_guard::sanitize::InvalidInput;
use board_types::api::RateLimitDecision;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Invalid(#[from] InvalidInput),

    #[error("{0} is not set")]
    MissingConfig(&'static str),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Too many failed attempts")]
    RateLimited(RateLimitDecision),

    #[error("{status}: {message}")]
    Api {
        status: u16,
        message: String,
        details: Vec<String>,
    },
}

impl ClientError {
    /// Lines suitable for a user-facing notice.
    pub fn notice_lines(&self) -> Vec<String> {
        match self {
            Self::Invalid(invalid) => invalid.messages(),
            Self::RateLimited(decision) => vec![
                decision
                    .reason
                    .clone()
                    .unwrap_or_else(|| self.to_string()),
            ],
            Self::Api { message, details, .. } => {
                let mut lines = vec![message.clone()];
                lines.extend(details.iter().cloned());
                lines
            }
            other => vec![other.to_string()],
        }
    }
}
