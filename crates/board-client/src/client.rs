use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use board_guard::fingerprint;
use board_guard::sanitize::{validate_comment_input, validate_post_input, validate_post_update};
use board_types::api::{
    CreateCommentRequest, CreatePostRequest, CreateSessionRequest, ErrorBody, RateLimitDecision,
    SessionResponse, SessionStatus, UpdatePostRequest,
};
use board_types::models::{Category, Comment, Post};
use board_types::signals::FingerprintSignals;

use crate::error::{ClientError, Result};

/// Typed HTTP client for the board API.
///
/// Post and comment submissions are validated locally first; an invalid
/// submission fails with [`ClientError::Invalid`] before any request.
#[derive(Debug, Clone)]
pub struct BoardClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    token: Option<String>,
}

impl BoardClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            token: None,
        }
    }

    /// `BOARD_API_URL` (required) and `BOARD_API_KEY` (optional).
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BOARD_API_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ClientError::MissingConfig("BOARD_API_URL"))?;
        let api_key = std::env::var("BOARD_API_KEY").ok().filter(|v| !v.is_empty());
        Ok(Self::new(&base_url, api_key))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    // -- Posts --

    pub async fn list_posts(&self, category: Option<Category>) -> Result<Vec<Post>> {
        let mut req = self.request(Method::GET, "/posts");
        if let Some(category) = category {
            req = req.query(&[("category", category.as_str())]);
        }
        read_json(req.send().await?).await
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post> {
        let req = self.request(Method::GET, &format!("/posts/{}", id));
        read_json(req.send().await?).await
    }

    pub async fn create_post(&self, post: &CreatePostRequest) -> Result<Post> {
        validate_post_input(&post.title, &post.content, &post.author)?;

        let req = self.request(Method::POST, "/posts").json(post);
        read_json(req.send().await?).await
    }

    pub async fn update_post(&self, id: Uuid, update: &UpdatePostRequest) -> Result<Post> {
        validate_post_update(
            update.title.as_deref(),
            update.content.as_deref(),
            update.author.as_deref(),
        )?;

        let req = self
            .request(Method::PUT, &format!("/posts/{}", id))
            .json(update);
        read_json(req.send().await?).await
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<()> {
        let req = self.request(Method::DELETE, &format!("/posts/{}", id));
        expect_success(req.send().await?).await
    }

    // -- Comments --

    pub async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let req = self.request(Method::GET, &format!("/posts/{}/comments", post_id));
        read_json(req.send().await?).await
    }

    pub async fn create_comment(
        &self,
        post_id: Uuid,
        comment: &CreateCommentRequest,
    ) -> Result<Comment> {
        validate_comment_input(&comment.author, &comment.content)?;

        let req = self
            .request(Method::POST, &format!("/posts/{}/comments", post_id))
            .json(comment);
        read_json(req.send().await?).await
    }

    pub async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> Result<()> {
        let req = self.request(
            Method::DELETE,
            &format!("/posts/{}/comments/{}", post_id, comment_id),
        );
        expect_success(req.send().await?).await
    }

    // -- Admin session --

    /// Exchange the admin password for a session. The fingerprint is hashed
    /// locally from `signals`; on success the token is kept for later calls.
    pub async fn sign_in(
        &mut self,
        password: &str,
        signals: &FingerprintSignals,
    ) -> Result<SessionResponse> {
        let body = CreateSessionRequest {
            password: password.to_string(),
            fingerprint: Some(fingerprint::generate(signals).to_string()),
            signals: None,
        };

        let req = self.request(Method::POST, "/auth/session").json(&body);
        let session: SessionResponse = read_json(req.send().await?).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    pub fn sign_out(&mut self) {
        self.token = None;
    }

    pub async fn session_status(&self) -> Result<SessionStatus> {
        let req = self.request(Method::GET, "/auth/session");
        read_json(req.send().await?).await
    }

    pub async fn rate_limit_status(&self, signals: &FingerprintSignals) -> Result<RateLimitDecision> {
        let fp = fingerprint::generate(signals);
        let req = self
            .request(Method::GET, "/auth/rate-limit")
            .query(&[("fingerprint", fp.as_str())]);
        read_json(req.send().await?).await
    }

    pub async fn health(&self) -> bool {
        match self.request(Method::GET, "/health").send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let resp = check_status(resp).await?;
    Ok(resp.json::<T>().await?)
}

async fn expect_success(resp: Response) -> Result<()> {
    check_status(resp).await.map(|_| ())
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let decision = resp.json::<RateLimitDecision>().await?;
        return Err(ClientError::RateLimited(decision));
    }

    let text = resp.text().await.unwrap_or_default();
    let (message, details) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.details),
        Err(_) => (text, Vec::new()),
    };
    warn!("API error {}: {}", status, message);

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = BoardClient::new("http://localhost:3000/", None);
        assert_eq!(client.base_url(), "http://localhost:3000");
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn invalid_post_fails_before_sending() {
        // Nothing listens here; a sent request would be a transport error.
        let client = BoardClient::new("http://127.0.0.1:9", None);
        let err = client
            .create_post(&CreatePostRequest {
                title: String::new(),
                content: "Body".into(),
                author: "Ada".into(),
                category: Category::Public,
                fingerprint: None,
            })
            .await
            .unwrap_err();

        match err {
            ClientError::Invalid(invalid) => {
                assert_eq!(
                    invalid.messages(),
                    vec!["Title must be between 1 and 200 characters".to_string()]
                );
            }
            other => panic!("expected local validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_comment_fails_before_sending() {
        let client = BoardClient::new("http://127.0.0.1:9", None);
        let err = client
            .create_comment(
                Uuid::new_v4(),
                &CreateCommentRequest {
                    author: "Grace".into(),
                    content: "x".repeat(5001),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Invalid(_)));
    }

    #[test]
    fn notice_lines_include_details() {
        let err = ClientError::Api {
            status: 401,
            message: "Invalid password".into(),
            details: vec!["3 attempts remaining".into()],
        };
        assert_eq!(err.notice_lines(), vec!["Invalid password", "3 attempts remaining"]);
    }
}
