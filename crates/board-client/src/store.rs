//! View state for a board front end as a reducer.
//!
//! Every change goes through [`reduce`]: the UI dispatches an [`Action`],
//! gets a new [`BoardState`] back and renders it. Network effects live in
//! [`Store`], which performs a call and dispatches its outcome.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use board_types::api::{
    CreateCommentRequest, CreatePostRequest, RateLimitDecision, SessionResponse, UpdatePostRequest,
};
use board_types::models::{Category, Comment, Post};
use board_types::signals::FingerprintSignals;

use crate::client::BoardClient;
use crate::error::ClientError;

pub const POST_DELETE_DISABLED: &str = "Post deletion is disabled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Self::Info(m) | Self::Error(m) => m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    pub posts: Vec<Post>,
    pub category: Option<Category>,
    pub loading: bool,
    pub selected: Option<Post>,
    pub comments: Vec<Comment>,
    pub admin: Option<AdminSession>,
    pub rate_limit: Option<RateLimitDecision>,
    pub notice: Option<Notice>,
}

impl BoardState {
    pub fn is_admin_at(&self, now: DateTime<Utc>) -> bool {
        self.admin.as_ref().is_some_and(|s| s.expires_at > now)
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin_at(Utc::now())
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    LoadRequested { category: Option<Category> },
    PostsLoaded(Vec<Post>),
    /// The previous list stays on screen.
    LoadFailed(String),

    PostSelected(Post),
    CommentsLoaded(Vec<Comment>),
    DetailClosed,

    /// A created or edited post, as returned by the server.
    PostSaved(Post),
    DeleteRequested(Uuid),
    PostRemoved(Uuid),

    CommentAdded(Comment),
    CommentRemoved(Uuid),

    ValidationFailed(Vec<String>),
    RequestFailed(String),

    SignedIn(SessionResponse),
    SignInRejected(Vec<String>),
    Throttled(RateLimitDecision),
    SignedOut,

    NoticeDismissed,
}

pub fn reduce(mut state: BoardState, action: Action) -> BoardState {
    match action {
        Action::LoadRequested { category } => {
            state.category = category;
            state.loading = true;
        }
        Action::PostsLoaded(posts) => {
            state.posts = posts;
            state.loading = false;
        }
        Action::LoadFailed(message) => {
            state.loading = false;
            state.notice = Some(Notice::Error(message));
        }

        Action::PostSelected(post) => {
            if state.selected.as_ref().map(|p| p.id) != Some(post.id) {
                state.comments.clear();
            }
            state.selected = Some(post);
        }
        Action::CommentsLoaded(comments) => {
            state.comments = comments;
        }
        Action::DetailClosed => {
            state.selected = None;
            state.comments.clear();
        }

        Action::PostSaved(post) => {
            if state.selected.as_ref().is_some_and(|p| p.id == post.id) {
                state.selected = Some(post.clone());
            }
            if let Some(existing) = state.posts.iter_mut().find(|p| p.id == post.id) {
                *existing = post;
            } else if state.category.is_none_or(|c| c == post.category) {
                state.posts.insert(0, post);
            }
        }
        Action::DeleteRequested(_) => {
            state.notice = Some(Notice::Info(POST_DELETE_DISABLED.to_string()));
        }
        Action::PostRemoved(id) => {
            state.posts.retain(|p| p.id != id);
            if state.selected.as_ref().is_some_and(|p| p.id == id) {
                state.selected = None;
                state.comments.clear();
            }
        }

        Action::CommentAdded(comment) => {
            if state.selected.as_ref().is_some_and(|p| p.id == comment.post_id) {
                state.comments.insert(0, comment);
            }
        }
        Action::CommentRemoved(id) => {
            state.comments.retain(|c| c.id != id);
        }

        Action::ValidationFailed(messages) => {
            state.notice = Some(Notice::Error(messages.join("\n")));
        }
        Action::RequestFailed(message) => {
            state.notice = Some(Notice::Error(message));
        }

        Action::SignedIn(session) => {
            state.admin = Some(AdminSession {
                token: session.token,
                expires_at: session.expires_at,
            });
            state.rate_limit = None;
            state.notice = None;
        }
        Action::SignInRejected(messages) => {
            state.notice = Some(Notice::Error(messages.join("\n")));
        }
        Action::Throttled(decision) => {
            let message = decision
                .reason
                .clone()
                .unwrap_or_else(|| "Too many failed attempts".to_string());
            state.notice = Some(Notice::Error(message));
            state.rate_limit = Some(decision);
        }
        Action::SignedOut => {
            state.admin = None;
        }

        Action::NoticeDismissed => {
            state.notice = None;
        }
    }
    state
}

/// Owns the client and current state; async helpers call the API and
/// dispatch the outcome.
pub struct Store {
    client: BoardClient,
    state: BoardState,
}

impl Store {
    pub fn new(client: BoardClient) -> Self {
        Self {
            client,
            state: BoardState::default(),
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn client(&self) -> &BoardClient {
        &self.client
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!(?action, "dispatch");
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    pub async fn load_posts(&mut self, category: Option<Category>) {
        self.dispatch(Action::LoadRequested { category });
        match self.client.list_posts(category).await {
            Ok(posts) => self.dispatch(Action::PostsLoaded(posts)),
            Err(e) => {
                warn!("Failed to load posts: {}", e);
                self.dispatch(Action::LoadFailed(e.to_string()));
            }
        }
    }

    pub async fn open_post(&mut self, post: Post) {
        let post_id = post.id;
        self.dispatch(Action::PostSelected(post));
        match self.client.list_comments(post_id).await {
            Ok(comments) => self.dispatch(Action::CommentsLoaded(comments)),
            Err(e) => self.fail(e),
        }
    }

    pub async fn submit_post(&mut self, post: CreatePostRequest) -> bool {
        match self.client.create_post(&post).await {
            Ok(saved) => {
                self.dispatch(Action::PostSaved(saved));
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn edit_post(&mut self, id: Uuid, update: UpdatePostRequest) -> bool {
        match self.client.update_post(id, &update).await {
            Ok(saved) => {
                self.dispatch(Action::PostSaved(saved));
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Deletion from the front end only reports that it is disabled.
    pub fn request_delete(&mut self, id: Uuid) {
        self.dispatch(Action::DeleteRequested(id));
    }

    /// Delete through the API. Only succeeds for an admin session on a
    /// server with post deletion enabled; otherwise the refusal becomes a notice.
    pub async fn delete_post(&mut self, id: Uuid) -> bool {
        match self.client.delete_post(id).await {
            Ok(()) => {
                self.dispatch(Action::PostRemoved(id));
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn submit_comment(&mut self, post_id: Uuid, comment: CreateCommentRequest) -> bool {
        match self.client.create_comment(post_id, &comment).await {
            Ok(saved) => {
                self.dispatch(Action::CommentAdded(saved));
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    pub async fn remove_comment(&mut self, post_id: Uuid, comment_id: Uuid) {
        match self.client.delete_comment(post_id, comment_id).await {
            Ok(()) => self.dispatch(Action::CommentRemoved(comment_id)),
            Err(e) => self.fail(e),
        }
    }

    pub async fn sign_in(&mut self, password: &str, signals: &FingerprintSignals) -> bool {
        match self.client.sign_in(password, signals).await {
            Ok(session) => {
                self.dispatch(Action::SignedIn(session));
                true
            }
            Err(ClientError::RateLimited(decision)) => {
                self.dispatch(Action::Throttled(decision));
                false
            }
            Err(e) => {
                let lines = e.notice_lines();
                self.dispatch(Action::SignInRejected(lines));
                false
            }
        }
    }

    pub fn sign_out(&mut self) {
        self.client.sign_out();
        self.dispatch(Action::SignedOut);
    }

    fn fail(&mut self, e: ClientError) {
        match e {
            ClientError::Invalid(invalid) => {
                self.dispatch(Action::ValidationFailed(invalid.messages()))
            }
            ClientError::Api { status: 400, ref details, .. } if !details.is_empty() => {
                self.dispatch(Action::ValidationFailed(details.clone()))
            }
            other => {
                warn!("Request failed: {}", other);
                self.dispatch(Action::RequestFailed(other.notice_lines().join("\n")));
            }
        }
    }
}
