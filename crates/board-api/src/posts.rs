use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use board_db::models::{PostRow, format_timestamp, parse_timestamp};
use board_guard::Fingerprint;
use board_guard::sanitize::validate_post_input;
use board_types::api::{CreatePostRequest, PostQuery, UpdatePostRequest};
use board_types::models::{Category, Post};

use crate::error::{ApiError, ApiResult};
use crate::middleware::{AdminSession, MaybeAdmin};
use crate::state::{AppState, blocking};

pub async fn list_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PostQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(&state, move |s| {
        s.db.list_posts(query.category.as_ref().map(Category::as_str))
    })
    .await?;

    let posts: Vec<Post> = rows.into_iter().map(post_from_row).collect();
    Ok(Json(posts))
}

pub async fn get_post(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let row = blocking(&state, move |s| s.db.get_post(&post_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(post_from_row(row)))
}

/// Anyone may post publicly. Admin-category posts need an admin session, and
/// posts made under one are marked verified.
pub async fn create_post(
    State(state): State<AppState>,
    MaybeAdmin(admin): MaybeAdmin,
    WithRejection(Json(req), _): WithRejection<Json<CreatePostRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    validate_post_input(&req.title, &req.content, &req.author)?;

    if req.category == Category::Admin && admin.is_none() {
        return Err(ApiError::Forbidden("Admin session required for admin posts"));
    }

    let fingerprint = req
        .fingerprint
        .as_deref()
        .map(Fingerprint::parse)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let now = Utc::now();
    let post = Post {
        id: Uuid::new_v4(),
        title: req.title,
        content: req.content,
        author: req.author,
        is_verified: admin.is_some(),
        category: req.category,
        fingerprint: fingerprint.map(|fp| fp.as_str().to_string()),
        created_at: now,
        updated_at: now,
    };

    let row = row_from_post(&post);
    blocking(&state, move |s| s.db.insert_post(&row)).await?;

    info!(post_id = %post.id, category = %post.category, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// Partial update: absent fields keep their stored value. The merged post is
/// validated as a whole before anything is written.
pub async fn update_post(
    State(state): State<AppState>,
    AdminSession(_claims): AdminSession,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePostRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let existing = blocking(&state, move |s| s.db.get_post(&post_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    let mut post = post_from_row(existing);
    if let Some(title) = req.title {
        post.title = title;
    }
    if let Some(content) = req.content {
        post.content = content;
    }
    if let Some(author) = req.author {
        post.author = author;
    }
    if let Some(category) = req.category {
        post.category = category;
    }

    validate_post_input(&post.title, &post.content, &post.author)?;

    post.is_verified = true;
    post.updated_at = Utc::now();

    let row = row_from_post(&post);
    let updated = blocking(&state, move |s| s.db.update_post(&row)).await?;
    if !updated {
        return Err(ApiError::NotFound("Post"));
    }

    info!(post_id = %post.id, "Post updated");
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    AdminSession(_claims): AdminSession,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    if !state.config.allow_post_delete {
        return Err(ApiError::Forbidden("Post deletion is disabled"));
    }

    let deleted = blocking(&state, move |s| s.db.delete_post(&post_id.to_string())).await?;
    if !deleted {
        return Err(ApiError::NotFound("Post"));
    }

    info!(post_id = %post_id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn post_from_row(row: PostRow) -> Post {
    Post {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt post id '{}': {}", row.id, e);
            Uuid::default()
        }),
        category: row.category.parse().unwrap_or_else(|e| {
            warn!("Corrupt category on post '{}': {}", row.id, e);
            Category::Public
        }),
        created_at: timestamp_or_default(&row.created_at, &row.id),
        updated_at: timestamp_or_default(&row.updated_at, &row.id),
        title: row.title,
        content: row.content,
        author: row.author,
        is_verified: row.is_verified,
        fingerprint: row.fingerprint,
    }
}

fn row_from_post(post: &Post) -> PostRow {
    PostRow {
        id: post.id.to_string(),
        title: post.title.clone(),
        content: post.content.clone(),
        author: post.author.clone(),
        is_verified: post.is_verified,
        category: post.category.as_str().to_string(),
        fingerprint: post.fingerprint.clone(),
        created_at: format_timestamp(post.created_at),
        updated_at: format_timestamp(post.updated_at),
    }
}

pub(crate) fn timestamp_or_default(raw: &str, owner: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt timestamp on '{}': {}", owner, e);
        DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PostRow {
        PostRow {
            id: "5f0c7a52-8d0e-4b8e-9a55-0b1f3e9d2c11".into(),
            title: "Hello".into(),
            content: "First post".into(),
            author: "Ada".into(),
            is_verified: false,
            category: "admin".into(),
            fingerprint: Some("r7quag".into()),
            created_at: "2026-03-01T12:30:05.000000Z".into(),
            updated_at: "2026-03-01 12:30:05".into(),
        }
    }

    #[test]
    fn rows_convert_to_posts() {
        let post = post_from_row(row());
        assert_eq!(post.category, Category::Admin);
        assert_eq!(post.created_at, post.updated_at);
        assert_eq!(row_from_post(&post).id, row().id);
    }

    #[test]
    fn corrupt_columns_fall_back() {
        let post = post_from_row(PostRow {
            id: "not-a-uuid".into(),
            category: "secret".into(),
            created_at: "garbage".into(),
            ..row()
        });
        assert_eq!(post.id, Uuid::default());
        assert_eq!(post.category, Category::Public);
        assert_eq!(post.created_at, DateTime::<Utc>::default());
    }
}
