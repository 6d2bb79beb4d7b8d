use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use board_db::models::{CommentRow, format_timestamp};
use board_guard::sanitize::validate_comment_input;
use board_types::api::CreateCommentRequest;
use board_types::models::Comment;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AdminSession;
use crate::posts::timestamp_or_default;
use crate::state::{AppState, blocking};

pub async fn list_comments(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(&state, move |s| {
        let pid = post_id.to_string();
        if s.db.get_post(&pid)?.is_none() {
            return Ok(None);
        }
        s.db.list_comments(&pid).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    let comments: Vec<Comment> = rows.into_iter().map(comment_from_row).collect();
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<CreateCommentRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    validate_comment_input(&req.author, &req.content)?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        post_id,
        author: req.author,
        content: req.content,
        created_at: now,
        updated_at: now,
    };

    let row = CommentRow {
        id: comment.id.to_string(),
        post_id: post_id.to_string(),
        author: comment.author.clone(),
        content: comment.content.clone(),
        created_at: format_timestamp(now),
        updated_at: format_timestamp(now),
    };

    let inserted = blocking(&state, move |s| {
        if s.db.get_post(&row.post_id)?.is_none() {
            return Ok(false);
        }
        s.db.insert_comment(&row)?;
        Ok(true)
    })
    .await?;

    if !inserted {
        return Err(ApiError::NotFound("Post"));
    }

    info!(post_id = %post_id, comment_id = %comment.id, "Comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AdminSession(_claims): AdminSession,
    WithRejection(Path((post_id, comment_id)), _): WithRejection<Path<(Uuid, Uuid)>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let deleted = blocking(&state, move |s| {
        s.db.delete_comment(&post_id.to_string(), &comment_id.to_string())
    })
    .await?;

    if !deleted {
        return Err(ApiError::NotFound("Comment"));
    }

    info!(post_id = %post_id, comment_id = %comment_id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn comment_from_row(row: CommentRow) -> Comment {
    Comment {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt comment id '{}': {}", row.id, e);
            Uuid::default()
        }),
        post_id: row.post_id.parse().unwrap_or_else(|e| {
            warn!("Corrupt post_id '{}' on comment '{}': {}", row.post_id, row.id, e);
            Uuid::default()
        }),
        created_at: timestamp_or_default(&row.created_at, &row.id),
        updated_at: timestamp_or_default(&row.updated_at, &row.id),
        author: row.author,
        content: row.content,
    }
}
