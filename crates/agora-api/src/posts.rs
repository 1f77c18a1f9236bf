use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use agora_db::{Database, OwnedWrite, PostPatch};
use agora_types::api::{Claims, CreatePostRequest, UpdatePostRequest};
use agora_types::models::Post;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::views;

/// Create a post owned by `owner_id`.
pub fn create(db: &Database, owner_id: i64, req: &CreatePostRequest) -> Result<Post, ApiError> {
    let row = db.create_post(owner_id, &req.title, &req.content, req.published)?;
    info!("User {} created post {}", owner_id, row.id);
    Ok(views::post(row).post)
}

/// Owner-only partial update.
pub fn update(db: &Database, id: i64, caller_id: i64, req: &UpdatePostRequest) -> Result<Post, ApiError> {
    let patch = PostPatch {
        title: req.title.as_deref(),
        content: req.content.as_deref(),
        published: req.published,
    };

    match db.update_post(id, caller_id, &patch)? {
        OwnedWrite::Done(row) => Ok(views::post(row).post),
        OwnedWrite::NotFound => Err(missing(id)),
        OwnedWrite::NotOwner => Err(ApiError::Forbidden),
    }
}

/// Owner-only delete; the post's votes go with it.
pub fn delete(db: &Database, id: i64, caller_id: i64) -> Result<(), ApiError> {
    match db.delete_post(id, caller_id)? {
        OwnedWrite::Done(()) => {
            info!("User {} deleted post {}", caller_id, id);
            Ok(())
        }
        OwnedWrite::NotFound => Err(missing(id)),
        OwnedWrite::NotOwner => Err(ApiError::Forbidden),
    }
}

fn missing(id: i64) -> ApiError {
    ApiError::NotFound(format!("post with id: {} does not exist", id))
}

/// POST /posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<CreatePostRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(&state, move |s| create(&s.db, claims.sub, &req)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<UpdatePostRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(&state, move |s| update(&s.db, id, claims.sub, &req)).await?;
    Ok(Json(post))
}

/// DELETE /posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| delete(&s.db, id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
