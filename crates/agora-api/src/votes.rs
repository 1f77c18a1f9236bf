use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use agora_db::{Database, VoteInsert, VoteRemoval};
use agora_types::api::{Claims, VoteCastResponse, VoteTotalResponse};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;

pub fn cast(db: &Database, post_id: i64, user_id: i64) -> Result<(), ApiError> {
    match db.insert_vote(post_id, user_id)? {
        VoteInsert::Cast => Ok(()),
        VoteInsert::PostMissing => Err(post_missing(post_id)),
        VoteInsert::Duplicate => Err(ApiError::DuplicateVote(format!(
            "user {} has already voted on post {}",
            user_id, post_id
        ))),
    }
}

pub fn retract(db: &Database, post_id: i64, user_id: i64) -> Result<(), ApiError> {
    match db.delete_vote(post_id, user_id)? {
        VoteRemoval::Retracted => Ok(()),
        VoteRemoval::PostMissing => Err(post_missing(post_id)),
        VoteRemoval::VoteMissing => Err(ApiError::NotFound("vote does not exist".into())),
    }
}

/// Zero for posts without votes, including posts that do not exist.
pub fn count_for(db: &Database, post_id: i64) -> Result<i64, ApiError> {
    Ok(db.count_votes(post_id)?)
}

fn post_missing(post_id: i64) -> ApiError {
    ApiError::NotFound(format!("post with id {} does not exist", post_id))
}

/// POST /posts/{id}/votes
pub async fn cast_vote(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| cast(&s.db, post_id, claims.sub)).await?;

    Ok((
        StatusCode::CREATED,
        Json(VoteCastResponse {
            message: "successfully added vote".into(),
        }),
    ))
}

/// DELETE /posts/{id}/votes
pub async fn retract_vote(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<i64>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(&state, move |s| retract(&s.db, post_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /votes/{id}
pub async fn vote_total(
    State(state): State<AppState>,
    WithRejection(Path(post_id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let total_votes = blocking(&state, move |s| count_for(&s.db, post_id)).await?;
    Ok(Json(VoteTotalResponse { post_id, total_votes }))
}
