use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;

use agora_db::Database;
use agora_types::api::{RegisterRequest, UserResponse};
use agora_types::models::User;

use crate::auth::{AppState, register_user};
use crate::blocking;
use crate::error::ApiError;
use crate::views;

pub fn find_user(db: &Database, id: i64) -> Result<User, ApiError> {
    db.get_user_by_id(id)?
        .map(views::user)
        .ok_or_else(|| ApiError::NotFound(format!("User with id: {} was not found", id)))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |s| register_user(&s.db, &req.email, &req.password)).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |s| find_user(&s.db, id)).await?;
    Ok(Json(user))
}
