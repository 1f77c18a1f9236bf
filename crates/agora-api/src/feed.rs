use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use agora_db::{Database, PostFilter};
use agora_types::models::PostWithVotes;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::views;

const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub skip: u32,
    /// Case-insensitive substring of the title.
    #[serde(default)]
    pub search: String,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            skip: 0,
            search: String::new(),
        }
    }
}

fn default_limit() -> u32 {
    10
}

pub fn list(db: &Database, query: &PostQuery) -> Result<Vec<PostWithVotes>, ApiError> {
    let filter = PostFilter {
        search: &query.search,
        limit: query.limit.min(MAX_LIMIT),
        offset: query.skip,
    };
    let rows = db.list_posts(&filter)?;
    Ok(rows.into_iter().map(views::post).collect())
}

pub fn get(db: &Database, id: i64) -> Result<PostWithVotes, ApiError> {
    db.get_post(id)?
        .map(views::post)
        .ok_or_else(|| ApiError::NotFound(format!("post with id: {} was not found", id)))
}

/// GET /posts?limit&skip&search
pub async fn list_posts(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PostQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = blocking(&state, move |s| list(&s.db, &query)).await?;
    Ok(Json(posts))
}

/// GET /posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    WithRejection(Path(id), _): WithRejection<Path<i64>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let post = blocking(&state, move |s| get(&s.db, id)).await?;
    Ok(Json(post))
}
