pub mod auth;
pub mod error;
pub mod feed;
pub mod middleware;
pub mod posts;
pub mod users;
pub mod views;
pub mod votes;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tracing::error;

use crate::auth::{AppState, AppStateInner};
use crate::error::ApiError;

/// All request routes. `/users` (registration) and `/login` are public;
/// everything else requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/users", post(users::create_user))
        .route("/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/{id}", get(users::get_user))
        .route("/posts", get(feed::list_posts).post(posts::create_post))
        .route(
            "/posts/{id}",
            get(feed::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/{id}/votes", post(votes::cast_vote).delete(votes::retract_vote))
        .route("/votes/{id}", get(votes::vote_total))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Run a blocking store call off the async runtime. Each call is one
/// request's worth of work and commits or fails as a unit.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}
