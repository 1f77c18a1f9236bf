//! Integration test: drive the full router in-process against an in-memory
//! database, covering the register → login → post → vote → delete flow.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use agora_api::auth::{AppStateInner, issue_token};
use agora_db::Database;

const SECRET: &str = "integration-secret";

fn app() -> Router {
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: SECRET.into(),
        token_ttl: chrono::Duration::minutes(30),
    });
    agora_api::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register_and_login(app: &Router, email: &str) -> (i64, String) {
    let (status, user) = send(app, "POST", "/users", None, Some(json!({"email": email, "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, token) = send(app, "POST", "/login", None, Some(json!({"email": email, "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(token["token_type"], "bearer");

    (user["id"].as_i64().unwrap(), token["access_token"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn full_blog_flow() {
    let app = app();

    let (status, user) = send(&app, "POST", "/users", None, Some(json!({"email": "a@x.com", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "a@x.com");
    assert!(user.get("password").is_none());
    let owner_id = user["id"].as_i64().unwrap();

    let (status, err) = send(&app, "POST", "/users", None, Some(json!({"email": "a@x.com", "password": "other12"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["detail"], "Email already registered");

    let (status, token) = send(&app, "POST", "/login", None, Some(json!({"email": "a@x.com", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::OK);
    let owner_token = token["access_token"].as_str().unwrap().to_string();

    let (status, post) = send(&app, "POST", "/posts", Some(&owner_token), Some(json!({"title": "t", "content": "c"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["owner_id"], owner_id);
    assert_eq!(post["published"], true);
    assert_eq!(post["owner"]["email"], "a@x.com");
    let post_id = post["id"].as_i64().unwrap();

    let (_, voter_token) = register_and_login(&app, "b@x.com").await;
    let votes_uri = format!("/posts/{post_id}/votes");

    let (status, _) = send(&app, "POST", &votes_uri, Some(&voter_token), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, total) = send(&app, "GET", &format!("/votes/{post_id}"), Some(&voter_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(total, json!({"post_id": post_id, "total_votes": 1}));

    let (status, _) = send(&app, "POST", &votes_uri, Some(&voter_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, detail) = send(&app, "GET", &format!("/posts/{post_id}"), Some(&voter_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["votes"], 1);
    assert_eq!(detail["post"]["title"], "t");

    let (status, _) = send(&app, "DELETE", &format!("/posts/{post_id}"), Some(&voter_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "DELETE", &format!("/posts/{post_id}"), Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "GET", &format!("/posts/{post_id}"), Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, total) = send(&app, "GET", &format!("/votes/{post_id}"), Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(total["total_votes"], 0);
}

#[tokio::test]
async fn registration_validation() {
    let app = app();

    let (status, err) = send(&app, "POST", "/users", None, Some(json!({"email": "a@x.com", "password": "12345"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["detail"], "Password must be at least 6 characters long");

    let (status, _) = send(&app, "POST", "/users", None, Some(json!({"email": "nope", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bad_credentials_are_forbidden() {
    let app = app();
    register_and_login(&app, "a@x.com").await;

    let (status, wrong_pw) = send(&app, "POST", "/login", None, Some(json!({"email": "a@x.com", "password": "nope123"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, unknown) = send(&app, "POST", "/login", None, Some(json!({"email": "z@x.com", "password": "secret1"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(wrong_pw, unknown);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app();
    let (user_id, token) = register_and_login(&app, "a@x.com").await;

    let (status, err) = send(&app, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["detail"], "Not authenticated");

    let (status, _) = send(&app, "GET", "/posts", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = issue_token(SECRET, user_id, chrono::Duration::minutes(-1)).unwrap();
    let (status, err) = send(&app, "GET", "/posts", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["detail"], "Token has expired");

    let (status, user) = send(&app, "GET", &format!("/users/{user_id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "a@x.com");

    let (status, _) = send(&app, "GET", "/users/9999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn partial_update_and_search() {
    let app = app();
    let (_, owner) = register_and_login(&app, "a@x.com").await;
    let (_, other) = register_and_login(&app, "b@x.com").await;

    let (_, first) = send(&app, "POST", "/posts", Some(&owner), Some(json!({"title": "Rust ownership", "content": "c"}))).await;
    send(&app, "POST", "/posts", Some(&owner), Some(json!({"title": "Gardening", "content": "c", "published": false}))).await;
    let first_uri = format!("/posts/{}", first["id"]);

    let (status, _) = send(&app, "PUT", &first_uri, Some(&other), Some(json!({"title": "mine now"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(&app, "PUT", &first_uri, Some(&owner), Some(json!({"content": "edited"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Rust ownership");
    assert_eq!(updated["content"], "edited");

    let (status, _) = send(&app, "PUT", "/posts/9999", Some(&owner), Some(json!({"content": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, listed) = send(&app, "GET", "/posts?search=rust", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["votes"], 0);
    assert_eq!(listed[0]["post"]["content"], "edited");

    let (_, page) = send(&app, "GET", "/posts?limit=1&skip=1", Some(&other), None).await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["post"]["title"], "Gardening");
}

#[tokio::test]
async fn retracting_votes() {
    let app = app();
    let (_, owner) = register_and_login(&app, "a@x.com").await;
    let (_, post) = send(&app, "POST", "/posts", Some(&owner), Some(json!({"title": "t", "content": "c"}))).await;
    let votes_uri = format!("/posts/{}/votes", post["id"]);

    let (status, err) = send(&app, "DELETE", &votes_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["detail"], "vote does not exist");

    send(&app, "POST", &votes_uri, Some(&owner), None).await;
    let (status, _) = send(&app, "DELETE", &votes_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "POST", "/posts/9999/votes", Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_requests_get_a_detail_body() {
    let app = app();
    let (_, token) = register_and_login(&app, "a@x.com").await;
    let (_, post) = send(&app, "POST", "/posts", Some(&token), Some(json!({"title": "t", "content": "c"}))).await;

    let (status, err) = send(&app, "PUT", &format!("/posts/{}", post["id"]), Some(&token), Some(json!({"author": "me"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["detail"].is_string());

    let (status, err) = send(&app, "GET", "/posts/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["detail"].is_string());

    let (status, err) = send(&app, "GET", "/posts?limit=-1", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(err["detail"].is_string());

    let req = Request::builder()
        .method("POST")
        .uri("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let err: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(err["detail"].is_string());
}
