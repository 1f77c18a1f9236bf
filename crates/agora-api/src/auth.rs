use std::sync::{Arc, LazyLock};

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use rand_core::OsRng;
use tracing::{info, warn};

use agora_db::{Database, UserInsert, UserRow};
use agora_types::api::{Claims, LoginRequest, TokenResponse};

use crate::blocking;
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash checked when the email is unknown, so both failure paths pay for
/// one Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::encode_b64(b"agora-unknown-user").ok()?;
    Argon2::default()
        .hash_password(b"not-a-real-password", &salt)
        .ok()
        .map(|hash| hash.to_string())
});

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

/// Create a user with an Argon2id hash of `password`. The raw password is
/// never stored.
pub fn register_user(db: &Database, email: &str, password: &str) -> Result<UserRow, ApiError> {
    validate_email(email)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();

    match db.create_user(email, &password_hash)? {
        UserInsert::Created(user) => {
            info!("Registered user {}", user.id);
            Ok(user)
        }
        UserInsert::EmailTaken => Err(ApiError::DuplicateEmail),
    }
}

/// Check an email/password pair. Unknown email and wrong password are
/// indistinguishable to the caller.
pub fn verify_credentials(db: &Database, email: &str, password: &str) -> Result<UserRow, ApiError> {
    let Some(user) = db.get_user_by_email(email)? else {
        burn_verification(password);
        return Err(ApiError::InvalidCredentials);
    };

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("Stored hash for user {} is unreadable: {}", user.id, e))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    Ok(user)
}

fn burn_verification(password: &str) {
    if let Some(parsed) = DUMMY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
    }
}

pub fn issue_token(secret: &str, user_id: i64, ttl: chrono::Duration) -> Result<String, ApiError> {
    let expires_at = chrono::Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| anyhow::anyhow!("Token lifetime {} is out of range", ttl))?;

    let claims = Claims {
        sub: user_id,
        exp: expires_at.timestamp().max(0) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(anyhow::Error::from)?;

    Ok(token)
}

/// Validate signature and expiry of a bearer token.
pub fn authenticate(secret: &str, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::ExpiredToken,
            _ => {
                warn!("Rejected bearer token: {}", e);
                ApiError::InvalidToken
            }
        })?;

    Ok(token_data.claims)
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation("value is not a valid email address".into()))
    }
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let user = blocking(&state, move |s| verify_credentials(&s.db, &req.email, &req.password)).await?;

    let access_token = issue_token(&state.jwt_secret, user.id, state.token_ttl)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}
