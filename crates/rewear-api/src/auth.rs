use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::json;
use tracing::{info, warn};

use rewear_db::{Database, NewUser};
use rewear_types::api::{AuthResponse, Claims, LimitQuery, LoginRequest, SignupRequest};
use rewear_types::models::{Role, User};

use crate::dispatcher::Dispatcher;
use crate::error::ApiError;
use crate::run_db;
use crate::validation::{self, Validator, non_blank, normalize_email};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Lower-cased emails that are given the admin role at signup.
    pub admin_emails: Vec<String>,
    pub dispatcher: Dispatcher,
}

pub async fn signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let mut v = Validator::new();
    v.length("name", &req.name, 2, 100)
        .email("email", &req.email)
        .check(
            req.password.chars().count() >= 8,
            "password",
            "Password must be at least 8 characters",
        );
    if let Some(avatar) = &req.avatar {
        v.url("avatar", avatar);
    }
    v.finish()?;

    let email = normalize_email(&req.email);
    let role = if state.admin_emails.contains(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let name = req.name.trim().to_string();
    let avatar = non_blank(req.avatar);
    let password = req.password;

    let (user, welcome) = run_db(&state, move |db| {
        let password_hash = hash_password(&password)?;
        db.create_user(&NewUser {
            name,
            email,
            password_hash,
            avatar,
            role,
        })
    })
    .await?;

    let token = create_token(&state.jwt_secret, &user, state.token_ttl_days)?;
    info!("New account {} ({})", user.name, user.id);
    state.dispatcher.notify(welcome);

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let password = req.password;

    let user = run_db(&state, move |db| {
        let Some((user, password_hash)) = db.get_credentials(&email)? else {
            return Ok(None);
        };
        if !verify_password(&password, &password_hash)? {
            return Ok(None);
        }
        db.touch_last_active(user.id)?;
        Ok(Some(user))
    })
    .await?
    .ok_or_else(|| {
        warn!("Failed login attempt");
        ApiError::Unauthorized("Invalid email or password")
    })?;

    let token = create_token(&state.jwt_secret, &user, state.token_ttl_days)?;
    Ok(Json(AuthResponse { user, token }))
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// Tokens are stateless; logging out only records the activity.
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| db.touch_last_active(user.id)).await?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<LimitQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = validation::limit(query.limit, 10)?;
    let entries = run_db(&state, move |db| db.leaderboard(limit)).await?;
    Ok(Json(entries))
}

pub async fn platform_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = run_db(&state, |db| db.platform_stats()).await?;
    Ok(Json(stats))
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(secret: &str, user: &User, ttl_days: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        name: user.name.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validates signature and expiry, returning the claims.
pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewear_types::models::{Location, Preferences, UserStats};
    use uuid::Uuid;

    fn user() -> User {
        let now = chrono::Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar: None,
            points: 10,
            role: Role::User,
            is_verified: false,
            badges: vec![],
            stats: UserStats::default(),
            preferences: Preferences::default(),
            location: Location::default(),
            last_active: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tokens_round_trip() {
        let user = user();
        let token = create_token("secret", &user, 7).unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.name, "Ada");
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_tokens_are_refused() {
        let token = create_token("secret", &user(), -1).unwrap();
        assert!(decode_token("secret", &token).is_err());
        let fresh = create_token("secret", &user(), 7).unwrap();
        assert!(decode_token("other-secret", &fresh).is_err());
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }
}
