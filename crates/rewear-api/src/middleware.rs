use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::debug;

use rewear_types::models::User;

use crate::auth::{AppState, decode_token};
use crate::error::ApiError;
use crate::run_db;

/// Validate the bearer JWT, load the account it names and attach it to the
/// request as an `Extension<User>`.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.map_err(|_| ApiError::Unauthorized("No token provided"))?;

    let claims = decode_token(&state.jwt_secret, bearer.token()).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::Unauthorized("Invalid or expired token")
    })?;

    let user_id = claims.sub;
    let user = run_db(&state, move |db| {
        let user = db.get_user(user_id)?;
        if user.is_some() {
            db.touch_last_active(user_id)?;
        }
        Ok(user)
    })
    .await?
    .ok_or(ApiError::Unauthorized("User no longer exists"))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Must be layered inside [`require_auth`].
pub async fn require_admin(
    Extension(user): Extension<User>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.is_admin() {
        return Err(ApiError::Forbidden("Admin access required"));
    }
    Ok(next.run(req).await)
}
