use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use uuid::Uuid;

use rewear_types::api::{
    NotificationListQuery, PageQuery, UnreadCountResponse, UpdatedCountResponse,
};
use rewear_types::models::{Notification, NotificationKind, User, parse_variant};
use strum::VariantArray;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;
use crate::validation::Paging;

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Query(query), _): WithRejection<Query<NotificationListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 20)?;
    let unread_only = query.unread_only.unwrap_or(false);
    let user_id = user.id;

    let (notifications, total) = run_db(&state, move |db| {
        db.list_notifications(user_id, None, unread_only, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(notifications, total)))
}

pub async fn list_by_kind(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(kind), _): WithRejection<Path<String>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 20)?;
    let kind: NotificationKind = parse_variant(&kind)
        .map_err(|e| ApiError::bad_request("Invalid notification type", e.to_string()))?;
    let user_id = user.id;

    let (notifications, total) = run_db(&state, move |db| {
        db.list_notifications(user_id, Some(kind), false, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(notifications, total)))
}

pub async fn kinds() -> Json<&'static [NotificationKind]> {
    Json(NotificationKind::VARIANTS)
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let unread_count = run_db(&state, move |db| db.unread_count(user_id)).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    owned_notification(&state, id, &user, "You can only mark your own notifications as read").await?;

    let notification = run_db(&state, move |db| db.mark_notification_read(id))
        .await?
        .ok_or(ApiError::NotFound("The requested notification does not exist"))?;
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let updated = run_db(&state, move |db| db.mark_all_read(user_id)).await?;
    Ok(Json(UpdatedCountResponse { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    owned_notification(&state, id, &user, "You can only delete your own notifications").await?;

    if !run_db(&state, move |db| db.delete_notification(id)).await? {
        return Err(ApiError::NotFound("The requested notification does not exist"));
    }
    Ok(Json(json!({ "message": "Notification deleted successfully" })))
}

pub async fn clear_all(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let updated = run_db(&state, move |db| db.clear_notifications(user_id)).await?;
    Ok(Json(UpdatedCountResponse { updated }))
}

async fn owned_notification(
    state: &AppState,
    id: Uuid,
    user: &User,
    denied: &'static str,
) -> Result<Notification, ApiError> {
    let notification = run_db(state, move |db| db.get_notification(id))
        .await?
        .ok_or(ApiError::NotFound("The requested notification does not exist"))?;
    if notification.user_id != user.id {
        return Err(ApiError::Forbidden(denied));
    }
    Ok(notification)
}
