//! Moderation and platform overview. Every route here sits behind
//! `require_auth` and `require_admin`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use rewear_db::ItemFilter;
use rewear_types::api::{
    DashboardResponse, PageQuery, RecentActivity, RejectItemRequest, SetRoleRequest,
    SwapListQuery, UserSearchQuery,
};
use rewear_types::models::{ItemStatus, Role, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;
use crate::validation::{Paging, Validator, non_blank};

const RECENT: u32 = 5;

pub async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let dashboard = run_db(&state, |db| {
        let stats = db.dashboard_stats()?;
        let users = db.recent_users(RECENT)?;
        let (items, _) = db.list_items(&ItemFilter::default(), 0, RECENT)?;
        let (swaps, _) = db.list_all_swaps(None, 0, RECENT)?;
        Ok(DashboardResponse {
            stats,
            recent: RecentActivity { users, items, swaps },
        })
    })
    .await?;
    Ok(Json(dashboard))
}

/// Listings waiting for moderation, newest first.
pub async fn pending_items(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 10)?;
    let filter = ItemFilter {
        status: Some(ItemStatus::Pending),
        approved: Some(false),
        ..Default::default()
    };

    let (items, total) = run_db(&state, move |db| {
        db.list_items(&filter, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(items, total)))
}

pub async fn approve_item(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    WithRejection(Path(item_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let admin_id = admin.id;
    let (item, notification) = run_db(&state, move |db| db.approve_item(item_id, admin_id))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;

    info!("Item {} approved by {}", item.id, admin_id);
    state.dispatcher.notify(notification);
    Ok(Json(item))
}

pub async fn reject_item(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    WithRejection(Path(item_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<RejectItemRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length("reason", &req.reason, 1, 200)
        .finish()?;

    let reason = req.reason.trim().to_string();
    let (item, notification) = run_db(&state, move |db| db.reject_item(item_id, &reason))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;

    info!("Item {} rejected by {}", item.id, admin.id);
    state.dispatcher.notify(notification);
    Ok(Json(item))
}

pub async fn list_users(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<UserSearchQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 10)?;
    let search = non_blank(query.search);
    Validator::new()
        .max_length("search", search.as_deref(), 100)
        .finish()?;

    let (users, total) = run_db(&state, move |db| {
        db.list_users(search.as_deref(), paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(users, total)))
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<SetRoleRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == admin.id && req.role != Role::Admin {
        return Err(ApiError::bad_request(
            "Cannot remove own admin role",
            "You cannot remove your own admin privileges",
        ));
    }

    let role = req.role;
    let user = run_db(&state, move |db| db.set_role(user_id, role))
        .await?
        .ok_or(ApiError::NotFound("The requested user does not exist"))?;

    warn!("{} set role of {} to {}", admin.id, user.id, role);
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<User>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::bad_request(
            "Cannot delete own account",
            "You cannot delete your own account",
        ));
    }

    if !run_db(&state, move |db| db.delete_user(user_id)).await? {
        return Err(ApiError::NotFound("The requested user does not exist"));
    }
    warn!("{} deleted user {}", admin.id, user_id);
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

pub async fn list_swaps(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<SwapListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 10)?;
    let status = query.status;

    let (swaps, total) = run_db(&state, move |db| {
        db.list_all_swaps(status, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(swaps, total)))
}

pub async fn analytics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let analytics = run_db(&state, |db| db.analytics()).await?;
    Ok(Json(analytics))
}
