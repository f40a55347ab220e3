use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AppState};
use crate::middleware::{require_admin, require_auth};
use crate::{admin, gateway, items, notifications, swaps, users};

/// The full HTTP surface: REST under `/api` plus the `/gateway` WebSocket.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/leaderboard", get(auth::leaderboard))
        .route("/api/auth/stats", get(auth::platform_stats))
        .route("/api/items", get(items::list_items))
        .route("/api/items/featured", get(items::featured_items))
        .route("/api/items/{id}", get(items::get_item))
        .route("/api/items/user/{user_id}", get(items::user_items))
        .route("/gateway", get(gateway::ws_upgrade));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/profile", put(users::update_profile))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/users/profile", get(users::get_profile).put(users::update_profile))
        .route("/api/users/items", get(users::my_items))
        .route("/api/users/swaps", get(swaps::list_swaps))
        .route("/api/users/stats", get(users::my_stats))
        .route("/api/users/points/add", post(users::add_points))
        .route("/api/users/{id}", get(users::public_profile))
        .route("/api/users/{id}/items", get(users::public_items))
        .route("/api/items", post(items::create_item))
        .route("/api/items/{id}", put(items::update_item).delete(items::delete_item))
        .route("/api/items/{id}/like", post(items::toggle_like))
        .route("/api/swaps", post(swaps::create_swap).get(swaps::list_swaps))
        .route("/api/swaps/pending", get(swaps::pending_swaps))
        .route("/api/swaps/{id}", get(swaps::get_swap))
        .route("/api/swaps/{id}/accept", put(swaps::accept_swap))
        .route("/api/swaps/{id}/reject", put(swaps::reject_swap))
        .route("/api/swaps/{id}/complete", put(swaps::complete_swap))
        .route("/api/swaps/{id}/cancel", put(swaps::cancel_swap))
        .route("/api/swaps/{id}/message", post(swaps::send_message))
        .route("/api/swaps/{id}/messages/read", put(swaps::mark_messages_read))
        .route("/api/swaps/{id}/rate", post(swaps::rate_swap))
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/types", get(notifications::kinds))
        .route("/api/notifications/by-type/{kind}", get(notifications::list_by_kind))
        .route("/api/notifications/mark-all-read", put(notifications::mark_all_read))
        .route("/api/notifications/clear-all", delete(notifications::clear_all))
        .route("/api/notifications/{id}", delete(notifications::delete_notification))
        .route("/api/notifications/{id}/read", put(notifications::mark_read))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/items/all", get(items::all_items))
        .route("/api/items/{id}/approve", put(admin::approve_item))
        .route("/api/admin/dashboard", get(admin::dashboard))
        .route("/api/admin/items/pending", get(admin::pending_items))
        .route("/api/admin/items/{id}/approve", put(admin::approve_item))
        .route("/api/admin/items/{id}/reject", put(admin::reject_item))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}/role", put(admin::set_role))
        .route("/api/admin/users/{id}", delete(admin::delete_user))
        .route("/api/admin/swaps", get(admin::list_swaps))
        .route("/api/admin/analytics", get(admin::analytics))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now(),
    }))
}
