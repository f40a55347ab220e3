use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use rewear_db::{ItemFilter, ProfileChanges};
use rewear_types::api::{
    AddPointsRequest, ItemStatusQuery, PageQuery, PointsResponse, PublicProfileResponse,
    UpdateProfileRequest,
};
use rewear_types::models::{Location, PublicUser, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;
use crate::validation::{Paging, Validator, non_blank};

const PROFILE_ITEMS: u32 = 6;

pub async fn get_profile(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let avatar = non_blank(req.avatar);

    let mut v = Validator::new();
    if let Some(name) = &req.name {
        v.length("name", name, 2, 100);
    }
    if let Some(avatar) = &avatar {
        v.url("avatar", avatar);
    }
    if let Some(location) = &req.location {
        v.max_length("location.city", location.city.as_deref(), 100)
            .max_length("location.country", location.country.as_deref(), 100);
    }
    v.finish()?;

    let changes = ProfileChanges {
        name: req.name.map(|n| n.trim().to_string()),
        avatar,
        preferences: req.preferences,
        location: req.location.map(|l| Location {
            city: non_blank(l.city),
            country: non_blank(l.country),
        }),
    };

    let user_id = user.id;
    let updated = run_db(&state, move |db| db.update_profile(user_id, changes))
        .await?
        .ok_or(ApiError::NotFound("User profile not found"))?;
    Ok(Json(updated))
}

pub async fn my_items(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Query(query), _): WithRejection<Query<ItemStatusQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 12)?;
    let filter = ItemFilter {
        owner_id: Some(user.id),
        status: query.status,
        ..Default::default()
    };

    let (items, total) = run_db(&state, move |db| {
        db.list_items(&filter, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(items, total)))
}

pub async fn my_stats(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = run_db(&state, move |db| db.user_stats(user.id))
        .await?
        .ok_or(ApiError::NotFound("User profile not found"))?;
    Ok(Json(stats))
}

pub async fn public_profile(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = run_db(&state, move |db| {
        let Some(user) = db.get_user(user_id)? else {
            return Ok(None);
        };
        let filter = ItemFilter {
            owner_id: Some(user_id),
            ..ItemFilter::browsable()
        };
        let (public_items, _) = db.list_items(&filter, 0, PROFILE_ITEMS)?;
        Ok(Some(PublicProfileResponse {
            user: PublicUser::from(user),
            public_items,
        }))
    })
    .await?
    .ok_or(ApiError::NotFound("The requested user does not exist"))?;
    Ok(Json(profile))
}

/// A member's browsable listings.
pub async fn public_items(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 12)?;

    let page = run_db(&state, move |db| {
        if db.get_user(user_id)?.is_none() {
            return Ok(None);
        }
        let filter = ItemFilter {
            owner_id: Some(user_id),
            ..ItemFilter::browsable()
        };
        db.list_items(&filter, paging.offset(), paging.limit).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound("The requested user does not exist"))?;

    let (items, total) = page;
    Ok(Json(paging.page_of(items, total)))
}

pub async fn add_points(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): WithRejection<Json<AddPointsRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .range("amount", req.amount, 1, 100)
        .finish()?;

    let amount = req.amount;
    let user_id = user.id;
    let balance = run_db(&state, move |db| db.add_points(user_id, amount))
        .await?
        .ok_or(ApiError::NotFound("User profile not found"))?;

    info!("Added {} points to {}", amount, user_id);
    Ok(Json(PointsResponse { amount, balance }))
}
