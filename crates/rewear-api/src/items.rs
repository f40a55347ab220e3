use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use rewear_db::{ItemFilter, NewItem};
use rewear_types::api::{
    CreateItemRequest, ItemListQuery, ItemStatusQuery, LimitQuery, UpdateItemRequest,
};
use rewear_types::models::{Item, ItemImage, SwapPreference, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;
use crate::validation::{self, Paging, Validator, non_blank, normalize_tags};

const MAX_IMAGES: usize = 5;
const MAX_TAGS: usize = 10;

pub async fn list_items(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ItemListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 12)?;
    let search = non_blank(query.search);

    let mut v = Validator::new();
    v.max_length("search", search.as_deref(), 100);
    if let Some(min) = query.min_points {
        v.check(min >= 0, "min_points", "Min points must be a positive integer");
    }
    if let Some(max) = query.max_points {
        v.check(max >= 0, "max_points", "Max points must be a positive integer");
    }
    v.finish()?;

    let filter = ItemFilter {
        category: query.category,
        size: query.size,
        condition: query.condition,
        min_points: query.min_points,
        max_points: query.max_points,
        search,
        tags: query
            .tags
            .as_deref()
            .map(|tags| normalize_tags(tags.split(',')))
            .unwrap_or_default(),
        ..ItemFilter::browsable()
    };

    let (items, total) = run_db(&state, move |db| {
        db.list_items(&filter, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(items, total)))
}

pub async fn featured_items(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<LimitQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = validation::limit(query.limit, 8)?;
    let items = run_db(&state, move |db| db.featured_items(limit)).await?;
    Ok(Json(items))
}

/// Every listing regardless of status or moderation, for admins.
pub async fn all_items(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<ItemStatusQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 12)?;
    let filter = ItemFilter {
        status: query.status,
        ..Default::default()
    };

    let (items, total) = run_db(&state, move |db| {
        db.list_items(&filter, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(items, total)))
}

pub async fn get_item(
    State(state): State<AppState>,
    WithRejection(Path(item_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let item = run_db(&state, move |db| db.view_item(item_id))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;
    Ok(Json(item))
}

/// A user's listings in any status, optionally narrowed to one.
pub async fn user_items(
    State(state): State<AppState>,
    WithRejection(Path(user_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Query(query), _): WithRejection<Query<ItemStatusQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 12)?;
    let filter = ItemFilter {
        owner_id: Some(user_id),
        status: query.status,
        ..Default::default()
    };

    let (items, total) = run_db(&state, move |db| {
        db.list_items(&filter, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(items, total)))
}

pub async fn create_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): WithRejection<Json<CreateItemRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = normalize_tags(req.tags.iter().map(String::as_str));

    let mut v = Validator::new();
    v.length("title", &req.title, 3, 100)
        .length("description", &req.description, 10, 1000)
        .range("points_required", req.points_required, 1, 100);
    check_details(&mut v, req.brand.as_deref(), req.color.as_deref(), req.material.as_deref());
    check_tags(&mut v, &tags);
    check_images(&mut v, &req.images);
    v.finish()?;

    let new = NewItem {
        owner_id: user.id,
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        category: req.category,
        size: req.size,
        condition: req.condition,
        brand: non_blank(req.brand),
        color: non_blank(req.color),
        material: non_blank(req.material),
        tags,
        points_required: req.points_required,
        swap_preference: req.swap_preference.unwrap_or(SwapPreference::Both),
        images: req.images,
    };

    let (item, badges) = run_db(&state, move |db| db.create_item(&new)).await?;
    info!("{} listed item {} pending approval", user.id, item.id);
    state.dispatcher.notify_all(badges);

    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(item_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(mut req), _): WithRejection<Json<UpdateItemRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    req.tags = req
        .tags
        .map(|tags| normalize_tags(tags.iter().map(String::as_str)));

    let mut v = Validator::new();
    if let Some(title) = &req.title {
        v.length("title", title, 3, 100);
    }
    if let Some(description) = &req.description {
        v.length("description", description, 10, 1000);
    }
    if let Some(points) = req.points_required {
        v.range("points_required", points, 1, 100);
    }
    check_details(&mut v, req.brand.as_deref(), req.color.as_deref(), req.material.as_deref());
    if let Some(tags) = &req.tags {
        check_tags(&mut v, tags);
    }
    if let Some(images) = &req.images {
        check_images(&mut v, images);
    }
    v.finish()?;

    req.title = req.title.map(|t| t.trim().to_string());
    req.description = req.description.map(|d| d.trim().to_string());
    req.brand = non_blank(req.brand);
    req.color = non_blank(req.color);
    req.material = non_blank(req.material);

    owned_item(&state, item_id, &user, "You can only update your own items").await?;
    let item = run_db(&state, move |db| db.update_item(item_id, req))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(item_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    owned_item(&state, item_id, &user, "You can only delete your own items").await?;

    let withdrawn = run_db(&state, move |db| db.delete_item(item_id))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;
    info!("{} deleted item {} ({} pending swaps closed)", user.id, item_id, withdrawn.len());
    state.dispatcher.notify_all(withdrawn);
    Ok(Json(json!({ "message": "Item deleted successfully" })))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(item_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let like = run_db(&state, move |db| db.toggle_like(item_id, user.id))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;
    Ok(Json(like))
}

/// Loads an item and checks that `user` owns it.
async fn owned_item(
    state: &AppState,
    item_id: Uuid,
    user: &User,
    denied: &'static str,
) -> Result<Item, ApiError> {
    let item = run_db(state, move |db| db.get_item(item_id))
        .await?
        .ok_or(ApiError::NotFound("The requested item does not exist"))?;
    if item.owner.id != user.id {
        return Err(ApiError::Forbidden(denied));
    }
    Ok(item)
}

fn check_details(v: &mut Validator, brand: Option<&str>, color: Option<&str>, material: Option<&str>) {
    v.max_length("brand", brand, 50)
        .max_length("color", color, 30)
        .max_length("material", material, 100);
}

fn check_tags(v: &mut Validator, tags: &[String]) {
    v.check(
        tags.len() <= MAX_TAGS,
        "tags",
        format!("No more than {} tags allowed", MAX_TAGS),
    )
    .check(
        tags.iter().all(|t| t.chars().count() <= 20),
        "tags",
        "Each tag must be 20 characters or less",
    );
}

fn check_images(v: &mut Validator, images: &[ItemImage]) {
    v.check(
        (1..=MAX_IMAGES).contains(&images.len()),
        "images",
        format!("Between 1 and {} images are required", MAX_IMAGES),
    );
    for image in images {
        v.url("images", &image.url).check(
            !image.public_id.trim().is_empty(),
            "images",
            "Each image needs a public_id",
        );
    }
}
