use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;
use uuid::Uuid;

use rewear_db::{NewSwap, SwapOutcome};
use rewear_types::api::{
    CancelSwapRequest, CreateSwapRequest, RateSwapRequest, RespondSwapRequest,
    SendChatMessageRequest, SwapListQuery, UpdatedCountResponse,
};
use rewear_types::events::ServerEvent;
use rewear_types::models::{Swap, SwapStatus, SwapType, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_db;
use crate::validation::{Paging, Validator, non_blank};

const SWAP_NOT_FOUND: &str = "The requested swap does not exist";

pub async fn create_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(req), _): WithRejection<Json<CreateSwapRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = non_blank(req.message);
    Validator::new()
        .max_length("message", message.as_deref(), 500)
        .finish()?;

    let requested_id = req.requested_item_id;
    let offered_id = match req.swap_type {
        SwapType::DirectSwap => req.offered_item_id,
        SwapType::PointsRedemption => None,
    };
    let (requested, offered) = run_db(&state, move |db| {
        let requested = db.get_item(requested_id)?;
        let offered = match offered_id {
            Some(id) => db.get_item(id)?,
            None => None,
        };
        Ok((requested, offered))
    })
    .await?;

    let requested = requested.ok_or(ApiError::NotFound("The item you want to swap for does not exist"))?;
    if !requested.is_swappable() {
        return Err(ApiError::bad_request(
            "Item not available",
            "This item is not available for swapping",
        ));
    }
    if requested.owner.id == user.id {
        return Err(ApiError::bad_request(
            "Cannot swap own item",
            "You cannot swap for your own item",
        ));
    }
    if !requested.swap_preference.allows(req.swap_type) {
        return Err(ApiError::bad_request(
            "Swap type not accepted",
            format!("The owner only accepts {} for this item", requested.swap_preference),
        ));
    }

    let points_offered = match req.swap_type {
        SwapType::DirectSwap => {
            if offered_id.is_none() {
                return Err(ApiError::bad_request(
                    "Offered item required",
                    "You must offer an item for direct swap",
                ));
            }
            let offered = offered.as_ref().ok_or(ApiError::NotFound("The item you are offering does not exist"))?;
            if offered.owner.id != user.id {
                return Err(ApiError::Forbidden("You can only offer items that belong to you"));
            }
            if !offered.is_swappable() {
                return Err(ApiError::bad_request(
                    "Offered item not available",
                    "The item you are offering is not available for swapping",
                ));
            }
            None
        }
        SwapType::PointsRedemption => {
            let points = req.points_offered.unwrap_or(0);
            if points <= 0 {
                return Err(ApiError::bad_request(
                    "Points required",
                    "You must offer points for points redemption",
                ));
            }
            if user.points < points {
                return Err(ApiError::bad_request(
                    "Insufficient points",
                    "You do not have enough points for this swap",
                ));
            }
            if points < requested.points_required {
                return Err(ApiError::bad_request(
                    "Insufficient points offered",
                    format!("This item requires {} points", requested.points_required),
                ));
            }
            Some(points)
        }
    };

    let recipient_id = requested.owner.id;
    let new = NewSwap {
        initiator_id: user.id,
        recipient_id,
        requested_item_id: requested.id,
        offered_item_id: offered.map(|item| item.id),
        points_offered,
        swap_type: req.swap_type,
        message,
    };

    let (swap, notification) = run_db(&state, move |db| {
        let notify = db
            .get_user(recipient_id)?
            .is_some_and(|owner| owner.preferences.notifications.swap_requests);
        db.create_swap(&new, notify)
    })
    .await?;

    info!("{} requested swap {} for item {}", user.id, swap.id, swap.requested_item.id);
    state.dispatcher.notify_all(notification);
    state.dispatcher.swap_updated(&swap);

    Ok((StatusCode::CREATED, Json(swap)))
}

/// The caller's swaps as initiator or recipient.
pub async fn list_swaps(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Query(query), _): WithRejection<Query<SwapListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = Paging::new(query.page, query.limit, 10)?;
    let status = query.status;
    let user_id = user.id;

    let (swaps, total) = run_db(&state, move |db| {
        db.list_user_swaps(user_id, status, paging.offset(), paging.limit)
    })
    .await?;
    Ok(Json(paging.page_of(swaps, total)))
}

pub async fn pending_swaps(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user.id;
    let swaps = run_db(&state, move |db| db.pending_swaps(user_id)).await?;
    Ok(Json(swaps))
}

pub async fn get_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let swap = run_db(&state, move |db| db.get_swap_detail(swap_id))
        .await?
        .ok_or(ApiError::NotFound(SWAP_NOT_FOUND))?;
    if !swap.is_participant(user.id) {
        return Err(ApiError::Forbidden("You can only view swaps you are involved in"));
    }
    Ok(Json(swap))
}

pub async fn accept_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(body, _): WithRejection<Option<Json<RespondSwapRequest>>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let response = response_message(body)?;
    let swap = load_swap(&state, swap_id).await?;
    if swap.recipient.id != user.id {
        return Err(ApiError::Forbidden("Only the recipient can accept a swap"));
    }
    ensure_pending(&swap)?;

    let outcome = run_db(&state, move |db| db.accept_swap(swap_id, response.as_deref())).await?;
    info!("Swap {} accepted by {}", swap_id, user.id);
    Ok(Json(publish(&state, outcome)))
}

pub async fn reject_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(body, _): WithRejection<Option<Json<RespondSwapRequest>>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let response = response_message(body)?;
    let swap = load_swap(&state, swap_id).await?;
    if swap.recipient.id != user.id {
        return Err(ApiError::Forbidden("Only the recipient can reject a swap"));
    }
    ensure_pending(&swap)?;

    let outcome = run_db(&state, move |db| db.reject_swap(swap_id, response.as_deref())).await?;
    info!("Swap {} rejected by {}", swap_id, user.id);
    Ok(Json(publish(&state, outcome)))
}

pub async fn complete_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let swap = load_swap(&state, swap_id).await?;
    if !swap.is_participant(user.id) {
        return Err(ApiError::Forbidden("You can only complete swaps you are involved in"));
    }
    if swap.status != SwapStatus::Accepted {
        return Err(ApiError::bad_request(
            "Swap not accepted",
            "This swap must be accepted before it can be completed",
        ));
    }

    let user_id = user.id;
    let outcome = run_db(&state, move |db| db.complete_swap(swap_id, user_id)).await?;
    info!("Swap {} completed by {}", swap_id, user_id);
    Ok(Json(publish(&state, outcome)))
}

pub async fn cancel_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(body, _): WithRejection<Option<Json<CancelSwapRequest>>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = non_blank(body.map(|Json(b)| b).unwrap_or_default().reason);
    Validator::new()
        .max_length("reason", reason.as_deref(), 200)
        .finish()?;

    let swap = load_swap(&state, swap_id).await?;
    if !swap.is_participant(user.id) {
        return Err(ApiError::Forbidden("You can only cancel swaps you are involved in"));
    }
    if !swap.status.can_transition_to(SwapStatus::Cancelled) {
        return Err(ApiError::bad_request(
            "Swap cannot be cancelled",
            "This swap cannot be cancelled",
        ));
    }

    let user_id = user.id;
    let outcome = run_db(&state, move |db| db.cancel_swap(swap_id, user_id, reason.as_deref())).await?;
    info!("Swap {} cancelled by {}", swap_id, user_id);
    Ok(Json(publish(&state, outcome)))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<SendChatMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length("message", &req.message, 1, 1000)
        .finish()?;

    let swap = load_swap(&state, swap_id).await?;
    if !swap.is_participant(user.id) {
        return Err(ApiError::Forbidden("You can only message on swaps you are involved in"));
    }

    let sender_id = user.id;
    let text = req.message.trim().to_string();
    let (message, notification) =
        run_db(&state, move |db| db.add_chat_message(swap_id, sender_id, &text)).await?;

    state.dispatcher.notify(notification);
    for user_id in [swap.initiator.id, swap.recipient.id] {
        state.dispatcher.publish(
            user_id,
            ServerEvent::ChatMessage {
                message: message.clone(),
            },
        );
    }

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_messages_read(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let swap = load_swap(&state, swap_id).await?;
    if !swap.is_participant(user.id) {
        return Err(ApiError::Forbidden("You can only view swaps you are involved in"));
    }

    let reader_id = user.id;
    let updated = run_db(&state, move |db| db.mark_messages_read(swap_id, reader_id)).await?;
    Ok(Json(UpdatedCountResponse { updated }))
}

pub async fn rate_swap(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Path(swap_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<RateSwapRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = non_blank(req.comment);
    Validator::new()
        .range("rating", i64::from(req.rating), 1, 5)
        .max_length("comment", comment.as_deref(), 300)
        .finish()?;

    let swap = load_swap(&state, swap_id).await?;
    if !swap.is_participant(user.id) {
        return Err(ApiError::Forbidden("You can only rate swaps you are involved in"));
    }

    let rater_id = user.id;
    let rating = req.rating;
    let swap = run_db(&state, move |db| {
        db.rate_swap(swap_id, rater_id, rating, comment.as_deref())
    })
    .await?;
    Ok(Json(swap))
}

async fn load_swap(state: &AppState, swap_id: Uuid) -> Result<Swap, ApiError> {
    run_db(state, move |db| db.get_swap(swap_id))
        .await?
        .ok_or(ApiError::NotFound(SWAP_NOT_FOUND))
}

fn ensure_pending(swap: &Swap) -> Result<(), ApiError> {
    if swap.status != SwapStatus::Pending {
        return Err(ApiError::bad_request(
            "Swap not pending",
            "This swap is not in a pending state",
        ));
    }
    Ok(())
}

fn response_message(body: Option<Json<RespondSwapRequest>>) -> Result<Option<String>, ApiError> {
    let message = non_blank(body.map(|Json(b)| b).unwrap_or_default().response_message);
    Validator::new()
        .max_length("response_message", message.as_deref(), 500)
        .finish()?;
    Ok(message)
}

/// Push a state change out to both participants and return the swap.
fn publish(state: &AppState, outcome: SwapOutcome) -> Swap {
    state.dispatcher.notify_all(outcome.notifications);
    state.dispatcher.swap_updated(&outcome.swap);
    outcome.swap
}
