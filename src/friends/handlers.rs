use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath},
    friends::dto::{SendFriendRequest, SendOutcome},
    state::AppState,
    users::repo_types::{FriendRequest, UserSummary},
};

pub fn friends_routes() -> Router<AppState> {
    Router::new()
        .route("/friends", get(list_friends))
        .route("/friends/:id", delete(remove_friend))
        .route("/friends/requests", get(list_requests).post(send_request))
        .route("/friends/requests/:id", delete(delete_request))
        .route("/friends/requests/:id/accept", post(accept_request))
}

#[instrument(skip(state))]
pub async fn list_friends(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    Ok(Json(state.directory.list_friends(user_id).await?))
}

#[instrument(skip(state))]
pub async fn remove_friend(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(friend_id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.directory.remove_friendship(user_id, friend_id).await? {
        return Err(AppError::NotFound("Not friends".into()));
    }
    info!(%user_id, %friend_id, "friendship removed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<FriendRequest>>, AppError> {
    Ok(Json(state.directory.pending_friend_requests(user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn send_request(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<SendFriendRequest>,
) -> Result<(StatusCode, Json<SendOutcome>), AppError> {
    let dir = state.directory.as_ref();
    let receiver_id = payload.receiver_id;

    if receiver_id == user_id {
        return Err(AppError::BadRequest("Cannot befriend yourself".into()));
    }
    if !dir
        .find_user_by_id(receiver_id)
        .await?
        .is_some_and(|u| u.is_active)
    {
        return Err(AppError::NotFound("User not found".into()));
    }
    if dir.friends_of(user_id).await?.contains(&receiver_id) {
        return Err(AppError::Conflict("Already friends".into()));
    }
    if dir
        .find_friend_request_between(user_id, receiver_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Friend request already sent".into()));
    }

    // the other side already asked: settle it instead of crossing requests
    if let Some(reverse) = dir.find_friend_request_between(receiver_id, user_id).await? {
        dir.accept_friend_request(&reverse).await?;
        info!(%user_id, friend_id = %receiver_id, "crossed friend request accepted");
        return Ok((
            StatusCode::OK,
            Json(SendOutcome::Accepted {
                friend_id: receiver_id,
            }),
        ));
    }

    let request = dir.create_friend_request(user_id, receiver_id).await?;
    info!(%user_id, %receiver_id, request_id = %request.id, "friend request sent");
    Ok((StatusCode::CREATED, Json(SendOutcome::Requested { request })))
}

#[instrument(skip(state))]
pub async fn accept_request(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    let dir = state.directory.as_ref();
    let request = dir
        .find_friend_request(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Friend request not found".into()))?;
    if request.receiver_id != user_id {
        warn!(%user_id, request_id = %id, "accept by non-receiver");
        return Err(AppError::Forbidden("Only the receiver can accept".into()));
    }
    dir.accept_friend_request(&request).await?;
    info!(%user_id, friend_id = %request.sender_id, "friend request accepted");
    Ok(StatusCode::NO_CONTENT)
}

/// Declines (receiver) or cancels (sender) a pending request.
#[instrument(skip(state))]
pub async fn delete_request(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, AppError> {
    let dir = state.directory.as_ref();
    let request = dir
        .find_friend_request(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Friend request not found".into()))?;
    if request.receiver_id != user_id && request.sender_id != user_id {
        return Err(AppError::Forbidden("Not your friend request".into()));
    }
    dir.delete_friend_request(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
