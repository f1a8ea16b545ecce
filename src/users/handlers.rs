use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    pagination::Page,
    state::AppState,
    users::{
        dto::{SearchParams, UpdatePrivacyRequest},
        friends::FriendCache,
        repo_types::{PrivacySettings, UserSummary},
        search::{present, search_users, Requester, SearchOptions},
        visibility::is_visible,
    },
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users/search", get(search))
        .route("/users/me/privacy", get(get_privacy).put(put_privacy))
        .route("/users/:id", get(get_user))
}

/// Staff status only matters when the bypass is switched on.
async fn load_requester(state: &AppState, id: Uuid) -> Result<Requester, AppError> {
    if !state.config.search.staff_bypass {
        return Ok(Requester::user(id));
    }
    let is_staff = state
        .directory
        .find_user_by_id(id)
        .await?
        .is_some_and(|u| u.is_active && u.is_staff);
    Ok(Requester { id, is_staff })
}

#[instrument(skip(state, params))]
pub async fn search(
    State(state): State<AppState>,
    MaybeAuthUser(requester): MaybeAuthUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> Result<Json<Page<UserSummary>>, AppError> {
    let cfg = &state.config.search;
    let requester = match requester {
        Some(id) => Some(load_requester(&state, id).await?),
        None => None,
    };
    let opts = SearchOptions {
        page: params.page.unwrap_or(1),
        page_size: params
            .page_size
            .unwrap_or(cfg.page_size)
            .clamp(1, cfg.max_page_size),
        ..SearchOptions::from(cfg)
    };
    let page = search_users(state.directory.as_ref(), &params.q, requester, opts).await?;
    Ok(Json(page))
}

/// A single user, subject to the same visibility rules as search.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    MaybeAuthUser(requester): MaybeAuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<UserSummary>, AppError> {
    let dir = state.directory.as_ref();
    let user = dir
        .find_user_by_id(id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut cache = FriendCache::new();
    if !is_visible(dir, &mut cache, requester, user.id).await? {
        // hidden users are indistinguishable from missing ones
        return Err(AppError::NotFound("User not found".into()));
    }
    Ok(Json(present(UserSummary::from(&user), requester)))
}

#[instrument(skip(state))]
pub async fn get_privacy(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PrivacySettings>, AppError> {
    let search_visibility = state
        .directory
        .search_visibility(user_id)
        .await?
        .unwrap_or_default();
    Ok(Json(PrivacySettings {
        user_id,
        search_visibility,
    }))
}

#[instrument(skip(state, payload))]
pub async fn put_privacy(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdatePrivacyRequest>,
) -> Result<Json<PrivacySettings>, AppError> {
    state
        .directory
        .set_search_visibility(user_id, payload.search_visibility)
        .await?;
    info!(%user_id, visibility = payload.search_visibility.as_str(), "search visibility updated");
    Ok(Json(PrivacySettings {
        user_id,
        search_visibility: payload.search_visibility,
    }))
}
