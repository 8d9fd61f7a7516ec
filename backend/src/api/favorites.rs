use crate::error::{AppError, AppResult};
use crate::models::{
    AddFavoriteRequest, AddFavoriteResponse, AddOutcome, FavoriteHistoryResponse,
    FavoritesListResponse, HistoryPoint, NewFavorite, RefreshSummary, RemoveFavoriteResponse,
};
use crate::services::favorite_store::DEFAULT_HISTORY_LIMIT;
use crate::services::tracking_service;
use crate::AppState;
use log::info;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};

#[get("/")]
pub async fn list_favorites(state: &State<AppState>) -> AppResult<Json<FavoritesListResponse>> {
    let favorites = tracking_service::favorite_views(&state.store)?;
    Ok(Json(FavoritesListResponse {
        total: favorites.len(),
        favorites,
    }))
}

#[post("/", data = "<request>")]
pub async fn add_favorite(
    request: Json<AddFavoriteRequest>,
    state: &State<AppState>,
) -> AppResult<Json<AddFavoriteResponse>> {
    let request = request.into_inner();
    let video_id = request
        .video_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("video_id is required".to_string()))?
        .to_string();

    let favorite = NewFavorite {
        video_id: video_id.clone(),
        title: request.title.unwrap_or_default(),
        channel_id: request.channel_id.unwrap_or_default(),
        channel_title: request.channel_title.unwrap_or_default(),
        thumbnail_url: request.thumbnail_url.unwrap_or_default(),
        published_at: request.published_at,
    };
    let outcome = state.store.add(&favorite)?;

    if let Some(view_count) = request.view_count {
        state.store.record_snapshot(
            &video_id,
            view_count,
            request.like_count,
            request.comment_count,
        )?;
    }

    info!("Favorited video {video_id} ({outcome:?})");

    Ok(Json(AddFavoriteResponse {
        success: true,
        video_id,
        reactivated: outcome == AddOutcome::Reactivated,
    }))
}

#[delete("/<video_id>")]
pub async fn remove_favorite(
    video_id: &str,
    state: &State<AppState>,
) -> AppResult<Json<RemoveFavoriteResponse>> {
    let success = state.store.remove(video_id)?;
    if success {
        info!("Removed favorite {video_id}");
    }
    Ok(Json(RemoveFavoriteResponse {
        success,
        video_id: video_id.to_string(),
    }))
}

#[post("/refresh")]
pub async fn refresh_favorites(state: &State<AppState>) -> AppResult<Json<RefreshSummary>> {
    let summary =
        tracking_service::refresh_favorites(state.platform.as_ref(), &state.store).await?;
    Ok(Json(summary))
}

#[get("/<video_id>/history")]
pub async fn get_favorite_history(
    video_id: &str,
    state: &State<AppState>,
) -> AppResult<Json<FavoriteHistoryResponse>> {
    let video = state
        .store
        .latest_with_favorite(video_id)?
        .ok_or_else(|| AppError::NotFound(format!("favorite {video_id} not found")))?;
    let history = state
        .store
        .history(video_id, DEFAULT_HISTORY_LIMIT)?
        .into_iter()
        .map(HistoryPoint::from)
        .collect();

    Ok(Json(FavoriteHistoryResponse { video, history }))
}
