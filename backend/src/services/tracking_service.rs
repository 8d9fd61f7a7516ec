use crate::error::AppResult;
use crate::models::{FavoriteView, FavoritesExport, HistoryPoint, RefreshSummary};
use crate::services::favorite_store::{FavoriteStore, DEFAULT_HISTORY_LIMIT};
use crate::services::snapshot_service::write_json;
use crate::services::youtube_client::{VideoPlatform, MAX_PAGE_SIZE};
use chrono::Utc;
use log::{info, warn};
use std::path::Path;

/// Append a fresh snapshot for every favorite still inside the tracking window.
///
/// Batches that already succeeded stay committed if a later batch fails.
pub async fn refresh_favorites(
    platform: &dyn VideoPlatform,
    store: &FavoriteStore,
) -> AppResult<RefreshSummary> {
    let favorites = store.list_trackable()?;
    if favorites.is_empty() {
        info!("No active favorites to track (empty or all expired)");
        return Ok(RefreshSummary::default());
    }

    info!("Refreshing {} favorites...", favorites.len());

    let video_ids: Vec<String> = favorites.into_iter().map(|f| f.video_id).collect();
    let mut summary = RefreshSummary {
        total: video_ids.len(),
        ..Default::default()
    };

    for batch in video_ids.chunks(MAX_PAGE_SIZE) {
        let stats = platform.video_statistics(batch).await?;

        for video_id in batch {
            match stats.get(video_id) {
                Some(s) => {
                    store.record_snapshot(
                        video_id,
                        s.view_count,
                        Some(s.like_count),
                        Some(s.comment_count),
                    )?;
                    summary.updated += 1;
                }
                None => summary.missing.push(video_id.clone()),
            }
        }
    }

    if !summary.missing.is_empty() {
        warn!(
            "No statistics returned for {} favorites: {}",
            summary.missing.len(),
            summary.missing.join(", ")
        );
    }
    info!("Updated {} of {} favorites", summary.updated, summary.total);
    Ok(summary)
}

/// Active favorites with their newest stats and up to 100 history points.
pub fn favorite_views(store: &FavoriteStore) -> AppResult<Vec<FavoriteView>> {
    let mut views = Vec::new();
    for favorite in store.list(false)? {
        let Some(video) = store.latest_with_favorite(&favorite.video_id)? else {
            continue;
        };
        let history = store
            .history(&favorite.video_id, DEFAULT_HISTORY_LIMIT)?
            .into_iter()
            .map(HistoryPoint::from)
            .collect();
        views.push(FavoriteView { video, history });
    }
    Ok(views)
}

pub fn export_favorites(store: &FavoriteStore, path: &Path) -> AppResult<usize> {
    let export = FavoritesExport {
        favorites: favorite_views(store)?,
        updated_at: Utc::now(),
    };
    write_json(path, &export)?;
    info!(
        "Exported {} favorites to {}",
        export.favorites.len(),
        path.display()
    );
    Ok(export.favorites.len())
}
