use crate::error::{AppError, AppResult};
use crate::models::{CollectRequest, IntField, PopularRequest, VideoCandidate, VideoDetails};
use crate::services::youtube_client::{SearchQuery, VideoPlatform};
use crate::utils::{build_published_after, parse_iso8601_duration_to_seconds, within_days};
use log::{info, warn};
use std::collections::{HashMap, HashSet};

pub const MAX_SHORT_SECONDS: u64 = 60;
pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const MAX_RESULTS_LIMIT: usize = 10_000;
pub const DEFAULT_DAYS: u32 = 7;

/// Validated input for a keyword collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectParams {
    pub keywords: Vec<String>,
    pub max_results: usize,
    pub days: u32,
    pub region: String,
}

impl CollectParams {
    pub fn from_request(request: &CollectRequest, default_region: &str) -> AppResult<Self> {
        let keywords =
            normalize_keywords(request.keyword_list.as_deref(), request.keywords.as_deref())?;
        Ok(CollectParams {
            keywords,
            max_results: validate_max_results(int_field(&request.max_results, "max_results")?)?,
            days: validate_days(int_field(&request.days, "days")?)?,
            region: normalize_region(request.region.as_deref(), default_region),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopularParams {
    pub max_results: usize,
    pub days: u32,
    pub region: String,
}

impl PopularParams {
    pub fn from_request(request: &PopularRequest, default_region: &str) -> AppResult<Self> {
        Ok(PopularParams {
            max_results: validate_max_results(int_field(&request.max_results, "max_results")?)?,
            days: validate_days(int_field(&request.days, "days")?)?,
            region: normalize_region(request.region.as_deref(), default_region),
        })
    }
}

/// Combine the list and comma-separated forms, trimmed, deduplicated case-insensitively.
pub fn normalize_keywords(
    keyword_list: Option<&[String]>,
    keywords: Option<&str>,
) -> AppResult<Vec<String>> {
    let listed = keyword_list.unwrap_or_default().iter().map(String::as_str);
    let inline = keywords.unwrap_or("").split(',');

    let mut seen = HashSet::new();
    let normalized: Vec<String> = listed
        .chain(inline)
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .filter(|keyword| seen.insert(keyword.to_lowercase()))
        .map(String::from)
        .collect();

    if normalized.is_empty() {
        return Err(AppError::Validation("keywords is required".to_string()));
    }
    Ok(normalized)
}

fn int_field(field: &IntField, name: &str) -> AppResult<Option<i64>> {
    field.value(name).map_err(AppError::Validation)
}

pub fn validate_max_results(max_results: Option<i64>) -> AppResult<usize> {
    match max_results {
        None => Ok(DEFAULT_MAX_RESULTS),
        Some(n) if (1..=MAX_RESULTS_LIMIT as i64).contains(&n) => Ok(n as usize),
        Some(_) => Err(AppError::Validation(format!(
            "max_results must be between 1 and {MAX_RESULTS_LIMIT}"
        ))),
    }
}

pub fn validate_days(days: Option<i64>) -> AppResult<u32> {
    match days {
        None => Ok(DEFAULT_DAYS),
        Some(d) if d < 0 => Err(AppError::Validation(
            "days must be non-negative".to_string(),
        )),
        Some(d) => u32::try_from(d)
            .map_err(|_| AppError::Validation(format!("days is too large: {d}"))),
    }
}

fn normalize_region(region: Option<&str>, default_region: &str) -> String {
    match region.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r.to_uppercase(),
        None => default_region.to_uppercase(),
    }
}

/// Apply the short-video duration filter; `None` for anything outside (0, 60] seconds.
pub fn candidate_from_details(details: VideoDetails) -> Option<VideoCandidate> {
    let duration_seconds = parse_iso8601_duration_to_seconds(&details.duration);
    if duration_seconds == 0 || duration_seconds > MAX_SHORT_SECONDS {
        return None;
    }

    Some(VideoCandidate {
        video_id: details.video_id,
        title: details.title,
        channel_id: details.channel_id,
        channel_title: details.channel_title,
        published_at: details.published_at,
        duration_seconds: duration_seconds as u32,
        view_count: details.view_count,
        like_count: details.like_count,
        comment_count: details.comment_count,
        tags: details.tags,
        subscriber_count: None,
    })
}

/// Sort by views, highest first, and cut to `max_results`.
pub fn rank_candidates(mut candidates: Vec<VideoCandidate>, max_results: usize) -> Vec<VideoCandidate> {
    candidates.sort_by(|a, b| b.view_count.cmp(&a.view_count));
    candidates.truncate(max_results);
    candidates
}

async fn enrich_subscribers(platform: &dyn VideoPlatform, candidates: &mut [VideoCandidate]) {
    let mut channel_ids: Vec<String> = Vec::new();
    for candidate in candidates.iter() {
        if !candidate.channel_id.is_empty() && !channel_ids.contains(&candidate.channel_id) {
            channel_ids.push(candidate.channel_id.clone());
        }
    }
    if channel_ids.is_empty() {
        return;
    }

    match platform.channel_subscribers(&channel_ids).await {
        Ok(subscribers) => {
            for candidate in candidates.iter_mut() {
                candidate.subscriber_count = subscribers.get(&candidate.channel_id).copied();
            }
        }
        Err(e) => {
            warn!(
                "Channel statistics lookup failed for {} channels, continuing without subscriber counts: {e}",
                channel_ids.len()
            );
        }
    }
}

/// Page through search results for one keyword and keep only shorts.
pub async fn collect_shorts(
    platform: &dyn VideoPlatform,
    keyword: &str,
    max_results: usize,
    days: Option<u32>,
    region: Option<&str>,
) -> AppResult<Vec<VideoCandidate>> {
    info!("Collecting shorts for keyword '{keyword}' (max {max_results})");

    let published_after = build_published_after(days);
    let mut collected: Vec<VideoCandidate> = Vec::new();
    let mut page_token: Option<String> = None;

    while collected.len() < max_results {
        let query = SearchQuery {
            keyword: keyword.to_string(),
            region: region.map(String::from),
            published_after: published_after.clone(),
            page_token: page_token.clone(),
        };
        let page = platform.search_page(&query).await?;
        if page.video_ids.is_empty() {
            break;
        }

        let details = platform.video_details(&page.video_ids).await?;
        let mut shorts: Vec<VideoCandidate> =
            details.into_iter().filter_map(candidate_from_details).collect();
        enrich_subscribers(platform, &mut shorts).await;

        info!(
            "Keyword '{keyword}': {} of {} results on page are shorts",
            shorts.len(),
            page.video_ids.len()
        );

        for candidate in shorts {
            collected.push(candidate);
            if collected.len() >= max_results {
                break;
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break, // No more pages
        }
    }

    Ok(rank_candidates(collected, max_results))
}

/// Identity-keyed merge where a collision keeps the copy with more views.
#[derive(Debug, Default)]
pub struct CandidateMerger {
    candidates: Vec<VideoCandidate>,
    positions: HashMap<String, usize>,
}

impl CandidateMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, batch: Vec<VideoCandidate>) {
        for candidate in batch {
            match self.positions.get(&candidate.video_id) {
                Some(&pos) => {
                    if candidate.view_count > self.candidates[pos].view_count {
                        self.candidates[pos] = candidate;
                    }
                }
                None => {
                    self.positions
                        .insert(candidate.video_id.clone(), self.candidates.len());
                    self.candidates.push(candidate);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn into_ranked(self, max_results: usize) -> Vec<VideoCandidate> {
        rank_candidates(self.candidates, max_results)
    }
}

/// Run the collector per keyword and merge. Any failing keyword aborts the whole run.
pub async fn collect_keywords(
    platform: &dyn VideoPlatform,
    params: &CollectParams,
) -> AppResult<Vec<VideoCandidate>> {
    if params.keywords.is_empty() {
        return Err(AppError::Validation("keywords is required".to_string()));
    }

    let mut merger = CandidateMerger::new();
    for keyword in &params.keywords {
        let batch = collect_shorts(
            platform,
            keyword,
            params.max_results,
            Some(params.days),
            Some(&params.region),
        )
        .await?;
        merger.absorb(batch);
    }

    info!(
        "Merged {} unique shorts across {} keywords",
        merger.len(),
        params.keywords.len()
    );
    Ok(merger.into_ranked(params.max_results))
}

async fn popular_pass(
    platform: &dyn VideoPlatform,
    max_results: usize,
    days: Option<u32>,
    region: &str,
) -> AppResult<Vec<VideoCandidate>> {
    let mut collected: Vec<VideoCandidate> = Vec::new();
    let mut page_token: Option<String> = None;

    while collected.len() < max_results {
        let page = platform
            .most_popular_page(region, page_token.as_deref())
            .await?;

        for details in page.items {
            if !within_days(&details.published_at, days) {
                continue;
            }
            if let Some(candidate) = candidate_from_details(details) {
                collected.push(candidate);
                if collected.len() >= max_results {
                    break;
                }
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(collected)
}

/// Shorts from the region's popular chart. A day-filtered pass that comes up short
/// is followed by exactly one pass without the day filter.
pub async fn collect_most_popular(
    platform: &dyn VideoPlatform,
    params: &PopularParams,
) -> AppResult<Vec<VideoCandidate>> {
    let strict = Some(params.days).filter(|days| *days > 0);
    let windows = match strict {
        Some(days) => vec![Some(days), None],
        None => vec![None],
    };

    let mut collected = Vec::new();
    for window in windows {
        collected = popular_pass(platform, params.max_results, window, &params.region).await?;
        if collected.len() >= params.max_results {
            break;
        }
        if let Some(days) = window {
            info!(
                "Only {} popular shorts within {days} days, retrying without day filter",
                collected.len()
            );
        }
    }

    Ok(rank_candidates(collected, params.max_results))
}
