use crate::error::{AppError, AppResult};
use crate::models::{VideoDetails, VideoStats};
use log::debug;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Upper bound the API accepts for ids per lookup and results per page.
pub const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keyword: String,
    pub region: Option<String>,
    pub published_after: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsPage {
    pub items: Vec<VideoDetails>,
    pub next_page_token: Option<String>,
}

/// The slice of the video platform API the collector and refresher consume.
#[rocket::async_trait]
pub trait VideoPlatform: Send + Sync {
    async fn search_page(&self, query: &SearchQuery) -> AppResult<SearchPage>;

    /// Snippet, content details and statistics for at most [`MAX_PAGE_SIZE`] ids.
    async fn video_details(&self, video_ids: &[String]) -> AppResult<Vec<VideoDetails>>;

    /// Subscriber counts keyed by channel id. Channels with hidden counts are absent.
    async fn channel_subscribers(&self, channel_ids: &[String]) -> AppResult<HashMap<String, u64>>;

    async fn video_statistics(&self, video_ids: &[String])
        -> AppResult<HashMap<String, VideoStats>>;

    async fn most_popular_page(
        &self,
        region: &str,
        page_token: Option<&str>,
    ) -> AppResult<DetailsPage>;
}

pub struct YouTubeClient {
    http: Client,
    api_key: Option<String>,
    base_url: Url,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>, base_url: &str) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        // Url::join drops the last segment unless the base ends in a slash
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Configuration(format!("Invalid API base url {base_url}: {e}")))?;

        Ok(YouTubeClient {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url,
        })
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("API_KEY is not configured".to_string()))
    }

    async fn get_json(&self, endpoint: &str, label: &str, params: &[(&str, String)]) -> AppResult<Value> {
        let api_key = self.api_key()?;
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| AppError::Configuration(format!("Invalid endpoint {endpoint}: {e}")))?;

        debug!("GET {url} {label}");

        let response = self
            .http
            .get(url)
            .query(&[("key", api_key)])
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube {label} request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Upstream(format!("YouTube {label} body unreadable: {e}")))?;
        decode_response(label, status, &body)
    }
}

/// Non-2xx statuses and unparseable bodies both surface as upstream errors.
fn decode_response(label: &str, status: StatusCode, body: &str) -> AppResult<Value> {
    if !status.is_success() {
        return Err(AppError::Upstream(format!(
            "YouTube {label} failed: {} {body}",
            status.as_u16()
        )));
    }

    serde_json::from_str(body)
        .map_err(|e| AppError::Upstream(format!("YouTube {label} returned malformed body: {e}")))
}

#[rocket::async_trait]
impl VideoPlatform for YouTubeClient {
    // Documentation: https://developers.google.com/youtube/v3/docs/search/list
    async fn search_page(&self, query: &SearchQuery) -> AppResult<SearchPage> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("q", query.keyword.clone()),
            ("maxResults", MAX_PAGE_SIZE.to_string()),
            ("order", "viewCount".to_string()),
            ("videoDuration", "short".to_string()),
        ];
        if let Some(region) = &query.region {
            params.push(("regionCode", region.clone()));
        }
        if let Some(published_after) = &query.published_after {
            params.push(("publishedAfter", published_after.clone()));
        }
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.clone()));
        }

        let response = self.get_json("search", "search", &params).await?;
        Ok(parse_search_page(&response))
    }

    // Documentation: https://developers.google.com/youtube/v3/docs/videos
    async fn video_details(&self, video_ids: &[String]) -> AppResult<Vec<VideoDetails>> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = [
            ("part", "snippet,contentDetails,statistics".to_string()),
            ("id", video_ids.join(",")),
            ("maxResults", MAX_PAGE_SIZE.to_string()),
        ];

        let response = self.get_json("videos", "videos lookup", &params).await?;
        Ok(parse_items(&response).iter().map(parse_video_item).collect())
    }

    async fn channel_subscribers(&self, channel_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if channel_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let params = [
            ("part", "statistics".to_string()),
            ("id", channel_ids.join(",")),
        ];

        let response = self.get_json("channels", "channels lookup", &params).await?;
        Ok(parse_channel_subscribers(&response))
    }

    async fn video_statistics(
        &self,
        video_ids: &[String],
    ) -> AppResult<HashMap<String, VideoStats>> {
        if video_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let params = [
            ("part", "statistics".to_string()),
            ("id", video_ids.join(",")),
        ];

        let response = self.get_json("videos", "statistics lookup", &params).await?;
        Ok(parse_items(&response)
            .iter()
            .filter_map(|item| {
                let id = item["id"].as_str()?;
                Some((id.to_string(), parse_stats(&item["statistics"])))
            })
            .collect())
    }

    async fn most_popular_page(
        &self,
        region: &str,
        page_token: Option<&str>,
    ) -> AppResult<DetailsPage> {
        let mut params = vec![
            ("part", "snippet,contentDetails,statistics".to_string()),
            ("chart", "mostPopular".to_string()),
            ("regionCode", region.to_string()),
            ("maxResults", MAX_PAGE_SIZE.to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self.get_json("videos", "mostPopular", &params).await?;
        Ok(DetailsPage {
            items: parse_items(&response).iter().map(parse_video_item).collect(),
            next_page_token: next_page_token(&response),
        })
    }
}

fn parse_items(response: &Value) -> &[Value] {
    response["items"].as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn next_page_token(response: &Value) -> Option<String> {
    response["nextPageToken"]
        .as_str()
        .filter(|token| !token.is_empty())
        .map(String::from)
}

/// Counts arrive as decimal strings; tolerate plain numbers too.
fn parse_count(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn parse_stats(statistics: &Value) -> VideoStats {
    VideoStats {
        view_count: parse_count(&statistics["viewCount"]),
        like_count: parse_count(&statistics["likeCount"]),
        comment_count: parse_count(&statistics["commentCount"]),
    }
}

pub(crate) fn parse_search_page(response: &Value) -> SearchPage {
    SearchPage {
        video_ids: parse_items(response)
            .iter()
            .filter_map(|item| item["id"]["videoId"].as_str())
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect(),
        next_page_token: next_page_token(response),
    }
}

pub(crate) fn parse_video_item(item: &Value) -> VideoDetails {
    let snippet = &item["snippet"];
    let stats = parse_stats(&item["statistics"]);

    VideoDetails {
        video_id: item["id"].as_str().unwrap_or("").to_string(),
        title: snippet["title"].as_str().unwrap_or("").to_string(),
        channel_id: snippet["channelId"].as_str().unwrap_or("").to_string(),
        channel_title: snippet["channelTitle"].as_str().unwrap_or("").to_string(),
        published_at: snippet["publishedAt"].as_str().unwrap_or("").to_string(),
        duration: item["contentDetails"]["duration"]
            .as_str()
            .unwrap_or("")
            .to_string(),
        view_count: stats.view_count,
        like_count: stats.like_count,
        comment_count: stats.comment_count,
        tags: snippet["tags"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

pub(crate) fn parse_channel_subscribers(response: &Value) -> HashMap<String, u64> {
    parse_items(response)
        .iter()
        .filter_map(|item| {
            let id = item["id"].as_str()?;
            let statistics = &item["statistics"];
            if statistics["hiddenSubscriberCount"].as_bool() == Some(true) {
                return None;
            }
            if statistics["subscriberCount"].is_null() {
                return None;
            }
            Some((id.to_string(), parse_count(&statistics["subscriberCount"])))
        })
        .collect()
}
