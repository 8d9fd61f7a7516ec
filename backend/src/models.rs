use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A numeric request field as sent by clients: a number, a numeric string, or blank.
///
/// Deserialization never fails; values that are not integers are kept as `Invalid`
/// so validation can report them.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum IntField {
    #[default]
    Absent,
    Value(i64),
    Invalid(String),
}

impl IntField {
    pub fn value(&self, name: &str) -> Result<Option<i64>, String> {
        match self {
            IntField::Absent => Ok(None),
            IntField::Value(n) => Ok(Some(*n)),
            IntField::Invalid(raw) => Err(format!("{name} must be an integer, got {raw}")),
        }
    }
}

impl From<i64> for IntField {
    fn from(n: i64) -> Self {
        IntField::Value(n)
    }
}

impl<'de> Deserialize<'de> for IntField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => IntField::Absent,
            Value::Number(n) => match n.as_i64() {
                Some(n) => IntField::Value(n),
                None => IntField::Invalid(n.to_string()),
            },
            Value::String(s) if s.trim().is_empty() => IntField::Absent,
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => IntField::Value(n),
                Err(_) => IntField::Invalid(format!("{s:?}")),
            },
            other => IntField::Invalid(other.to_string()),
        })
    }
}

/// A filtered short video produced by a collection run. Never persisted as a favorite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: String,
    pub duration_seconds: u32,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_count: Option<u64>,
}

/// Raw per-video record as returned by the upstream details/chart lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: String,
    pub duration: String, // compact notation, e.g. PT45S
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub published_at: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Metadata supplied when a video is favorited.
#[derive(Debug, Clone, Default)]
pub struct NewFavorite {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    Reactivated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub video_id: String,
    pub view_count: u64,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

/// A favorite joined with its most recent snapshot, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteWithStats {
    #[serde(flatten)]
    pub favorite: Favorite,
    pub latest_view_count: Option<u64>,
    pub latest_like_count: Option<u64>,
    pub latest_comment_count: Option<u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteView {
    #[serde(flatten)]
    pub video: FavoriteWithStats,
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub view_count: u64,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

impl From<ViewSnapshot> for HistoryPoint {
    fn from(snapshot: ViewSnapshot) -> Self {
        HistoryPoint {
            view_count: snapshot.view_count,
            like_count: snapshot.like_count,
            comment_count: snapshot.comment_count,
            recorded_at: snapshot.recorded_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub total: usize,
    pub updated: usize,
    pub missing: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedSnapshot {
    pub data_file: String,
    pub preview_file: String,
    pub saved: usize,
    pub preview_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct CollectRequest {
    pub keywords: Option<String>,
    pub keyword_list: Option<Vec<String>>,
    #[serde(default)]
    pub max_results: IntField,
    #[serde(default)]
    pub days: IntField,
    pub region: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectResponse {
    pub total: usize,
    pub keywords_used: Vec<String>,
    #[serde(flatten)]
    pub snapshot: SavedSnapshot,
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularRequest {
    #[serde(default)]
    pub max_results: IntField,
    #[serde(default)]
    pub days: IntField,
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PopularResponse {
    pub total: usize,
    pub videos: Vec<VideoCandidate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddFavoriteRequest {
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published_at: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddFavoriteResponse {
    pub success: bool,
    pub video_id: String,
    pub reactivated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveFavoriteResponse {
    pub success: bool,
    pub video_id: String,
}

#[derive(Debug, Serialize)]
pub struct FavoritesListResponse {
    pub favorites: Vec<FavoriteView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct FavoriteHistoryResponse {
    pub video: FavoriteWithStats,
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Serialize)]
pub struct FavoritesExport {
    pub favorites: Vec<FavoriteView>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
