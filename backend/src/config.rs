use crate::services::favorite_store::FavoriteStore;
use crate::services::snapshot_service::SnapshotWriter;
use crate::services::tracking_service::{export_favorites, refresh_favorites};
use crate::services::youtube_client::{VideoPlatform, YouTubeClient};
use crate::AppState;
use anyhow::Result;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use rocket::http::Method;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";
pub const DEFAULT_REFRESH_SCHEDULE: &str = "0 0 */12 * * *";

/// Settings read once at startup and handed to the components that need them.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub favorites_export_path: PathBuf,
    /// `None` disables the scheduled refresh.
    pub refresh_schedule: Option<String>,
    pub default_region: String,
    pub cors_origin: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir: PathBuf::from("."),
            database_path: PathBuf::from("favorites.db"),
            favorites_export_path: PathBuf::from("favorites_data.json"),
            refresh_schedule: Some(DEFAULT_REFRESH_SCHEDULE.to_string()),
            default_region: "US".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        AppConfig {
            api_key: non_empty("API_KEY").or_else(|| non_empty("YOUTUBE_API_KEY")),
            api_base: non_empty("YOUTUBE_API_BASE").unwrap_or(defaults.api_base),
            data_dir: non_empty("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            database_path: non_empty("FAVORITES_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            favorites_export_path: non_empty("FAVORITES_EXPORT_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.favorites_export_path),
            // set but empty turns the scheduler off
            refresh_schedule: match lookup("REFRESH_SCHEDULE") {
                Some(schedule) if schedule.trim().is_empty() => None,
                Some(schedule) => Some(schedule),
                None => defaults.refresh_schedule,
            },
            default_region: non_empty("DEFAULT_REGION")
                .map(|region| region.trim().to_uppercase())
                .unwrap_or(defaults.default_region),
            cors_origin: non_empty("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
        }
    }
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting Rocket backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub async fn setup_refresh_scheduler(
    schedule: &str,
    platform: Arc<dyn VideoPlatform>,
    store: Arc<FavoriteStore>,
    export_path: PathBuf,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let refresh_job = Job::new_async(schedule, move |_uuid, _l| {
        let platform = platform.clone();
        let store = store.clone();
        let export_path = export_path.clone();
        Box::pin(async move {
            match refresh_favorites(platform.as_ref(), &store).await {
                Ok(summary) => info!(
                    "Scheduled refresh: {} of {} favorites updated, {} missing",
                    summary.updated,
                    summary.total,
                    summary.missing.len()
                ),
                Err(e) => error!("Scheduled refresh failed: {e}"),
            }
            if let Err(e) = export_favorites(&store, &export_path) {
                error!("Failed to export favorites: {e}");
            }
        })
    })?;

    scheduler.add(refresh_job).await?;
    scheduler.start().await?;
    info!("Favorites refresh scheduler started ({schedule}).");

    Ok(scheduler)
}

pub async fn create_app_state(config: AppConfig) -> Result<AppState> {
    if config.api_key.is_none() {
        warn!("API_KEY is not configured; collection and refresh will fail until it is set");
    }

    let platform: Arc<dyn VideoPlatform> =
        Arc::new(YouTubeClient::new(config.api_key.clone(), &config.api_base)?);
    let store = Arc::new(FavoriteStore::open(&config.database_path)?);

    let scheduler = match &config.refresh_schedule {
        Some(schedule) => Some(
            setup_refresh_scheduler(
                schedule,
                platform.clone(),
                store.clone(),
                config.favorites_export_path.clone(),
            )
            .await?,
        ),
        None => {
            info!("Scheduled favorites refresh disabled.");
            None
        }
    };

    Ok(AppState {
        snapshots: SnapshotWriter::new(&config.data_dir),
        platform,
        store,
        scheduler: Mutex::new(scheduler),
        config,
    })
}

pub fn create_cors(origin: &str) -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[origin]))
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Delete, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&["Accept", "Content-Type"]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}
