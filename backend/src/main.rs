#[macro_use]
extern crate rocket;

mod api;
mod config;
mod error;
mod models;
mod services;
mod utils;

use crate::config::AppConfig;
use crate::services::favorite_store::FavoriteStore;
use crate::services::snapshot_service::SnapshotWriter;
use crate::services::youtube_client::VideoPlatform;
use log::error;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;

pub struct AppState {
    pub config: AppConfig,
    pub platform: Arc<dyn VideoPlatform>,
    pub store: Arc<FavoriteStore>,
    pub snapshots: SnapshotWriter,
    // held so the refresh job keeps running
    #[allow(dead_code)]
    pub scheduler: Mutex<Option<JobScheduler>>,
}

#[launch]
async fn rocket() -> _ {
    config::load_environment();
    config::init_logger();

    let app_config = AppConfig::from_env();

    let cors = match config::create_cors(&app_config.cors_origin) {
        Ok(cors) => cors,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };

    let state = match config::create_app_state(app_config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize backend: {e:#}");
            std::process::exit(1);
        }
    };

    api::mount(rocket::build().manage(state)).attach(cors)
}
