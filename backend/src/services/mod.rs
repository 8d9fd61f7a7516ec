pub mod collector;
pub mod favorite_store;
pub mod snapshot_service;
pub mod tracking_service;
pub mod youtube_client;
