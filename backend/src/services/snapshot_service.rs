use crate::error::AppResult;
use crate::models::{SavedSnapshot, VideoCandidate};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_FILE_NAME: &str = "shorts.json";
pub const PREVIEW_FILE_NAME: &str = "shorts.preview.json";
pub const PREVIEW_SIZE: usize = 3;

/// Writes the latest collection result. Both files are replaced wholesale on every save.
pub struct SnapshotWriter {
    data_file: PathBuf,
    preview_file: PathBuf,
}

impl SnapshotWriter {
    pub fn new(data_dir: &Path) -> Self {
        SnapshotWriter {
            data_file: data_dir.join(DATA_FILE_NAME),
            preview_file: data_dir.join(PREVIEW_FILE_NAME),
        }
    }

    pub fn save(&self, records: &[VideoCandidate]) -> AppResult<SavedSnapshot> {
        let preview = &records[..records.len().min(PREVIEW_SIZE)];

        write_json(&self.data_file, records)?;
        write_json(&self.preview_file, preview)?;

        info!(
            "Saved {} shorts to {} (preview: {})",
            records.len(),
            self.data_file.display(),
            preview.len()
        );

        Ok(SavedSnapshot {
            data_file: self.data_file.display().to_string(),
            preview_file: self.preview_file.display().to_string(),
            saved: records.len(),
            preview_count: preview.len(),
        })
    }
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
