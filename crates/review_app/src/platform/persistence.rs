//! Watch state kept between runs: which completions were already announced and
//! which job the operator was following.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use review_core::JobId;
use review_logging::{review_error, review_info, review_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub const DEFAULT_STATE_FILE: &str = ".batch-review-state.ron";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchState {
    pub notified: Vec<JobId>,
    pub selected: Option<JobId>,
}

/// A missing or unreadable file yields an empty state.
pub fn load_watch_state(path: &Path) -> WatchState {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return WatchState::default();
        }
        Err(err) => {
            review_warn!("Failed to read watch state from {:?}: {}", path, err);
            return WatchState::default();
        }
    };

    match ron::from_str::<WatchState>(&content) {
        Ok(state) => {
            review_info!(
                "Loaded watch state from {:?} ({} notified)",
                path,
                state.notified.len()
            );
            state
        }
        Err(err) => {
            review_warn!("Failed to parse watch state from {:?}: {}", path, err);
            WatchState::default()
        }
    }
}

/// Failures are logged; losing watch state only means repeated notifications.
pub fn save_watch_state(path: &Path, state: &WatchState) {
    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(state, pretty) {
        Ok(text) => text,
        Err(err) => {
            review_error!("Failed to serialize watch state: {}", err);
            return;
        }
    };

    if let Err(err) = write_atomic(path, &content) {
        review_error!("Failed to write watch state to {:?}: {}", path, err);
    }
}

/// Writes a temp file next to `path`, then renames it over `path`.
fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_state_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.ron");
        let state = WatchState {
            notified: vec!["job-1".into(), "job-7".into()],
            selected: Some("job-7".into()),
        };

        save_watch_state(&path, &state);
        assert_eq!(load_watch_state(&path), state);

        let updated = WatchState {
            notified: vec!["job-1".into()],
            selected: None,
        };
        save_watch_state(&path, &updated);
        assert_eq!(load_watch_state(&path), updated);
    }

    #[test]
    fn missing_or_garbled_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.ron");
        assert_eq!(load_watch_state(&path), WatchState::default());

        fs::write(&path, "not ron at all {").unwrap();
        assert_eq!(load_watch_state(&path), WatchState::default());
    }
}
