//! JSON file store for the session and layout snapshots

use lounge_api::Session;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::file::{read_optional, write_atomic};
use crate::{LayoutStore, SessionStore, SlotRecord, StoreResult};

/// File-backed snapshot store. Each save rewrites the whole file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    sessions_path: PathBuf,
    layout_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(sessions_path: impl Into<PathBuf>, layout_path: impl Into<PathBuf>) -> Self {
        Self {
            sessions_path: sessions_path.into(),
            layout_path: layout_path.into(),
        }
    }

    /// Store with the default file names inside `data_dir`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self::new(
            data_dir.join("active_sessions.json"),
            data_dir.join("device_layout.json"),
        )
    }

    pub fn sessions_path(&self) -> &Path {
        &self.sessions_path
    }

    pub fn layout_path(&self) -> &Path {
        &self.layout_path
    }
}

impl SessionStore for JsonFileStore {
    fn load_sessions(&self) -> StoreResult<Vec<Session>> {
        match read_optional(&self.sessions_path)? {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
                Ok(serde_json::from_slice(&bytes)?)
            }
            _ => Ok(Vec::new()),
        }
    }

    fn save_sessions(&self, sessions: &[Session]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(sessions)?;
        write_atomic(&self.sessions_path, &json)?;
        debug!(count = sessions.len(), "Session snapshot saved");
        Ok(())
    }
}

impl LayoutStore for JsonFileStore {
    fn load_layout(&self) -> StoreResult<Option<Vec<SlotRecord>>> {
        match read_optional(&self.layout_path)? {
            Some(bytes) if !bytes.is_empty() => Ok(Some(serde_json::from_slice(&bytes)?)),
            _ => Ok(None),
        }
    }

    fn save_layout(&self, slots: &[SlotRecord]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(slots)?;
        write_atomic(&self.layout_path, &json)?;
        debug!(count = slots.len(), "Slot layout saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use lounge_util::{DeviceId, MemberId};

    fn session(identity: &str, device: u32) -> Session {
        Session {
            identity: MemberId::new(identity),
            name: format!("Name {}", identity),
            checked_in_at: Local.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            device: DeviceId::new(device),
        }
    }

    #[test]
    fn sessions_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        assert!(store.load_sessions().unwrap().is_empty());

        let sessions = vec![session("S1", 3), session("S2", 0), session("S3", 17)];
        store.save_sessions(&sessions).unwrap();

        let loaded = store.load_sessions().unwrap();
        assert_eq!(loaded, sessions);
    }

    #[test]
    fn layout_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        assert!(store.load_layout().unwrap().is_none());

        let slots = vec![
            SlotRecord { device: DeviceId::new(3), slot: 1 },
            SlotRecord { device: DeviceId::new(4), slot: 0 },
        ];
        store.save_layout(&slots).unwrap();

        let mut loaded = store.load_layout().unwrap().unwrap();
        loaded.sort_by_key(|r| r.device);
        assert_eq!(loaded, slots);
    }

    #[test]
    fn corrupt_sessions_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        std::fs::write(store.sessions_path(), "{ not json").unwrap();

        assert!(store.load_sessions().is_err());
    }

    #[test]
    fn corrupt_layout_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());
        std::fs::write(store.layout_path(), "[{\"device\": \"x\"}]").unwrap();

        assert!(store.load_layout().is_err());
    }
}
