use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use santa_core::AssignmentSet;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::persist::{load_snapshot, write_snapshot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: String,
    pub label: Option<String>,
    pub created_at: u64,
    pub assignments: AssignmentSet,
}

/// Keeps finished draws under an opaque room id so they can be reopened later.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn put(&self, assignments: AssignmentSet, label: Option<String>) -> String;
    async fn get(&self, room_id: &str) -> Result<RoomRecord, RoomError>;
}

#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, RoomRecord>>,
    persist_path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_persistence(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let rooms: HashMap<String, RoomRecord> = load_snapshot(&path).await.unwrap_or_default();
        info!(rooms = rooms.len(), path = %path.display(), "room store loaded");
        Self {
            rooms: RwLock::new(rooms),
            persist_path: Some(path),
            persist_lock: Mutex::new(()),
        }
    }

    async fn persist(&self) {
        if let Some(path) = &self.persist_path {
            let _guard = self.persist_lock.lock().await;
            let snapshot = self.rooms.read().await.clone();
            write_snapshot(path, &snapshot).await;
        }
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn put(&self, assignments: AssignmentSet, label: Option<String>) -> String {
        let id = Uuid::new_v4().to_string();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let record = RoomRecord {
            id: id.clone(),
            label: label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
            created_at,
            assignments,
        };

        self.rooms.write().await.insert(id.clone(), record);
        self.persist().await;
        info!(room_id = %id, "room stored");
        id
    }

    async fn get(&self, room_id: &str) -> Result<RoomRecord, RoomError> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .cloned()
            .ok_or(RoomError::NotFound)
    }
}
