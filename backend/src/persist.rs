use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Reads a JSON snapshot. A missing or unreadable file yields `None`.
pub(crate) async fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), %err, "no snapshot loaded");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unreadable snapshot");
            None
        }
    }
}

/// Replaces the snapshot at `path`. The JSON goes to a sibling temp file first
/// and is renamed over the old one, so readers never see a partial file.
/// Callers serialize their writes; two writers sharing a temp file would race.
pub(crate) async fn write_snapshot<T: Serialize>(path: &Path, value: &T) {
    let json = match serde_json::to_vec_pretty(value) {
        Ok(json) => json,
        Err(err) => {
            warn!(%err, "snapshot not serializable");
            return;
        }
    };
    let tmp = temp_path(path);
    if let Err(err) = tokio::fs::write(&tmp, json).await {
        warn!(path = %tmp.display(), %err, "persist error");
        return;
    }
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        warn!(path = %path.display(), %err, "persist error");
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    #[test]
    fn temp_file_sits_next_to_snapshot() {
        let tmp = temp_path(Path::new("/var/lib/santa/sessions.json"));
        assert_eq!(tmp, PathBuf::from("/var/lib/santa/sessions.json.tmp"));
    }

    #[tokio::test]
    async fn overwrite_leaves_latest_value_and_no_temp_file() {
        let path = std::env::temp_dir().join(format!("santa_snapshot_{}.json", Uuid::new_v4()));
        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1);
        write_snapshot(&path, &value).await;
        value.insert("b".to_string(), 2);
        write_snapshot(&path, &value).await;

        let loaded: BTreeMap<String, i32> = load_snapshot(&path).await.unwrap();
        assert_eq!(loaded, value);
        assert!(tokio::fs::metadata(temp_path(&path)).await.is_err());
        let _ = tokio::fs::remove_file(&path).await;
    }
}
