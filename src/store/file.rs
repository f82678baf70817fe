//! File-backed session store — one JSON document per session.
//!
//! Writes go through a unique temp file in the same directory followed by a
//! rename, so a reader never observes a half-written session. Two writers
//! racing on the same id both succeed and the later rename wins whole; the
//! file is never interleaved.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::Session;
use crate::store::traits::SessionStore;

/// Session store over a directory of `<id>.json` files.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(id)))
    }
}

/// Map a session id to a safe file stem. Anything outside a conservative
/// character set becomes `_`, which keeps ids like `../x` inside the
/// store directory.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, id: &str) -> Result<Session, StoreError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Session::new(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(session)?;
        let path = self.path_for(&session.id);
        // Unique temp name per writer so concurrent saves never share one.
        let tmp = self.dir.join(format!(
            "{}.{}.tmp",
            sanitize(&session.id),
            Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn prune_older_than(&self, ttl: Duration) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let session: Session = match tokio::fs::read(&path)
                .await
                .map_err(StoreError::from)
                .and_then(|bytes| Ok(serde_json::from_slice(&bytes)?))
            {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e,
                        "skipping unreadable session file during prune");
                    continue;
                }
            };
            if session.updated_at < cutoff {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;

    async fn store() -> (tempfile::TempDir, FileSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let (_dir, store) = store().await;
        let mut session = Session::new("conv_abc123".to_string());
        session.append(Turn::user("we're building a budgeting app"));
        session
            .slot_values
            .insert("target".to_string(), Some("students".to_string()));
        store.save(&session).await.unwrap();

        let loaded = store.load("conv_abc123").await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.turns.len(), 1);
        assert_eq!(
            loaded.slot_values.get("target"),
            Some(&Some("students".to_string()))
        );
        assert_eq!(loaded.state, session.state);
    }

    #[tokio::test]
    async fn unknown_id_loads_as_fresh_session() {
        let (_dir, store) = store().await;
        let session = store.load("never_saved").await.unwrap();
        assert_eq!(session.id, "never_saved");
        assert!(session.turns.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_typed_error() {
        let (dir, store) = store().await;
        tokio::fs::write(dir.path().join("bad.json"), b"{not json")
            .await
            .unwrap();
        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref id, .. } if id == "bad"));
    }

    #[tokio::test]
    async fn hostile_ids_stay_inside_the_directory() {
        let (dir, store) = store().await;
        let session = Session::new("../escape".to_string());
        store.save(&session).await.unwrap();
        // The file landed under the store dir, not its parent.
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["___escape.json".to_string()]);

        let loaded = store.load("../escape").await.unwrap();
        assert_eq!(loaded.id, "../escape");
    }

    #[tokio::test]
    async fn concurrent_saves_leave_a_parseable_file() {
        let (_dir, store) = store().await;
        let store = std::sync::Arc::new(store);
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut session = Session::new("conv_race".to_string());
                session.append(Turn::user(format!("writer {i}")));
                store.save(&session).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        // Last write wins; whichever it was, the file is intact.
        let loaded = store.load("conv_race").await.unwrap();
        assert_eq!(loaded.turns.len(), 1);
    }

    #[tokio::test]
    async fn prune_removes_only_stale_sessions() {
        let (_dir, store) = store().await;

        let mut stale = Session::new("old".to_string());
        stale.updated_at = Utc::now() - TimeDelta::days(45);
        store.save(&stale).await.unwrap();

        let fresh = Session::new("new".to_string());
        store.save(&fresh).await.unwrap();

        let removed = store
            .prune_older_than(Duration::from_secs(30 * 24 * 3600))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        assert!(store.load("new").await.unwrap().turns.is_empty());
        // The stale session reloads as fresh because its file is gone.
        let reloaded = store.load("old").await.unwrap();
        assert_eq!(reloaded.id, "old");
        assert!(reloaded.updated_at > Utc::now() - TimeDelta::minutes(1));
    }

    #[tokio::test]
    async fn prune_skips_unparseable_files() {
        let (dir, store) = store().await;
        tokio::fs::write(dir.path().join("junk.json"), b"???")
            .await
            .unwrap();
        let removed = store.prune_older_than(Duration::from_secs(0)).await.unwrap();
        assert_eq!(removed, 0);
        assert!(dir.path().join("junk.json").exists());
    }
}
