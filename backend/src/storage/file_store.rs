//! Filesystem session store.
//!
//! Layout under the base path:
//!
//! - `<base>/<uuid>.json` - session record; its mtime tracks activity
//! - `<base>/<uuid>.terminated` - marker making termination permanent
//! - `<base>/<uuid>/<key>.json` - one queued event, consumed in ascending key order
//!
//! The base path doubles as an inter-process mailbox: POST handlers in one
//! process queue events that a stream task in another process picks up.
//!
//! Activity never rewrites the record: pings only bump the record file's
//! mtime, and only on a record that still exists. `last_active` is the later
//! of the stored value and that mtime.

use super::{is_expired, Result, SessionStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mcpgate_types::{QueuedEvent, Session, SessionId, SessionStatus};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_EXTENSION: &str = ".json";

/// Storage backend that keeps sessions and queues as JSON files.
pub struct FileSessionStore {
    base: PathBuf,
    /// Last ordering key issued by this process.
    last_key: AtomicU64,
    /// Serialises record rewrites and deletions within this process.
    records: Mutex<()>,
}

impl FileSessionStore {
    /// Create a store rooted at `base`. The directory is created lazily.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            last_key: AtomicU64::new(0),
            records: Mutex::new(()),
        }
    }

    fn record_path(&self, id: &SessionId) -> PathBuf {
        self.base.join(format!("{}.json", id))
    }

    fn marker_path(&self, id: &SessionId) -> PathBuf {
        self.base.join(format!("{}.terminated", id))
    }

    fn queue_dir(&self, id: &SessionId) -> PathBuf {
        self.base.join(id.to_string())
    }

    /// Next ordering key: wall clock nanoseconds, forced strictly above the
    /// previous key issued here.
    fn next_key(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let previous = self
            .last_key
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    async fn read_record(&self, id: &SessionId) -> Result<Session> {
        let path = self.record_path(id);
        let not_found = |e: std::io::Error| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(*id),
            _ => e.into(),
        };

        let bytes = fs::read(&path).await.map_err(not_found)?;
        let mut session: Session = serde_json::from_slice(&bytes)?;

        let touched: DateTime<Utc> = fs::metadata(&path)
            .await
            .map_err(not_found)?
            .modified()?
            .into();
        session.last_active = session.last_active.max(touched);

        if fs::try_exists(self.marker_path(id)).await? {
            session.status = SessionStatus::Terminated;
        }
        Ok(session)
    }

    /// Write the record to a temporary file first, then rename (atomic replace).
    ///
    /// The file's mtime is set to `last_active` so a later read does not see
    /// the write itself as activity.
    async fn write_record(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_vec_pretty(session)?;
        let path = self.record_path(&session.session_id);
        let temp_path = self
            .base
            .join(format!("{}.json.tmp-{}", session.session_id, Uuid::new_v4()));

        fs::write(&temp_path, json).await?;
        let published = match set_mtime(temp_path.clone(), session.last_active.into()).await {
            Ok(()) => fs::rename(&temp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Mark activity on an existing record without rewriting it.
    async fn touch_record(&self, id: &SessionId) -> Result<()> {
        match set_mtime(self.record_path(id), SystemTime::now()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(*id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Publish one event file without ever overwriting an existing one.
    ///
    /// The payload is written to a pending file and hard-linked to its final
    /// name; linking fails if the name is taken, in which case the next key
    /// is tried.
    async fn write_event(&self, dir: &Path, event: &QueuedEvent) -> Result<u64> {
        let body = serde_json::to_vec(event)?;
        let pending = dir.join(format!(".pending-{}", Uuid::new_v4()));
        fs::write(&pending, body).await?;

        let result: Result<u64> = loop {
            let key = self.next_key();
            let target = dir.join(format!("{:020}{}", key, EVENT_EXTENSION));
            match fs::hard_link(&pending, &target).await {
                Ok(()) => break Ok(key),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Queue key {} taken, retrying", key);
                    continue;
                }
                Err(e) => break Err(e.into()),
            }
        };

        let _ = fs::remove_file(&pending).await;
        result
    }

    /// Queued event file names in consumption order.
    async fn pending_events(&self, dir: &Path) -> std::io::Result<Vec<String>> {
        let mut entries = fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(EVENT_EXTENSION) && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create_session(&self) -> Result<SessionId> {
        let session = Session::new();
        let id = session.session_id;

        // Also creates the base directory
        fs::create_dir_all(self.queue_dir(&id)).await?;
        self.write_record(&session).await?;

        debug!("Created session record {:?}", self.record_path(&id));
        Ok(id)
    }

    async fn get_session(&self, id: &SessionId) -> Result<Session> {
        self.read_record(id).await
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let _records = self.records.lock().await;
        let id = &session.session_id;

        fs::create_dir_all(self.queue_dir(id)).await?;
        // Marker first: once it exists no stale record can revive the session
        if session.status == SessionStatus::Terminated {
            fs::write(self.marker_path(id), b"").await?;
        }
        self.write_record(session).await
    }

    async fn ping_session(&self, id: &SessionId) -> Result<()> {
        self.touch_record(id).await
    }

    async fn initialise_session(&self, id: &SessionId) -> Result<()> {
        let _records = self.records.lock().await;

        let mut session = self.read_record(id).await?;
        if session.status != SessionStatus::New {
            return Err(StoreError::InvalidTransition {
                id: *id,
                from: session.status,
            });
        }
        session.status = SessionStatus::Initialised;
        session.touch();
        self.write_record(&session).await
    }

    async fn queue_events(&self, id: &SessionId, events: Vec<QueuedEvent>) -> Result<()> {
        self.read_record(id).await?;
        // The queue directory is never recreated; a deleted session stays deleted
        let dir = self.queue_dir(id);

        for event in &events {
            let key = self.write_event(&dir, event).await.map_err(|e| match e {
                StoreError::Io(io) if io.kind() == ErrorKind::NotFound => {
                    StoreError::NotFound(*id)
                }
                other => other,
            })?;
            debug!("[{}] Queued '{}' event with key {}", id, event.event, key);
        }

        // Pending messages keep the session alive
        self.touch_record(id).await
    }

    async fn next_event(&self, id: &SessionId) -> Result<Option<QueuedEvent>> {
        let dir = self.queue_dir(id);
        let names = match self.pending_events(&dir).await {
            Ok(names) => names,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No queue directory: either nothing was ever queued or the session is gone
                self.read_record(id).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        for name in names {
            let path = dir.join(&name);
            let claimed = dir.join(format!("{}.claimed-{}", name, Uuid::new_v4()));

            // Only one poller can win the rename
            match fs::rename(&path, &claimed).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }

            let bytes = fs::read(&claimed).await;
            let _ = fs::remove_file(&claimed).await;

            match serde_json::from_slice::<QueuedEvent>(&bytes?) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    warn!("[{}] Dropping unreadable queued event {}: {}", id, name, e);
                    continue;
                }
            }
        }

        Ok(None)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<()> {
        let _records = self.records.lock().await;

        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match fs::remove_dir_all(self.queue_dir(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match fs::remove_file(self.marker_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn purge_expired(&self, idle_timeout: Duration) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.base).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut expired = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
            else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(stem) else {
                continue;
            };

            match self.read_record(&id).await {
                Ok(session) if is_expired(&session, idle_timeout) => expired.push(id),
                Ok(_) => {}
                // Deleted concurrently
                Err(StoreError::NotFound(_)) => {}
                Err(e) => warn!("Skipping unreadable session record {}: {}", id, e),
            }
        }

        for id in &expired {
            self.delete_session(id).await?;
            info!("Evicted idle session {}", id);
        }

        Ok(expired.len())
    }
}

/// Set a file's modification time. Fails with `NotFound` instead of creating it.
async fn set_mtime(path: PathBuf, at: SystemTime) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || {
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)?
            .set_modified(at)
    })
    .await
    .map_err(std::io::Error::other)?
}
