//! Rejection sinks for records that could not be stored.
//!
//! A [`Rejection`] carries the raw entry payload, a reason label, the error
//! text and a random correlation token. Sinks are fire-and-forget: the
//! backfill loop logs the rejection itself and never looks at the outcome of
//! [`RejectionSink::reject`].

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// One rejected feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Correlates the log line with the stored payload.
    pub token: Uuid,
    /// Stable reason label (`bad-id`, `stale-update`, ...).
    pub reason: &'static str,
    /// Human-readable error text.
    pub detail: String,
    /// Article id or `<id>` URL, when known.
    pub subject: Option<String>,
    pub rejected_at: DateTime<Utc>,
    /// Verbatim entry XML.
    #[serde(skip)]
    pub payload: String,
}

impl Rejection {
    /// Creates a rejection with a fresh v4 token.
    #[must_use]
    pub fn new(
        reason: &'static str,
        detail: impl Into<String>,
        subject: Option<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            token: Uuid::new_v4(),
            reason,
            detail: detail.into(),
            subject,
            rejected_at: Utc::now(),
            payload: payload.into(),
        }
    }
}

/// Destination for rejected records.
#[async_trait]
pub trait RejectionSink: Send + Sync {
    /// Records one rejection. Failures are handled inside the sink.
    async fn reject(&self, rejection: &Rejection);
}

/// Writes each rejection to `<dir>/<token>.xml` plus a `<token>.json` summary.
#[derive(Debug, Clone)]
pub struct FileRejectionSink {
    dir: PathBuf,
}

impl FileRejectionSink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the payload file for `token`.
    #[must_use]
    pub fn payload_path(&self, token: Uuid) -> PathBuf {
        self.dir.join(format!("{token}.xml"))
    }

    fn write(&self, rejection: &Rejection) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let payload_path = self.payload_path(rejection.token);
        write_new(&payload_path, rejection.payload.as_bytes())?;

        let summary_path = self.dir.join(format!("{}.json", rejection.token));
        let summary = serde_json::to_vec_pretty(rejection).map_err(std::io::Error::other)?;
        write_new(&summary_path, &summary)?;

        Ok(payload_path)
    }
}

fn write_new(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "rejection file already exists, keeping it");
            return Ok(());
        }
        Err(err) => return Err(err),
    };
    let mut writer = BufWriter::new(file);
    let result = writer.write_all(contents).and_then(|()| writer.flush());
    if result.is_err() {
        // Do not leave a truncated payload behind.
        let _ = fs::remove_file(path);
    }
    result
}

#[async_trait]
impl RejectionSink for FileRejectionSink {
    async fn reject(&self, rejection: &Rejection) {
        let sink = self.clone();
        let owned = rejection.clone();
        let written = tokio::task::spawn_blocking(move || sink.write(&owned)).await;
        match written {
            Ok(Ok(path)) => debug!(path = %path.display(), "rejected payload saved"),
            Ok(Err(err)) => warn!(
                token = %rejection.token,
                dir = %self.dir.display(),
                error = %err,
                "failed to save rejected payload"
            ),
            Err(err) => warn!(token = %rejection.token, error = %err, "rejection writer task failed"),
        }
    }
}

/// Keeps rejections in memory.
#[derive(Debug, Default)]
pub struct MemoryRejectionSink {
    rejections: Mutex<Vec<Rejection>>,
}

impl MemoryRejectionSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything rejected so far.
    pub async fn rejections(&self) -> Vec<Rejection> {
        self.rejections.lock().await.clone()
    }

    /// Reason labels in rejection order.
    pub async fn reasons(&self) -> Vec<&'static str> {
        self.rejections
            .lock()
            .await
            .iter()
            .map(|rejection| rejection.reason)
            .collect()
    }
}

#[async_trait]
impl RejectionSink for MemoryRejectionSink {
    async fn reject(&self, rejection: &Rejection) {
        self.rejections.lock().await.push(rejection.clone());
    }
}
