//! Append-only JSONL conversation history.
//!
//! Every completed exchange is appended to a single file as one JSON line.
//! An in-memory write-through cache keeps reads off the disk after the first
//! load; all file I/O runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use hearth_domain::error::{Error, Result};
use hearth_domain::message::Turn;
use hearth_domain::trace::TraceEvent;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::store::{tail, ConversationStore};

/// A single transcript line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub timestamp: String,
    pub user: String,
    pub assistant: String,
}

impl TranscriptLine {
    fn now(user: &str, assistant: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            user: user.to_owned(),
            assistant: assistant.to_owned(),
        }
    }
}

struct Inner {
    path: PathBuf,
    /// `None` until the file has been read once.
    cache: Mutex<Option<Vec<Turn>>>,
}

/// File-backed [`ConversationStore`].
#[derive(Clone)]
pub struct TranscriptStore {
    inner: Arc<Inner>,
}

impl TranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                cache: Mutex::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }
}

impl Inner {
    /// Load the cache from disk if it has not been populated yet.
    fn loaded<'a>(&self, cache: &'a mut Option<Vec<Turn>>) -> Result<&'a mut Vec<Turn>> {
        if cache.is_none() {
            *cache = Some(read_jsonl_file(&self.path)?);
        }
        cache
            .as_mut()
            .ok_or_else(|| Error::Store("transcript cache unavailable".into()))
    }

    fn append(&self, line: &TranscriptLine) -> Result<()> {
        use std::io::Write;

        let mut cache = self.cache.lock();
        let turns = self.loaded(&mut cache)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut json = serde_json::to_string(line)
            .map_err(|e| Error::Store(format!("serializing transcript line: {e}")))?;
        json.push('\n');

        // Disk first; the cache only follows a successful write.
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(json.as_bytes())?;

        turns.push(Turn::new(line.user.clone(), line.assistant.clone()));
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<Turn>> {
        let mut cache = self.cache.lock();
        let turns = self.loaded(&mut cache)?;
        Ok(tail(turns, limit))
    }

    fn clear(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *cache = Some(Vec::new());
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationStore for TranscriptStore {
    async fn append(&self, user: &str, assistant: &str) -> Result<()> {
        let line = TranscriptLine::now(user, assistant);
        self.blocking(move |inner| inner.append(&line)).await?;

        TraceEvent::TranscriptAppend {
            path: self.inner.path.display().to_string(),
            lines: 1,
        }
        .emit();
        Ok(())
    }

    async fn recent_context(&self, limit: usize) -> Result<Vec<Turn>> {
        self.blocking(move |inner| inner.recent(limit)).await
    }

    async fn clear(&self) -> Result<()> {
        self.blocking(|inner| inner.clear()).await?;
        tracing::info!(path = %self.inner.path.display(), "conversation history cleared");
        Ok(())
    }
}

/// Read and parse a JSONL transcript file.
fn read_jsonl_file(path: &Path) -> Result<Vec<Turn>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut turns = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptLine>(line) {
            Ok(tl) => turns.push(Turn::new(tl.user, tl.assistant)),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping malformed transcript line"
                );
            }
        }
    }
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_then_read_back_from_fresh_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/conversation.jsonl");

        let store = TranscriptStore::new(&path);
        store.append("hi", "hello").await.unwrap();
        store.append("how are you", "fine").await.unwrap();

        // A new instance has a cold cache and must go to disk.
        let reopened = TranscriptStore::new(&path);
        let turns = reopened.recent_context(10).await.unwrap();
        assert_eq!(
            turns,
            vec![Turn::new("hi", "hello"), Turn::new("how are you", "fine")]
        );
    }

    #[tokio::test]
    async fn recent_context_is_limited_to_the_newest_turns() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("c.jsonl"));
        for i in 0..12 {
            store.append(&format!("q{i}"), &format!("a{i}")).await.unwrap();
        }
        let turns = store.recent_context(10).await.unwrap();
        assert_eq!(turns.len(), 10);
        assert_eq!(turns[0].user, "q2");
        assert_eq!(turns[9].assistant, "a11");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jsonl");
        std::fs::write(
            &path,
            "{\"timestamp\":\"t\",\"user\":\"u\",\"assistant\":\"a\"}\nnot json\n\n",
        )
        .unwrap();

        let store = TranscriptStore::new(&path);
        assert_eq!(
            store.recent_context(5).await.unwrap(),
            vec![Turn::new("u", "a")]
        );
    }

    #[tokio::test]
    async fn clear_removes_file_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jsonl");
        let store = TranscriptStore::new(&path);
        store.append("q", "a").await.unwrap();

        store.clear().await.unwrap();
        assert!(!path.exists());
        assert!(store.recent_context(5).await.unwrap().is_empty());

        // Clearing twice is fine.
        store.clear().await.unwrap();
    }
}
