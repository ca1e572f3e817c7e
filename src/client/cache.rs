//! File-backed local article cache.
//!
//! Plays the role browser storage plays for a reading surface: a durable
//! `{articles, token}` blob the client works from while offline. The
//! authoritative store stays the writer-of-record; a successful sync
//! overwrites the article list here wholesale.

use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::LocalArticle;

/// Cache file cap. The cache holds article metadata, never page content.
const MAX_CACHE_FILE_SIZE: u64 = 8 * 1024 * 1024; // 8MB

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to access cache file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in cache file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Cache file too large: {0}")]
    TooLarge(String),
}

/// On-disk shape of the cache file. Every field is optional in the file so
/// older or hand-edited caches still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct CacheState {
    articles: Vec<LocalArticle>,
    token: Option<String>,
}

/// Durable client-side cache, one JSON file per profile.
///
/// Mutations persist immediately; there is no separate flush step to forget.
pub struct FileCache {
    path: PathBuf,
    state: CacheState,
}

impl FileCache {
    /// Opens the cache at `path`. A missing or empty file is an empty cache;
    /// a malformed or oversized one is an error rather than silent data loss.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();

        let state = match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > MAX_CACHE_FILE_SIZE => {
                return Err(CacheError::TooLarge(format!(
                    "Cache file is {} bytes (max {} bytes)",
                    meta.len(),
                    MAX_CACHE_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No cache file found, starting empty");
                CacheState::default()
            }
            Err(e) => return Err(CacheError::Io(e)),
            Ok(_) => {
                let content = std::fs::read_to_string(&path)?;
                if content.trim().is_empty() {
                    CacheState::default()
                } else {
                    serde_json::from_str(&content)?
                }
            }
        };

        Ok(Self { path, state })
    }

    pub fn articles(&self) -> &[LocalArticle] {
        &self.state.articles
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    /// Replaces the article list wholesale (the post-sync adoption rule).
    pub fn replace_articles(&mut self, articles: Vec<LocalArticle>) -> Result<(), CacheError> {
        self.state.articles = articles;
        self.persist()
    }

    /// Merges one article by URL: replace the cached copy if present, append
    /// otherwise. List order is preserved so the reading list stays stable.
    pub fn upsert_local(&mut self, article: LocalArticle) -> Result<(), CacheError> {
        match self
            .state
            .articles
            .iter_mut()
            .find(|cached| cached.url == article.url)
        {
            Some(existing) => *existing = article,
            None => self.state.articles.push(article),
        }
        self.persist()
    }

    pub fn set_token(&mut self, token: String) -> Result<(), CacheError> {
        self.state.token = Some(token);
        self.persist()
    }

    pub fn clear_token(&mut self) -> Result<(), CacheError> {
        self.state.token = None;
        self.persist()
    }

    /// Atomic write: temp file beside the target, then rename over it. The
    /// temp file is created owner-only on Unix since the token lives here,
    /// and rename carries that mode to the final file.
    fn persist(&self) -> Result<(), CacheError> {
        let payload = serde_json::to_string_pretty(&self.state)?;

        // Randomized temp name so a predictable path cannot be planted.
        let random_suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = self
            .path
            .with_extension(format!("tmp.{:016x}", random_suffix));

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut temp_file = options.open(&temp_path)?;
        if let Err(e) = temp_file
            .write_all(payload.as_bytes())
            .and_then(|_| temp_file.sync_all())
        {
            let _ = std::fs::remove_file(&temp_path);
            return Err(CacheError::Io(e));
        }
        drop(temp_file);

        // On Windows, rename fails if the destination exists.
        #[cfg(windows)]
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                let _ = std::fs::remove_file(&temp_path);
                return Err(CacheError::Io(e));
            }
        }

        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(CacheError::Io(e));
        }

        Ok(())
    }
}
