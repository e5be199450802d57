//! Revalidation manifest
//!
//! Records when each post page was rendered and which publication of the
//! document it was rendered from. A page older than the revalidation
//! interval, or whose document was edited since, is stale.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the manifest, relative to the site base directory
pub const CACHE_DIR: &str = ".spacetraveling-cache";

const CACHE_FILE: &str = "db.json";

/// A rendered post page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub rendered_at: DateTime<Utc>,
    /// Publication the page was rendered from
    pub last_publication_date: Option<DateTime<Utc>>,
    /// Output path relative to the public dir
    pub output_path: String,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.rendered_at < max_age
    }
}

/// Manifest of rendered pages, stored as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheDb {
    pub version: u32,
    /// Entries keyed by post uid
    pub posts: BTreeMap<String, CacheEntry>,
    pub listing_rendered_at: Option<DateTime<Utc>>,
}

impl CacheDb {
    /// Current manifest format version
    const VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            ..Default::default()
        }
    }

    fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CACHE_DIR).join(CACHE_FILE)
    }

    /// Load the manifest from disk, or start an empty one
    pub fn load(base_dir: &Path) -> Self {
        let cache_path = Self::path(base_dir);
        if let Ok(content) = fs::read_to_string(&cache_path) {
            match serde_json::from_str::<CacheDb>(&content) {
                Ok(cache) if cache.version == Self::VERSION => return cache,
                Ok(_) => tracing::info!("Cache version mismatch, rebuilding cache"),
                Err(e) => tracing::warn!("Ignoring unreadable cache {:?}: {}", cache_path, e),
            }
        }
        Self::new()
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir.join(CACHE_DIR))?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(base_dir), content)?;
        Ok(())
    }

    pub fn record(&mut self, uid: &str, entry: CacheEntry) {
        self.posts.insert(uid.to_string(), entry);
    }

    pub fn remove(&mut self, uid: &str) -> Option<CacheEntry> {
        self.posts.remove(uid)
    }

    /// Whether the page for `uid` was rendered less than `max_age` ago
    pub fn is_fresh(&self, uid: &str, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.posts
            .get(uid)
            .is_some_and(|entry| entry.is_fresh(now, max_age))
    }

    /// Whether the page for `uid` must be rendered again: never rendered,
    /// older than `max_age`, or rendered from an older publication
    pub fn needs_render(
        &self,
        uid: &str,
        last_publication_date: Option<&DateTime<Utc>>,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> bool {
        let Some(entry) = self.posts.get(uid) else {
            return true;
        };
        if !entry.is_fresh(now, max_age) {
            return true;
        }
        match (last_publication_date, entry.last_publication_date.as_ref()) {
            (Some(current), Some(rendered)) => current > rendered,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn listing_is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.listing_rendered_at.is_some_and(|at| now - at < max_age)
    }
}
