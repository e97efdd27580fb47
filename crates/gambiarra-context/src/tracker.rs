//! File-context staleness tracking.
//!
//! The tracker is a per-session ledger of reads and writes keyed by
//! absolute path. A file's cached understanding goes stale when a tool
//! writes it after it was read, or when its on-disk mtime moves past the
//! last read.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default cap on tracked files.
pub const DEFAULT_MAX_TRACKED: usize = 200;

/// Hex characters of the content hash kept per file.
const HASH_PREFIX_LEN: usize = 16;

/// Context information for one tracked file.
#[derive(Debug, Clone)]
pub struct FileContext {
    /// Absolute path.
    pub path: PathBuf,
    /// Last time a tool read the file in this session.
    pub last_read: Option<DateTime<Utc>>,
    /// Last modification the tracker observed (disk mtime on read, write
    /// time on write).
    pub last_modified: Option<DateTime<Utc>>,
    /// First 16 hex characters of the sha256 of the last-seen content.
    pub content_hash: Option<String>,
    /// Number of reads in this session.
    pub access_count: u64,
    /// Number of tool writes in this session.
    pub modification_count: u64,
    /// Whether the cached understanding is known stale.
    pub is_stale: bool,
}

/// Freshness verdict for a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freshness {
    /// Whether the path has been seen this session.
    pub tracked: bool,
    /// Whether the cached understanding is stale.
    pub stale: bool,
    /// Human-readable explanation.
    pub reason: String,
}

/// Per-session ledger of file reads and writes.
#[derive(Debug)]
pub struct FileContextTracker {
    tracked: HashMap<PathBuf, FileContext>,
    modified: HashSet<PathBuf>,
    max_tracked: usize,
    session_start: DateTime<Utc>,
}

impl FileContextTracker {
    /// Create a tracker with the default cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_TRACKED)
    }

    /// Create a tracker with an explicit cap.
    #[must_use]
    pub fn with_capacity(max_tracked: usize) -> Self {
        Self {
            tracked: HashMap::new(),
            modified: HashSet::new(),
            max_tracked,
            session_start: Utc::now(),
        }
    }

    /// Record that a tool read `path` and saw `content`.
    pub fn on_read(&mut self, path: &Path, content: &str) {
        let abs = absolute(path);
        let disk_mtime = disk_mtime(&abs);
        let hash = content_hash(content);

        let entry = self.tracked.entry(abs.clone()).or_insert_with(|| FileContext {
            path: abs.clone(),
            last_read: None,
            last_modified: None,
            content_hash: None,
            access_count: 0,
            modification_count: 0,
            is_stale: false,
        });
        entry.last_read = Some(Utc::now());
        entry.last_modified = disk_mtime;
        entry.content_hash = Some(hash);
        entry.access_count += 1;
        entry.is_stale = false;

        debug!(path = %abs.display(), "tracked file read");
        self.enforce_limit();
    }

    /// Record that a tool wrote `content` to `path`.
    pub fn on_write(&mut self, path: &Path, content: &str) {
        let abs = absolute(path);
        let hash = content_hash(content);

        let entry = self.tracked.entry(abs.clone()).or_insert_with(|| FileContext {
            path: abs.clone(),
            last_read: None,
            last_modified: None,
            content_hash: None,
            access_count: 0,
            modification_count: 0,
            is_stale: false,
        });
        // A write after a read invalidates the cached understanding; a
        // write to a never-read file has nothing to invalidate.
        entry.is_stale = entry.last_read.is_some();
        entry.last_modified = Some(Utc::now());
        entry.content_hash = Some(hash);
        entry.modification_count += 1;

        self.modified.insert(abs.clone());
        debug!(path = %abs.display(), "tracked file write");
        self.enforce_limit();
    }

    /// Check whether the cached context for `path` is fresh.
    pub fn check(&mut self, path: &Path) -> Freshness {
        let abs = absolute(path);
        let Some(entry) = self.tracked.get_mut(&abs) else {
            return Freshness {
                tracked: false,
                stale: false,
                reason: "File not tracked".to_string(),
            };
        };

        if let (Some(last_read), Some(mtime)) = (entry.last_read, disk_mtime(&abs)) {
            if mtime > last_read {
                entry.is_stale = true;
                return Freshness {
                    tracked: true,
                    stale: true,
                    reason: "File modified on disk since last read".to_string(),
                };
            }
        }

        if entry.is_stale {
            return Freshness {
                tracked: true,
                stale: true,
                reason: "File modified by tool after being read".to_string(),
            };
        }

        Freshness {
            tracked: true,
            stale: false,
            reason: "File context is fresh".to_string(),
        }
    }

    /// Mark a path fresh again (typically after a re-read).
    pub fn mark_fresh(&mut self, path: &Path) {
        let abs = absolute(path);
        if let Some(entry) = self.tracked.get_mut(&abs) {
            entry.is_stale = false;
        }
    }

    /// Paths with a stale flag set.
    #[must_use]
    pub fn stale_files(&self) -> Vec<PathBuf> {
        self.tracked
            .values()
            .filter(|c| c.is_stale)
            .map(|c| c.path.clone())
            .collect()
    }

    /// Paths written during this session.
    #[must_use]
    pub fn modified_files(&self) -> &HashSet<PathBuf> {
        &self.modified
    }

    /// Number of tracked files.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Access the context entry for a path, if tracked.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileContext> {
        self.tracked.get(&absolute(path))
    }

    /// Drop oldest-read entries when the cap is exceeded.
    fn enforce_limit(&mut self) {
        if self.tracked.len() <= self.max_tracked {
            return;
        }
        let mut by_age: Vec<(PathBuf, DateTime<Utc>)> = self
            .tracked
            .values()
            .map(|c| (c.path.clone(), c.last_read.unwrap_or(self.session_start)))
            .collect();
        by_age.sort_by_key(|(_, read)| *read);

        let excess = self.tracked.len() - self.max_tracked;
        for (path, _) in by_age.into_iter().take(excess) {
            self.tracked.remove(&path);
            self.modified.remove(&path);
        }
        debug!(removed = excess, "evicted old tracked files");
    }
}

impl Default for FileContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn disk_mtime(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_PREFIX_LEN);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_is_not_stale() {
        let mut tracker = FileContextTracker::new();
        let freshness = tracker.check(Path::new("/nonexistent/whatever.txt"));
        assert!(!freshness.tracked);
        assert!(!freshness.stale);
    }

    #[test]
    fn test_read_then_write_marks_stale() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "print('hi')\n").unwrap();

        let mut tracker = FileContextTracker::new();
        tracker.on_read(&file, "print('hi')\n");
        assert!(!tracker.check(&file).stale);

        tracker.on_write(&file, "print('bye')\n");
        let freshness = tracker.check(&file);
        assert!(freshness.stale);
        assert_eq!(freshness.reason, "File modified by tool after being read");
    }

    #[test]
    fn test_reread_clears_stale() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "one").unwrap();

        let mut tracker = FileContextTracker::new();
        tracker.on_read(&file, "one");
        tracker.on_write(&file, "two");
        assert!(tracker.check(&file).stale);

        tracker.on_read(&file, "two");
        assert!(!tracker.check(&file).stale);
    }

    #[test]
    fn test_write_to_unread_file_is_not_stale() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.txt");

        let mut tracker = FileContextTracker::new();
        tracker.on_write(&file, "fresh content");
        assert!(!tracker.check(&file).stale);
        assert_eq!(tracker.get(&file).unwrap().modification_count, 1);
    }

    #[test]
    fn test_content_hash_is_16_hex_chars() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "data").unwrap();

        let mut tracker = FileContextTracker::new();
        tracker.on_read(&file, "data");
        let hash = tracker.get(&file).unwrap().content_hash.clone().unwrap();
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_eviction_drops_oldest_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = FileContextTracker::with_capacity(3);
        for i in 0..5 {
            let file = dir.path().join(format!("f{i}.txt"));
            std::fs::write(&file, "x").unwrap();
            tracker.on_read(&file, "x");
        }
        assert_eq!(tracker.tracked_count(), 3);
        // The earliest reads were evicted
        assert!(tracker.get(&dir.path().join("f0.txt")).is_none());
        assert!(tracker.get(&dir.path().join("f4.txt")).is_some());
    }

    #[test]
    fn test_modified_files_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.txt");
        let mut tracker = FileContextTracker::new();
        tracker.on_write(&file, "x");
        assert_eq!(tracker.modified_files().len(), 1);
    }
}
