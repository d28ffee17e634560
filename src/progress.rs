//! Watch-progress persistence: per-item playback position and a one-way
//! "completed" latch, keyed by source URL.
//!
//! The store is an in-memory map with a throttled TOML flush, because
//! positions arrive on every playback tick. `in_memory()` gives tests a
//! fake with identical semantics and no disk.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::constants::constants;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressRecord {
  pub position: f64,
  pub completed: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressFile {
  #[serde(default)]
  items: HashMap<String, ProgressRecord>,
}

pub struct ProgressStore {
  entries: HashMap<String, ProgressRecord>,
  path: Option<PathBuf>,
  dirty: bool,
  last_flush: Instant,
}

impl ProgressStore {
  /// Open the store backed by `progress.toml` in the platform data dir.
  /// A missing or unreadable file starts empty rather than failing.
  pub fn open() -> Self {
    let path = ProjectDirs::from("", "", "rvp").map(|dirs| dirs.data_dir().join("progress.toml"));
    Self::at_path(path)
  }

  /// Store backed by an explicit file path.
  pub fn at_path(path: Option<PathBuf>) -> Self {
    let entries = path
      .as_ref()
      .and_then(|p| std::fs::read_to_string(p).ok())
      .and_then(|content| toml::from_str::<ProgressFile>(&content).ok())
      .map(|file| file.items)
      .unwrap_or_default();
    Self { entries, path, dirty: false, last_flush: Instant::now() }
  }

  /// Store with no backing file. Used in tests.
  pub fn in_memory() -> Self {
    Self::at_path(None)
  }

  /// Last saved playback position for a URL; 0.0 when the URL is unseen.
  pub fn position(&self, url: &str) -> f64 {
    self.entries.get(url).map_or(0.0, |r| r.position)
  }

  /// Record the playback position. Called on every playback tick, so this
  /// only touches the map; disk writes happen in `flush_if_stale`.
  /// Non-finite or negative positions are ignored.
  pub fn set_position(&mut self, url: &str, position: f64) {
    if !position.is_finite() || position < 0.0 {
      return;
    }
    let record = self.entries.entry(url.to_string()).or_default();
    record.position = position;
    self.dirty = true;
  }

  /// One-way latch: once marked, a URL stays completed.
  pub fn mark_completed(&mut self, url: &str) {
    let record = self.entries.entry(url.to_string()).or_default();
    if !record.completed {
      debug!(url, "marking item completed");
      record.completed = true;
      self.dirty = true;
    }
  }

  pub fn is_completed(&self, url: &str) -> bool {
    self.entries.get(url).is_some_and(|r| r.completed)
  }

  /// Flush to disk if anything changed since the last flush and the throttle
  /// interval has elapsed.
  pub fn flush_if_stale(&mut self) {
    if self.dirty && self.last_flush.elapsed() >= Duration::from_secs(constants().progress_flush_secs) {
      self.flush();
    }
  }

  /// Unconditional flush. Called on exit and when a completion latches.
  pub fn flush(&mut self) {
    let Some(ref path) = self.path else {
      self.dirty = false;
      return;
    };
    if !self.dirty {
      return;
    }
    let file = ProgressFile { items: self.entries.clone() };
    match toml::to_string(&file) {
      Ok(content) => {
        if let Some(parent) = path.parent() {
          let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(path, content) {
          warn!(err = %e, path = %path.display(), "failed to write progress file");
        } else {
          self.dirty = false;
          self.last_flush = Instant::now();
        }
      }
      Err(e) => warn!(err = %e, "failed to serialize progress file"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn position_round_trip() {
    let mut store = ProgressStore::in_memory();
    store.set_position("http://x/a.mp4", 42.5);
    assert_eq!(store.position("http://x/a.mp4"), 42.5);
  }

  #[test]
  fn unseen_url_defaults_to_zero() {
    let store = ProgressStore::in_memory();
    assert_eq!(store.position("http://x/never.mp4"), 0.0);
    assert!(!store.is_completed("http://x/never.mp4"));
  }

  #[test]
  fn position_overwrites_idempotently() {
    let mut store = ProgressStore::in_memory();
    for t in 0..100 {
      store.set_position("http://x/a.mp4", t as f64 * 0.25);
    }
    assert_eq!(store.position("http://x/a.mp4"), 99.0 * 0.25);
  }

  #[test]
  fn invalid_positions_ignored() {
    let mut store = ProgressStore::in_memory();
    store.set_position("http://x/a.mp4", 10.0);
    store.set_position("http://x/a.mp4", f64::NAN);
    store.set_position("http://x/a.mp4", -3.0);
    assert_eq!(store.position("http://x/a.mp4"), 10.0);
  }

  #[test]
  fn completion_is_a_one_way_latch() {
    let mut store = ProgressStore::in_memory();
    store.mark_completed("http://x/a.mp4");
    assert!(store.is_completed("http://x/a.mp4"));

    // Unrelated writes don't reset it.
    store.set_position("http://x/b.mp4", 5.0);
    store.mark_completed("http://x/b.mp4");
    store.set_position("http://x/a.mp4", 0.0);
    assert!(store.is_completed("http://x/a.mp4"));
  }

  #[test]
  fn survives_disk_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.toml");

    let mut store = ProgressStore::at_path(Some(path.clone()));
    store.set_position("http://x/a b.mp4", 17.0);
    store.mark_completed("http://x/a b.mp4");
    store.flush();

    let reopened = ProgressStore::at_path(Some(path));
    assert_eq!(reopened.position("http://x/a b.mp4"), 17.0);
    assert!(reopened.is_completed("http://x/a b.mp4"));
  }

  #[test]
  fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.toml");
    std::fs::write(&path, "not [valid toml").unwrap();

    let store = ProgressStore::at_path(Some(path));
    assert_eq!(store.position("http://x/a.mp4"), 0.0);
  }
}
