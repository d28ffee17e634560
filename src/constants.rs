//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Default catalog location
  pub default_repo: String,
  pub default_branch: String,
  pub default_path: String,

  // Catalog filtering
  pub media_extensions: Vec<String>,

  // Thumbnail capture
  pub capture_offset_secs: f64,
  pub thumb_width: u32,
  pub thumb_height: u32,
  pub thumb_timeout_secs: u64,

  // Catalog request
  pub request_timeout_secs: u64,

  // Watch progress
  pub completed_threshold: f64,
  pub progress_flush_secs: u64,

  // Transport
  pub seek_step_secs: f64,
  pub volume_step: i64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
