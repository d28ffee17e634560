use reqwest::{Client, Url, header};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::constants;

// --- Errors ---

/// Failures of the catalog load boundary. `Network` and the rest are caught
/// in one place and rendered as a single list message, never a crash.
#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("catalog request failed: {0}")]
  Network(#[from] reqwest::Error),
  #[error("catalog endpoint returned {status}: {message}")]
  Status { status: u16, message: String },
  #[error("catalog response was not a file listing")]
  Malformed,
  #[error("no media found")]
  NoMedia,
}

// --- Types ---

/// One entry of the repository contents listing. The API returns more fields
/// (sha, size, type); only the filename matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
  pub name: String,
}

/// One playable entry of the catalog. Identity is `source_url`; immutable
/// once constructed from the listing response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableItem {
  /// Filename with its media extension stripped.
  pub display_name: String,
  /// Raw-content URL the player loads.
  pub source_url: String,
  /// Co-located `.jpg` guess used as the first thumbnail candidate.
  pub thumb_url: String,
}

/// Where the catalog lives: a GitHub repository, branch and subdirectory.
#[derive(Debug, Clone)]
pub struct CatalogSource {
  api_url: Url,
  raw_base: Url,
  token: Option<String>,
}

impl CatalogSource {
  pub fn new(repo: &str, branch: &str, path: &str, token: Option<String>) -> anyhow::Result<Self> {
    let api_url = if path.is_empty() {
      format!("https://api.github.com/repos/{}/contents", repo)
    } else {
      format!("https://api.github.com/repos/{}/contents/{}", repo, path)
    };
    let raw_base = if path.is_empty() {
      format!("https://raw.githubusercontent.com/{}/{}", repo, branch)
    } else {
      format!("https://raw.githubusercontent.com/{}/{}/{}", repo, branch, path)
    };
    Ok(Self {
      api_url: Url::parse(&api_url).map_err(|e| anyhow::anyhow!("invalid repository '{}': {}", repo, e))?,
      raw_base: Url::parse(&raw_base).map_err(|e| anyhow::anyhow!("invalid repository '{}': {}", repo, e))?,
      token,
    })
  }

  pub fn api_url(&self) -> &str {
    self.api_url.as_str()
  }

  /// Deterministic raw-content URL for a file in the catalog directory.
  /// The filename is percent-escaped as a single path segment.
  pub fn item_url(&self, filename: &str) -> String {
    let mut url = self.raw_base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.push(filename);
    }
    url.to_string()
  }
}

// --- Filtering and mapping ---

/// Whether a filename's extension is in the media allowlist (case-insensitive).
pub fn is_media_file(name: &str) -> bool {
  let Some((_, ext)) = name.rsplit_once('.') else { return false };
  let ext = ext.to_lowercase();
  constants().media_extensions.iter().any(|e| *e == ext)
}

/// Strip the recognized media extension from a filename, exactly once.
/// Unrecognized extensions are left alone.
pub fn strip_media_extension(name: &str) -> String {
  match name.rsplit_once('.') {
    Some((stem, ext)) if constants().media_extensions.iter().any(|e| *e == ext.to_lowercase()) => stem.to_string(),
    _ => name.to_string(),
  }
}

/// Filename of the sidecar thumbnail guess: media extension replaced by jpg.
fn sidecar_name(name: &str) -> String {
  format!("{}.jpg", strip_media_extension(name))
}

/// Filter a contents listing down to playable items, in listing order.
/// Fails with `NoMedia` when nothing in the listing matches the allowlist.
pub fn items_from_entries(entries: &[CatalogEntry], source: &CatalogSource) -> Result<Vec<PlayableItem>, CatalogError> {
  let items: Vec<PlayableItem> = entries
    .iter()
    .filter(|e| is_media_file(&e.name))
    .map(|e| PlayableItem {
      display_name: strip_media_extension(&e.name),
      source_url: source.item_url(&e.name),
      thumb_url: source.item_url(&sidecar_name(&e.name)),
    })
    .collect();

  if items.is_empty() {
    return Err(CatalogError::NoMedia);
  }
  Ok(items)
}

// --- Fetch ---

/// Fetch the repository contents listing and map it to playable items.
///
/// One GET, no retries. The request carries a bounded timeout (configured on
/// the shared client) so a dead endpoint cannot stall the app forever.
pub async fn fetch_catalog(client: &Client, source: &CatalogSource) -> Result<Vec<PlayableItem>, CatalogError> {
  debug!(url = %source.api_url(), "fetching catalog listing");

  let mut request = client
    .get(source.api_url.clone())
    // GitHub rejects requests without a User-Agent.
    .header(header::USER_AGENT, concat!("rvp/", env!("CARGO_PKG_VERSION")))
    .header(header::ACCEPT, "application/vnd.github+json");
  if let Some(ref token) = source.token {
    request = request.bearer_auth(token);
  }

  let response = request.send().await?;
  let status = response.status();
  if !status.is_success() {
    // The API error body is JSON with a "message" field; fall back to the
    // canonical reason when it isn't.
    let message = response
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
      .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    return Err(CatalogError::Status { status: status.as_u16(), message });
  }

  let body = response.text().await?;
  let entries: Vec<CatalogEntry> = serde_json::from_str(&body).map_err(|_| CatalogError::Malformed)?;
  let items = items_from_entries(&entries, source)?;
  info!(total = entries.len(), playable = items.len(), "catalog loaded");
  Ok(items)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn source() -> CatalogSource {
    CatalogSource::new("someone/videos", "main", "videos", None).unwrap()
  }

  fn entries(names: &[&str]) -> Vec<CatalogEntry> {
    names.iter().map(|n| CatalogEntry { name: n.to_string() }).collect()
  }

  // --- is_media_file ---

  #[test]
  fn media_file_allowlist() {
    assert!(is_media_file("clip.mp4"));
    assert!(is_media_file("clip.mkv"));
    assert!(is_media_file("clip.mp3"));
    assert!(!is_media_file("readme.md"));
    assert!(!is_media_file("cover.jpg"));
    assert!(!is_media_file("noextension"));
  }

  #[test]
  fn media_file_case_insensitive() {
    assert!(is_media_file("clip.MP4"));
    assert!(is_media_file("clip.Mov"));
  }

  // --- strip_media_extension ---

  #[test]
  fn strip_extension_basic() {
    assert_eq!(strip_media_extension("Lesson 01.mp4"), "Lesson 01");
    assert_eq!(strip_media_extension("clip.MKV"), "clip");
  }

  #[test]
  fn strip_extension_exactly_once() {
    // Only the final recognized extension goes; inner dots stay.
    assert_eq!(strip_media_extension("ep2.part1.mp4"), "ep2.part1");
    assert_eq!(strip_media_extension("archive.mp4.mp4"), "archive.mp4");
  }

  #[test]
  fn strip_extension_leaves_unrecognized() {
    assert_eq!(strip_media_extension("notes.txt"), "notes.txt");
    assert_eq!(strip_media_extension("plain"), "plain");
  }

  // --- item_url ---

  #[test]
  fn item_url_joins_and_escapes() {
    let url = source().item_url("my clip #1.mp4");
    assert_eq!(url, "https://raw.githubusercontent.com/someone/videos/main/videos/my%20clip%20%231.mp4");
  }

  #[test]
  fn item_url_plain_filename() {
    assert_eq!(source().item_url("a.mp4"), "https://raw.githubusercontent.com/someone/videos/main/videos/a.mp4");
  }

  #[test]
  fn source_without_subdirectory() {
    let source = CatalogSource::new("someone/videos", "main", "", None).unwrap();
    assert_eq!(source.api_url(), "https://api.github.com/repos/someone/videos/contents");
    assert_eq!(source.item_url("a.mp4"), "https://raw.githubusercontent.com/someone/videos/main/a.mp4");
  }

  // --- items_from_entries ---

  #[test]
  fn entries_filtered_and_mapped_in_order() {
    let items = items_from_entries(&entries(&["b.mp4", "readme.md", "a.MOV"]), &source()).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].display_name, "b");
    assert_eq!(items[1].display_name, "a");
    assert!(items[0].source_url.ends_with("/b.mp4"));
    assert!(items[1].thumb_url.ends_with("/a.jpg"));
  }

  #[test]
  fn entries_with_no_media_fail() {
    let result = items_from_entries(&entries(&["readme.md", "cover.png"]), &source());
    assert!(matches!(result, Err(CatalogError::NoMedia)));
  }

  #[test]
  fn empty_listing_fails() {
    assert!(matches!(items_from_entries(&[], &source()), Err(CatalogError::NoMedia)));
  }
}
