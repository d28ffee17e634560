use anyhow::{Context, Result};
use image::DynamicImage;
use ratatui::widgets::ListState;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::catalog::{self, CatalogError, CatalogSource, PlayableItem};
use crate::config::Config;
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::player::{Player, PlayerEvent};
use crate::progress::ProgressStore;
use crate::theme::{self, THEMES, Theme};
use crate::thumbs;

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Playlist,
  Filter,
}

/// In-flight async task receivers.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) catalog_rx: Option<oneshot::Receiver<Result<Vec<PlayableItem>, CatalogError>>>,
  pub(crate) thumbs_rx: Option<oneshot::Receiver<Vec<DynamicImage>>>,
}

/// Cache of the thumbnail resized for the current pane size.
#[derive(Default)]
pub struct GraphicsCache {
  pub resized_thumb: Option<(String, u16, u16, DynamicImage)>,
}

// --- Pure playlist helpers ---

/// Case-insensitive substring match against the display name.
pub fn matches_filter(item: &PlayableItem, filter: &str) -> bool {
  if filter.is_empty() {
    return true;
  }
  item.display_name.to_lowercase().contains(&filter.to_lowercase())
}

/// Indices of the rows visible under `filter`, in catalog order.
/// Non-matching rows are hidden, never removed.
pub fn filter_indices(items: &[PlayableItem], filter: &str) -> Vec<usize> {
  items.iter().enumerate().filter(|(_, item)| matches_filter(item, filter)).map(|(i, _)| i).collect()
}

/// The URL to mark active, if it names a known item. Unknown URLs resolve
/// to `None` so every row loses the marker rather than guessing.
pub fn resolve_active(items: &[PlayableItem], url: &str) -> Option<String> {
  items.iter().find(|item| item.source_url == url).map(|item| item.source_url.clone())
}

/// Index of the item after the active one, in catalog order.
/// `None` when there is no active item, it is unknown, or it is last.
pub fn next_index(items: &[PlayableItem], active_url: Option<&str>) -> Option<usize> {
  let url = active_url?;
  let idx = items.iter().position(|item| item.source_url == url)?;
  (idx + 1 < items.len()).then_some(idx + 1)
}

// --- App State ---

pub struct App {
  pub mode: AppMode,
  pub items: Vec<PlayableItem>,
  /// One image per item once the capture batch resolves; empty before that.
  pub thumbnails: Vec<DynamicImage>,
  pub list_state: ListState,
  /// Filter text for narrowing rows by display name.
  pub filter: String,
  pub filter_cursor: usize,
  pub filter_scroll: usize,
  /// Indices into `items` currently visible. All indices when filter is empty.
  pub filtered_indices: Vec<usize>,
  /// Source URL of the single active row, if any.
  pub active_url: Option<String>,
  pub player: Player,
  pub progress: ProgressStore,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub list_visible: bool,
  pub thumbs_enabled: bool,
  pub http_client: Client,
  pub source: CatalogSource,
  pub status_message: Option<String>,
  pub last_error: Option<String>,
  /// Catalog-load failure or empty-state text, rendered inside the list.
  pub catalog_message: Option<String>,
  pub should_quit: bool,
  pub gfx: GraphicsCache,
  pub(crate) tasks: AsyncTasks,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(source: CatalogSource, display_mode: DisplayMode, thumbs_enabled: bool) -> Result<Self> {
    let config = Config::load();
    let theme_index = config.theme_name.as_deref().map(theme::theme_index).unwrap_or(0);
    let volume = config.volume.unwrap_or(100).clamp(0, 100);

    let http_client = Client::builder()
      .timeout(Duration::from_secs(constants().request_timeout_secs))
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self {
      mode: AppMode::Playlist,
      items: Vec::new(),
      thumbnails: Vec::new(),
      list_state: ListState::default(),
      filter: String::new(),
      filter_cursor: 0,
      filter_scroll: 0,
      filtered_indices: Vec::new(),
      active_url: None,
      player: Player::new(volume),
      progress: ProgressStore::open(),
      theme_index,
      display_mode,
      list_visible: config.list_visible.unwrap_or(true),
      thumbs_enabled,
      http_client,
      source,
      status_message: None,
      last_error: None,
      catalog_message: None,
      should_quit: false,
      gfx: GraphicsCache::default(),
      tasks: AsyncTasks::default(),
      error_time: None,
    })
  }

  pub fn theme(&self) -> &'static Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  pub fn toggle_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  pub fn toggle_list(&mut self) {
    self.list_visible = !self.list_visible;
    self.save_config();
  }

  fn save_config(&self) {
    let config = Config {
      theme_name: Some(self.theme().name.to_string()),
      list_visible: Some(self.list_visible),
      volume: Some(self.player.volume),
    };
    config.save();
  }

  // --- Errors ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Filter ---

  /// Rebuild `filtered_indices` and clamp the selection into range.
  pub fn recompute_filter(&mut self) {
    self.filtered_indices = filter_indices(&self.items, &self.filter);
    if self.filtered_indices.is_empty() {
      self.list_state.select(None);
    } else {
      let sel = self.list_state.selected().unwrap_or(0);
      if sel >= self.filtered_indices.len() {
        self.list_state.select(Some(self.filtered_indices.len().saturating_sub(1)));
      }
    }
  }

  pub fn clear_filter(&mut self) {
    self.filter.clear();
    self.filter_cursor = 0;
    self.filter_scroll = 0;
    self.recompute_filter();
  }

  pub fn select_next(&mut self) {
    let count = self.filtered_indices.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| (i + 1) % count);
      self.list_state.select(Some(i));
    }
  }

  pub fn select_prev(&mut self) {
    let count = self.filtered_indices.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      self.list_state.select(Some(i));
    }
  }

  // --- Active row ---

  /// Exactly one row is active at a time; an unknown URL clears them all.
  pub fn set_active(&mut self, url: &str) {
    self.active_url = resolve_active(&self.items, url);
  }

  // --- Catalog loading ---

  pub fn trigger_catalog(&mut self) {
    self.status_message = Some("Loading catalog…".to_string());
    self.catalog_message = None;

    let client = self.http_client.clone();
    let source = self.source.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(catalog::fetch_catalog(&client, &source).await);
    });
    self.tasks.catalog_rx = Some(rx);
  }

  fn trigger_thumbs(&mut self) {
    if !self.thumbs_enabled || self.items.is_empty() {
      return;
    }
    let client = self.http_client.clone();
    let items = self.items.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(thumbs::generate_all(&client, &items).await);
    });
    self.tasks.thumbs_rx = Some(rx);
  }

  pub async fn check_pending(&mut self) {
    if let Some(mut rx) = self.tasks.catalog_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(items) => {
              info!(count = items.len(), "catalog ready");
              self.items = items;
              self.recompute_filter();
              self.list_state.select(Some(0));
              self.trigger_thumbs();
              // Auto-select the first item, like clicking the first row.
              self.play_item(0).await;
            }
            Err(e) => {
              warn!(err = %e, "catalog load failed");
              self.catalog_message = Some(match e {
                CatalogError::NoMedia => "No media found in the repository.".to_string(),
                other => format!("Could not load the video list: {}", other),
              });
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.catalog_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.catalog_message = Some("Catalog task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.thumbs_rx.take() {
      match rx.try_recv() {
        Ok(batch) => {
          self.thumbnails = batch;
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.thumbs_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          // Thumbnails are enrichment only; rows keep their numbers.
        }
      }
    }
  }

  /// Thumbnail for an item index, once the batch has resolved.
  pub fn thumbnail_for(&self, item_idx: usize) -> Option<&DynamicImage> {
    self.thumbnails.get(item_idx)
  }

  // --- Playback ---

  /// Load the item at `item_idx` (an index into `items`), restoring its
  /// saved position. Interrupts current playback without error.
  pub async fn play_item(&mut self, item_idx: usize) {
    let Some(item) = self.items.get(item_idx).cloned() else { return };
    let start = self.progress.position(&item.source_url);
    let url = item.source_url.clone();

    match self.player.load(item, start).await {
      Ok(()) => {
        self.set_active(&url);
        self.apply_player_event(PlayerEvent::Loaded);
      }
      Err(e) => {
        self.apply_player_event(PlayerEvent::Failed(format!("{:#}", e)));
      }
    }
  }

  /// Play the row currently selected in the (filtered) list.
  pub async fn play_selected(&mut self) {
    let Some(selected) = self.list_state.selected() else { return };
    let Some(&item_idx) = self.filtered_indices.get(selected) else { return };
    self.play_item(item_idx).await;
  }

  /// The one place player events turn into state transitions and their
  /// non-navigating side effects: progress writes, the completion latch,
  /// and error display. Auto-advance lives in `dispatch_player_event`.
  fn apply_player_event(&mut self, event: PlayerEvent) {
    self.player.state = self.player.state.apply(&event);
    match event {
      PlayerEvent::Loaded => {
        self.clear_error();
      }
      PlayerEvent::Tick { position, duration, .. } => {
        if let Some(url) = self.player.active_url().map(str::to_string) {
          self.progress.set_position(&url, position);
          // Watched latch: most of the way through counts as completed.
          if duration > 0.0
            && position / duration > constants().completed_threshold
            && !self.progress.is_completed(&url)
          {
            self.progress.mark_completed(&url);
            self.progress.flush();
          }
        }
      }
      PlayerEvent::Finished => {
        if let Some(url) = self.player.active_url().map(str::to_string) {
          self.progress.mark_completed(&url);
          self.progress.flush();
        }
      }
      PlayerEvent::Failed(msg) => {
        warn!(err = %msg, "playback failed");
        self.set_error(msg);
      }
      PlayerEvent::Stopped => {
        self.active_url = None;
      }
    }
  }

  /// Dispatch one player event, including auto-advance on natural end.
  pub async fn dispatch_player_event(&mut self, event: PlayerEvent) {
    let finished = matches!(event, PlayerEvent::Finished);
    self.apply_player_event(event);
    if finished {
      // Advance to the next item in catalog order; after the last item the
      // player stays in Ended. A failed item never advances.
      if let Some(next) = next_index(&self.items, self.active_url.as_deref()) {
        self.play_item(next).await;
      }
    }
  }

  /// Per-loop upkeep: drain backend events and keep the progress file fresh.
  pub async fn tick(&mut self) {
    for event in self.player.poll() {
      self.dispatch_player_event(event).await;
    }
    self.progress.flush_if_stale();
  }

  pub async fn stop_playback(&mut self) -> Result<()> {
    if self.player.is_loaded() {
      self.player.stop().await.context("Failed to stop playback")?;
      self.apply_player_event(PlayerEvent::Stopped);
      self.gfx.resized_thumb = None;
    }
    Ok(())
  }

  /// Final cleanup before the terminal is restored.
  pub async fn shutdown(&mut self) -> Result<()> {
    self.save_config();
    self.progress.flush();
    self.player.stop().await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(name: &str) -> PlayableItem {
    PlayableItem {
      display_name: name.to_string(),
      source_url: format!("https://raw.example.com/videos/{}.mp4", name),
      thumb_url: format!("https://raw.example.com/videos/{}.jpg", name),
    }
  }

  fn playlist(names: &[&str]) -> Vec<PlayableItem> {
    names.iter().map(|n| item(n)).collect()
  }

  // --- matches_filter / filter_indices ---

  #[test]
  fn empty_filter_matches_everything() {
    assert!(matches_filter(&item("Anything"), ""));
    assert_eq!(filter_indices(&playlist(&["a", "b", "c"]), ""), vec![0, 1, 2]);
  }

  #[test]
  fn filter_is_case_insensitive_substring() {
    let items = playlist(&["Course EP1", "course ep2", "Bonus EP2 extras", "Outro"]);
    assert_eq!(filter_indices(&items, "ep2"), vec![1, 2]);
    assert_eq!(filter_indices(&items, "EP2"), vec![1, 2]);
    assert_eq!(filter_indices(&items, "course"), vec![0, 1]);
  }

  #[test]
  fn clearing_filter_restores_all_rows() {
    let items = playlist(&["one", "two", "three"]);
    assert_eq!(filter_indices(&items, "two"), vec![1]);
    assert_eq!(filter_indices(&items, ""), vec![0, 1, 2]);
  }

  #[test]
  fn filter_with_no_matches_hides_all() {
    assert!(filter_indices(&playlist(&["a", "b"]), "zzz").is_empty());
  }

  // --- resolve_active ---

  #[test]
  fn active_marker_is_exclusive_to_known_urls() {
    let items = playlist(&["a", "b"]);
    let b_url = items[1].source_url.clone();
    assert_eq!(resolve_active(&items, &b_url), Some(b_url));
  }

  #[test]
  fn unknown_url_clears_active_marker() {
    let items = playlist(&["a", "b"]);
    assert_eq!(resolve_active(&items, "https://raw.example.com/videos/ghost.mp4"), None);
  }

  // --- next_index (auto-advance order) ---

  #[test]
  fn advance_from_middle_goes_to_next() {
    let items = playlist(&["a", "b", "c"]);
    let b_url = items[1].source_url.clone();
    assert_eq!(next_index(&items, Some(&b_url)), Some(2));
  }

  #[test]
  fn advance_from_last_stays_put() {
    let items = playlist(&["a", "b", "c"]);
    let c_url = items[2].source_url.clone();
    assert_eq!(next_index(&items, Some(&c_url)), None);
  }

  #[test]
  fn advance_without_active_item_does_nothing() {
    let items = playlist(&["a", "b"]);
    assert_eq!(next_index(&items, None), None);
    assert_eq!(next_index(&items, Some("https://raw.example.com/unknown.mp4")), None);
  }
}
