use anyhow::{Context, Result};
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::constants::constants;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
    app.stop_playback().await.context("Failed to stop playback")?;
    return Ok(());
  }

  match app.mode {
    AppMode::Playlist => handle_playlist_key(app, key).await.context("Failed to handle playlist key event")?,
    AppMode::Filter => handle_filter_key(app, key),
  }
  Ok(())
}

async fn handle_playlist_key(app: &mut App, key: event::KeyEvent) -> Result<()> {
  match key.code {
    KeyCode::Enter => {
      app.play_selected().await;
    }
    KeyCode::Char(' ') => {
      if app.player.is_loaded()
        && let Err(e) = app.player.toggle_pause().await
      {
        app.set_error(format!("Pause error: {}", e));
      }
    }
    KeyCode::Left => {
      if app.player.is_loaded()
        && let Err(e) = app.player.seek_relative(-constants().seek_step_secs).await
      {
        app.set_error(format!("Seek error: {}", e));
      }
    }
    KeyCode::Right => {
      if app.player.is_loaded()
        && let Err(e) = app.player.seek_relative(constants().seek_step_secs).await
      {
        app.set_error(format!("Seek error: {}", e));
      }
    }
    // Digit keys jump to that tenth of the media, like a seek bar click.
    KeyCode::Char(c @ '0'..='9') => {
      if app.player.is_loaded() {
        let percent = c.to_digit(10).unwrap_or(0) as f64 * 10.0;
        if let Err(e) = app.player.seek_percent(percent).await {
          app.set_error(format!("Seek error: {}", e));
        }
      }
    }
    KeyCode::Char('+') | KeyCode::Char('=') => {
      if let Err(e) = app.player.adjust_volume(constants().volume_step).await {
        app.set_error(format!("Volume error: {}", e));
      }
    }
    KeyCode::Char('-') => {
      if let Err(e) = app.player.adjust_volume(-constants().volume_step).await {
        app.set_error(format!("Volume error: {}", e));
      }
    }
    KeyCode::Char('m') => {
      if app.player.is_loaded()
        && let Err(e) = app.player.toggle_mute().await
      {
        app.set_error(format!("Mute error: {}", e));
      }
    }
    KeyCode::Char('/') => {
      app.mode = AppMode::Filter;
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.select_next();
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.select_prev();
    }
    KeyCode::Char('t') => {
      app.toggle_theme();
    }
    KeyCode::Char('l') => {
      app.toggle_list();
    }
    KeyCode::Char('r') => {
      app.trigger_catalog();
    }
    KeyCode::Esc => {
      if !app.filter.is_empty() {
        app.clear_filter();
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Char('q') => {
      app.should_quit = true;
    }
    _ => {}
  }
  Ok(())
}

fn handle_filter_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.filter, app.filter_cursor);
      app.filter.insert(byte_idx, c);
      app.filter_cursor += 1;
      app.recompute_filter();
    }
    KeyCode::Backspace => {
      if app.filter_cursor > 0 {
        app.filter_cursor -= 1;
        let byte_idx = char_to_byte_index(&app.filter, app.filter_cursor);
        app.filter.remove(byte_idx);
        app.recompute_filter();
      }
    }
    KeyCode::Delete => {
      if app.filter_cursor < app.filter.chars().count() {
        let byte_idx = char_to_byte_index(&app.filter, app.filter_cursor);
        app.filter.remove(byte_idx);
        app.recompute_filter();
      }
    }
    KeyCode::Left => {
      app.filter_cursor = app.filter_cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.filter_cursor < app.filter.chars().count() {
        app.filter_cursor += 1;
      }
    }
    KeyCode::Home => {
      app.filter_cursor = 0;
    }
    KeyCode::End => {
      app.filter_cursor = app.filter.chars().count();
    }
    // Navigate the narrowed rows while typing
    KeyCode::Down => {
      app.select_next();
    }
    KeyCode::Up => {
      app.select_prev();
    }
    KeyCode::Enter => {
      // Apply filter and return to the playlist
      app.mode = AppMode::Playlist;
    }
    KeyCode::Esc => {
      // Clear filter and return to the playlist
      app.clear_filter();
      app.mode = AppMode::Playlist;
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日"; // a=1 byte, é=2 bytes, 日=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0); // 'a'
    assert_eq!(char_to_byte_index(s, 1), 1); // 'é' starts at byte 1
    assert_eq!(char_to_byte_index(s, 2), 3); // '日' starts at byte 3
    assert_eq!(char_to_byte_index(s, 3), 6); // past end
  }

  #[test]
  fn char_to_byte_empty() {
    assert_eq!(char_to_byte_index("", 0), 0);
    assert_eq!(char_to_byte_index("", 5), 0);
  }
}
