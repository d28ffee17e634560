use image::imageops::FilterType;
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, Gauge, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, AppMode};
use crate::display::DisplayMode;
use crate::graphics::ThumbnailWidget;
use crate::player::PlayerState;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// Format a position in seconds as `m:ss` with zero-padded seconds.
/// Undefined (NaN, infinite) or negative inputs render as "0:00".
pub fn format_time(seconds: f64) -> String {
  if !seconds.is_finite() || seconds < 0.0 {
    return "0:00".to_string();
  }
  let total = seconds.floor() as u64;
  format!("{}:{:02}", total / 60, total % 60)
}

fn state_label(state: PlayerState) -> &'static str {
  match state {
    PlayerState::Idle => "Idle",
    PlayerState::Loading => "Loading…",
    PlayerState::Playing => "Playing",
    PlayerState::Paused => "Paused",
    PlayerState::Ended => "Ended",
  }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, filter_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);

  if app.list_visible {
    let [list_area, player_area] =
      Layout::horizontal([Constraint::Percentage(42), Constraint::Percentage(58)]).areas(main_area);
    render_playlist(frame, app, list_area);
    render_now_playing(frame, app, player_area);
  } else {
    render_now_playing(frame, app, main_area);
  }

  render_status(frame, app, status_area);
  render_filter_input(frame, app, filter_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ rvp ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_playlist(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  let block = Block::bordered()
    .title(format!(" Playlist — {} ", app.filtered_indices.len()))
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border));

  // Catalog failure or empty allowlist: a single message row, no items.
  if let Some(ref message) = app.catalog_message {
    let paragraph = Paragraph::new(Line::from(Span::styled(message.clone(), Style::default().fg(theme.error))))
      .alignment(Alignment::Center)
      .block(block);
    frame.render_widget(paragraph, area);
    return;
  }

  // Inner width: area minus 2 borders minus 2 chars for the highlight symbol
  let inner_w = area.width.saturating_sub(4) as usize;

  let rows: Vec<ListItem> = app
    .filtered_indices
    .iter()
    .enumerate()
    .map(|(visible_idx, &item_idx)| {
      let item = &app.items[item_idx];
      let is_active = app.active_url.as_deref() == Some(item.source_url.as_str());
      let is_completed = app.progress.is_completed(&item.source_url);

      let fg = if is_active { theme.accent } else { theme.fg };
      let bg = if visible_idx % 2 == 1 { theme.stripe_bg } else { theme.bg };

      let number = format!("{:>3} ", item_idx + 1);
      let badge = if is_completed { "✓ " } else { "  " };
      let marker = if is_active { "▶ " } else { "  " };
      let name_w = inner_w.saturating_sub(number.len() + badge.len() + marker.len());

      let mut style = Style::default().fg(fg);
      if is_active {
        style = style.add_modifier(Modifier::BOLD);
      }
      let line = Line::from(vec![
        Span::styled(number, Style::default().fg(theme.muted)),
        Span::styled(badge, Style::default().fg(theme.completed)),
        Span::styled(marker, Style::default().fg(theme.accent)),
        Span::styled(truncate_str(&item.display_name, name_w), style),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let list = List::new(rows)
    .block(block)
    .highlight_symbol("› ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_now_playing(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  let block = Block::bordered()
    .title(" Now Playing ")
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let Some(active_url) = app.active_url.clone() else {
    let text = vec![
      Line::from(""),
      Line::from(Span::styled("Nothing loaded", Style::default().fg(theme.muted))),
      Line::from(""),
      Line::from(Span::styled("Select a row and press Enter.", Style::default().fg(theme.muted))),
    ];
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), inner);
    return;
  };

  let [thumb_area, info_area] =
    Layout::vertical([Constraint::Min(4), Constraint::Length(5)]).areas(inner);

  render_thumbnail(frame, app, &active_url, thumb_area);

  let theme = app.theme();
  let active_name = app
    .items
    .iter()
    .find(|item| item.source_url == active_url)
    .map(|item| item.display_name.clone())
    .unwrap_or_default();

  let elapsed = format_time(app.player.position);
  let total = format_time(app.player.duration);
  let volume_label = if app.player.muted { "muted".to_string() } else { format!("{}%", app.player.volume) };

  let [title_area, time_area, gauge_area, volume_area, _] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Min(0),
  ])
  .areas(info_area);

  let title_line = Line::from(Span::styled(
    truncate_str(&active_name, info_area.width as usize),
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
  ));
  frame.render_widget(Paragraph::new(title_line), title_area);

  let time_line = Line::from(vec![
    Span::styled(state_label(app.player.state), Style::default().fg(theme.status)),
    Span::raw("   "),
    Span::styled(format!("{} / {}", elapsed, total), Style::default().fg(theme.fg)),
  ]);
  frame.render_widget(Paragraph::new(time_line), time_area);

  let ratio = if app.player.duration > 0.0 { (app.player.position / app.player.duration).clamp(0.0, 1.0) } else { 0.0 };
  let gauge = Gauge::default()
    .gauge_style(Style::default().fg(theme.accent).bg(theme.stripe_bg))
    .ratio(ratio)
    .label("");
  frame.render_widget(gauge, gauge_area);

  let volume_line = Line::from(vec![
    Span::styled("Volume  ", Style::default().fg(theme.muted)),
    Span::styled(volume_label, Style::default().fg(theme.fg)),
  ]);
  frame.render_widget(Paragraph::new(volume_line), volume_area);
}

/// Draw the active item's thumbnail, resizing it at most once per (item,
/// pane size) pair. Half-block cells pack two pixel rows per cell, so the
/// target pixel height doubles in direct mode.
fn render_thumbnail(frame: &mut Frame, app: &mut App, active_url: &str, area: Rect) {
  if area.is_empty() {
    return;
  }
  let Some(item_idx) = app.items.iter().position(|item| item.source_url == active_url) else { return };
  let Some(image) = app.thumbnail_for(item_idx) else { return };

  let needs_resize = match &app.gfx.resized_thumb {
    Some((url, w, h, _)) => url != active_url || *w != area.width || *h != area.height,
    None => true,
  };
  if needs_resize {
    let target_w = area.width as u32;
    let target_h = match app.display_mode {
      DisplayMode::Direct => (area.height as u32) * 2,
      DisplayMode::Ascii => area.height as u32,
    };
    let resized = image.resize(target_w.max(1), target_h.max(1), FilterType::Lanczos3);
    app.gfx.resized_thumb = Some((active_url.to_string(), area.width, area.height, resized));
  }

  if let Some((_, _, _, ref resized)) = app.gfx.resized_thumb {
    let widget = ThumbnailWidget { image: resized, display_mode: app.display_mode };
    frame.render_widget(widget, area);
  }
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_filter_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Filter { theme.accent } else { theme.border };
  let title = if app.filter.is_empty() { " Search " } else { " Search (Esc clears) " };
  let input_block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.filter, app.filter_cursor);

  if cursor_col < app.filter_scroll {
    app.filter_scroll = cursor_col;
  } else if cursor_col >= app.filter_scroll + inner_w {
    app.filter_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .filter
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.filter_scroll)
    .take_while(|(start, _, _)| *start < app.filter_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Filter {
    let cursor_x = area.x + 2 + (cursor_col - app.filter_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Playlist => {
      let mut k = vec![("Enter", "Play"), ("j/k", "Navigate"), ("/", "Search")];
      if app.player.is_loaded() {
        // The toggle label reflects the state the press would produce.
        k.push(("Space", if app.player.paused { "Resume" } else { "Pause" }));
        k.push(("←/→", "Seek"));
        k.push(("m", "Mute"));
      }
      k.push(("l", "List"));
      k.push(("t", "Theme"));
      k.push(("q", "Quit"));
      k
    }
    AppMode::Filter => vec![("Enter", "Apply"), ("Esc", "Clear"), ("↑/↓", "Navigate")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw(" "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- format_time ---

  #[test]
  fn format_time_zero() {
    assert_eq!(format_time(0.0), "0:00");
  }

  #[test]
  fn format_time_pads_seconds() {
    assert_eq!(format_time(65.0), "1:05");
    assert_eq!(format_time(9.0), "0:09");
  }

  #[test]
  fn format_time_undefined_and_negative() {
    assert_eq!(format_time(f64::NAN), "0:00");
    assert_eq!(format_time(f64::INFINITY), "0:00");
    assert_eq!(format_time(-5.0), "0:00");
  }

  #[test]
  fn format_time_just_under_an_hour() {
    assert_eq!(format_time(3599.0), "59:59");
    assert_eq!(format_time(3599.9), "59:59");
  }

  #[test]
  fn format_time_over_an_hour_keeps_minutes() {
    assert_eq!(format_time(3600.0), "60:00");
  }

  // --- truncate_str ---

  #[test]
  fn truncate_leaves_short_strings() {
    assert_eq!(truncate_str("abc", 10), "abc");
  }

  #[test]
  fn truncate_appends_ellipsis() {
    assert_eq!(truncate_str("abcdefgh", 5), "abcd…");
  }
}
