use image::DynamicImage;
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};

use crate::display::DisplayMode;

/// Draws an already-resized thumbnail into the terminal buffer, either as
/// true-color half-block cells or as a grayscale ASCII ramp.
pub struct ThumbnailWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_RAMP: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for ThumbnailWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_half_blocks(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
    }
  }
}

/// Each cell shows two vertical pixels: the upper one as the foreground of
/// a `▀` glyph, the lower one as its background.
fn render_half_blocks(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let cols = rgb.width().min(area.width as u32);
  let rows = rgb.height().div_ceil(2).min(area.height as u32);
  let pad_x = ((area.width as u32).saturating_sub(cols) / 2) as u16;
  let pad_y = ((area.height as u32).saturating_sub(rows) / 2) as u16;

  for row in 0..rows {
    for col in 0..cols {
      let upper = rgb.get_pixel(col, row * 2);
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if row * 2 + 1 < rgb.height() {
        let lower = rgb.get_pixel(col, row * 2 + 1);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      let x = area.x.saturating_add(pad_x).saturating_add(col as u16);
      let y = area.y.saturating_add(pad_y).saturating_add(row as u16);
      buf.set_string(x, y, "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let gray = image.to_luma8();
  let cols = gray.width().min(area.width as u32);
  let rows = gray.height().min(area.height as u32);
  let pad_x = ((area.width as u32).saturating_sub(cols) / 2) as u16;
  let pad_y = ((area.height as u32).saturating_sub(rows) / 2) as u16;

  for row in 0..rows {
    for col in 0..cols {
      let luma = gray.get_pixel(col, row)[0] as usize;
      let idx = (luma * (ASCII_RAMP.len() - 1) + 127) / 255;
      let x = area.x.saturating_add(pad_x).saturating_add(col as u16);
      let y = area.y.saturating_add(pad_y).saturating_add(row as u16);
      buf.set_string(x, y, ASCII_RAMP[idx.min(ASCII_RAMP.len() - 1)], Style::default());
    }
  }
}
