use ratatui::style::Color;

/// Color palette for the whole UI. Two variants, dark first — dark is the
/// default when no preference has been saved.
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub muted: Color,
  pub accent: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub completed: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: [Theme; 2] = [
  Theme {
    name: "dark",
    bg: Color::Rgb(24, 24, 32),
    fg: Color::Rgb(205, 214, 244),
    muted: Color::Rgb(127, 132, 156),
    accent: Color::Rgb(137, 180, 250),
    border: Color::Rgb(69, 71, 90),
    highlight_fg: Color::Rgb(24, 24, 32),
    highlight_bg: Color::Rgb(137, 180, 250),
    stripe_bg: Color::Rgb(30, 30, 40),
    status: Color::Rgb(166, 227, 161),
    error: Color::Rgb(243, 139, 168),
    completed: Color::Rgb(166, 227, 161),
    key_fg: Color::Rgb(24, 24, 32),
    key_bg: Color::Rgb(127, 132, 156),
  },
  Theme {
    name: "light",
    bg: Color::Rgb(239, 241, 245),
    fg: Color::Rgb(46, 52, 64),
    muted: Color::Rgb(140, 143, 161),
    accent: Color::Rgb(30, 102, 245),
    border: Color::Rgb(188, 192, 204),
    highlight_fg: Color::Rgb(239, 241, 245),
    highlight_bg: Color::Rgb(30, 102, 245),
    stripe_bg: Color::Rgb(230, 233, 239),
    status: Color::Rgb(64, 160, 43),
    error: Color::Rgb(210, 15, 57),
    completed: Color::Rgb(64, 160, 43),
    key_fg: Color::Rgb(239, 241, 245),
    key_bg: Color::Rgb(140, 143, 161),
  },
];

/// Index into `THEMES` for a saved theme name; 0 (dark) for unknown names.
pub fn theme_index(name: &str) -> usize {
  THEMES.iter().position(|t| t.name == name).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dark_is_the_default() {
    assert_eq!(theme_index("dark"), 0);
    assert_eq!(theme_index("no-such-theme"), 0);
    assert_eq!(theme_index(""), 0);
  }

  #[test]
  fn light_resolves() {
    assert_eq!(THEMES[theme_index("light")].name, "light");
  }
}
