use clap::ValueEnum;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
}

/// How thumbnails are drawn into the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  /// True-color half-block cells.
  Direct,
  /// Grayscale ASCII ramp fallback.
  Ascii,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Direct => "half-block",
      DisplayMode::Ascii => "ascii",
    }
  }
}

/// Detect the best display mode the terminal supports:
/// true-color half-block when `COLORTERM` advertises it, ASCII otherwise.
pub fn detect_display_mode() -> DisplayMode {
  let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
  if colorterm == "truecolor" || colorterm == "24bit" {
    return DisplayMode::Direct;
  }
  DisplayMode::Ascii
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
  }
}
