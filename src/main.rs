mod app;
mod catalog;
mod config;
mod constants;
mod display;
mod graphics;
mod input;
mod player;
mod progress;
mod theme;
mod thumbs;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use catalog::CatalogSource;
use constants::constants;
use display::CliDisplayMode;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// GitHub repository holding the media, as owner/name
  #[arg(short, long)]
  repo: Option<String>,

  /// Branch the raw-content URLs point at
  #[arg(short, long)]
  branch: Option<String>,

  /// Subdirectory within the repository to list
  #[arg(short, long)]
  path: Option<String>,

  /// GitHub API token for private repositories or higher rate limits
  #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Display mode: 'auto', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Skip thumbnail capture entirely
  #[arg(long)]
  no_thumbs: bool,
}

// --- Logging ---

/// Route tracing output to a file in the data directory; stdout belongs to
/// the terminal UI. Returns the guard that flushes buffered lines on drop.
fn init_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "rvp")?;
  std::fs::create_dir_all(dirs.data_dir()).ok()?;
  let appender = tracing_appender::rolling::never(dirs.data_dir(), "rvp.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rvp=info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();

  let c = constants();
  let source = CatalogSource::new(
    args.repo.as_deref().unwrap_or(&c.default_repo),
    args.branch.as_deref().unwrap_or(&c.default_branch),
    args.path.as_deref().unwrap_or(&c.default_path),
    args.token.clone(),
  )
  .context("Invalid catalog source")?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, args, source).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, args: Args, source: CatalogSource) -> Result<()> {
  let display_mode = display::resolve_display_mode(args.display_mode);
  info!(mode = display_mode.label(), "starting");

  let mut app = App::new(source, display_mode, !args.no_thumbs)?;
  app.trigger_catalog();

  loop {
    app.check_pending().await;
    app.tick().await;
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown().await?;
  Ok(())
}
