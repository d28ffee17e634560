use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::catalog::PlayableItem;

// --- State machine ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
  Idle,
  Loading,
  Playing,
  Paused,
  Ended,
}

/// Everything that can move the controller between states. Produced by
/// `Player::poll` (backend events) and by user selections, consumed by one
/// dispatch function in the app.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
  /// A new item was handed to the backend.
  Loaded,
  /// Periodic playback status from the backend.
  Tick { position: f64, duration: f64, paused: bool },
  /// The media ran to its natural end.
  Finished,
  /// The backend could not decode or play the media.
  Failed(String),
  /// Playback was stopped deliberately.
  Stopped,
}

impl PlayerState {
  /// Pure transition function. Side effects (progress writes, auto-advance,
  /// error display) live in the app dispatch, not here.
  pub fn apply(self, event: &PlayerEvent) -> PlayerState {
    match event {
      PlayerEvent::Loaded => PlayerState::Loading,
      PlayerEvent::Tick { paused: true, .. } => PlayerState::Paused,
      PlayerEvent::Tick { paused: false, .. } => PlayerState::Playing,
      PlayerEvent::Finished => PlayerState::Ended,
      PlayerEvent::Failed(_) | PlayerEvent::Stopped => PlayerState::Idle,
    }
  }
}

// --- mpv IPC ---

/// One parsed line from mpv's JSON IPC event stream.
#[derive(Debug, Clone, PartialEq)]
enum MpvEvent {
  Position(f64),
  Duration(f64),
  Pause(bool),
  Mute(bool),
  Volume(f64),
  EndFile { error: bool },
}

/// Parse a single line of mpv IPC output. Lines that aren't relevant events
/// (command replies, other event types, deliberate stops) map to `None`.
fn parse_ipc_line(line: &str) -> Option<MpvEvent> {
  let value: serde_json::Value = serde_json::from_str(line).ok()?;
  match value.get("event").and_then(|e| e.as_str())? {
    "property-change" => {
      let name = value.get("name").and_then(|n| n.as_str())?;
      let data = value.get("data");
      match name {
        "time-pos" => Some(MpvEvent::Position(data?.as_f64()?)),
        "duration" => Some(MpvEvent::Duration(data?.as_f64()?)),
        "pause" => Some(MpvEvent::Pause(data?.as_bool()?)),
        "mute" => Some(MpvEvent::Mute(data?.as_bool()?)),
        "volume" => Some(MpvEvent::Volume(data?.as_f64()?)),
        _ => None,
      }
    }
    "end-file" => match value.get("reason").and_then(|r| r.as_str()) {
      Some("eof") => Some(MpvEvent::EndFile { error: false }),
      Some("error") => Some(MpvEvent::EndFile { error: true }),
      // "quit" and "stop" are deliberate; the stop path handles them.
      _ => None,
    },
    _ => None,
  }
}

/// Properties observed over IPC, with the subscription ids mpv echoes back.
const OBSERVED_PROPERTIES: [(u32, &str); 5] =
  [(1, "time-pos"), (2, "duration"), (3, "pause"), (4, "mute"), (5, "volume")];

/// Read mpv's IPC socket and forward parsed events. The socket appears a
/// moment after spawn, so connection is retried briefly.
async fn monitor_ipc(socket_path: String, tx: mpsc::Sender<MpvEvent>) {
  let mut stream = None;
  for _ in 0..50 {
    match UnixStream::connect(&socket_path).await {
      Ok(s) => {
        stream = Some(s);
        break;
      }
      Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
    }
  }
  let Some(stream) = stream else {
    warn!(socket = %socket_path, "could not connect to mpv IPC socket");
    return;
  };

  let (read_half, mut write_half) = stream.into_split();
  for (id, prop) in OBSERVED_PROPERTIES {
    let cmd = format!("{{\"command\":[\"observe_property\",{},\"{}\"]}}\n", id, prop);
    if write_half.write_all(cmd.as_bytes()).await.is_err() {
      return;
    }
  }

  let reader = TokioBufReader::new(read_half);
  let mut lines = reader.lines();
  while let Ok(Some(line)) = lines.next_line().await {
    if let Some(event) = parse_ipc_line(&line)
      && tx.send(event).await.is_err()
    {
      break;
    }
  }
}

// --- Player ---

/// Owns the mpv child process and mirrors its playback status. The single
/// source of truth for what is currently loaded.
pub struct Player {
  pub state: PlayerState,
  pub current: Option<PlayableItem>,
  pub position: f64,
  pub duration: f64,
  pub paused: bool,
  pub muted: bool,
  pub volume: i64,
  current_process: Option<TokioChild>,
  monitor_handle: Option<JoinHandle<()>>,
  event_rx: Option<mpsc::Receiver<MpvEvent>>,
  ipc_socket_path: Option<String>,
}

impl Player {
  pub fn new(volume: i64) -> Self {
    Self {
      state: PlayerState::Idle,
      current: None,
      position: 0.0,
      duration: 0.0,
      paused: false,
      muted: false,
      volume: volume.clamp(0, 100),
      current_process: None,
      monitor_handle: None,
      event_rx: None,
      ipc_socket_path: None,
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn active_url(&self) -> Option<&str> {
    self.current.as_ref().map(|item| item.source_url.as_str())
  }

  /// Load an item into a fresh mpv instance, restoring `start_position`.
  /// Interrupts whatever was playing; the caller dispatches `Loaded` on
  /// success and `Failed` on error.
  pub async fn load(&mut self, item: PlayableItem, start_position: f64) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;

    let socket_path = std::env::temp_dir().join(format!("rvp-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    info!(item = %item.display_name, start = start_position, "loading item");

    let mut cmd = Command::new("mpv");
    cmd.args([
      "--really-quiet",
      "--force-window",
      &format!("--start={:.3}", start_position.max(0.0)),
      &format!("--volume={}", self.volume),
      &format!("--mute={}", if self.muted { "yes" } else { "no" }),
      &format!("--input-ipc-server={}", socket_path_str),
      &item.source_url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let (tx, rx) = mpsc::channel::<MpvEvent>(64);
    self.event_rx = Some(rx);
    self.monitor_handle = Some(tokio::spawn(monitor_ipc(socket_path_str.clone(), tx)));

    self.current_process = Some(child);
    self.ipc_socket_path = Some(socket_path_str);
    self.current = Some(item);
    self.position = start_position.max(0.0);
    self.duration = 0.0;
    self.paused = false;
    Ok(())
  }

  /// Drain backend events into controller events for the app to dispatch.
  /// Called once per UI loop iteration.
  pub fn poll(&mut self) -> Vec<PlayerEvent> {
    let mut events = Vec::new();
    if !self.is_loaded() {
      return events;
    }

    let mut ended: Option<bool> = None;
    let mut saw_status = false;
    if let Some(rx) = &mut self.event_rx {
      while let Ok(event) = rx.try_recv() {
        match event {
          MpvEvent::Position(p) => {
            self.position = p;
            saw_status = true;
          }
          MpvEvent::Duration(d) => {
            self.duration = d;
            saw_status = true;
          }
          MpvEvent::Pause(p) => {
            self.paused = p;
            saw_status = true;
          }
          MpvEvent::Mute(m) => self.muted = m,
          MpvEvent::Volume(v) => self.volume = v.round() as i64,
          MpvEvent::EndFile { error } => ended = Some(error),
        }
      }
    }

    if saw_status && ended.is_none() {
      events.push(PlayerEvent::Tick { position: self.position, duration: self.duration, paused: self.paused });
    }

    match ended {
      Some(false) => {
        debug!("playback reached end of file");
        self.release();
        events.push(PlayerEvent::Finished);
      }
      Some(true) => {
        self.release();
        events.push(PlayerEvent::Failed("mpv could not play the file (corrupt or unsupported media)".to_string()));
      }
      None => {
        // mpv exits right after end-of-file; if the process died without an
        // end-file event reaching us, fall back on the exit status.
        if let Some(child) = &mut self.current_process
          && let Ok(Some(status)) = child.try_wait()
        {
          let failed = !status.success();
          self.release();
          if failed {
            events.push(PlayerEvent::Failed("mpv exited with an error".to_string()));
          } else {
            events.push(PlayerEvent::Finished);
          }
        }
      }
    }

    events
  }

  /// Drop handles to an mpv process that has already exited.
  /// Keeps `current` so the UI can still show what just ended.
  fn release(&mut self) {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
    }
    self.event_rx = None;
    self.current_process = None;
    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
  }

  // --- Transport commands (one-shot IPC writes) ---

  async fn send_command(&self, json: &str) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream = UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.writable().await.context("mpv IPC socket not writable")?;
    let payload = format!("{}\n", json);
    let written = stream.try_write(payload.as_bytes()).context("Failed to send command to mpv")?;
    if written < payload.len() {
      return Err(anyhow!("Partial write to mpv IPC socket: wrote {} of {} bytes", written, payload.len()));
    }
    Ok(())
  }

  pub async fn toggle_pause(&mut self) -> Result<()> {
    self.send_command("{\"command\":[\"cycle\",\"pause\"]}").await?;
    self.paused = !self.paused;
    Ok(())
  }

  /// Seek by a signed number of seconds from the current position.
  pub async fn seek_relative(&self, secs: f64) -> Result<()> {
    self.send_command(&format!("{{\"command\":[\"seek\",{:.3},\"relative\"]}}", secs)).await
  }

  /// Proportional seek: 0–100 maps onto the full duration.
  pub async fn seek_percent(&self, percent: f64) -> Result<()> {
    let percent = percent.clamp(0.0, 100.0);
    self.send_command(&format!("{{\"command\":[\"seek\",{:.1},\"absolute-percent\"]}}", percent)).await
  }

  pub async fn adjust_volume(&mut self, delta: i64) -> Result<()> {
    let volume = (self.volume + delta).clamp(0, 100);
    self.send_command(&format!("{{\"command\":[\"set_property\",\"volume\",{}]}}", volume)).await?;
    self.volume = volume;
    Ok(())
  }

  pub async fn toggle_mute(&mut self) -> Result<()> {
    self.send_command("{\"command\":[\"cycle\",\"mute\"]}").await?;
    self.muted = !self.muted;
    Ok(())
  }

  /// Kill the backend and clear playback state. Deliberate stop, not an end.
  pub async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.event_rx = None;

    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }

    self.current = None;
    self.position = 0.0;
    self.duration = 0.0;
    self.paused = false;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- PlayerState::apply ---

  #[test]
  fn loaded_enters_loading_from_any_state() {
    for state in [PlayerState::Idle, PlayerState::Playing, PlayerState::Paused, PlayerState::Ended] {
      assert_eq!(state.apply(&PlayerEvent::Loaded), PlayerState::Loading);
    }
  }

  #[test]
  fn tick_reflects_pause_flag() {
    let tick = |paused| PlayerEvent::Tick { position: 1.0, duration: 10.0, paused };
    assert_eq!(PlayerState::Loading.apply(&tick(false)), PlayerState::Playing);
    assert_eq!(PlayerState::Playing.apply(&tick(true)), PlayerState::Paused);
    assert_eq!(PlayerState::Paused.apply(&tick(false)), PlayerState::Playing);
  }

  #[test]
  fn finished_enters_ended() {
    assert_eq!(PlayerState::Playing.apply(&PlayerEvent::Finished), PlayerState::Ended);
  }

  #[test]
  fn failure_and_stop_return_to_idle() {
    assert_eq!(PlayerState::Playing.apply(&PlayerEvent::Failed("x".into())), PlayerState::Idle);
    assert_eq!(PlayerState::Paused.apply(&PlayerEvent::Stopped), PlayerState::Idle);
  }

  // --- parse_ipc_line ---

  #[test]
  fn parses_property_changes() {
    assert_eq!(
      parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos","data":12.5}"#),
      Some(MpvEvent::Position(12.5))
    );
    assert_eq!(
      parse_ipc_line(r#"{"event":"property-change","id":3,"name":"pause","data":true}"#),
      Some(MpvEvent::Pause(true))
    );
    assert_eq!(
      parse_ipc_line(r#"{"event":"property-change","id":5,"name":"volume","data":80.0}"#),
      Some(MpvEvent::Volume(80.0))
    );
  }

  #[test]
  fn parses_end_file_reasons() {
    assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"eof"}"#), Some(MpvEvent::EndFile { error: false }));
    assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"error"}"#), Some(MpvEvent::EndFile { error: true }));
    // Deliberate stops are not end events.
    assert_eq!(parse_ipc_line(r#"{"event":"end-file","reason":"quit"}"#), None);
  }

  #[test]
  fn ignores_irrelevant_lines() {
    assert_eq!(parse_ipc_line(r#"{"request_id":1,"error":"success"}"#), None);
    assert_eq!(parse_ipc_line(r#"{"event":"file-loaded"}"#), None);
    assert_eq!(parse_ipc_line("not json"), None);
    // Null data arrives when a property becomes unavailable.
    assert_eq!(parse_ipc_line(r#"{"event":"property-change","id":1,"name":"time-pos","data":null}"#), None);
  }
}
