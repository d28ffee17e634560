//! Thumbnail capture: one concurrent task per playlist item, joined as a
//! batch. A capture never fails — every fallback path ends at a generated
//! placeholder, so a corrupt file or dead URL can't block list rendering.

use anyhow::{Context, Result, anyhow};
use futures::future::join_all;
use image::{DynamicImage, Rgb, RgbImage};
use reqwest::Client;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::catalog::PlayableItem;
use crate::constants::constants;

/// Capture thumbnails for every item concurrently and join the full batch.
/// Results come back in item order, one image per item.
pub async fn generate_all(client: &Client, items: &[PlayableItem]) -> Vec<DynamicImage> {
  let tasks = items.iter().map(|item| {
    let client = client.clone();
    let item = item.clone();
    async move { capture(&client, &item).await }
  });
  join_all(tasks).await
}

/// Capture one thumbnail. Resolves with the sidecar image, an extracted
/// frame, or the placeholder — in that order. The whole attempt runs under
/// a timeout so one hung decode can't delay the batch indefinitely.
pub async fn capture(client: &Client, item: &PlayableItem) -> DynamicImage {
  let budget = Duration::from_secs(constants().thumb_timeout_secs);
  match tokio::time::timeout(budget, try_capture(client, item)).await {
    Ok(Ok(image)) => image,
    Ok(Err(e)) => {
      debug!(item = %item.display_name, err = %e, "thumbnail capture failed, using placeholder");
      placeholder()
    }
    Err(_) => {
      warn!(item = %item.display_name, "thumbnail capture timed out, using placeholder");
      placeholder()
    }
  }
}

async fn try_capture(client: &Client, item: &PlayableItem) -> Result<DynamicImage> {
  match fetch_sidecar(client, &item.thumb_url).await {
    Ok(image) => return Ok(image),
    Err(e) => debug!(item = %item.display_name, err = %e, "no sidecar thumbnail, extracting frame"),
  }
  extract_frame(&item.source_url).await
}

/// Fetch the co-located `.jpg` guess and decode it.
async fn fetch_sidecar(client: &Client, url: &str) -> Result<DynamicImage> {
  let response = client.get(url).send().await.context("sidecar request failed")?;
  if !response.status().is_success() {
    return Err(anyhow!("sidecar returned {}", response.status()));
  }
  let bytes = response.bytes().await.context("failed to read sidecar bytes")?;
  image::load_from_memory(&bytes).context("failed to decode sidecar image")
}

/// Grab a single still frame from the media at the fixed capture offset,
/// scaled to the thumbnail size, via ffmpeg on stdout.
async fn extract_frame(url: &str) -> Result<DynamicImage> {
  let c = constants();
  let output = Command::new("ffmpeg")
    .args([
      "-v",
      "error",
      "-ss",
      &format!("{}", c.capture_offset_secs),
      "-i",
      url,
      "-frames:v",
      "1",
      "-vf",
      &format!("scale={}:{}", c.thumb_width, c.thumb_height),
      "-f",
      "image2pipe",
      "-c:v",
      "png",
      "-",
    ])
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .output()
    .await
    .map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("ffmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)")
      } else {
        anyhow!(e).context("Failed to execute ffmpeg frame extraction")
      }
    })?;

  if !output.status.success() || output.stdout.is_empty() {
    return Err(anyhow!("ffmpeg produced no frame for {}", url));
  }
  image::load_from_memory(&output.stdout).context("failed to decode extracted frame")
}

/// Flat fallback image at the configured thumbnail size.
pub fn placeholder() -> DynamicImage {
  let c = constants();
  DynamicImage::ImageRgb8(RgbImage::from_pixel(c.thumb_width, c.thumb_height, Rgb([58, 60, 78])))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn placeholder_matches_configured_size() {
    let image = placeholder();
    assert_eq!(image.width(), constants().thumb_width);
    assert_eq!(image.height(), constants().thumb_height);
  }
}
