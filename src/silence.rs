//! Guarantees a short `silence.mp3` exists.
//!
//! Joining a voice chat needs a stream to publish before real media is
//! queued. The file is made with ffmpeg when possible, downloaded otherwise,
//! and as a last resort filled with silent MP3 frames.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

pub const SILENCE_FILE: &str = "silence.mp3";

/// Anything smaller is treated as a truncated write.
pub const MIN_VALID_SIZE: u64 = 50;

/// MPEG-1 Layer III frame header, 128 kbps, 44.1 kHz, no padding.
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];
const FRAME_LEN: usize = 64;
const FRAME_COUNT: usize = 100;

/// Upper bound for each of the ffmpeg and download strategies.
pub const STRATEGY_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceSource {
    Existing,
    Ffmpeg,
    Download,
    Placeholder,
}

#[derive(Debug, Clone, Serialize)]
pub struct SilenceReport {
    pub source: SilenceSource,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum SilenceError {
    #[error("could not create {}: every strategy failed", path.display())]
    Exhausted { path: PathBuf },
}

pub struct SilenceMaker {
    path: PathBuf,
    ffmpeg: String,
    download_url: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl SilenceMaker {
    /// `ffmpeg` is whatever the bootstrap exported: an absolute path or the
    /// bare name.
    pub fn new(dir: impl AsRef<Path>, ffmpeg: impl Into<String>) -> Self {
        Self {
            path: dir.as_ref().join(SILENCE_FILE),
            ffmpeg: ffmpeg.into(),
            download_url: None,
            timeout: STRATEGY_TIMEOUT,
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn with_download(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn ensure(&self) -> Result<SilenceReport, SilenceError> {
        match valid_size(&self.path).await {
            Some(size) => {
                info!("✅ {} already exists ({size} bytes)", self.path.display());
                return Ok(self.report(SilenceSource::Existing, size));
            }
            None if self.path.exists() => {
                warn!("⚠️ Existing {} looks invalid, recreating", self.path.display());
            }
            None => {}
        }

        match self.with_ffmpeg().await {
            Ok(()) => {
                if let Some(size) = valid_size(&self.path).await {
                    info!("✅ Created {} with ffmpeg", self.path.display());
                    return Ok(self.report(SilenceSource::Ffmpeg, size));
                }
                warn!("⚠️ ffmpeg produced an unusable silence file");
            }
            Err(e) => warn!("⚠️ ffmpeg silence failed: {e}"),
        }

        if let Some(url) = &self.download_url {
            match self.download(url).await {
                Ok(()) => {
                    if let Some(size) = valid_size(&self.path).await {
                        info!("✅ Downloaded {} from {url}", self.path.display());
                        return Ok(self.report(SilenceSource::Download, size));
                    }
                    warn!("⚠️ Downloaded silence file is too small");
                }
                Err(e) => warn!("⚠️ Silence download failed: {e}"),
            }
        }

        match tokio::fs::write(&self.path, placeholder_frames()).await {
            Ok(()) => {
                if let Some(size) = valid_size(&self.path).await {
                    info!("✅ Wrote placeholder {} ({size} bytes)", self.path.display());
                    return Ok(self.report(SilenceSource::Placeholder, size));
                }
            }
            Err(e) => warn!("⚠️ Could not write placeholder silence: {e}"),
        }

        Err(SilenceError::Exhausted {
            path: self.path.clone(),
        })
    }

    async fn with_ffmpeg(&self) -> Result<(), String> {
        let run = Command::new(&self.ffmpeg)
            .args(["-f", "lavfi", "-i", "anullsrc=r=48000:cl=stereo"])
            .args(["-t", "1", "-ar", "48000", "-ac", "2"])
            .args(["-acodec", "libmp3lame", "-q:a", "0", "-y"])
            .arg(&self.path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| format!("{} timed out after {:?}", self.ffmpeg, self.timeout))?
            .map_err(|e| format!("failed to run {}: {e}", self.ffmpeg))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("ffmpeg exited with {}: {}", output.status, last_line(&stderr)));
        }
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<(), String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("failed to read body: {e}"))?;

        tokio::fs::write(&self.path, &bytes)
            .await
            .map_err(|e| format!("failed to write {}: {e}", self.path.display()))
    }

    fn report(&self, source: SilenceSource, size: u64) -> SilenceReport {
        SilenceReport {
            source,
            path: self.path.clone(),
            size,
        }
    }
}

/// Size of `path` if it exists and is big enough to be real audio.
async fn valid_size(path: &Path) -> Option<u64> {
    let size = tokio::fs::metadata(path).await.ok()?.len();
    (size >= MIN_VALID_SIZE).then_some(size)
}

fn placeholder_frames() -> Vec<u8> {
    let mut frame = [0u8; FRAME_LEN];
    frame[..FRAME_HEADER.len()].copy_from_slice(&FRAME_HEADER);
    frame.repeat(FRAME_COUNT)
}

fn last_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}
