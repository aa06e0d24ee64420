//! ffmpeg command lines for volume scaling and seeking.
//!
//! The voice-chat side re-encodes media before handing it to the call: a
//! volume change or resume-from-offset produces a fresh MP3 through the filter
//! chain below.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// UI volume range in percent.
pub const MIN_VOLUME: u16 = 10;
pub const MAX_VOLUME: u16 = 200;

/// Gain at 200%, about +21.5 dB. The limiter keeps it from clipping.
pub const MAX_BOOST: f64 = 12.0;

const AUDIO_BITRATE: &str = "256k";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("input file does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg error: {stderr}")]
    Ffmpeg { stderr: String },
}

/// Map a UI percentage to an ffmpeg `volume` multiplier.
///
/// 10..=100 attenuates linearly, 100..=200 ramps from 1.0 to `MAX_BOOST`.
pub fn volume_multiplier(percent: u16) -> f64 {
    let p = f64::from(percent.clamp(MIN_VOLUME, MAX_VOLUME));
    if p <= 100.0 {
        p / 100.0
    } else {
        1.0 + (p - 100.0) / f64::from(MAX_VOLUME - 100) * (MAX_BOOST - 1.0)
    }
}

/// A playback volume already limited by the configured ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume(u16);

impl Volume {
    /// Cap `percent` at `ceiling` (the `MAX_VOLUME` setting), never below
    /// `MIN_VOLUME`.
    pub fn new(percent: u16, ceiling: u16) -> Self {
        Self(percent.min(ceiling).max(MIN_VOLUME))
    }

    pub fn percent(self) -> u16 {
        self.0
    }

    pub fn multiplier(self) -> f64 {
        volume_multiplier(self.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self(100)
    }
}

/// Boost, compress, limit, then band-limit to the voice range.
pub fn filter_chain(multiplier: f64) -> String {
    format!(
        "volume={multiplier}:precision=fixed,\
         acompressor=threshold=-14dB:ratio=6:attack=5:release=50:makeup=1,\
         alimiter=limit=-1.0dB,\
         highpass=f=120,lowpass=f=14000"
    )
}

/// Container extensions whose video track is copied through untouched.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| matches!(ext.as_str(), "mp4" | "mkv" | "avi" | "mov"))
}

/// A single ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegJob {
    input: PathBuf,
    output: PathBuf,
    args: Vec<OsString>,
}

impl FfmpegJob {
    /// Re-encode `input` at `volume`. Video is copied when `keep_video`.
    pub fn adjust_volume(input: &Path, output: &Path, volume: Volume, keep_video: bool) -> Self {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];
        if keep_video {
            args.extend([OsString::from("-vcodec"), OsString::from("copy")]);
        }
        args.extend(audio_args(volume));
        args.push(output.into());
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            args,
        }
    }

    /// Re-encode `input` starting `offset_secs` in, as MP3.
    ///
    /// Used to resume after a pause. Audio-only playback drops the video track.
    pub fn seek(input: &Path, output: &Path, offset_secs: f64, volume: Volume, is_video: bool) -> Self {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-ss".into(),
            format!("{:.3}", offset_secs.max(0.0)).into(),
            "-i".into(),
            input.into(),
        ];
        if !is_video {
            args.push("-vn".into());
        }
        args.extend(audio_args(volume));
        args.extend([OsString::from("-f"), OsString::from("mp3")]);
        args.push(output.into());
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            args,
        }
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Run with the given ffmpeg (absolute path or bare name).
    pub async fn run(&self, ffmpeg: &str) -> Result<&Path, MediaError> {
        if !self.input.exists() {
            return Err(MediaError::MissingInput(self.input.clone()));
        }
        debug!("{ffmpeg} {:?}", self.args);

        let output = Command::new(ffmpeg)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: ffmpeg.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(MediaError::Ffmpeg {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("🎚️ Encoded {}", self.output.display());
        Ok(&self.output)
    }
}

fn audio_args(volume: Volume) -> Vec<OsString> {
    let chain = filter_chain(volume.multiplier());
    ["-af", chain.as_str(), "-acodec", "libmp3lame", "-b:a", AUDIO_BITRATE]
        .into_iter()
        .map(OsString::from)
        .collect()
}
