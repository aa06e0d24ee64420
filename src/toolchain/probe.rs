//! Executable resolution and version extraction.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// How long a `-version` call may take before the tool is considered broken.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

static VERSION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"version\s+(\S+)").expect("static regex"));

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{name}: not found on search path")]
    NotFound { name: String },

    #[error("{}: failed to run: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: -version timed out after {}s", path.display(), VERSION_TIMEOUT.as_secs())]
    Timeout { path: PathBuf },

    #[error("{}: -version exited with {status}", path.display())]
    Failed { path: PathBuf, status: ExitStatus },

    #[error("{}: -version printed nothing", path.display())]
    NoOutput { path: PathBuf },
}

/// Resolve `name` to an absolute executable path.
///
/// A bare name is searched in `search_path`. A name containing a path
/// separator is checked directly, relative names against `cwd`.
pub fn resolve(name: &str, search_path: &str, cwd: &Path) -> Result<PathBuf, ProbeError> {
    let found = which::which_in(name, Some(search_path), cwd).map_err(|e| {
        debug!("which({name}) failed: {e}");
        ProbeError::NotFound {
            name: name.to_string(),
        }
    })?;

    if found.is_absolute() {
        Ok(found)
    } else {
        Ok(cwd.join(found))
    }
}

/// Run `<path> -version` and return the first line it prints.
///
/// ffmpeg-family tools print the banner on stdout; stderr is used as a
/// fallback for wrappers that redirect it.
pub async fn version(path: &Path) -> Result<String, ProbeError> {
    let run = Command::new(path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(VERSION_TIMEOUT, run)
        .await
        .map_err(|_| ProbeError::Timeout {
            path: path.to_path_buf(),
        })?
        .map_err(|source| ProbeError::Spawn {
            path: path.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Failed {
            path: path.to_path_buf(),
            status: output.status,
        });
    }

    first_line(&output.stdout)
        .or_else(|| first_line(&output.stderr))
        .ok_or_else(|| ProbeError::NoOutput {
            path: path.to_path_buf(),
        })
}

/// Extract the bare version number from a banner line.
///
/// "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) ..." -> "6.1.1-3ubuntu5"
pub fn version_number(banner: &str) -> Option<&str> {
    VERSION_NUMBER
        .captures(banner)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_number_from_banner() {
        assert_eq!(
            version_number("ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023"),
            Some("6.1.1-3ubuntu5")
        );
        assert_eq!(
            version_number("ffprobe version n7.0 Copyright"),
            Some("n7.0")
        );
        assert_eq!(version_number("garbage"), None);
    }

    #[test]
    fn test_first_line_skips_blank_lines() {
        assert_eq!(first_line(b"\n\n  ffmpeg version 6\nmore"), Some("ffmpeg version 6".into()));
        assert_eq!(first_line(b"   \n"), None);
    }

    #[test]
    fn test_resolve_missing_name() {
        let dir = tempfile::tempdir().unwrap();
        let search = dir.path().to_str().unwrap();
        let err = resolve("definitely_not_a_real_tool_12345", search, dir.path()).unwrap_err();
        assert!(matches!(err, ProbeError::NotFound { .. }));
        assert!(err.to_string().contains("definitely_not_a_real_tool_12345"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_skips_non_executable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ffmpeg"), "not a program").unwrap();
        let search = dir.path().to_str().unwrap();
        assert!(resolve("ffmpeg", search, dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_version_of_missing_binary_is_spawn_error() {
        let err = version(Path::new("/nonexistent/bin/ffmpeg")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
    }
}
