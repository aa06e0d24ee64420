//! Toolchain diagnostic report, printed by `vcbot check`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::toolchain::{BootstrapOutcome, ProcessEnv, ToolStatus};

/// Directories listed in the report. Missing ones are skipped.
pub const INSPECTED_DIRS: &[&str] = &["/usr/bin", "/app/.apt/usr/bin"];

#[derive(Debug, Clone, Serialize)]
pub struct DirListing {
    pub dir: PathBuf,
    /// Entries whose name mentions ffmpeg or ffprobe, sorted.
    pub entries: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,
    pub platform: String,
    pub working_dir: Option<PathBuf>,
    pub original_path: Option<String>,
    pub listings: Vec<DirListing>,
    pub bootstrap: BootstrapOutcome,
}

impl DiagnosticReport {
    pub fn collect<S: AsRef<str>>(env: &ProcessEnv, dirs: &[S], bootstrap: BootstrapOutcome) -> Self {
        let listings = dirs
            .iter()
            .map(AsRef::<str>::as_ref)
            .map(Path::new)
            .filter(|d| d.is_dir())
            .map(list_media_tools)
            .collect();

        Self {
            generated_at: Utc::now(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            working_dir: std::env::current_dir().ok(),
            original_path: env.get("PATH").map(str::to_string),
            listings,
            bootstrap,
        }
    }
}

/// Read `dir` and keep entries related to ffmpeg. A read error is recorded,
/// not returned.
pub fn list_media_tools(dir: &Path) -> DirListing {
    let mut listing = DirListing {
        dir: dir.to_path_buf(),
        entries: Vec::new(),
        error: None,
    };

    match std::fs::read_dir(dir) {
        Ok(read) => {
            listing.entries = read
                .filter_map(Result::ok)
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| is_media_tool_name(name))
                .collect();
            listing.entries.sort();
        }
        Err(e) => listing.error = Some(e.to_string()),
    }
    listing
}

fn is_media_tool_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("ffmpeg") || lower.contains("ffprobe")
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🔍 Media toolchain check ({})", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Platform: {}", self.platform)?;
        match &self.working_dir {
            Some(dir) => writeln!(f, "Working directory: {}", dir.display())?,
            None => writeln!(f, "Working directory: unknown")?,
        }
        writeln!(f, "PATH: {}", self.original_path.as_deref().unwrap_or("Not set"))?;
        writeln!(f, "Search path: {}", self.bootstrap.search_path)?;

        for listing in &self.listings {
            writeln!(f)?;
            writeln!(f, "📂 {} (ffmpeg related):", listing.dir.display())?;
            if let Some(error) = &listing.error {
                writeln!(f, "  Error reading directory: {error}")?;
            } else if listing.entries.is_empty() {
                writeln!(f, "  No FFmpeg-related files found")?;
            } else {
                for entry in &listing.entries {
                    writeln!(f, "  - {entry}")?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "📋 Summary:")?;
        writeln!(f, "{}", "=".repeat(30))?;
        for report in &self.bootstrap.tools {
            match &report.status {
                ToolStatus::Found { path, .. } => writeln!(
                    f,
                    "✅ {} {}: {}",
                    report.tool,
                    report.version_number().unwrap_or("(version unknown)"),
                    path.display()
                )?,
                ToolStatus::Missing { reason } => writeln!(f, "❌ {}: {reason}", report.tool)?,
            }
            writeln!(f, "   {}={}", report.tool.env_var(), report.exported)?;
        }
        Ok(())
    }
}
