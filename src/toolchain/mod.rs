//! Media toolchain bootstrap.
//!
//! Runs once before the bot process starts: widens the search path with the
//! directories buildpacks install into, resolves `ffmpeg` and `ffprobe`, and
//! publishes where they live as `FFMPEG_PATH` / `FFPROBE_PATH`. A missing tool
//! is logged and exported as its bare name; it never stops the boot.

pub mod env;
pub mod probe;
pub mod search_path;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

pub use env::ProcessEnv;

/// Directories the apt and ffmpeg buildpacks install binaries into.
pub const DEFAULT_INSTALL_DIRS: &[&str] = &[
    "/app/.apt/usr/bin",
    "/app/.heroku/vendor/bin",
    "/app/vendor/ffmpeg/bin",
];

/// Appended when missing so a stripped-down `PATH` still sees system packages.
pub const DEFAULT_FALLBACK_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin"];

/// Operator-supplied directories, searched before the defaults.
pub const EXTRA_PATH_VAR: &str = "VCBOT_EXTRA_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub const ALL: [Tool; 2] = [Tool::Ffmpeg, Tool::Ffprobe];

    /// Bare executable name, also the fallback value when resolution fails.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Tool::Ffmpeg => "FFMPEG_PATH",
            Tool::Ffprobe => "FFPROBE_PATH",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolStatus {
    Found {
        path: PathBuf,
        /// First line of `-version`, absent when the binary would not run.
        version: Option<String>,
    },
    Missing {
        reason: String,
    },
}

/// Outcome for a single tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub tool: Tool,
    /// Names tried, in order (operator override first).
    pub candidates: Vec<String>,
    pub status: ToolStatus,
    /// Value published in the tool's environment variable.
    pub exported: String,
}

impl ToolReport {
    pub fn is_found(&self) -> bool {
        matches!(self.status, ToolStatus::Found { .. })
    }

    pub fn version(&self) -> Option<&str> {
        match &self.status {
            ToolStatus::Found { version, .. } => version.as_deref(),
            ToolStatus::Missing { .. } => None,
        }
    }

    /// Bare release number from the banner, e.g. `6.1.1`.
    pub fn version_number(&self) -> Option<&str> {
        self.version().and_then(probe::version_number)
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Prepended to the search path, in order.
    pub install_dirs: Vec<String>,
    /// Appended to the search path when not already present.
    pub fallback_dirs: Vec<String>,
    /// Base for relative override paths.
    pub cwd: PathBuf,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            install_dirs: DEFAULT_INSTALL_DIRS.iter().map(|d| d.to_string()).collect(),
            fallback_dirs: DEFAULT_FALLBACK_DIRS.iter().map(|d| d.to_string()).collect(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
        }
    }
}

impl BootstrapOptions {
    /// Defaults plus any directories listed in `VCBOT_EXTRA_PATH`.
    pub fn from_env(env: &ProcessEnv) -> Self {
        let mut options = Self::default();
        if let Some(extra) = env.get_non_empty(EXTRA_PATH_VAR) {
            let mut dirs: Vec<String> = search_path::split(extra).map(str::to_string).collect();
            dirs.append(&mut options.install_dirs);
            options.install_dirs = dirs;
        }
        options
    }
}

#[derive(Debug, Clone)]
pub struct Bootstrap {
    options: BootstrapOptions,
}

impl Bootstrap {
    pub fn new(options: BootstrapOptions) -> Self {
        Self { options }
    }

    /// Probe both tools against `env` and compute what to export.
    ///
    /// Never fails: absence of a tool is part of the outcome.
    pub async fn run(&self, env: &ProcessEnv) -> BootstrapOutcome {
        let current = env.get("PATH").unwrap_or_default();
        let widened = search_path::prepend(current, &self.options.install_dirs);
        let search_path = search_path::append_missing(&widened, &self.options.fallback_dirs);

        let mut tools = Vec::with_capacity(Tool::ALL.len());
        for tool in Tool::ALL {
            tools.push(self.probe_tool(tool, env, &search_path).await);
        }

        BootstrapOutcome { search_path, tools }
    }

    async fn probe_tool(&self, tool: Tool, env: &ProcessEnv, search_path: &str) -> ToolReport {
        let mut candidates = Vec::new();
        if let Some(previous) = env.get_non_empty(tool.env_var())
            && previous != tool.name()
        {
            candidates.push(previous.to_string());
        }
        candidates.push(tool.name().to_string());

        let mut last_error = None;
        for candidate in &candidates {
            match probe::resolve(candidate, search_path, &self.options.cwd) {
                Ok(path) => {
                    let version = match probe::version(&path).await {
                        Ok(line) => {
                            info!("✅ {tool}: {line}");
                            Some(line)
                        }
                        Err(e) => {
                            warn!("⚠️ {tool} found at {} but did not report a version: {e}", path.display());
                            None
                        }
                    };
                    let exported = path.display().to_string();
                    return ToolReport {
                        tool,
                        candidates,
                        status: ToolStatus::Found { path, version },
                        exported,
                    };
                }
                Err(e) => {
                    if candidate != tool.name() {
                        warn!("⚠️ {} override {candidate:?} is unusable, trying {tool}", tool.env_var());
                    }
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| format!("{tool}: not found"));
        warn!("❌ {tool} not found, exporting {}={}", tool.env_var(), tool.name());
        ToolReport {
            tool,
            candidates,
            status: ToolStatus::Missing { reason },
            exported: tool.name().to_string(),
        }
    }
}

/// What a bootstrap run decided to publish.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapOutcome {
    pub search_path: String,
    pub tools: Vec<ToolReport>,
}

impl BootstrapOutcome {
    pub fn report(&self, tool: Tool) -> Option<&ToolReport> {
        self.tools.iter().find(|r| r.tool == tool)
    }

    /// Exported value for `tool`: an absolute path or the bare name.
    pub fn path_of(&self, tool: Tool) -> &str {
        self.report(tool).map_or(tool.name(), |r| r.exported.as_str())
    }

    pub fn all_found(&self) -> bool {
        self.tools.iter().all(ToolReport::is_found)
    }

    /// Variables to publish, `PATH` first.
    pub fn exports(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![("PATH", self.search_path.clone())];
        vars.extend(self.tools.iter().map(|r| (r.tool.env_var(), r.exported.clone())));
        vars
    }

    pub fn apply(&self, env: &mut ProcessEnv) {
        for (key, value) in self.exports() {
            env.set(key, value);
        }
    }

    /// POSIX `export` lines, suitable for `eval "$(vcbot env)"`.
    pub fn to_shell(&self) -> String {
        self.exports()
            .into_iter()
            .map(|(key, value)| format!("export {key}={}\n", shell_quote(&value)))
            .collect()
    }

    pub fn apply_to_command(&self, cmd: &mut tokio::process::Command) {
        cmd.envs(self.exports());
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
