use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tracing::{error, info, warn};

use vcbot::config::{self, Config, DEFAULT_SILENCE_URL};
use vcbot::diagnostics::{DiagnosticReport, INSPECTED_DIRS};
use vcbot::owner_alerts::OwnerAlertLayer;
use vcbot::server::{self, ServerState};
use vcbot::silence::SilenceMaker;
use vcbot::toolchain::{Bootstrap, BootstrapOptions, BootstrapOutcome, ProcessEnv, Tool};

#[derive(Parser)]
#[command(name = "vcbot", version, about = "Media toolchain bootstrap and health server for the voice-chat bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print `export` lines for PATH, FFMPEG_PATH and FFPROBE_PATH
    Env,
    /// Bootstrap the toolchain, then run a command with the exported environment
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<OsString>,
    },
    /// Report what ffmpeg/ffprobe installation is visible
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make sure silence.mp3 exists
    Silence {
        /// Directory to create silence.mp3 in
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Skip the download fallback
        #[arg(long)]
        no_download: bool,
    },
    /// Validate the bot configuration
    Config,
    /// Validate config, bootstrap the toolchain and serve the health endpoint
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    config::load_dotenv_files();
    let env = ProcessEnv::capture();

    // Loaded up front so owner alerts can be part of the subscriber.
    let loaded = Config::from_env(&env);
    let alerts = match (&cli.command, &loaded) {
        (Commands::Serve, Ok(config)) if config.notify_owners => {
            Some(OwnerAlertLayer::new(Bot::new(&config.bot_token), &config.owner_ids))
        }
        _ => None,
    };
    // `env` runs as a boot hook and `exec` wraps another process; neither
    // should leave a log directory behind.
    let log_dir = match cli.command {
        Commands::Env | Commands::Exec { .. } => None,
        _ => Some(config::log_dir_from_env(&env)),
    };
    let _guard = vcbot::logging::init(log_dir.as_deref(), alerts);

    let result = match cli.command {
        Commands::Env => print_env(&env).await,
        Commands::Exec { command } => exec(&env, command).await,
        Commands::Check { json } => check(&env, json).await,
        Commands::Silence { dir, no_download } => silence(&env, dir, no_download).await,
        Commands::Config => loaded.map(report_config).context("configuration error"),
        Commands::Serve => match loaded {
            Ok(config) => serve(&env, config).await,
            Err(e) => Err(e).context("configuration error"),
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn bootstrap(env: &ProcessEnv) -> BootstrapOutcome {
    Bootstrap::new(BootstrapOptions::from_env(env)).run(env).await
}

async fn print_env(env: &ProcessEnv) -> Result<ExitCode> {
    let outcome = bootstrap(env).await;
    print!("{}", outcome.to_shell());
    Ok(ExitCode::SUCCESS)
}

async fn exec(env: &ProcessEnv, command: Vec<OsString>) -> Result<ExitCode> {
    let outcome = bootstrap(env).await;
    let (program, args) = command.split_first().context("no command given")?;

    let mut child = tokio::process::Command::new(program);
    child.args(args);
    outcome.apply_to_command(&mut child);

    info!("🚀 Starting {}", program.to_string_lossy());
    let status = child
        .status()
        .await
        .with_context(|| format!("failed to start {}", program.to_string_lossy()))?;

    Ok(ExitCode::from(child_exit_code(status)))
}

/// Exit code to forward for a finished child. A signal death maps to
/// `128 + signo` as shells report it.
fn child_exit_code(status: ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return u8::try_from(code).unwrap_or(1);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return u8::try_from(128 + signal).unwrap_or(1);
        }
    }
    1
}

async fn check(env: &ProcessEnv, json: bool) -> Result<ExitCode> {
    let outcome = bootstrap(env).await;
    let report = DiagnosticReport::collect(env, INSPECTED_DIRS, outcome);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn silence(env: &ProcessEnv, dir: PathBuf, no_download: bool) -> Result<ExitCode> {
    let outcome = bootstrap(env).await;
    let mut maker = SilenceMaker::new(&dir, outcome.path_of(Tool::Ffmpeg));
    if !no_download {
        let url = env.get_non_empty("SILENCE_URL").unwrap_or(DEFAULT_SILENCE_URL);
        maker = maker.with_download(url);
    }
    let report = maker.ensure().await?;
    info!("🎵 {} ready ({:?}, {} bytes)", report.path.display(), report.source, report.size);
    Ok(ExitCode::SUCCESS)
}

fn report_config(config: Config) -> ExitCode {
    for warning in &config.warnings {
        warn!("⚠️ {warning}");
    }
    info!("✅ Configuration loaded successfully");
    println!("{}", config.summary());
    ExitCode::SUCCESS
}

async fn serve(env: &ProcessEnv, config: Config) -> Result<ExitCode> {
    info!("🚀 Starting voice-chat bot services...");
    for warning in &config.warnings {
        warn!("⚠️ {warning}");
    }
    info!("📱 Max accounts: {}", config.max_accounts);
    info!("👑 Authorized owners: {}", config.owner_ids.len());
    info!("🎚️ Max volume: {}%", config.max_volume);

    let listener = server::bind(config.port)
        .await
        .with_context(|| format!("cannot bind health server on port {}", config.port))?;

    let outcome = bootstrap(env).await;
    if !outcome.all_found() {
        warn!("⚠️ Media toolchain incomplete, playback features will fail until it is installed");
    }
    let maker = SilenceMaker::new(".", outcome.path_of(Tool::Ffmpeg)).with_download(&config.silence_url);

    let state = Arc::new(ServerState::new(outcome));
    let server = tokio::spawn(server::serve(listener, Arc::clone(&state)));

    match maker.ensure().await {
        Ok(report) => state.set_silence(report),
        Err(e) => warn!("⚠️ {e}"),
    }

    server
        .await
        .context("health server task panicked")?
        .with_context(|| format!("health server on port {} failed", config.port))?;
    Ok(ExitCode::SUCCESS)
}
