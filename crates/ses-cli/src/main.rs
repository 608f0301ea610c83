mod server;
mod session;
mod source;
mod speech;
mod upload;

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ses_core::{EngagementConfig, SessionInfo};
use ses_store::Store;

use crate::source::{FrameSource, JsonlSource, SyntheticSource};
use crate::speech::SpeechService;

#[derive(Parser)]
#[command(name = "ses", about = "Engagement monitoring session runner and collector")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a monitoring session against a frame source
    Run(RunArgs),

    /// Start the collector HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },

    /// List locally stored sessions
    Sessions,

    /// Export stored sessions to a CSV file
    Export {
        /// Output file path
        path: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// JSONL file of per-frame eye landmarks (one frame per line)
    #[arg(long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// Generate a synthetic EAR stream instead of reading frames
    #[arg(long)]
    synthetic: bool,

    /// Random seed for the synthetic stream
    #[arg(long)]
    seed: Option<u64>,

    /// Frame rate of the source, frames per second
    #[arg(long, default_value_t = 10.0)]
    fps: f64,

    /// Session duration in minutes
    #[arg(long, default_value_t = 10)]
    duration: u64,

    /// Student name
    #[arg(long)]
    name: String,

    /// Matric number
    #[arg(long)]
    matric_id: String,

    #[arg(long)]
    course: String,

    #[arg(long)]
    group: String,

    #[arg(long)]
    module: String,

    /// Detection parameters TOML file (defaults apply to omitted fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collector upload endpoint
    #[arg(
        long,
        default_value = "http://127.0.0.1:8000/api/v1/engagement/upload"
    )]
    endpoint: String,

    /// Skip the upload (the session is still stored locally)
    #[arg(long)]
    no_upload: bool,

    /// Disable spoken alerts
    #[arg(long)]
    no_speech: bool,

    /// Text-to-speech command invoked with each alert message
    #[arg(long, default_value = "espeak")]
    speech_command: String,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Serve { bind } => cmd_serve(*bind).await,
        Commands::Sessions => cmd_sessions(),
        Commands::Export { path } => cmd_export(path),
    }
}

fn open_store() -> Result<Store> {
    let path = ses_store::default_base_dir().join("sessions.db");
    Store::open(&path).context("failed to open session store")
}

fn backup_path() -> PathBuf {
    ses_store::default_base_dir().join("engagement_data.csv")
}

fn load_config(path: Option<&Path>) -> Result<EngagementConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("invalid config in {}", path.display()))
        }
        None => Ok(EngagementConfig::default()),
    }
}

async fn cmd_run(args: &RunArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    let mut source: Box<dyn FrameSource> = if args.synthetic {
        Box::new(SyntheticSource::new(args.fps, args.seed))
    } else if let Some(path) = &args.input {
        Box::new(JsonlSource::open(path)?)
    } else {
        anyhow::bail!("either --input or --synthetic is required");
    };

    let info = SessionInfo {
        name: args.name.clone(),
        matric_id: args.matric_id.clone(),
        course: args.course.clone(),
        group: args.group.clone(),
        module: args.module.clone(),
        duration_minutes: args.duration,
    };

    let speech = if args.no_speech {
        None
    } else {
        Some(SpeechService::spawn(args.speech_command.clone()))
    };

    let outcome = session::run_session(&config, args.fps, &info, source.as_mut(), speech.as_ref())?;

    if outcome.summary.total_frames == 0 {
        tracing::warn!("source ended before calibration finished; nothing to report");
        println!("No engagement data collected.");
        if let Some(speech) = speech {
            speech.shutdown().await;
        }
        return Ok(());
    }

    println!(
        "Session ended. Total disengaged: {:.1}s",
        outcome.summary.disengaged_seconds
    );
    println!(
        "Engagement: {:.1}% ({} frames at {:.1} fps, {} alerts)",
        outcome.summary.engaged_percentage,
        outcome.summary.total_frames,
        outcome.summary.fps,
        outcome.alerts_fired,
    );

    if args.no_upload {
        println!("Upload skipped.");
    } else if upload::post_summary(&args.endpoint, &outcome.summary, &backup_path()).await? {
        println!("Summary uploaded to {}", args.endpoint);
    } else {
        println!(
            "Upload failed; summary saved to {}",
            backup_path().display()
        );
    }

    let store = open_store()?;
    let id = store
        .insert_session(&outcome.summary)
        .context("failed to store session")?;
    println!("Session stored locally ({id})");

    if let Some(speech) = speech {
        speech.shutdown().await;
    }
    Ok(())
}

async fn cmd_serve(bind: SocketAddr) -> Result<()> {
    let store = open_store()?;
    let pidfile = write_pidfile();

    let result = server::serve(store, bind).await;

    if let Some(path) = pidfile {
        let _ = std::fs::remove_file(path);
    }
    result
}

fn cmd_sessions() -> Result<()> {
    let store = open_store()?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("no sessions recorded");
        return Ok(());
    }

    for s in &sessions {
        println!(
            "{}  {:<10} {:<8} {:>6.1}% engaged  {:>6} frames  {:.1}s disengaged",
            s.id,
            s.summary.matric_id,
            s.summary.course,
            s.summary.engaged_percentage,
            s.summary.total_frames,
            s.summary.disengaged_seconds,
        );
    }
    println!("{} sessions", sessions.len());
    Ok(())
}

fn cmd_export(path: &Path) -> Result<()> {
    let store = open_store()?;
    let count = store.export_csv(path).context("failed to export CSV")?;
    println!("exported {} sessions to {}", count, path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Advisory pidfile for the collector
// ---------------------------------------------------------------------------

/// Write our pid for observability. Warns if another collector appears to be
/// running; a stale file from a dead process is cleaned up.
fn write_pidfile() -> Option<PathBuf> {
    let path = ses_store::default_base_dir().join("ses-serve.pid");

    if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(pid) = content.trim().parse::<u32>()
    {
        if is_process_alive(pid) {
            tracing::warn!("another ses serve (PID {pid}) appears to be running");
        } else {
            let _ = std::fs::remove_file(&path);
        }
    }

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(mut f) => {
            let _ = write!(f, "{}", std::process::id());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("failed to write pidfile: {e}");
            None
        }
    }
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    // kill(pid, 0) checks existence without sending a signal
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    false
}
