use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use order_sync::{ContainerId, EditorSession, HttpRemote, MemoryRemote, RemoteStore, SyncConfig};
use ordering::{EditorState, OrderingProfile, ValidationGate, Verdict};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod script;
use script::Script;

#[derive(Parser)]
#[command(name = "order-editor")]
#[command(about = "Order editor CLI - Fetch, replay and validate orderable collections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Sync configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a container's items from the remote
    Fetch {
        /// Container identifier
        #[arg(short, long)]
        container: String,

        /// Write the sequence to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay a scripted edit session
    Replay {
        /// Script file path
        script: PathBuf,

        /// Run against the configured server instead of an in-memory remote
        #[arg(long)]
        http: bool,

        /// Override the script's container
        #[arg(short, long)]
        container: Option<String>,

        /// Write the final state to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check saved editor state against the pre-save rules
    Validate {
        /// Editor state file path
        state: PathBuf,

        /// Record type the state belongs to
        #[arg(long, value_enum, default_value = "lesson-units")]
        profile: ProfileKind,

        /// Minimum number of items
        #[arg(long)]
        min_items: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileKind {
    LessonUnits,
    ReorderQuestion,
}

impl ProfileKind {
    fn profile(self, min_items: Option<usize>) -> OrderingProfile {
        let profile = match self {
            ProfileKind::LessonUnits => OrderingProfile::lesson_units(),
            ProfileKind::ReorderQuestion => OrderingProfile::reorder_question(),
        };
        match min_items {
            Some(min) => profile.with_min_items(min),
            None => profile,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => SyncConfig::default(),
    };

    match cli.command {
        Commands::Fetch { container, output } => fetch_command(&config, container, output).await,
        Commands::Replay {
            script,
            http,
            container,
            output,
        } => replay_command(&config, script, http, container, output).await,
        Commands::Validate {
            state,
            profile,
            min_items,
        } => validate_command(state, profile.profile(min_items)),
    }
}

async fn fetch_command(config: &SyncConfig, container: String, output: Option<PathBuf>) -> Result<()> {
    let remote = HttpRemote::new(config)?;
    let container = ContainerId::from(container);
    info!("Fetching container {}", container);

    let sequence = remote
        .fetch_sequence(&container)
        .await
        .with_context(|| format!("Failed to fetch {}", container))?;

    info!("Fetched {} items", sequence.len());
    write_json(&sequence, output)
}

async fn replay_command(
    config: &SyncConfig,
    script_path: PathBuf,
    http: bool,
    container: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let json = std::fs::read_to_string(&script_path)
        .with_context(|| format!("Failed to read script {:?}", script_path))?;
    let mut script = Script::parse(&json).context("Invalid replay script")?;
    if let Some(container) = container {
        script.container = container;
    }

    let state = if http {
        if !script.items.is_empty() {
            warn!("Ignoring {} seed items, using the server's", script.items.len());
        }
        replay(Arc::new(HttpRemote::new(config)?), &script, config).await?
    } else {
        let remote = MemoryRemote::with_items(script.container.as_str(), script.items.clone());
        replay(Arc::new(remote), &script, config).await?
    };

    write_json(&state, output)
}

/// Applies every scripted command in order. Failed commands are logged and
/// skipped; the coordinator has already restored state when they return.
async fn replay<R: RemoteStore + 'static>(remote: Arc<R>, script: &Script, config: &SyncConfig) -> Result<EditorState> {
    let session = EditorSession::open(
        remote,
        ContainerId::from(script.container.as_str()),
        script.profile,
        config.clone(),
    )
    .await
    .with_context(|| format!("Failed to open {}", script.container))?;

    let mut failed = 0;
    for (index, command) in script.commands.iter().enumerate() {
        match session.apply(command.clone()).await {
            Ok(report) if report.stale => {
                warn!("#{} {}: accepted, refreshing local state", index, report.command);
                session.refresh().await.context("Refresh failed")?;
            }
            Ok(report) => info!(
                "#{} {}: {} (reconciled: {})",
                index, report.command, report.outcome, report.reconciled
            ),
            Err(e) => {
                failed += 1;
                warn!("#{} {} failed: {}", index, command.name(), e);
            }
        }
    }

    if script.save {
        let gate: ValidationGate<serde_json::Value> = script.gate();
        let report = session.save(&gate, &script.record).await.context("Save failed")?;
        info!("save: {}", report.outcome);
    }

    info!(
        "Replayed {} commands, {} failed",
        script.commands.len(),
        failed
    );
    Ok(session.state())
}

fn validate_command(state_path: PathBuf, profile: OrderingProfile) -> Result<()> {
    let json = std::fs::read_to_string(&state_path)
        .with_context(|| format!("Failed to read state {:?}", state_path))?;
    let state: EditorState = serde_json::from_str(&json).context("Invalid editor state")?;

    match ValidationGate::new(profile).check_state(&state) {
        Verdict::Valid => {
            println!("valid: {} items", state.sequence.len());
            Ok(())
        }
        Verdict::Invalid(violation) => {
            println!("{}", serde_json::to_string_pretty(&violation)?);
            bail!("invalid: {}", violation)
        }
    }
}

fn write_json<T: serde::Serialize>(value: &T, output: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
