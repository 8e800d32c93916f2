use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskdeck::api::ApiClient;
use taskdeck::{
    AccessToken, Authorizer as _, BearerAuth, ChannelState, ClientConfig, StoreChange, SyncPhase,
    Synchronizer, TaskDraft, TaskStatus, TaskStore,
};

#[derive(Parser)]
#[command(
    name = "taskdeck",
    about = "Taskdeck — live-syncing task board client",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config.toml
    #[arg(long, env = "TASKDECK_CONFIG")]
    config: Option<PathBuf>,

    /// Task API base URL
    #[arg(long, env = "TASKDECK_API_URL")]
    api_url: Option<String>,

    /// Live channel base URL (defaults to the API URL with a ws:// scheme)
    #[arg(long, env = "TASKDECK_WS_URL")]
    ws_url: Option<String>,

    /// Bearer token for API calls (obtain one with `taskdeck login`)
    #[arg(long, env = "TASKDECK_TOKEN")]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKDECK_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the current task board and exit.
    List,
    /// Create a task and print its server-assigned id.
    Create {
        #[arg(long)]
        title: String,
        /// Initial status (pending, in_progress, completed)
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    /// Run the live board: reprint the columns on every change until Ctrl-C.
    Watch,
    /// Exchange credentials for a bearer token and print it.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    let config = load_config(&args)?;
    let token = args.token.clone().map(AccessToken::new);

    match args.command {
        Command::List => list(&config, token).await,
        Command::Create {
            title,
            status,
            description,
            assignee,
        } => {
            let draft = TaskDraft {
                title,
                status,
                description,
                assigned_to: assignee,
                ..TaskDraft::default()
            };
            create(&config, token, draft).await
        }
        Command::Watch => watch(&config, token).await,
        Command::Login { username, password } => login(&config, &username, &password).await,
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::new(level.unwrap_or("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (when present) with CLI/env overrides layered on top.
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(url) = &args.ws_url {
        config.ws_base_url = Some(url.clone());
    }
    Ok(config)
}

async fn list(config: &ClientConfig, token: Option<AccessToken>) -> Result<()> {
    let api = ApiClient::new(config, token)?;
    let tasks = api.fetch_tasks().await.context("could not load tasks")?;

    let mut store = TaskStore::new();
    store.seed(tasks);
    print_columns(&store);
    Ok(())
}

async fn create(
    config: &ClientConfig,
    token: Option<AccessToken>,
    draft: TaskDraft,
) -> Result<()> {
    let api = ApiClient::new(config, token)?;
    let task = api.create_task(&draft).await.context("create failed")?;
    println!("created {} ({})", task.id, task.status);
    Ok(())
}

async fn login(config: &ClientConfig, username: &str, password: &str) -> Result<()> {
    let token = ApiClient::login(config, username, password)
        .await
        .context("login failed")?;
    println!("{}", token.as_str());
    Ok(())
}

async fn watch(config: &ClientConfig, token: Option<AccessToken>) -> Result<()> {
    let gate = BearerAuth::new(token);
    if !gate.is_authorized() {
        anyhow::bail!("not authorized — provide --token or run `taskdeck login` first");
    }

    let sync = Synchronizer::start(config, gate.into_token())?;
    wait_until_ready(&sync).await?;

    print_board(&sync).await;

    let mut changes = sync.subscribe();
    let mut connectivity = sync.connectivity();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(StoreChange::CreateApplied | StoreChange::EventApplied | StoreChange::Seeded) => {
                    print_board(&sync).await;
                }
                // Lagged just means we redraw once instead of N times.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                    print_board(&sync).await;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = connectivity.changed() => {
                let state = *connectivity.borrow();
                if state == ChannelState::Lost {
                    eprintln!("live updates lost — board stays usable; restart watch to reconnect");
                } else {
                    eprintln!("live channel: {state}");
                }
            }
        }
    }

    sync.shutdown();
    Ok(())
}

async fn wait_until_ready(sync: &Synchronizer) -> Result<()> {
    let mut phase = sync.phase();
    loop {
        let current = phase.borrow().clone();
        match current {
            SyncPhase::Ready => return Ok(()),
            SyncPhase::Failed(msg) => anyhow::bail!("could not load tasks: {msg}"),
            SyncPhase::Loading => {}
        }
        phase
            .changed()
            .await
            .context("synchronizer stopped before the snapshot finished")?;
    }
}

async fn print_board(sync: &Synchronizer) {
    let board = sync.board().await;
    println!();
    for (status, tasks) in board {
        println!("── {status} ({})", tasks.len());
        for task in tasks {
            match &task.assigned_to {
                Some(who) => println!("  [{}] {} → {who}", task.id, task.title),
                None => println!("  [{}] {}", task.id, task.title),
            }
        }
    }
}

fn print_columns(store: &TaskStore) {
    for (status, tasks) in store.by_status() {
        println!("── {status} ({})", tasks.len());
        for task in tasks {
            println!("  [{}] {}", task.id, task.title);
        }
    }
}
