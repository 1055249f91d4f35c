use anyhow::{Context, Result};
use chunkwave::audio::wav;
use chunkwave::cli::{Cli, Commands};
use chunkwave::config::{Config, TransformKind};
use chunkwave::daemon::run_daemon;
use chunkwave::ipc::client::{send_command, subscribe};
use chunkwave::ipc::protocol::{Command, Response, resolve_resolution};
use chunkwave::ipc::server::IpcServer;
use chunkwave::pipeline::orchestrator::{Pipeline, PipelineConfig};
use chunkwave::pipeline::sink::JsonLinesSink;
use chunkwave::pipeline::types::{TaskId, TaskStatus};
use chunkwave::{logging, transform};
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Process {
            file,
            resolution,
            transform,
            workers,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(kind) = transform {
                config.transform.kind = kind
                    .parse::<TransformKind>()
                    .map_err(anyhow::Error::msg)?;
            }
            if let Some(workers) = workers {
                config.pipeline.workers = workers;
            }
            config.validate()?;
            run_process(config, &file, resolution.as_deref()).await?;
        }
        Commands::Daemon { socket } => {
            let config = load_config(cli.config.as_deref())?;
            run_daemon(config, socket).await?;
        }
        Commands::Submit {
            file,
            resolution,
            follow,
            socket,
        } => {
            handle_submit(socket, &file, resolution, follow).await?;
        }
        Commands::Stop { task_id, socket } => {
            let task_id: TaskId = task_id
                .parse()
                .with_context(|| format!("Invalid task id '{}'", task_id))?;
            handle_ipc_command(socket, Command::Stop { task_id }).await?;
        }
        Commands::Status { socket } => {
            handle_ipc_command(socket, Command::Status).await?;
        }
        Commands::Follow { socket } => {
            handle_follow(socket).await?;
        }
        Commands::Shutdown { socket } => {
            handle_ipc_command(socket, Command::Shutdown).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "chunkwave", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/chunkwave/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides apply on top of all three.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Process one file in-process, printing ordered events to stdout.
async fn run_process(config: Config, file: &Path, resolution: Option<&str>) -> Result<()> {
    let audio = wav::decode_file(file)?;
    tracing::info!(
        file = %file.display(),
        duration_secs = audio.duration_secs(),
        sample_rate = audio.sample_rate,
        "Decoded input"
    );
    let pipeline = Pipeline::new(
        PipelineConfig::from(&config),
        transform::from_config(&config.transform),
    )?;
    let resolution = resolve_resolution(resolution, config.resolution.default);

    let filename = file.display().to_string();
    let handle = pipeline.submit(
        &audio.samples,
        resolution,
        &filename,
        Box::new(JsonLinesSink::stdout()),
    )?;
    let task_id = handle.task_id();

    let mut waiter = tokio::task::spawn_blocking(move || handle.wait());
    let outcome = tokio::select! {
        joined = &mut waiter => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(%task_id, "Interrupted, stopping task");
            if let Err(e) = pipeline.request_stop(task_id) {
                tracing::debug!("Task already finished: {}", e);
            }
            waiter.await??
        }
    };

    tracing::info!(
        status = ?outcome.status,
        emitted = outcome.emitted,
        chunks = outcome.chunk_count,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "Done"
    );
    pipeline.shutdown();

    if outcome.status == TaskStatus::Stopped {
        std::process::exit(130);
    }
    Ok(())
}

fn socket_path(socket: Option<PathBuf>) -> PathBuf {
    socket.unwrap_or_else(IpcServer::default_socket_path)
}

/// Submit a file to the daemon, optionally following it to its terminal event.
async fn handle_submit(
    socket: Option<PathBuf>,
    file: &Path,
    resolution: Option<String>,
    follow: bool,
) -> Result<()> {
    let socket_path = socket_path(socket);
    // The daemon may run with a different working directory
    let path = std::fs::canonicalize(file)
        .with_context(|| format!("Cannot resolve {}", file.display()))?;

    // Subscribe first so no event of the new task is missed
    let mut events = if follow {
        Some(subscribe(&socket_path).await.map_err(daemon_unreachable)?)
    } else {
        None
    };

    let response = send_command(&socket_path, Command::Submit { path, resolution })
        .await
        .map_err(daemon_unreachable)?;

    let task_id = match response {
        Response::Submitted {
            task_id,
            chunks,
            workers,
        } => {
            eprintln!("Submitted {} ({} chunks, {} workers)", task_id, chunks, workers);
            if !follow {
                println!("{}", task_id);
            }
            task_id
        }
        Response::Error { message } => anyhow::bail!("Daemon error: {}", message),
        other => anyhow::bail!("Unexpected response: {:?}", other),
    };

    if let Some(events) = events.as_mut() {
        while let Some(event) = events.next().await? {
            if event.task_id() != task_id {
                continue;
            }
            println!("{}", event.to_json()?);
            if event.is_terminal() {
                break;
            }
        }
    }

    Ok(())
}

/// Send a single IPC command and print the response.
async fn handle_ipc_command(socket: Option<PathBuf>, command: Command) -> Result<()> {
    let response = send_command(&socket_path(socket), command)
        .await
        .map_err(daemon_unreachable)?;

    match response {
        Response::Ok => println!("OK"),
        Response::Submitted { task_id, .. } => println!("{}", task_id),
        Response::Status { tasks, workers } => {
            println!("Workers: {}", workers);
            if tasks.is_empty() {
                println!("No running tasks");
            }
            for task in tasks {
                println!(
                    "  {}  {:<24} {:>4} chunks  {:>8} ms{}",
                    task.task_id,
                    task.filename,
                    task.chunks,
                    task.elapsed_ms,
                    if task.cancelled { "  (stopping)" } else { "" }
                );
            }
        }
        Response::Following => println!("Following"),
        Response::Error { message } => anyhow::bail!("Daemon error: {}", message),
    }

    Ok(())
}

/// Print every daemon event as a JSON line until the daemon goes away.
async fn handle_follow(socket: Option<PathBuf>) -> Result<()> {
    let mut events = subscribe(&socket_path(socket))
        .await
        .map_err(daemon_unreachable)?;
    eprintln!("Following daemon events... (Ctrl+C to stop)");

    while let Some(event) = events.next().await? {
        println!("{}", event.to_json()?);
    }

    eprintln!("Daemon connection closed");
    Ok(())
}

fn daemon_unreachable(e: chunkwave::ChunkwaveError) -> anyhow::Error {
    anyhow::Error::new(e).context("Is the daemon running? Start it with: chunkwave daemon")
}
