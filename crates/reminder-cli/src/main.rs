//! `reminder-cli` - deadline reminder scheduler front end.
//!
//! `run` starts the scheduler and reads line commands from stdin; the other
//! subcommands edit the task file directly without scheduling anything.

mod commands;

use std::path::PathBuf;
use std::pin::Pin;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use reminder_core::domain::Task;
use reminder_core::impls::JsonFileTaskStore;
use reminder_core::ports::{SystemClock, TaskStore, UlidGenerator};
use reminder_core::{App, AppBuilder, ReminderConfig};

use crate::commands::Command;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "reminder-cli", about = "Deadline reminder scheduler", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the task file location.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Start the scheduler and read commands from stdin.
    Run,
    /// Print the stored tasks with their positions.
    List,
    /// Remove the task at a position.
    Remove { position: usize },
    /// Remove every task.
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // stdin reads park a blocking thread that never returns on its own
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref(), cli.store)?;

    match cli.command {
        CliCommand::Run => serve(config).await,
        CliCommand::List => {
            let store = open_store(&config).await?;
            print_tasks(&store.list().await?);
            Ok(())
        }
        CliCommand::Remove { position } => {
            let store = open_store(&config).await?;
            let task = store.remove_at(position).await?;
            println!("removed {} ({})", task.id, task.project);
            Ok(())
        }
        CliCommand::Clear => {
            let store = open_store(&config).await?;
            let removed = store.clear().await?;
            println!("cleared {} tasks", removed.len());
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>, store: Option<PathBuf>) -> Result<ReminderConfig> {
    let mut config = match path {
        Some(path) => ReminderConfig::load(path)?,
        None => ReminderConfig::default(),
    };
    if let Some(store) = store {
        config.store_path = store;
    }
    config.validate()?;
    Ok(config)
}

async fn open_store(config: &ReminderConfig) -> Result<JsonFileTaskStore> {
    let ids = UlidGenerator::new(SystemClock);
    JsonFileTaskStore::open(config.store_path.clone(), &ids)
        .await
        .context("failed to open task store")
}

async fn serve(config: ReminderConfig) -> Result<()> {
    let app = AppBuilder::new(config)
        .build()
        .await
        .context("failed to start reminder app")?;
    println!("{}", commands::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        let Some(line) = next_line(&mut lines, ctrl_c.as_mut()).await? else {
            break;
        };

        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("error: {err:#}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(err) = execute(&app, command).await {
            warn!(error = %err, "command failed");
            println!("error: {err:#}");
        }
    }

    app.shutdown().await;
    info!("reminder-cli shut down");
    Ok(())
}

/// Next stdin line, or `None` at end of input or once `interrupt` resolves.
async fn next_line<R, F, T>(lines: &mut Lines<R>, interrupt: Pin<&mut F>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = T>,
{
    tokio::select! {
        line = lines.next_line() => line.context("failed to read stdin"),
        _ = interrupt => {
            info!("interrupt received");
            Ok(None)
        }
    }
}

async fn execute(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Add(new_task) => {
            let added = app.service.add_task(new_task).await?;
            match added.job_id {
                Some(job_id) => println!(
                    "added {} at position {}; reminder {} fires at {}",
                    added.task.id,
                    added.position,
                    job_id,
                    added.trigger_at.to_rfc3339()
                ),
                None => println!(
                    "added {} at position {}; no reminder scheduled",
                    added.task.id, added.position
                ),
            }
        }
        Command::List => print_tasks(&app.service.list_tasks().await?),
        Command::Remove(position) => {
            let task = app.service.remove_at(position).await?;
            println!("removed {} ({})", task.id, task.project);
        }
        Command::RemoveId(id) => {
            let task = app.service.remove(id).await?;
            println!("removed {} ({})", task.id, task.project);
        }
        Command::Cancel(job_id) => {
            if app.service.cancel_job(job_id).await {
                println!("cancelled {job_id}");
            } else {
                println!("{job_id} is not pending");
            }
        }
        Command::Clear => {
            let removed = app.service.clear().await?;
            println!("cleared {removed} tasks");
        }
        Command::Status => {
            let status = app.scheduler.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for (position, task) in tasks.iter().enumerate() {
        println!(
            "{position}: {} {} {} email={} phone={} [{}]",
            task.user,
            task.project,
            task.deadline,
            task.email.as_deref().unwrap_or("-"),
            task.phone.as_deref().unwrap_or("-"),
            task.id,
        );
    }
}

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| anyhow::anyhow!("failed to init tracing: {err}"))?,
    }

    Ok(())
}
