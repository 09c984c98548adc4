//! upsync command-line entry point.
//!
//! Uploads the given files into one remote folder, printing one JSON line
//! per uploaded file on stdout. Ctrl-C aborts the whole batch.

mod config;

use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use tracing_subscriber::EnvFilter;
use upsync_transfer::{BatchProgress, UploadFile};
use upsync_uploader::{Session, UploadBatch, UploadOptions, UploadTask};

use crate::config::UpsyncConfig;

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
struct Args {
    files: Vec<PathBuf>,
    parent: i64,
    name: Option<String>,
    token: Option<String>,
    concurrency: Option<usize>,
    config: Option<PathBuf>,
}

fn cli() -> Command {
    Command::new("upsync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Upload files to a remote folder")
        .arg(
            Arg::new("parent")
                .short('p')
                .long("parent")
                .value_name("FOLDER_ID")
                .value_parser(value_parser!(i64))
                .default_value("0")
                .help("Destination folder id (0 is the root folder)"),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("NAME")
                .help("Remote name (only with a single file)"),
        )
        .arg(
            Arg::new("token")
                .short('t')
                .long("token")
                .value_name("TOKEN")
                .help("Token to use when the config file has none"),
        )
        .arg(
            Arg::new("concurrency")
                .short('j')
                .long("concurrency")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Maximum number of simultaneous uploads"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file"),
        )
        .arg(
            Arg::new("files")
                .required(true)
                .action(ArgAction::Append)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
}

impl Args {
    fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let files: Vec<PathBuf> = matches
            .get_many::<PathBuf>("files")
            .context("at least one file is required")?
            .cloned()
            .collect();
        let name = matches.get_one::<String>("name").cloned();
        if name.is_some() && files.len() > 1 {
            anyhow::bail!("--name can only be used with a single file");
        }

        Ok(Self {
            files,
            parent: matches.get_one::<i64>("parent").copied().unwrap_or(0),
            name,
            token: matches.get_one::<String>("token").cloned(),
            concurrency: matches.get_one::<usize>("concurrency").copied(),
            config: matches.get_one::<PathBuf>("config").cloned(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::from_matches(&cli().get_matches())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting upsync");

    // Load configuration.
    let config_path = args.config.clone().unwrap_or_else(config::config_path);
    let upsync_config = match UpsyncConfig::load_from(&config_path) {
        Ok(c) => {
            tracing::info!(path = %config_path.display(), host = %c.service_host, "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            UpsyncConfig::default()
        }
    };

    let session = Arc::new(Session::new(upsync_config.session_config())?);
    if let Some(token) = &args.token {
        session.tokens().set_session_token(token.as_str());
    }

    let mut batch = UploadBatch::new(Arc::clone(&session));
    if let Some(limit) = args
        .concurrency
        .or(upsync_config.concurrency)
        .and_then(NonZeroUsize::new)
    {
        batch = batch.with_concurrency_limit(limit);
    }

    let progress = BatchProgress::new();
    for path in &args.files {
        let file = UploadFile::open(path)
            .await
            .with_context(|| format!("cannot upload {}", path.display()))?;
        let options = UploadOptions {
            name: args.name.clone(),
        };
        batch.add(file, args.parent, options)?;
    }
    for task in batch.tasks() {
        progress.register(task.id().get(), task.file().size());
    }

    let cancel = batch.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, aborting uploads");
            cancel.cancel();
        }
    });

    let outcome = batch
        .start(|task: &UploadTask, pct: f64| {
            progress.update(task.id().get(), pct);
            tracing::debug!(task = %task.id(), file = %task.name(), percent = pct, "progress");
            render_progress(&progress);
        })
        .await;
    eprintln!();

    let results = outcome?;
    let mut stdout = std::io::stdout().lock();
    for result in &results {
        let line = serde_json::json!({
            "task": result.task_id.get(),
            "name": result.name,
            "kind": result.kind,
            "remote": result.remote,
        });
        writeln!(stdout, "{line}")?;
    }

    tracing::info!(files = results.len(), "all uploads finished");
    Ok(())
}

/// Redraws the single-line batch status on stderr.
fn render_progress(progress: &BatchProgress) {
    let speed = progress.bytes_per_second() / 1_048_576.0;
    let eta = progress
        .eta()
        .map(|d| format!("{}s", d.as_secs()))
        .unwrap_or_else(|| "--".into());
    eprint!(
        "\r{:>6.2}%  {:.2} MiB/s  eta {eta:<8}",
        progress.overall(),
        speed
    );
}
