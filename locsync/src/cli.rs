//! # locsync CLI interface
//!
//! Command parsing and orchestration only. Every transfer, filter and
//! templating rule lives in `locsync-core`; this module wires a loaded
//! [`Config`] to the core services and prints the results.
//!
//! ## How To Use
//! - From a shell: `locsync --help`.
//! - From tests: build a [`Cli`] and call [`run`].
//!
//! Each invocation runs inside a `locsync` span carrying the session
//! `run_id`, so per-file events from concurrent workers can be correlated.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, info_span, Instrument};

use locsync_core::config::Config;
use locsync_core::download::{DownloadOptions, Downloader};
use locsync_core::files::FileService;
use locsync_core::local::Local;
use locsync_core::push::{PushOptions, Pusher};
use locsync_core::rest::RestClient;
use locsync_core::segments::{KeyAddRequest, SegmentService};
use locsync_core::session::Session;
use locsync_core::status::project_status;
use locsync_core::template::FilePathPattern;
use locsync_core::workspace::WorkspaceCache;

use crate::load_config::load_config;
use crate::render;

/// Synchronise local files with a remote localization workspace.
#[derive(Parser, Debug)]
#[clap(
    name = "locsync",
    version,
    about = "Push source files to, and pull translations from, a localization workspace"
)]
pub struct Cli {
    /// Path to the YAML config file. Defaults to `.locsync.yaml` in this or
    /// a parent directory, then `~/.locsync/config.yaml`.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[clap(long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Upload source files (arguments, or `push.sources` from the config)
    Push {
        /// Files, folders or glob patterns
        files: Vec<String>,
        /// Version label attached to every pushed file
        #[clap(long, default_value = "")]
        version: String,
        /// Push the first configured folder recursively, keeping relative paths
        #[clap(long)]
        file_path: bool,
    },
    /// Download translated or source files
    Pull {
        /// Include files that are not completed yet
        #[clap(long, short = 'c')]
        current: bool,
        /// Comma separated persona codes, e.g. `fr-fr,de-de`
        #[clap(long, short = 'a', value_delimiter = ',')]
        audience: Vec<String>,
        /// Download source files with updates applied
        #[clap(long, short = 's')]
        source: bool,
        /// Download source files as originally pushed
        #[clap(long, short = 'o')]
        original: bool,
        /// Keep files that already exist locally
        #[clap(long)]
        skip: bool,
        /// Rewrite the stored directory using this persona token
        #[clap(long)]
        file_path_pattern: Option<FilePathPattern>,
    },
    /// Delete a remote file
    Delete {
        file: String,
        #[clap(long, default_value = "")]
        version: String,
    },
    /// Show translation progress per audience
    Status,
    /// List remote files (first 50, sorted by name)
    Ls {
        /// Comma separated persona codes; defaults to the configured audiences
        #[clap(long, short = 'a', value_delimiter = ',')]
        audience: Vec<String>,
    },
    /// Show the content score of a remote file
    Score {
        file: String,
        #[clap(long, default_value = "")]
        version: String,
    },
    /// Add a key to a remote file
    AddKey {
        file: String,
        #[clap(long)]
        key: String,
        #[clap(long)]
        value: String,
        #[clap(long = "ref", default_value = "")]
        reference: String,
        #[clap(long, default_value = "")]
        version: String,
    },
    /// Update the source text of an existing key
    UpdateKey {
        file: String,
        #[clap(long)]
        key: String,
        #[clap(long)]
        value: String,
        #[clap(long = "ref", default_value = "")]
        reference: String,
        #[clap(long, default_value = "")]
        version: String,
    },
    /// Print the value stored under a key
    ValueKey {
        file: String,
        #[clap(long)]
        key: String,
        #[clap(long, default_value = "")]
        version: String,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Push { .. } => "push",
            Commands::Pull { .. } => "pull",
            Commands::Delete { .. } => "delete",
            Commands::Status => "status",
            Commands::Ls { .. } => "ls",
            Commands::Score { .. } => "score",
            Commands::AddKey { .. } => "add-key",
            Commands::UpdateKey { .. } => "update-key",
            Commands::ValueKey { .. } => "value-key",
        }
    }
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = Arc::new(load_config(cli.config.as_deref())?);
    let session = Arc::new(Session::new());
    let span = info_span!(
        "locsync",
        run_id = %session.run_id(),
        command = cli.command.name()
    );
    execute(cli.command, config, session).instrument(span).await
}

async fn execute(command: Commands, config: Arc<Config>, session: Arc<Session>) -> Result<()> {
    let client = Arc::new(RestClient::new(&config.workspace.access_token)?);
    let cache = WorkspaceCache::new(
        Arc::clone(&client),
        Local::from_user_home()?,
        config.api_base(),
        config.workspace.organization_id,
        config.workspace.workspace_id,
    );

    match command {
        Commands::Push {
            files,
            version,
            file_path,
        } => {
            let snapshot = cache.load_workspace().await?;
            let pusher = Pusher::new(client, Arc::clone(&config), Arc::clone(&session));
            let candidates = if !files.is_empty() {
                pusher.expand_arguments(&files, file_path)
            } else if file_path {
                pusher.path_aware_sources()?
            } else {
                pusher.configured_sources()?
            };
            let options = PushOptions {
                version,
                path_aware: file_path,
            };
            let report = pusher.push_files(&snapshot, candidates, &options).await?;
            println!("{}", render::summary("push", &report, &session));
        }
        Commands::Pull {
            current,
            audience,
            source,
            original,
            skip,
            file_path_pattern,
        } => {
            let options = DownloadOptions {
                current,
                audience,
                source,
                original,
                skip_existing: skip,
                file_path_pattern,
            };
            let downloader = Downloader::new(client, Arc::clone(&config), Arc::clone(&session));
            let report = downloader.download(&cache, &options).await?;
            println!("{}", render::summary("pull", &report, &session));
        }
        Commands::Delete { file, version } => {
            let snapshot = cache.load_workspace().await?;
            let files = FileService::new(client, Arc::clone(&config));
            if files.delete_file(&snapshot, &file, &version).await? {
                println!("deleted {file}");
            }
        }
        Commands::Status => {
            let snapshot = cache.load_workspace().await?;
            let files = FileService::new(client, Arc::clone(&config));
            let status = project_status(&files, &snapshot).await?;
            print!("{}", render::status_table(&status));
        }
        Commands::Ls { audience } => {
            let snapshot = cache.load_workspace().await?;
            let files = FileService::new(client, Arc::clone(&config));
            let audiences = if audience.is_empty() {
                config.audiences()
            } else {
                audience.into_iter().collect()
            };
            let listed = files.list_files(&snapshot, &audiences).await?;
            print!("{}", render::file_list_table(&listed));
        }
        Commands::Score { file, version } => {
            let snapshot = cache.load_workspace().await?;
            let files = FileService::new(client, Arc::clone(&config));
            if let Some(score) = files.file_score(&snapshot, &file, &version).await? {
                print!("{}", render::score_table(&score));
            }
        }
        Commands::AddKey {
            file,
            key,
            value,
            reference,
            version,
        } => {
            let snapshot = cache.load_workspace().await?;
            let segments = SegmentService::new(FileService::new(client, Arc::clone(&config)));
            let request = KeyAddRequest {
                key,
                source: value,
                reference,
            };
            segments.add_key(&snapshot, &file, &version, &request).await?;
        }
        Commands::UpdateKey {
            file,
            key,
            value,
            reference,
            version,
        } => {
            let snapshot = cache.load_workspace().await?;
            let segments = SegmentService::new(FileService::new(client, Arc::clone(&config)));
            let request = KeyAddRequest {
                key,
                source: value,
                reference,
            };
            segments.update_key(&snapshot, &file, &version, &request).await?;
        }
        Commands::ValueKey { file, key, version } => {
            let snapshot = cache.load_workspace().await?;
            let segments = SegmentService::new(FileService::new(client, Arc::clone(&config)));
            if let Some(value) = segments.value_key(&snapshot, &file, &version, &key).await? {
                print!("{}", render::key_value_table(&value));
            }
        }
    }

    info!(
        transferred = session.transferred(),
        skipped = session.skipped(),
        failed = session.failed(),
        "Command finished"
    );
    Ok(())
}
