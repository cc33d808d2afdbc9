//! Push: collect local files, filter them, upsert each through the transfer pool.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::contract::{PushRequest, RemoteClient, TransferTask, WorkspaceSnapshot};
use crate::error::SyncError;
use crate::filter::{Blacklist, FilterPipeline, MimeWhitelist, SourceValidation};
use crate::local::files_in_folder;
use crate::pool::{PoolReport, TaskOutcome, TransferPool};
use crate::session::Session;

const STATUS_UNAUTHORIZED: u16 = 401;
const STATUS_PAYLOAD_TOO_LARGE: u16 = 413;

#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Version label sent with every file; empty for none.
    pub version: String,
    /// Send the directory relative to the base folder and require the
    /// source locale in the path.
    pub path_aware: bool,
}

pub struct Pusher<C: RemoteClient> {
    client: Arc<C>,
    config: Arc<Config>,
    session: Arc<Session>,
}

impl<C: RemoteClient + 'static> Pusher<C> {
    pub fn new(client: Arc<C>, config: Arc<Config>, session: Arc<Session>) -> Self {
        Pusher {
            client,
            config,
            session,
        }
    }

    fn upsert_url(&self) -> String {
        format!(
            "{}/v3/files/organizations/{}/workspaces/{}/upsert",
            self.config.api_base(),
            self.config.workspace.organization_id,
            self.config.workspace.workspace_id
        )
    }

    /// Folder push paths are made relative to: the first configured push
    /// folder, else the working directory.
    fn base_folder(&self) -> PathBuf {
        match self.config.base_folder() {
            Some(folder) => folder.clone(),
            None => std::env::current_dir().unwrap_or_else(|e| {
                debug!(error = ?e, "error occurred on getting current dir");
                PathBuf::from(".")
            }),
        }
    }

    /// Files named by `push.sources`: the listed files plus every configured folder.
    ///
    /// Folders must be absolute.
    pub fn configured_sources(&self) -> Result<Vec<PathBuf>, SyncError> {
        let sources = &self.config.push.sources;
        info!(
            files = ?sources.files,
            folders = ?sources.folders,
            "no '--files' or '--file-path' params in command. 'push.sources' from config is used"
        );
        let mut collected = sources.files.clone();
        for folder in &sources.folders {
            if !folder.is_absolute() {
                error!(folder = %folder.display(), "Please provide an absolute path for config parameter `push.sources.folders`");
                return Err(SyncError::Config(format!(
                    "push.sources.folders entry {} is not absolute",
                    folder.display()
                )));
            }
            collected.extend(files_in_folder(&folder.to_string_lossy(), false));
        }
        Ok(collected)
    }

    /// Expands explicit arguments (files, folders or globs).
    pub fn expand_arguments(&self, arguments: &[String], recursive: bool) -> Vec<PathBuf> {
        arguments
            .iter()
            .flat_map(|arg| std::env::split_paths(arg).collect::<Vec<_>>())
            .flat_map(|path| files_in_folder(&path.to_string_lossy(), recursive))
            .collect()
    }

    /// Everything in the first configured push folder, recursively.
    pub fn path_aware_sources(&self) -> Result<Vec<PathBuf>, SyncError> {
        match self.config.base_folder() {
            Some(folder) => {
                info!("Files being recursively pushed from path provided in configuration at `push.sources.folders`");
                Ok(files_in_folder(&folder.to_string_lossy(), true))
            }
            None => {
                error!("--file-path variants uses push.sources.folders from config and push it on server");
                Err(SyncError::Config("push.sources.folders is empty".into()))
            }
        }
    }

    pub async fn push_folder(
        &self,
        snapshot: &WorkspaceSnapshot,
        folder: &str,
        recursive: bool,
        options: &PushOptions,
    ) -> Result<PoolReport, SyncError> {
        let files = files_in_folder(folder, recursive);
        self.push_files(snapshot, files, options).await
    }

    /// Filters `files` and upserts the survivors.
    ///
    /// Per-file problems are logged and counted; the call only fails on an
    /// invalid blacklist, a path-aware push combined with `download.target`,
    /// or an unauthorised response.
    pub async fn push_files(
        &self,
        snapshot: &WorkspaceSnapshot,
        files: Vec<PathBuf>,
        options: &PushOptions,
    ) -> Result<PoolReport, SyncError> {
        if options.path_aware && !self.config.download.target.is_empty() {
            error!("Please remove `download.target` from your configuration file; it is not supported with file paths.");
            return Err(SyncError::Config(
                "download.target cannot be combined with file paths".into(),
            ));
        }
        let blacklist = Blacklist::compile(self.config.blacklist.sources.as_slice())?;
        let base = self.base_folder();
        let source = options.path_aware.then(|| SourceValidation {
            base: base.clone(),
            source: snapshot.source_persona.clone(),
        });
        let pipeline = FilterPipeline::new(blacklist, MimeWhitelist::from_snapshot(snapshot), source);
        let candidates = files.len();
        let filtered = pipeline.filter(files, &self.session);
        debug!(candidates, accepted = filtered.len(), "Push candidates filtered");

        let tasks: Vec<TransferTask> = filtered
            .into_iter()
            .filter_map(|file_path| match fs::metadata(&file_path) {
                Ok(meta) => Some(TransferTask::Push {
                    file_path,
                    size: meta.len(),
                }),
                Err(e) => {
                    error!(error = ?e, file = %file_path.display(), "error occurred on file read");
                    None
                }
            })
            .collect();

        let job = Arc::new(PushJob {
            client: Arc::clone(&self.client),
            session: Arc::clone(&self.session),
            url: self.upsert_url(),
            base,
            options: options.clone(),
        });
        let pool = TransferPool::new(self.config.transfer.push_workers);
        let report = pool
            .run(tasks, move |task| {
                let job = Arc::clone(&job);
                async move { job.send(task).await }
            })
            .await;

        for outcome in &report.outcomes {
            if let TaskOutcome::Failed(_) = outcome {
                self.session.record_failed();
            }
        }
        if self.session.is_unauthorized() {
            return Err(SyncError::Unauthorized);
        }
        if self.session.skipped() > 0 {
            info!(
                "{} files were skipped as their extension did not match one of: {}",
                self.session.skipped(),
                snapshot
                    .content_type_extensions
                    .iter()
                    .map(|ext| format!("\"{ext}\""))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(report)
    }
}

/// State one push worker needs; shared by all of them.
struct PushJob<C: RemoteClient> {
    client: Arc<C>,
    session: Arc<Session>,
    url: String,
    base: PathBuf,
    options: PushOptions,
}

impl<C: RemoteClient> PushJob<C> {
    async fn send(&self, task: TransferTask) -> TaskOutcome {
        let direction = task.direction();
        let TransferTask::Push { file_path, size } = task else {
            return TaskOutcome::failed(format!("{direction:?} task handed to push worker"));
        };
        if self.session.is_unauthorized() {
            return TaskOutcome::Skipped;
        }
        let request = match build_push_request(&file_path, &self.base, &self.options) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, file = %file_path.display(), "can't handle file");
                return TaskOutcome::failed(e);
            }
        };
        let body = match serde_json::to_value(&request) {
            Ok(body) => body,
            Err(e) => return TaskOutcome::failed(e),
        };
        let response = match self.client.post_to_server(&self.url, body).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, file = %file_path.display(), "error occurred on post to server");
                return TaskOutcome::failed(e);
            }
        };
        match response.status {
            status if (200..300).contains(&status) => {
                if self.options.version.is_empty() {
                    info!("File {} was pushed to server.", file_path.display());
                } else {
                    info!(
                        "File {} (version '{}') was pushed to server.",
                        file_path.display(),
                        self.options.version
                    );
                }
                self.session.record_transferred();
                TaskOutcome::Transferred
            }
            STATUS_UNAUTHORIZED => {
                if !self.session.is_unauthorized() {
                    error!("{}", SyncError::Unauthorized);
                }
                self.session.mark_unauthorized();
                TaskOutcome::failed(SyncError::Unauthorized)
            }
            STATUS_PAYLOAD_TOO_LARGE => {
                error!(
                    "File {} ({} bytes) is too large for server. {}",
                    request.filename,
                    size,
                    response.body_text()
                );
                TaskOutcome::failed(format!("{} is too large", request.filename))
            }
            status => {
                warn!(
                    "File {} push status: {}. Response: {}",
                    file_path.display(),
                    status,
                    response.body_text()
                );
                TaskOutcome::failed(format!("push status {status}"))
            }
        }
    }
}

/// Directory sent as `filepath`: `/`-separated, `.` when there is none.
fn remote_directory(file_path: &Path, base: &Path, path_aware: bool) -> String {
    if !path_aware {
        return ".".to_string();
    }
    let relative = match file_path.strip_prefix(base) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => file_path,
    };
    match relative.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_string_lossy().replace('\\', "/"),
        _ => ".".to_string(),
    }
}

pub fn build_push_request(
    file_path: &Path,
    base: &Path,
    options: &PushOptions,
) -> Result<PushRequest, SyncError> {
    let content = fs::read(file_path)?;
    let filename = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(PushRequest {
        filename,
        version: options.version.clone(),
        content: String::from_utf8_lossy(&content).into_owned(),
        filepath: remote_directory(file_path, base, options.path_aware),
    })
}
