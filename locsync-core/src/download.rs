//! # download: pull translated (or source) files into the local tree
//!
//! One [`TransferTask::Download`] is assembled per remote file and target
//! persona, then handed to the [`TransferPool`]. Each task decides on its own
//! whether the file is eligible, computes its local path through the
//! templating engine, fetches the bytes and writes them.
//!
//! ## Modes
//! - default: translated file of each audience persona, completed files only.
//! - `current`: also files that are not completed yet.
//! - `source`: the source file with updates applied.
//! - `original`: the source file as originally pushed (suffix `original`
//!   when combined with `source`).
//!
//! In `source`/`original` mode only the first persona's file list is used,
//! since every persona lists the same source files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::contract::{FileMetadata, Persona, RemoteClient, TransferTask, WorkspaceSnapshot};
use crate::error::SyncError;
use crate::files::FileService;
use crate::local::{file_exists, write_file};
use crate::pool::{PoolReport, TaskOutcome, TransferPool};
use crate::session::Session;
use crate::template::{
    build_directory_file_path, build_variants, substitute, FilePathPattern, NamingMode,
    Substitution, ORIGINAL_SUFFIX,
};
use crate::workspace::WorkspaceCache;

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Include files that are not completed yet.
    pub current: bool,
    /// Persona codes to pull; empty means the configured audiences.
    pub audience: Vec<String>,
    pub source: bool,
    pub original: bool,
    /// Leave files that already exist locally untouched.
    pub skip_existing: bool,
    pub file_path_pattern: Option<FilePathPattern>,
}

/// Result of checking requested audiences against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceCheck {
    Valid,
    /// The audience is the source language.
    SourceLanguage(String),
    /// The audience is not a target persona of the workspace.
    Unknown { audience: String, available: Vec<String> },
}

pub fn check_audiences(snapshot: &WorkspaceSnapshot, audiences: &[String]) -> AudienceCheck {
    for audience in audiences {
        if snapshot.target_persona(audience).is_some() {
            continue;
        }
        if snapshot.source_persona.code == *audience {
            return AudienceCheck::SourceLanguage(audience.clone());
        }
        return AudienceCheck::Unknown {
            audience: audience.clone(),
            available: snapshot
                .target_personas
                .iter()
                .map(|p| format!("`{}`", p.code))
                .collect(),
        };
    }
    AudienceCheck::Valid
}

pub struct Downloader<C: RemoteClient> {
    files: FileService<C>,
    config: Arc<Config>,
    session: Arc<Session>,
}

impl<C: RemoteClient + 'static> Downloader<C> {
    pub fn new(client: Arc<C>, config: Arc<Config>, session: Arc<Session>) -> Self {
        Downloader {
            files: FileService::new(client, Arc::clone(&config)),
            config,
            session,
        }
    }

    /// Requested audiences: the explicit list, else the configured map values.
    pub fn audiences(&self, options: &DownloadOptions) -> BTreeSet<String> {
        if options.audience.is_empty() {
            self.config.audiences()
        } else {
            options.audience.iter().cloned().collect()
        }
    }

    /// Loads the workspace and makes sure every explicit audience exists.
    ///
    /// An unknown audience forces one refresh from the server since the
    /// cached snapshot may predate a newly added language.
    pub async fn resolve_workspace(
        &self,
        cache: &WorkspaceCache<C>,
        options: &DownloadOptions,
    ) -> Result<WorkspaceSnapshot, SyncError> {
        let snapshot = cache.load_workspace().await?;
        match check_audiences(&snapshot, &options.audience) {
            AudienceCheck::Valid => Ok(snapshot),
            AudienceCheck::SourceLanguage(code) => Err(source_audience_error(&code)),
            AudienceCheck::Unknown { audience, .. } => {
                debug!(audience = %audience, "Audience unknown in cached workspace, refreshing");
                let refreshed = cache.workspace_from_server().await?;
                match check_audiences(&refreshed, &options.audience) {
                    AudienceCheck::Valid => Ok(refreshed),
                    AudienceCheck::SourceLanguage(code) => Err(source_audience_error(&code)),
                    AudienceCheck::Unknown { audience, available } => {
                        error!(
                            "`{}` does not match one of available project target languages: {}",
                            audience,
                            available.join(", ")
                        );
                        Err(SyncError::NotFound(format!("target language `{audience}`")))
                    }
                }
            }
        }
    }

    fn check_naming(&self, options: &DownloadOptions) -> Result<(), SyncError> {
        if options.file_path_pattern.is_none()
            && self.config.download.target.is_empty()
            && !options.original
        {
            info!("Please update configuration and set the `download.target` field. For example `<language_code>-<filename>.<extension>`");
            return Err(SyncError::Config("download.target is not set".into()));
        }
        Ok(())
    }

    /// One task per file and persona in the audience.
    ///
    /// A persona whose file list cannot be fetched is skipped with a warning;
    /// an authorisation failure stops assembly.
    pub async fn assemble_tasks(
        &self,
        snapshot: &WorkspaceSnapshot,
        options: &DownloadOptions,
    ) -> Result<Vec<TransferTask>, SyncError> {
        let audiences = self.audiences(options);
        let mut tasks = Vec::new();
        for persona in &snapshot.target_personas {
            if !audiences.is_empty() && !audiences.contains(&persona.code) {
                continue;
            }
            let response = match self.files.workspace_files(persona.id, false).await {
                Ok(response) => response,
                Err(e) if e.is_auth_error() => {
                    error!("{}", SyncError::Unauthorized);
                    return Err(e);
                }
                Err(e) => {
                    warn!(persona = %persona.code, error = %e, "File list could not be fetched for persona");
                    continue;
                }
            };
            let substitution = substitute(persona, options.file_path_pattern);
            tasks.extend(response.files.into_iter().map(|file| TransferTask::Download {
                file,
                persona: persona.clone(),
                substitution: substitution.clone(),
            }));
            if options.original || options.source {
                break;
            }
        }
        debug!(tasks = tasks.len(), "Download tasks assembled");
        Ok(tasks)
    }

    /// Full pull: validate, assemble, transfer, report.
    pub async fn download(
        &self,
        cache: &WorkspaceCache<C>,
        options: &DownloadOptions,
    ) -> Result<PoolReport, SyncError> {
        let snapshot = self.resolve_workspace(cache, options).await?;
        self.check_naming(options)?;
        if options.current && options.original {
            info!("-c parameter has no effect when used with -o, proceeding with downloading the original version of file.");
        }
        let tasks = self.assemble_tasks(&snapshot, options).await?;

        let job = Arc::new(DownloadJob {
            files: self.files.clone(),
            session: Arc::clone(&self.session),
            options: options.clone(),
            target: self.config.download.target.clone(),
            base_folder: self.config.base_folder().cloned(),
            source_variants: build_variants(&snapshot.source_persona),
        });
        let pool = TransferPool::new(self.config.transfer.download_workers);
        let report = pool
            .run(tasks, move |task| {
                let job = Arc::clone(&job);
                async move { job.handle(task).await }
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
        if options.current {
            info!("downloaded {} files", report.transferred);
        } else {
            info!("downloaded {} completed files", report.transferred);
        }
        Ok(report)
    }
}

fn source_audience_error(code: &str) -> SyncError {
    error!(
        "`{}` is a source language. Please use the -o and -s parameters to download source files.",
        code
    );
    SyncError::Config(format!("`{code}` is a source language"))
}

/// What a single download writes and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fetch {
    url: String,
    path: PathBuf,
    language: Option<String>,
}

struct DownloadJob<C: RemoteClient> {
    files: FileService<C>,
    session: Arc<Session>,
    options: DownloadOptions,
    target: String,
    base_folder: Option<PathBuf>,
    source_variants: Vec<String>,
}

impl<C: RemoteClient> DownloadJob<C> {
    async fn handle(&self, task: TransferTask) -> TaskOutcome {
        let direction = task.direction();
        let TransferTask::Download {
            file,
            persona,
            substitution,
        } = task
        else {
            return TaskOutcome::failed(format!("{direction:?} task handed to download worker"));
        };
        if self.session.is_unauthorized() {
            return TaskOutcome::Skipped;
        }
        if !file.completed && !self.options.current && !self.options.original {
            info!(
                "file {} is not completed. Use flag '-c' or '--current' to download even not completed files",
                file.filename
            );
            self.session.record_skipped();
            return TaskOutcome::Skipped;
        }
        if file.error_id != 0 || !file.enabled {
            report_invalid_file(&file);
            self.session.record_skipped();
            return TaskOutcome::Skipped;
        }

        let fetches = self.plan(&file, &persona, &substitution);
        if fetches.is_empty() {
            self.session.record_skipped();
            return TaskOutcome::Skipped;
        }
        let mut outcome = TaskOutcome::Skipped;
        for fetch in fetches {
            match self.fetch(&file, fetch).await {
                TaskOutcome::Transferred => outcome = TaskOutcome::Transferred,
                TaskOutcome::Skipped => {}
                failed @ TaskOutcome::Failed(_) => return failed,
            }
        }
        outcome
    }

    fn target_mode(&self) -> NamingMode<'_> {
        match self.options.file_path_pattern {
            Some(_) => NamingMode::FilePath {
                source_variants: &self.source_variants,
            },
            None => NamingMode::Target {
                template: &self.target,
            },
        }
    }

    /// Fetches implied by the mode flags, in the order they run.
    fn plan(&self, file: &FileMetadata, persona: &Persona, substitution: &Substitution) -> Vec<Fetch> {
        let mut plan = Vec::new();
        let has_naming = self.options.file_path_pattern.is_some() || !self.target.is_empty();
        let keep_stored_dir = NamingMode::FilePath { source_variants: &[] };

        if self.options.source && has_naming {
            if !self.target.is_empty() && has_remote_directory(file) {
                info!(
                    "[SOURCE] file '{}' has file path. File path is not supported with config `download.target`. Skip.",
                    file.filepath
                );
            } else {
                plan.push(Fetch {
                    url: self.files.source_download_url(file.file_id, true),
                    path: build_directory_file_path(file, substitution, "", keep_stored_dir),
                    language: None,
                });
            }
        }
        if self.options.original {
            let suffix = if self.options.source { ORIGINAL_SUFFIX } else { "" };
            plan.push(Fetch {
                url: self.files.source_download_url(file.file_id, false),
                path: build_directory_file_path(file, substitution, suffix, keep_stored_dir),
                language: None,
            });
        }
        if !self.options.original && !self.options.source {
            if !self.target.is_empty() && has_remote_directory(file) {
                info!(
                    "[TARGET] file '{}' has file path. File path is not supported with config`download.target`. Skip.",
                    file.filepath
                );
            } else {
                plan.push(Fetch {
                    url: self.files.download_url(persona.id, file.file_id),
                    path: build_directory_file_path(file, substitution, "", self.target_mode()),
                    language: Some(persona.code.clone()),
                });
            }
        }
        plan
    }

    fn local_path(&self, relative: PathBuf) -> PathBuf {
        match &self.base_folder {
            Some(base) => base.join(relative),
            None => relative,
        }
    }

    async fn fetch(&self, file: &FileMetadata, fetch: Fetch) -> TaskOutcome {
        let path = self.local_path(fetch.path);
        if self.options.skip_existing && file_exists(&path) {
            debug!(file = %path.display(), "File exists locally, skipping");
            self.session.record_skipped();
            return TaskOutcome::Skipped;
        }
        if !self.session.reserve_path(&path) {
            warn!(
                file = %path.display(),
                remote = %file.filename,
                "Another file in this run already resolved to this path. Skip."
            );
            self.session.record_skipped();
            return TaskOutcome::Skipped;
        }
        let bytes = match self.files.client().get_from_server(&fetch.url).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_auth_error() => {
                if !self.session.is_unauthorized() {
                    error!("{}", SyncError::Unauthorized);
                }
                self.session.mark_unauthorized();
                return TaskOutcome::failed(e);
            }
            Err(e) if e.is_not_found() => {
                warn!(file = %file.filename, url = %fetch.url, "Remote file was not found. Skip.");
                self.session.record_skipped();
                return TaskOutcome::Skipped;
            }
            Err(e) => {
                error!(
                    "error occurred on file {} download (url = {})\n{}",
                    path.display(),
                    fetch.url,
                    e
                );
                return TaskOutcome::failed(e);
            }
        };
        if let Err(e) = write_file(&path, &bytes) {
            error!(error = %e, file = %path.display(), "error occurred on file write");
            return TaskOutcome::failed(e);
        }
        match fetch.language {
            Some(language) => info!("file {} was downloaded for language {}", path.display(), language),
            None => info!("file {} was downloaded", path.display()),
        }
        self.session.record_transferred();
        TaskOutcome::Transferred
    }
}

fn has_remote_directory(file: &FileMetadata) -> bool {
    match Path::new(&file.filepath).parent() {
        Some(dir) => !dir.as_os_str().is_empty() && dir != Path::new("."),
        None => false,
    }
}

fn report_invalid_file(file: &FileMetadata) {
    if file.error_id != 0 {
        if file.version.is_empty() {
            warn!("'{}' has error. Skip its download", file.filename);
        } else {
            warn!("'{}'(version '{}') has error. Skip its download", file.filename, file.version);
        }
    } else if file.version.is_empty() {
        warn!("File '{}' is disabled. Skip its download", file.filename);
    } else {
        warn!(
            "File '{}' (version '{}') is disabled. Skip its download",
            file.filename, file.version
        );
    }
}
