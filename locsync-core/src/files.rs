//! Remote file listing, lookup, scoring and deletion.

use std::collections::BTreeSet;
use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::contract::{
    FileDeleteResponse, FileMetadata, FileSearchResponse, Persona, RemoteClient, ScoreResponse,
    WorkspaceSnapshot,
};
use crate::error::SyncError;

/// Most rows `list_files` returns.
pub const LIST_LIMIT: usize = 50;

/// A remote file together with the target persona it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub file: FileMetadata,
    pub persona: Persona,
}

pub struct FileService<C: RemoteClient> {
    client: Arc<C>,
    config: Arc<Config>,
}

impl<C: RemoteClient> Clone for FileService<C> {
    fn clone(&self) -> Self {
        FileService {
            client: Arc::clone(&self.client),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C: RemoteClient> FileService<C> {
    pub fn new(client: Arc<C>, config: Arc<Config>) -> Self {
        FileService { client, config }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// `{base}/v3/organizations/{org}/workspaces/{ws}`
    pub fn workspace_base(&self) -> String {
        format!(
            "{}/v3/organizations/{}/workspaces/{}",
            self.config.api_base(),
            self.config.workspace.organization_id,
            self.config.workspace.workspace_id
        )
    }

    fn persona_files_url(&self, persona_id: i64) -> String {
        format!("{}/personas/{}/files", self.workspace_base(), persona_id)
    }

    pub fn file_list_url(&self, persona_id: i64, with_progress: bool) -> String {
        format!(
            "{}?withProgressStatus={}",
            self.persona_files_url(persona_id),
            with_progress
        )
    }

    pub fn limited_file_list_url(&self, persona_id: i64, limit: usize) -> String {
        format!("{}&limit={}", self.file_list_url(persona_id, false), limit)
    }

    pub fn file_search_url(&self, persona_id: i64, name: &str, version: &str) -> Result<String, SyncError> {
        let url = Url::parse_with_params(
            &self.persona_files_url(persona_id),
            &[
                ("withProgressStatus", "false"),
                ("filename", name),
                ("version", version),
            ],
        )
        .map_err(|e| SyncError::Config(format!("invalid base_url: {e}")))?;
        Ok(url.to_string())
    }

    pub fn download_url(&self, persona_id: i64, file_id: i64) -> String {
        format!(
            "{}/personas/{}/files/{}/download",
            self.workspace_base(),
            persona_id,
            file_id
        )
    }

    pub fn source_download_url(&self, file_id: i64, with_updates: bool) -> String {
        format!(
            "{}/files/{}/download/source?withUpdates={}",
            self.workspace_base(),
            file_id,
            with_updates
        )
    }

    pub fn delete_url(&self, file_id: i64) -> String {
        format!("{}/files/{}", self.workspace_base(), file_id)
    }

    pub fn score_url(&self, file_id: i64, persona_id: i64) -> String {
        format!(
            "{}/v3/contentscore/organizations/{}/workspaces/{}/documents/{}/personas/{}/score?documentLength=1",
            self.config.api_base(),
            self.config.workspace.organization_id,
            self.config.workspace.workspace_id,
            file_id,
            persona_id
        )
    }

    /// Every file of one target persona, optionally with workflow progress.
    pub async fn workspace_files(
        &self,
        persona_id: i64,
        with_progress: bool,
    ) -> Result<FileSearchResponse, SyncError> {
        let url = self.file_list_url(persona_id, with_progress);
        self.search(&url).await
    }

    /// Files of the target personas in `audiences` (all when empty), at most
    /// [`LIST_LIMIT`] of them, sorted by name.
    ///
    /// Personas are walked in workspace order and the cap applies before the
    /// sort. A persona whose listing fails is left out unless the failure is
    /// an authorisation error.
    pub async fn list_files(
        &self,
        snapshot: &WorkspaceSnapshot,
        audiences: &BTreeSet<String>,
    ) -> Result<Vec<FileMetadata>, SyncError> {
        let mut files = Vec::new();
        for persona in &snapshot.target_personas {
            if !audiences.is_empty() && !audiences.contains(&persona.code) {
                continue;
            }
            let url = self.limited_file_list_url(persona.id, LIST_LIMIT);
            match self.search(&url).await {
                Ok(response) => files.extend(response.files),
                Err(e) if e.is_auth_error() => return Err(e),
                Err(e) => {
                    warn!(persona = %persona.code, error = %e, "File list could not be fetched for persona");
                    continue;
                }
            }
            if files.len() >= LIST_LIMIT {
                files.truncate(LIST_LIMIT);
                break;
            }
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        debug!(files = files.len(), "Listed workspace files");
        Ok(files)
    }

    async fn search(&self, url: &str) -> Result<FileSearchResponse, SyncError> {
        let bytes = self.client.get_from_server(url).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            error!(error = %e, "error occurred on server response unmarshalling");
            SyncError::from(e)
        })
    }

    /// First file across the target personas whose name and version match exactly.
    ///
    /// Personas whose search fails are skipped, except on an authorisation
    /// failure which is returned.
    pub async fn find_file(
        &self,
        snapshot: &WorkspaceSnapshot,
        name: &str,
        version: &str,
    ) -> Result<Option<FoundFile>, SyncError> {
        debug!(file = name, version, "FindFile was called");
        for persona in &snapshot.target_personas {
            let url = self.file_search_url(persona.id, name, version)?;
            let response = match self.search(&url).await {
                Ok(response) => response,
                Err(e) if e.is_auth_error() => return Err(e),
                Err(e) => {
                    debug!(persona = %persona.code, error = %e, "File search failed for persona");
                    continue;
                }
            };
            if let Some(file) = response
                .files
                .into_iter()
                .find(|f| f.filename == name && f.version == version)
            {
                return Ok(Some(FoundFile {
                    file,
                    persona: persona.clone(),
                }));
            }
        }
        if version.is_empty() {
            warn!("File '{}' WAS NOT FOUND", name);
        } else {
            warn!("File '{}' with version '{}' WAS NOT FOUND", name, version);
        }
        Ok(None)
    }

    /// Content score of the matching file for the persona it was found under.
    pub async fn file_score(
        &self,
        snapshot: &WorkspaceSnapshot,
        name: &str,
        version: &str,
    ) -> Result<Option<ScoreResponse>, SyncError> {
        let Some(found) = self.find_file(snapshot, name, version).await? else {
            return Ok(None);
        };
        let url = self.score_url(found.file.file_id, found.persona.id);
        let bytes = self.client.get_from_server(&url).await?;
        let score = serde_json::from_slice(&bytes).map_err(|e| {
            error!(error = %e, "error occurred on file score response unmarshalling");
            SyncError::from(e)
        })?;
        Ok(Some(score))
    }

    /// Deletes the matching file. `Ok(false)` when it was not found or not removed.
    pub async fn delete_file(
        &self,
        snapshot: &WorkspaceSnapshot,
        name: &str,
        version: &str,
    ) -> Result<bool, SyncError> {
        let Some(found) = self.find_file(snapshot, name, version).await? else {
            return Ok(false);
        };
        let bytes = self.client.delete_from_server(&self.delete_url(found.file.file_id)).await?;
        let response: FileDeleteResponse = serde_json::from_slice(&bytes).map_err(|e| {
            error!(error = %e, "error occurred on delete response unmarshalling");
            SyncError::from(e)
        })?;
        if response.success {
            info!(
                "File '{}' with version '{}' was removed",
                found.file.filename, found.file.version
            );
        } else {
            error!(
                "File '{}' with version '{}' WAS NOT REMOVED",
                found.file.filename, found.file.version
            );
        }
        Ok(response.success)
    }
}
