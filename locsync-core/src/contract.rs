//! # contract: data model and the remote transport seam
//!
//! Plain data types exchanged with the remote localization API, plus the
//! [`RemoteClient`] trait every service in this crate talks through.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall` so tests drive the workspace cache,
//!   push, download and segment flows against `MockRemoteClient`.
//!
//! ## Wire format
//! - All types deserialise from the camelCase JSON the server returns.
//! - Unknown fields are ignored; absent optional fields fall back to defaults.

use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::template::Substitution;

/// A locale identity inside a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    #[serde(default)]
    pub id: i64,
    /// Locale code, e.g. `en-us`.
    #[serde(default)]
    pub code: String,
    /// Display name, e.g. `English - United States`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub direction: String,
}

/// Accepted file extensions declared by the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeCode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization_id: i64,
    #[serde(default)]
    pub content_type_codes: Vec<ContentTypeCode>,
    #[serde(default)]
    pub source_persona: Persona,
    #[serde(default)]
    pub target_personas: Vec<Persona>,
    #[serde(default)]
    pub timezone: String,
}

/// A named step a file's segments pass through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStage {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub complete: bool,
}

/// One entry of the paginated workspace listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceData {
    #[serde(default)]
    pub workflow: Vec<WorkflowStage>,
    pub workspace: Workspace,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    #[serde(default)]
    pub total_enabled: usize,
    #[serde(default)]
    pub total_results: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub paging: Paging,
}

/// Full workspace listing; also the on-disk cache format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceResponse {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceData>,
}

/// The resolved, read-only view of the configured workspace.
///
/// Built once per invocation by [`crate::workspace::WorkspaceCache`] and
/// shared by reference (usually behind an `Arc`) with every worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub workspace_id: i64,
    pub organization_id: i64,
    pub source_persona: Persona,
    pub target_personas: Vec<Persona>,
    pub content_type_extensions: Vec<String>,
    pub workflow_stages: Vec<WorkflowStage>,
    pub fetched_at: std::time::SystemTime,
}

impl WorkspaceSnapshot {
    pub fn from_data(data: &WorkspaceData, fetched_at: std::time::SystemTime) -> Self {
        let content_type_extensions = data
            .workspace
            .content_type_codes
            .iter()
            .flat_map(|code| code.extensions.iter().cloned())
            .collect();
        WorkspaceSnapshot {
            workspace_id: data.workspace.id,
            organization_id: data.workspace.organization_id,
            source_persona: data.workspace.source_persona.clone(),
            target_personas: data.workspace.target_personas.clone(),
            content_type_extensions,
            workflow_stages: data.workflow.clone(),
            fetched_at,
        }
    }

    pub fn target_persona(&self, code: &str) -> Option<&Persona> {
        self.target_personas.iter().find(|p| p.code == code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(default)]
    pub tag_id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counts {
    #[serde(default)]
    pub segment_count: u64,
    #[serde(default)]
    pub word_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowProgress {
    #[serde(default)]
    pub workflow: WorkflowStage,
    #[serde(default)]
    pub counts: Counts,
}

/// Remote file record from a persona file search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_id: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub error_id: i64,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Last update, milliseconds since the epoch.
    #[serde(default)]
    pub update: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaProgress {
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub by_workflow_progress: Vec<WorkflowProgress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchResponse {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub files: Vec<FileMetadata>,
    #[serde(default)]
    pub by_persona_progress: Vec<PersonaProgress>,
    #[serde(default)]
    pub total_counts: Counts,
}

/// Content score of one document for one persona.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    #[serde(default)]
    pub snapshot_time: i64,
    #[serde(default)]
    pub document_score: f64,
    #[serde(default)]
    pub breakdown: Vec<ScoreBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub issue_count: u64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeleteResponse {
    #[serde(default)]
    pub success: bool,
}

/// Body of the upsert call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub filename: String,
    pub version: String,
    pub content: String,
    pub filepath: String,
}

/// Which way a task moves bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Push,
    Download,
}

/// One unit of work for the transfer pool. Consumed exactly once.
#[derive(Debug, Clone)]
pub enum TransferTask {
    Push {
        file_path: PathBuf,
        size: u64,
    },
    Download {
        file: FileMetadata,
        persona: Persona,
        substitution: Substitution,
    },
}

impl TransferTask {
    pub fn direction(&self) -> Direction {
        match self {
            TransferTask::Push { .. } => Direction::Push,
            TransferTask::Download { .. } => Direction::Download,
        }
    }
}

/// Status and body of a POST/PUT. The caller decides what a status means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Narrow transport interface to the remote API.
///
/// GET and DELETE resolve non-2xx statuses into [`SyncError`]; POST and PUT
/// hand the raw status back because push needs to tell 401 from 413.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn get_from_server(&self, url: &str) -> Result<Vec<u8>, SyncError>;

    async fn post_to_server(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<RemoteResponse, SyncError>;

    async fn put_to_server(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<RemoteResponse, SyncError>;

    async fn delete_from_server(&self, url: &str) -> Result<Vec<u8>, SyncError>;
}
