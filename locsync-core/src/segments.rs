//! Segment key management: add a key, find it, update its source, read its value.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::contract::{Meta, RemoteClient, RemoteResponse, WorkspaceSnapshot};
use crate::error::SyncError;
use crate::files::{FileService, FoundFile};

/// Body of `keyAdd` and `sourceUpdate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAddRequest {
    pub key: String,
    pub source: String,
    #[serde(default)]
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default)]
    pub last_saved: i64,
    #[serde(default)]
    pub segment_id: i64,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub ss_text: String,
    #[serde(default)]
    pub string_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSearchResponse {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// The value stored under a key, as shown by `value-key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyValue {
    pub file_name: String,
    pub file_version: String,
    pub key: String,
    pub value: String,
    pub reference: String,
    /// Milliseconds since the epoch.
    pub last_saved: i64,
}

pub struct SegmentService<C: RemoteClient> {
    files: FileService<C>,
}

impl<C: RemoteClient> SegmentService<C> {
    pub fn new(files: FileService<C>) -> Self {
        SegmentService { files }
    }

    async fn require_file(
        &self,
        snapshot: &WorkspaceSnapshot,
        file: &str,
        version: &str,
    ) -> Result<FoundFile, SyncError> {
        self.files
            .find_file(snapshot, file, version)
            .await?
            .ok_or_else(|| SyncError::NotFound(describe(file, version)))
    }

    pub async fn add_key(
        &self,
        snapshot: &WorkspaceSnapshot,
        file: &str,
        version: &str,
        request: &KeyAddRequest,
    ) -> Result<(), SyncError> {
        let found = self.require_file(snapshot, file, version).await?;
        let url = format!(
            "{}/files/{}/segments/keyAdd",
            self.files.workspace_base(),
            found.file.file_id
        );
        debug!(url = %url, "call to add key");
        let response = self
            .files
            .client()
            .post_to_server(&url, serde_json::to_value(request)?)
            .await?;
        check_response(&url, &response, || {
            format!("Problem to add key '{}'", request.key)
        })?;
        if version.is_empty() {
            info!("Key '{}' was added to file '{}'.", request.key, file);
        } else {
            info!("Key '{}' was added to file '{}' ({}).", request.key, file, version);
        }
        Ok(())
    }

    /// Searches every workflow stage for a segment whose string key is `key`.
    pub async fn find_segment(
        &self,
        snapshot: &WorkspaceSnapshot,
        file: &str,
        version: &str,
        key: &str,
    ) -> Result<Option<(FoundFile, Segment)>, SyncError> {
        let found = self.require_file(snapshot, file, version).await?;
        for stage in &snapshot.workflow_stages {
            let url = format!(
                "{}/personas/{}/files/{}/workflow/{}/segments",
                self.files.workspace_base(),
                found.persona.id,
                found.file.file_id,
                stage.id
            );
            let url = reqwest::Url::parse_with_params(&url, &[("search", key)])
                .map_err(|e| SyncError::Config(format!("invalid base_url: {e}")))?;
            let bytes = match self.files.client().get_from_server(url.as_str()).await {
                Ok(bytes) => bytes,
                Err(e) if e.is_auth_error() => return Err(e),
                Err(e) => {
                    debug!(stage = %stage.name, error = %e, "Segment search failed");
                    continue;
                }
            };
            let response: SegmentSearchResponse = match serde_json::from_slice(&bytes) {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, "error occurred on server segmentSearchResponse unmarshalling");
                    continue;
                }
            };
            if let Some(segment) = response.segments.into_iter().find(|s| s.string_key == key) {
                return Ok(Some((found, segment)));
            }
        }
        warn!("Segment {} in {} was not found", key, describe(file, version));
        Ok(None)
    }

    pub async fn update_key(
        &self,
        snapshot: &WorkspaceSnapshot,
        file: &str,
        version: &str,
        request: &KeyAddRequest,
    ) -> Result<(), SyncError> {
        let Some((found, segment)) = self.find_segment(snapshot, file, version, &request.key).await? else {
            return Err(SyncError::NotFound(format!(
                "segment {} in {}",
                request.key,
                describe(file, version)
            )));
        };
        let url = format!(
            "{}/files/{}/segments/{}/sourceUpdate",
            self.files.workspace_base(),
            found.file.file_id,
            segment.segment_id
        );
        let response = self
            .files
            .client()
            .put_to_server(&url, serde_json::to_value(request)?)
            .await?;
        check_response(&url, &response, || "Segment update".to_string())?;
        info!("Segment was successfully updated");
        Ok(())
    }

    pub async fn value_key(
        &self,
        snapshot: &WorkspaceSnapshot,
        file: &str,
        version: &str,
        key: &str,
    ) -> Result<Option<KeyValue>, SyncError> {
        Ok(self
            .find_segment(snapshot, file, version, key)
            .await?
            .map(|(_, segment)| KeyValue {
                file_name: file.to_string(),
                file_version: version.to_string(),
                key: key.to_string(),
                value: segment.ss_text,
                reference: segment.reference,
                last_saved: segment.last_saved,
            }))
    }
}

fn describe(file: &str, version: &str) -> String {
    if version.is_empty() {
        file.to_string()
    } else {
        format!("{file} {version}")
    }
}

fn check_response(
    url: &str,
    response: &RemoteResponse,
    what: impl FnOnce() -> String,
) -> Result<(), SyncError> {
    if response.is_success() {
        return Ok(());
    }
    if response.status == 401 {
        error!("{}", SyncError::Unauthorized);
        return Err(SyncError::Unauthorized);
    }
    let context = what();
    error!(
        "{}. Status: {}\nResponse : {}",
        context,
        response.status,
        response.body_text()
    );
    Err(SyncError::Status {
        url: url.to_string(),
        status: response.status,
        body: response.body_text(),
    })
}
