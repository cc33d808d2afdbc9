use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::SyncError;

pub const DEFAULT_PUSH_WORKERS: usize = 1;
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 3;

/// Typed configuration surface consumed by the core.
///
/// Loading and merging (YAML files, env overrides) lives in the CLI crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub organization_id: i64,
    #[serde(default)]
    pub workspace_id: i64,
    /// Alias → persona code. Only the values are used as the default audience.
    #[serde(default)]
    pub audiences_map: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub sources: SourceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub folders: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Target file name template, e.g. `i18n/<language_code>/<filename>.<extension>`.
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlacklistConfig {
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_push_workers")]
    pub push_workers: usize,
    #[serde(default = "default_download_workers")]
    pub download_workers: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            push_workers: DEFAULT_PUSH_WORKERS,
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
        }
    }
}

fn default_push_workers() -> usize {
    DEFAULT_PUSH_WORKERS
}

fn default_download_workers() -> usize {
    DEFAULT_DOWNLOAD_WORKERS
}

impl Config {
    /// API root without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Persona codes from `audiences_map`, de-duplicated.
    pub fn audiences(&self) -> BTreeSet<String> {
        self.workspace.audiences_map.values().cloned().collect()
    }

    /// First configured push folder; downloads land under it too.
    pub fn base_folder(&self) -> Option<&PathBuf> {
        self.push.sources.folders.first()
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let mut problems = Vec::new();
        if self.workspace.access_token.trim().is_empty() {
            error!("access_token is not set");
            problems.push("access_token is not set");
        }
        if self.workspace.organization_id == 0 {
            error!("organization_id is not set");
            problems.push("organization_id is not set");
        }
        if self.workspace.workspace_id == 0 {
            error!("workspace_id is not set");
            problems.push("workspace_id is not set");
        }
        if self.api_base().is_empty() {
            error!("base_url is not set");
            problems.push("base_url is not set");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(problems.join(", ")))
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            organization_id = self.workspace.organization_id,
            workspace_id = self.workspace.workspace_id,
            base_url = %self.api_base(),
            blacklist_count = self.blacklist.sources.len(),
            "Loaded Config"
        );
        debug!(
            push_files = self.push.sources.files.len(),
            push_folders = self.push.sources.folders.len(),
            download_target = %self.download.target,
            "Config loaded (details)"
        );
    }
}
