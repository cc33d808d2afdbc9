//! Workspace metadata cache.
//!
//! Resolves the configured workspace into a [`WorkspaceSnapshot`], preferring
//! a fresh on-disk copy of the last full listing and falling back to a
//! paginated fetch. A page that fails is retried once; a second failure on
//! the same page aborts the fetch.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, error, info, warn};

use crate::contract::{RemoteClient, WorkspaceResponse, WorkspaceSnapshot};
use crate::error::SyncError;
use crate::local::{Local, INVALIDATION_PERIOD};

pub const WORKSPACE_CACHE_FILE: &str = "workspace.json";
pub const WORKSPACE_PAGE_SIZE: usize = 500;

pub struct WorkspaceCache<C: RemoteClient> {
    client: Arc<C>,
    local: Local,
    api_base: String,
    organization_id: i64,
    workspace_id: i64,
    ttl: Duration,
    page_size: usize,
}

impl<C: RemoteClient> WorkspaceCache<C> {
    pub fn new(
        client: Arc<C>,
        local: Local,
        api_base: impl Into<String>,
        organization_id: i64,
        workspace_id: i64,
    ) -> Self {
        WorkspaceCache {
            client,
            local,
            api_base: api_base.into(),
            organization_id,
            workspace_id,
            ttl: INVALIDATION_PERIOD,
            page_size: WORKSPACE_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cached snapshot if fresh and it contains the workspace, otherwise remote.
    pub async fn load_workspace(&self) -> Result<WorkspaceSnapshot, SyncError> {
        let start = Instant::now();
        let result = match self.cached_workspaces() {
            Some((cached, fetched_at)) => match self.find(&cached, fetched_at) {
                Some(snapshot) => {
                    debug!(workspace_id = self.workspace_id, "Workspace served from cache");
                    Ok(snapshot)
                }
                None => self.workspace_from_server().await,
            },
            None => self.workspace_from_server().await,
        };
        debug!(
            workspace_id = self.workspace_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "LoadWorkspace finished"
        );
        result
    }

    /// Ignores the cache, fetches the full listing and persists it.
    pub async fn workspace_from_server(&self) -> Result<WorkspaceSnapshot, SyncError> {
        let response = self.fetch_all().await?;
        match serde_json::to_vec(&response) {
            Ok(body) => {
                if let Err(e) = self.local.put_in_home(WORKSPACE_CACHE_FILE, &body) {
                    warn!(error = %e, "Failed to persist workspace cache");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialise workspace cache"),
        }
        self.find(&response, SystemTime::now()).ok_or_else(|| {
            error!(workspace_id = self.workspace_id, "workspace was not found");
            SyncError::NotFound(format!("workspace with id={} was not found", self.workspace_id))
        })
    }

    /// The cached listing and the time it was written.
    fn cached_workspaces(&self) -> Option<(WorkspaceResponse, SystemTime)> {
        let (bytes, modified) = self.local.load_cached(WORKSPACE_CACHE_FILE, self.ttl)?;
        match serde_json::from_slice(&bytes) {
            Ok(response) => Some((response, modified)),
            Err(e) => {
                error!(error = %e, "error occurred on cached workspace read");
                None
            }
        }
    }

    fn find(&self, response: &WorkspaceResponse, fetched_at: SystemTime) -> Option<WorkspaceSnapshot> {
        response
            .workspaces
            .iter()
            .find(|data| data.workspace.id == self.workspace_id)
            .map(|data| WorkspaceSnapshot::from_data(data, fetched_at))
    }

    fn page_url(&self, offset: usize) -> String {
        format!(
            "{}/v3/organizations/{}/workspaces?limit={}&offset={}",
            self.api_base, self.organization_id, self.page_size, offset
        )
    }

    async fn fetch_page(&self, offset: usize) -> Result<WorkspaceResponse, SyncError> {
        let bytes = self.client.get_from_server(&self.page_url(offset)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Walks every page, retrying each failed page exactly once.
    async fn fetch_all(&self) -> Result<WorkspaceResponse, SyncError> {
        let mut merged = WorkspaceResponse::default();
        let mut total: Option<usize> = None;
        let mut offset = 0;
        loop {
            let page = match self.fetch_page(offset).await {
                Ok(page) => page,
                Err(first) if first.is_auth_error() => return Err(first),
                Err(first) => {
                    warn!(offset, error = %first, "Workspace page request failed, retrying once");
                    self.fetch_page(offset).await.map_err(|second| {
                        error!(offset, error = %second, "Workspace page failed twice, aborting pagination");
                        SyncError::PaginationAborted {
                            offset,
                            source: Box::new(second),
                        }
                    })?
                }
            };
            let total_results = *total.get_or_insert(page.meta.paging.total_results);
            if offset == 0 {
                merged.meta = page.meta.clone();
            }
            merged.workspaces.extend(page.workspaces);
            offset += self.page_size;
            if offset >= total_results {
                break;
            }
        }
        info!(
            workspaces = merged.workspaces.len(),
            "Fetched workspace list from server"
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{MockRemoteClient, Workspace, WorkspaceData};
    use tempfile::tempdir;

    fn page(total: usize, ids: std::ops::Range<i64>) -> Vec<u8> {
        let response = WorkspaceResponse {
            meta: crate::contract::Meta {
                paging: crate::contract::Paging {
                    total_enabled: total,
                    total_results: total,
                },
            },
            workspaces: ids
                .map(|id| WorkspaceData {
                    workflow: vec![],
                    workspace: Workspace {
                        id,
                        ..Workspace::default()
                    },
                })
                .collect(),
        };
        serde_json::to_vec(&response).unwrap()
    }

    #[tokio::test]
    async fn pagination_merges_pages_in_order() {
        let dir = tempdir().unwrap();
        let mut client = MockRemoteClient::new();
        client
            .expect_get_from_server()
            .withf(|url: &str| url.ends_with("offset=0"))
            .times(1)
            .returning(|_| Ok(page(5, 0..2)));
        client
            .expect_get_from_server()
            .withf(|url: &str| url.ends_with("offset=2"))
            .times(1)
            .returning(|_| Ok(page(5, 2..4)));
        client
            .expect_get_from_server()
            .withf(|url: &str| url.ends_with("offset=4"))
            .times(1)
            .returning(|_| Ok(page(5, 4..5)));

        let cache = WorkspaceCache::new(Arc::new(client), Local::with_home(dir.path()), "http://api", 9, 3)
            .with_page_size(2);
        let merged = cache.fetch_all().await.unwrap();
        let ids: Vec<i64> = merged.workspaces.iter().map(|w| w.workspace.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
