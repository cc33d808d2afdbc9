//! Per-persona project progress.

use serde::Serialize;
use tracing::{debug, error};

use crate::contract::{FileSearchResponse, PersonaProgress, RemoteClient, WorkspaceSnapshot};
use crate::error::SyncError;
use crate::files::FileService;

pub const COMPLETE_COLUMN: &str = "Complete";
pub const BASE_COLUMNS: [&str; 3] = ["#AUDIENCES", "#SEGMENTS", "#WORDS"];

/// Share of a persona's segments sitting in one workflow stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageShare {
    pub stage: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub audience_id: i64,
    pub audience_code: String,
    pub audience_name: String,
    pub segments_total: u64,
    pub words_total: u64,
    /// Incomplete stages by workflow order, then the complete stage last.
    pub stages: Vec<StageShare>,
}

impl StatusRow {
    /// Table cells in header order.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = vec![
            self.audience_code.clone(),
            self.segments_total.to_string(),
            self.words_total.to_string(),
        ];
        cells.extend(self.stages.iter().map(|s| format!("{:6.2}%", s.percent)));
        cells
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStatus {
    pub header: Vec<String>,
    pub rows: Vec<StatusRow>,
}

fn ordered(progress: &PersonaProgress) -> PersonaProgress {
    let mut progress = progress.clone();
    progress
        .by_workflow_progress
        .sort_by_key(|p| p.workflow.order);
    progress
}

fn header_for(progress: &PersonaProgress) -> Vec<String> {
    let mut header: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut has_complete = false;
    for stage in &progress.by_workflow_progress {
        if stage.workflow.complete {
            has_complete = true;
        } else {
            header.push(stage.workflow.name.clone());
        }
    }
    if has_complete {
        header.push(COMPLETE_COLUMN.to_string());
    }
    header
}

fn row_for(progress: &PersonaProgress) -> StatusRow {
    let segments_total: u64 = progress
        .by_workflow_progress
        .iter()
        .map(|p| p.counts.segment_count)
        .sum();
    let words_total = progress
        .by_workflow_progress
        .iter()
        .map(|p| p.counts.word_count)
        .sum();
    let share = |count: u64| {
        if segments_total == 0 {
            0.0
        } else {
            count as f64 / segments_total as f64 * 100.0
        }
    };
    let mut stages = Vec::new();
    let mut complete = None;
    for stage in &progress.by_workflow_progress {
        let entry = StageShare {
            stage: stage.workflow.name.clone(),
            percent: share(stage.counts.segment_count),
        };
        if stage.workflow.complete {
            complete = Some(StageShare {
                stage: COMPLETE_COLUMN.to_string(),
                ..entry
            });
        } else {
            stages.push(entry);
        }
    }
    stages.extend(complete);
    StatusRow {
        audience_id: progress.persona.id,
        audience_code: progress.persona.code.clone(),
        audience_name: progress.persona.name.clone(),
        segments_total,
        words_total,
        stages,
    }
}

/// Builds the status table from a file search made with progress.
pub fn build_project_status(response: &FileSearchResponse) -> Result<ProjectStatus, SyncError> {
    let Some(first) = response.by_persona_progress.first() else {
        error!("fileSearchResponse returned empty byPersonaProgress. Status is not available");
        return Err(SyncError::NotFound("persona progress".into()));
    };
    let header = header_for(&ordered(first));
    let rows = response
        .by_persona_progress
        .iter()
        .map(|p| row_for(&ordered(p)))
        .collect();
    Ok(ProjectStatus { header, rows })
}

/// Fetches progress through the first target persona that answers.
pub async fn project_status<C: RemoteClient>(
    files: &FileService<C>,
    snapshot: &WorkspaceSnapshot,
) -> Result<ProjectStatus, SyncError> {
    for persona in &snapshot.target_personas {
        match files.workspace_files(persona.id, true).await {
            Ok(response) => return build_project_status(&response),
            Err(e) if e.is_auth_error() => return Err(e),
            Err(e) => debug!(persona = %persona.code, error = %e, "Progress unavailable for persona"),
        }
    }
    error!(workspace_id = snapshot.workspace_id, "file progress was not found");
    Err(SyncError::NotFound(format!(
        "progress for workspace {}",
        snapshot.workspace_id
    )))
}
