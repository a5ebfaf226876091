use serde::Serialize;

use crate::domain::{JobKind, JobStatus};
use crate::entities::job_runs;

#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub id: i32,
    pub kind: JobKind,
    pub status: JobStatus,
    pub triggered_by: Option<i32>,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl TryFrom<job_runs::Model> for JobRun {
    type Error = anyhow::Error;

    fn try_from(model: job_runs::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            kind: model.kind.parse()?,
            status: model.status.parse()?,
            triggered_by: model.triggered_by,
            summary: model.summary,
            error: model.error,
            created_at: model.created_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
        })
    }
}
