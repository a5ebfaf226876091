use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, sea_query::Expr,
};

use crate::domain::{JobKind, JobStatus, UserId};
use crate::entities::{job_runs, prelude::*};
use crate::models::job::JobRun;

pub struct JobRepository {
    conn: DatabaseConnection,
}

impl JobRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, kind: JobKind, triggered_by: Option<UserId>) -> Result<JobRun> {
        let active = job_runs::ActiveModel {
            kind: Set(kind.as_str().to_string()),
            status: Set(JobStatus::Pending.as_str().to_string()),
            triggered_by: Set(triggered_by.map(|u| u.value())),
            summary: Set(None),
            error: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            started_at: Set(None),
            finished_at: Set(None),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert job run")?;

        JobRun::try_from(model)
    }

    pub async fn mark_running(&self, id: i32) -> Result<()> {
        job_runs::Entity::update_many()
            .col_expr(job_runs::Column::Status, Expr::value(JobStatus::Running.as_str()))
            .col_expr(
                job_runs::Column::StartedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(job_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: i32, summary: &str) -> Result<()> {
        job_runs::Entity::update_many()
            .col_expr(job_runs::Column::Status, Expr::value(JobStatus::Completed.as_str()))
            .col_expr(job_runs::Column::Summary, Expr::value(summary))
            .col_expr(
                job_runs::Column::FinishedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(job_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: i32, error: &str) -> Result<()> {
        job_runs::Entity::update_many()
            .col_expr(job_runs::Column::Status, Expr::value(JobStatus::Failed.as_str()))
            .col_expr(job_runs::Column::Error, Expr::value(error))
            .col_expr(
                job_runs::Column::FinishedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(job_runs::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i32) -> Result<Option<JobRun>> {
        let model = JobRuns::find_by_id(id).one(&self.conn).await?;
        model.map(JobRun::try_from).transpose()
    }

    /// Newest first.
    pub async fn list(&self, kind: Option<JobKind>, limit: u64) -> Result<Vec<JobRun>> {
        let mut query = JobRuns::find()
            .order_by_desc(job_runs::Column::CreatedAt)
            .order_by_desc(job_runs::Column::Id);

        if let Some(kind) = kind {
            query = query.filter(job_runs::Column::Kind.eq(kind.as_str()));
        }

        let models = query
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list job runs")?;

        models.into_iter().map(JobRun::try_from).collect()
    }

    /// A pending or running job of this kind, if any.
    pub async fn find_active(&self, kind: JobKind) -> Result<Option<JobRun>> {
        let model = JobRuns::find()
            .filter(job_runs::Column::Kind.eq(kind.as_str()))
            .filter(job_runs::Column::Status.is_in([
                JobStatus::Pending.as_str(),
                JobStatus::Running.as_str(),
            ]))
            .one(&self.conn)
            .await?;

        model.map(JobRun::try_from).transpose()
    }

    /// Runs left active by a previous process can never finish; mark them failed.
    pub async fn fail_stale_runs(&self) -> Result<u64> {
        let result = job_runs::Entity::update_many()
            .col_expr(job_runs::Column::Status, Expr::value(JobStatus::Failed.as_str()))
            .col_expr(job_runs::Column::Error, Expr::value("Interrupted by shutdown"))
            .col_expr(
                job_runs::Column::FinishedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(job_runs::Column::Status.is_in([
                JobStatus::Pending.as_str(),
                JobStatus::Running.as_str(),
            ]))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
