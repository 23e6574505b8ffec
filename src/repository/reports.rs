use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{AppResult, conflict_on_unique},
    models::{ClosedReport, Pagination, Report, ReportStatus, ReportTarget, Resolution},
};

#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// One report per reporter and target; a repeat is a conflict.
    async fn create_report(&self, reporter_id: Uuid, target: ReportTarget, reason: String) -> AppResult<Report>;
    /// Oldest first, so the queue is worked in order.
    async fn list_reports(&self, status: Option<ReportStatus>, page: Pagination) -> AppResult<Vec<Report>>;
    async fn get_report(&self, id: Uuid) -> AppResult<Option<Report>>;
    /// Closes a report that is still open; `None` otherwise. A take-down (hide the
    /// post, delete the comment) commits in the same transaction.
    async fn resolve_report(
        &self,
        id: Uuid,
        resolver_id: Uuid,
        resolution: &Resolution,
    ) -> AppResult<Option<ClosedReport>>;
}

pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const REPORT_COLUMNS: &str = "id, reporter_id, target_type, post_id, comment_id, reason, status, \
                              resolved_by, resolution_note, created_at, resolved_at";

#[async_trait]
impl ReportRepository for PgReportRepository {
    async fn create_report(&self, reporter_id: Uuid, target: ReportTarget, reason: String) -> AppResult<Report> {
        let (post_id, comment_id) = match target {
            ReportTarget::Post { id } => (Some(id), None),
            ReportTarget::Comment { id } => (None, Some(id)),
        };
        sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports (id, reporter_id, target_type, post_id, comment_id, reason) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {REPORT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(reporter_id)
        .bind(target.kind().as_str())
        .bind(post_id)
        .bind(comment_id)
        .bind(&reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "you have already reported this content"))
    }

    async fn list_reports(&self, status: Option<ReportStatus>, page: Pagination) -> AppResult<Vec<Report>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {REPORT_COLUMNS} FROM reports"));
        if let Some(status) = status {
            builder.push(" WHERE status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY created_at ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let reports = builder.build_query_as::<Report>().fetch_all(&self.pool).await?;
        Ok(reports)
    }

    async fn get_report(&self, id: Uuid) -> AppResult<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(report)
    }

    async fn resolve_report(
        &self,
        id: Uuid,
        resolver_id: Uuid,
        resolution: &Resolution,
    ) -> AppResult<Option<ClosedReport>> {
        let mut tx = self.pool.begin().await?;

        let Some(report) = sqlx::query_as::<_, Report>(&format!(
            "UPDATE reports SET status = $3, resolved_by = $2, resolution_note = $4, resolved_at = NOW() \
             WHERE id = $1 AND status = 'open' RETURNING {REPORT_COLUMNS}"
        ))
        .bind(id)
        .bind(resolver_id)
        .bind(resolution.status.as_str())
        .bind(&resolution.note)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let mut hidden_post_author = None;
        if resolution.take_down {
            if let Some(post_id) = report.post_id {
                hidden_post_author = sqlx::query_scalar::<_, Uuid>(
                    "UPDATE posts SET status = 'hidden', updated_at = NOW() \
                     WHERE id = $1 AND status <> 'hidden' RETURNING author_id",
                )
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
            } else if let Some(comment_id) = report.comment_id {
                sqlx::query("DELETE FROM comments WHERE id = $1")
                    .bind(comment_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(Some(ClosedReport { report, hidden_post_author }))
    }
}
