use async_trait::async_trait;
use rf_core::error::{AppError, Result};
use rf_core::models::Report;
use rf_core::traits::ReportRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{decode_error, is_foreign_key_violation, storage, target_from_columns, SqliteForumRepo};

const REPORT_COLUMNS: &str = "id, reporter_id, post_id, comment_id, reason, status, created_at";

fn report_from_row(row: &SqliteRow) -> sqlx::Result<Report> {
    let status: String = row.try_get("status")?;
    Ok(Report {
        id: row.try_get("id")?,
        reporter_id: row.try_get("reporter_id")?,
        target: target_from_columns(row.try_get("post_id")?, row.try_get("comment_id")?)?,
        reason: row.try_get("reason")?,
        status: status.parse().map_err(decode_error)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ReportRepo for SqliteForumRepo {
    async fn insert_report(&self, report: &Report) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO reports (id, reporter_id, post_id, comment_id, reason, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(report.id)
        .bind(report.reporter_id)
        .bind(report.target.post_id())
        .bind(report.target.comment_id())
        .bind(&report.reason)
        .bind(report.status.as_str())
        .bind(report.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_foreign_key_violation(&err) => Err(AppError::not_found(
                report.target.entity(),
                report.target.id(),
            )),
            Err(err) => Err(storage("insert report")(err)),
        }
    }

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>> {
        let row = sqlx::query(&format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find report"))?;

        row.as_ref()
            .map(report_from_row)
            .transpose()
            .map_err(storage("decode report"))
    }

    async fn list_reports(&self) -> Result<Vec<Report>> {
        let rows = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list reports"))?;

        rows.iter()
            .map(report_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode report"))
    }

    async fn close_report(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE reports SET status = 'closed' WHERE id = ? AND status = 'open'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage("close report"))?;
        Ok(result.rows_affected() > 0)
    }
}
