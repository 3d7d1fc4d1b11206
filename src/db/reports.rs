use sqlx::{Pool, Sqlite};

use crate::db::models::{Report, ReportStatus};
use crate::error::AppError;

pub struct ReportRepository;

impl ReportRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        reporter_id: i64,
        post_id: Option<i64>,
        comment_id: Option<i64>,
        reason: &str,
        description: Option<&str>,
    ) -> Result<Report, AppError> {
        let report = sqlx::query_as::<_, Report>(
            r#"
INSERT INTO reports (reporter_id, post_id, comment_id, reason, description, status, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(reporter_id)
        .bind(post_id)
        .bind(comment_id)
        .bind(reason)
        .bind(description)
        .bind(ReportStatus::Pending)
        .bind(chrono::Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(report)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Report>, AppError> {
        let report = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(report)
    }

    pub async fn list(
        pool: &Pool<Sqlite>,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>, AppError> {
        let reports = match status {
            Some(status) => {
                sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE status = ? ORDER BY id")
                    .bind(status)
                    .fetch_all(pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Report>("SELECT * FROM reports ORDER BY id")
                    .fetch_all(pool)
                    .await?
            }
        };

        Ok(reports)
    }

    pub async fn set_status(
        pool: &Pool<Sqlite>,
        id: i64,
        status: ReportStatus,
    ) -> Result<Report, AppError> {
        let report =
            sqlx::query_as::<_, Report>("UPDATE reports SET status = ? WHERE id = ? RETURNING *")
                .bind(status)
                .bind(id)
                .fetch_one(pool)
                .await?;

        Ok(report)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM reports WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
