use sqlx::{Pool, Sqlite};

use crate::db::models::Comment;
use crate::error::AppError;

pub struct CommentRepository;

impl CommentRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        post_id: i64,
        owner_id: i64,
        content: &str,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
INSERT INTO comments (content, post_id, owner_id, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(content)
        .bind(post_id)
        .bind(owner_id)
        .bind(chrono::Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(comment)
    }

    pub async fn list_for_post(pool: &Pool<Sqlite>, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let comments =
            sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE post_id = ? ORDER BY id")
                .bind(post_id)
                .fetch_all(pool)
                .await?;

        Ok(comments)
    }

    pub async fn update_content(
        pool: &Pool<Sqlite>,
        id: i64,
        content: &str,
    ) -> Result<Comment, AppError> {
        let comment = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET content = ? WHERE id = ? RETURNING *",
        )
        .bind(content)
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
