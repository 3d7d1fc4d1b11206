use sqlx::{Pool, Sqlite};

use crate::db::models::Post;
use crate::error::AppError;

pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

pub struct PostRepository;

impl PostRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        owner_id: i64,
        owner_username: &str,
        title: &str,
        content: &str,
        is_anonymous: bool,
    ) -> Result<Post, AppError> {
        let display_name = if is_anonymous {
            ANONYMOUS_DISPLAY_NAME
        } else {
            owner_username
        };

        let post = sqlx::query_as::<_, Post>(
            r#"
INSERT INTO posts (title, content, owner_id, is_anonymous, display_name, created_at)
VALUES (?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(owner_id)
        .bind(is_anonymous)
        .bind(display_name)
        .bind(chrono::Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(post)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(post)
    }

    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts ORDER BY id")
            .fetch_all(pool)
            .await?;

        Ok(posts)
    }

    pub async fn list_by_owner(pool: &Pool<Sqlite>, owner_id: i64) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE owner_id = ? ORDER BY id")
            .bind(owner_id)
            .fetch_all(pool)
            .await?;

        Ok(posts)
    }

    pub async fn update(
        pool: &Pool<Sqlite>,
        id: i64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Post, AppError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
UPDATE posts
SET title = COALESCE(?, title),
    content = COALESCE(?, content)
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(post)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
