use sqlx::{Pool, Sqlite};

use crate::db::models::Message;
use crate::error::AppError;

pub struct MessageRepository;

impl MessageRepository {
    /// Insert a message and return the stored row. The id and timestamp are
    /// assigned here; `is_read` always starts false.
    pub async fn create(
        pool: &Pool<Sqlite>,
        sender_id: i64,
        recipient_id: i64,
        content: &str,
    ) -> Result<Message, AppError> {
        let created_at = chrono::Utc::now();

        let message = sqlx::query_as::<_, Message>(
            r#"
INSERT INTO messages (sender_id, recipient_id, content, created_at, is_read)
VALUES (?, ?, ?, ?, 0)
RETURNING id, sender_id, recipient_id, content, created_at, is_read
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(content)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(message)
    }

    /// Both directions between two users, oldest first.
    pub async fn conversation(
        pool: &Pool<Sqlite>,
        user_a: i64,
        user_b: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT * FROM messages
WHERE (sender_id = ? AND recipient_id = ?)
   OR (sender_id = ? AND recipient_id = ?)
ORDER BY id ASC
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn inbox(pool: &Pool<Sqlite>, recipient_id: i64) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE recipient_id = ? ORDER BY id DESC",
        )
        .bind(recipient_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn sent(pool: &Pool<Sqlite>, sender_id: i64) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE sender_id = ? ORDER BY id DESC",
        )
        .bind(sender_id)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn mark_read(pool: &Pool<Sqlite>, id: i64) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(
            "UPDATE messages SET is_read = 1 WHERE id = ? RETURNING *",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
