use sqlx::{Pool, Sqlite};

use crate::db::models::User;
use crate::error::AppError;

pub struct UserRepository;

impl UserRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        username: &str,
        email: &str,
        password_hash: &[u8],
        password_salt: &[u8],
    ) -> Result<User, AppError> {
        let created_at = chrono::Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (username, email, password_hash, password_salt, is_active, created_at)
VALUES (?, ?, ?, ?, 1, ?)
RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(password_salt)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn exists(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(found.is_some())
    }

    /// Whether another account (not `except_id`) already uses this username.
    pub async fn username_taken(
        pool: &Pool<Sqlite>,
        username: &str,
        except_id: i64,
    ) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = ? AND id != ?")
                .bind(username)
                .bind(except_id)
                .fetch_optional(pool)
                .await?;

        Ok(found.is_some())
    }

    pub async fn email_taken(
        pool: &Pool<Sqlite>,
        email: &str,
        except_id: i64,
    ) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(except_id)
                .fetch_optional(pool)
                .await?;

        Ok(found.is_some())
    }

    /// Apply the provided fields; `None` leaves a column untouched.
    pub async fn update(
        pool: &Pool<Sqlite>,
        id: i64,
        username: Option<&str>,
        email: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
UPDATE users
SET username = COALESCE(?, username),
    email = COALESCE(?, email),
    is_active = COALESCE(?, is_active)
WHERE id = ?
RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(is_active)
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
