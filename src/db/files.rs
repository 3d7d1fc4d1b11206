use sqlx::{Pool, Sqlite};

use crate::db::models::StoredFile;
use crate::error::AppError;

pub struct NewFile<'a> {
    pub filename: &'a str,
    pub file_path: &'a str,
    pub file_size: i64,
    pub uploader_id: i64,
    pub post_id: Option<i64>,
    pub message_id: Option<i64>,
}

pub struct FileRepository;

impl FileRepository {
    pub async fn create(pool: &Pool<Sqlite>, file: NewFile<'_>) -> Result<StoredFile, AppError> {
        let stored = sqlx::query_as::<_, StoredFile>(
            r#"
INSERT INTO files (filename, file_path, file_size, uploader_id, post_id, message_id, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(file.filename)
        .bind(file.file_path)
        .bind(file.file_size)
        .bind(file.uploader_id)
        .bind(file.post_id)
        .bind(file.message_id)
        .bind(chrono::Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(stored)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<StoredFile>, AppError> {
        let file = sqlx::query_as::<_, StoredFile>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(file)
    }

    pub async fn list_by_uploader(
        pool: &Pool<Sqlite>,
        uploader_id: i64,
    ) -> Result<Vec<StoredFile>, AppError> {
        let files =
            sqlx::query_as::<_, StoredFile>("SELECT * FROM files WHERE uploader_id = ? ORDER BY id")
                .bind(uploader_id)
                .fetch_all(pool)
                .await?;

        Ok(files)
    }

    pub async fn delete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }
}
