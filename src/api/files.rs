use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use sqlx::{Pool, Sqlite};

use crate::api::extract::{ApiPath, ApiQuery, CurrentUser};
use crate::api::state::AppState;
use crate::api::{done, with_data};
use crate::db::{FileRepository, MessageRepository, NewFile, PostRepository, StoredFile};
use crate::error::AppError;
use crate::storage;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub post_id: Option<i64>,
    pub message_id: Option<i64>,
}

struct Upload {
    filename: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Pull the `file` field out of the form; other fields are ignored.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(bad_form)?.to_vec();

        return Ok(Upload {
            filename,
            content_type,
            data,
        });
    }

    Err(AppError::Validation("Missing file field".to_string()))
}

/// Write the upload to disk, then record it. A failed insert removes the file
/// again so nothing is left on disk without a row.
async fn persist_upload(
    db: &Pool<Sqlite>,
    upload_dir: &str,
    uploader_id: i64,
    upload: &Upload,
    query: &UploadQuery,
) -> Result<StoredFile, AppError> {
    let (file_path, file_size) = storage::save_file(upload_dir, &upload.filename, &upload.data).await?;

    let created = FileRepository::create(
        db,
        NewFile {
            filename: &upload.filename,
            file_path: &file_path,
            file_size,
            uploader_id,
            post_id: query.post_id,
            message_id: query.message_id,
        },
    )
    .await;

    if created.is_err() {
        if let Err(e) = storage::remove_file(&file_path).await {
            tracing::error!(path = %file_path, error = %e, "Failed to discard orphaned upload");
        }
    }

    created
}

/// POST /files/upload?post_id=&message_id=
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<UploadQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let upload = read_upload(multipart).await?;

    if !storage::is_allowed_media(&upload.filename, upload.content_type.as_deref()) {
        return Err(AppError::BadRequest(
            "Only images, gifs, and videos are allowed".to_string(),
        ));
    }

    if let Some(post_id) = query.post_id {
        PostRepository::get_by_id(&state.db, post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;
    }
    if let Some(message_id) = query.message_id {
        MessageRepository::get_by_id(&state.db, message_id)
            .await?
            .ok_or_else(|| AppError::not_found("Message"))?;
    }

    let file = persist_upload(
        &state.db,
        &state.config.upload_dir,
        user.id,
        &upload,
        &query,
    )
    .await?;
    tracing::info!(file_id = file.id, user_id = user.id, file_size = file.file_size, "File uploaded");

    Ok((StatusCode::CREATED, with_data("Successfully uploaded file", file)))
}

/// GET /files/{file_id}
pub async fn get_file(
    State(state): State<AppState>,
    ApiPath(file_id): ApiPath<i64>,
) -> Result<Json<StoredFile>, AppError> {
    let file = FileRepository::get_by_id(&state.db, file_id)
        .await?
        .ok_or_else(|| AppError::not_found("File"))?;

    Ok(Json(file))
}

/// GET /files/user/{user_id}
pub async fn files_by_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<Json<Vec<StoredFile>>, AppError> {
    Ok(Json(FileRepository::list_by_uploader(&state.db, user_id).await?))
}

/// DELETE /files/{file_id}
pub async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(file_id): ApiPath<i64>,
) -> Result<Json<Value>, AppError> {
    let file = FileRepository::get_by_id(&state.db, file_id)
        .await?
        .ok_or_else(|| AppError::not_found("File"))?;

    if file.uploader_id != user.id {
        return Err(AppError::Forbidden("Not authorized to delete this file".to_string()));
    }

    FileRepository::delete(&state.db, file_id).await?;
    storage::remove_file(&file.file_path).await?;

    Ok(done("Successfully deleted file"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn upload() -> Upload {
        Upload {
            filename: "clip.mp4".to_string(),
            content_type: Some("video/mp4".to_string()),
            data: b"fake mp4".to_vec(),
        }
    }

    fn stored_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn rejected_insert_leaves_no_file_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            database_url: format!("sqlite://{}/files.db", tmp.path().display()),
            ..Config::default()
        };
        let pool = crate::db::connect(&config).await.unwrap();
        let upload_dir = tmp.path().join("uploads");

        // No such user: the foreign key rejects the row after the write.
        let query = UploadQuery { post_id: None, message_id: None };
        let result = persist_upload(&pool, upload_dir.to_str().unwrap(), 4242, &upload(), &query).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(stored_files(&upload_dir), 0);
    }

    #[tokio::test]
    async fn accepted_upload_keeps_file_and_row() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            database_url: format!("sqlite://{}/files.db", tmp.path().display()),
            ..Config::default()
        };
        let pool = crate::db::connect(&config).await.unwrap();
        let user = crate::db::UserRepository::create(&pool, "uploader", "u@example.com", b"h", b"s")
            .await
            .unwrap();
        let upload_dir = tmp.path().join("uploads");

        let query = UploadQuery { post_id: None, message_id: None };
        let file = persist_upload(&pool, upload_dir.to_str().unwrap(), user.id, &upload(), &query)
            .await
            .unwrap();

        assert_eq!(file.uploader_id, user.id);
        assert_eq!(file.file_size, 8);
        assert_eq!(stored_files(&upload_dir), 1);
    }
}
