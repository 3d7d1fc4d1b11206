//! Local disk storage for media uploads.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "video/quicktime",
];

const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4", ".webm", ".mov"];

/// Lowercased extension including the dot, or an empty string.
pub fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Both the declared MIME type and the extension must be on the media list.
pub fn is_allowed_media(filename: &str, content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };

    ALLOWED_MIME_TYPES.contains(&content_type)
        && ALLOWED_EXTENSIONS.contains(&extension(filename).as_str())
}

/// Random on-disk name that keeps the original extension.
pub fn generate_filename(original: &str) -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), extension(original))
}

/// Write an upload under `upload_dir`, returning the stored path and size.
pub async fn save_file(upload_dir: &str, original: &str, data: &[u8]) -> Result<(String, i64), AppError> {
    fs::create_dir_all(upload_dir).await.map_err(|e| {
        tracing::error!(upload_dir, error = %e, "Failed to create upload directory");
        e
    })?;

    let path = PathBuf::from(upload_dir).join(generate_filename(original));

    let mut file = fs::File::create(&path).await?;
    file.write_all(data).await?;
    file.flush().await?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "Upload stored");

    let size = i64::try_from(data.len())
        .map_err(|_| AppError::Internal("Upload size overflow".to_string()))?;

    Ok((path.to_string_lossy().into_owned(), size))
}

/// Remove a stored upload. A file that is already gone is only logged.
pub async fn remove_file(path: &str) -> Result<(), AppError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path, "Stored file already missing");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_whitelist_needs_mime_and_extension() {
        assert!(is_allowed_media("cat.PNG", Some("image/png")));
        assert!(is_allowed_media("clip.mov", Some("video/quicktime")));
        assert!(!is_allowed_media("cat.png", Some("text/plain")));
        assert!(!is_allowed_media("notes.txt", Some("image/png")));
        assert!(!is_allowed_media("cat.png", None));
        assert!(!is_allowed_media("noext", Some("image/png")));
    }

    #[test]
    fn generated_name_keeps_extension() {
        let name = generate_filename("Holiday.JPEG");
        assert!(name.ends_with(".jpeg"));
        assert_eq!(name.len(), 32 + ".jpeg".len());
    }

    #[tokio::test]
    async fn save_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().to_str().unwrap();

        let (path, size) = save_file(upload_dir, "a.gif", b"GIF89a").await.unwrap();
        assert_eq!(size, 6);
        assert!(Path::new(&path).exists());

        remove_file(&path).await.unwrap();
        assert!(!Path::new(&path).exists());

        // Second removal is tolerated.
        remove_file(&path).await.unwrap();
    }
}
