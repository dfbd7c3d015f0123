//! Object storage collaborator for uploaded video bytes.

mod memory;
mod s3;

pub use memory::InMemoryObjectStorage;
pub use s3::{get_s3_client, S3ObjectStorage};

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::path::Path;
use thiserror::Error;

/// Video file extensions accepted for upload (lowercase, with dot).
pub const ALLOWED_EXTENSIONS: [&str; 6] = [".mp4", ".mov", ".avi", ".mkv", ".webm", ".ogg"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage provider error: {0}")]
    Provider(String),
}

/// Where video bytes live. Keys are opaque to the provider.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the file at `local_path` under `key` and return its public URL.
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Lowercased extension of `filename` including the dot, e.g. ".mp4".
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

pub fn is_allowed_video(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Unique object key: `{timestampMillis}-{random}-{sanitizedFilename}`.
pub fn object_key(filename: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        suffix,
        sanitize_filename(filename)
    )
}

fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("video");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// MIME type for an allowed video extension.
pub fn content_type_for(key: &str) -> &'static str {
    match extension_of(key).as_deref() {
        Some(".mp4") => "video/mp4",
        Some(".mov") => "video/quicktime",
        Some(".avi") => "video/x-msvideo",
        Some(".mkv") => "video/x-matroska",
        Some(".webm") => "video/webm",
        Some(".ogg") => "video/ogg",
        _ => "application/octet-stream",
    }
}
