/// Video handlers - HTTP endpoints for gallery operations
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{DeleteResponse, UploadResponse, VideoMetadata, INSUFFICIENT_STORAGE_MSG};
use crate::services::{GalleryService, UploadedFile};

/// Longest accepted text part (title, description, ...).
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Upload spooled to local disk; removed when dropped.
struct SpooledUpload {
    filename: String,
    path: PathBuf,
    size: u64,
}

impl Drop for SpooledUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove spooled upload");
            }
        }
    }
}

/// Stream a file part to disk, refusing it as soon as it passes `max_bytes`.
async fn spool_field(field: &mut Field, filename: String, max_bytes: u64) -> Result<SpooledUpload> {
    let path = std::env::temp_dir().join(format!("gallery-upload-{}", Uuid::new_v4()));
    let mut spooled = SpooledUpload {
        filename,
        path,
        size: 0,
    };

    let mut file = tokio::fs::File::create(&spooled.path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {}", e)))?;

    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| AppError::BadRequest(format!("Upload read error: {}", e)))?;
        if spooled.size + data.len() as u64 > max_bytes {
            warn!(filename = %spooled.filename, max_bytes, "Upload exceeds size limit");
            return Err(AppError::BadRequest(INSUFFICIENT_STORAGE_MSG.to_string()));
        }
        file.write_all(&data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write temp file: {}", e)))?;
        spooled.size += data.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write temp file: {}", e)))?;

    Ok(spooled)
}

async fn read_text(field: &mut Field) -> Result<String> {
    let mut buf = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
        if buf.len() + data.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::BadRequest("Form field too large".to_string()));
        }
        buf.extend_from_slice(&data);
    }
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

/// Upload a video into a user's gallery
/// POST /videos/add/{user_id}
pub async fn add_video(
    gallery: web::Data<GalleryService>,
    user_id: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let mut video: Option<SpooledUpload> = None;
    let mut metadata = VideoMetadata::default();

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "video" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                video = Some(spool_field(&mut field, filename, gallery.max_upload_bytes()).await?);
            }
            "title" => metadata.title = Some(read_text(&mut field).await?),
            "description" => metadata.description = Some(read_text(&mut field).await?),
            "thumbnail" => metadata.thumbnail = Some(read_text(&mut field).await?),
            "duration" => {
                let raw = read_text(&mut field).await?;
                metadata.duration = Some(raw.parse().map_err(|_| {
                    AppError::BadRequest(format!("Invalid duration: {}", raw))
                })?);
            }
            "eventId" => {
                let event_id = read_text(&mut field).await?;
                if !event_id.is_empty() {
                    metadata.event_id = Some(event_id);
                }
            }
            _ => {
                // Drain unknown parts
                while field.next().await.is_some() {}
            }
        }
    }

    let video = video.ok_or_else(|| AppError::BadRequest("No video file uploaded".to_string()))?;

    let (record, gallery) = gallery
        .upload_video(
            &user_id,
            UploadedFile {
                filename: &video.filename,
                local_path: &video.path,
                size: video.size,
            },
            metadata,
        )
        .await?;

    Ok(HttpResponse::Created().json(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        video: record,
        gallery,
    }))
}

/// Delete a video
/// DELETE /videos/{user_id}/{video_id}
pub async fn delete_video(
    gallery: web::Data<GalleryService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, video_id) = path.into_inner();
    let updated = gallery.delete_video(&user_id, &video_id).await?;

    Ok(HttpResponse::Ok().json(DeleteResponse {
        message: "Video deleted successfully".to_string(),
        gallery: updated,
    }))
}

/// Get a user's gallery
/// GET /videos/{user_id}
pub async fn get_gallery(
    gallery: web::Data<GalleryService>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(gallery.get_gallery(&user_id).await?))
}

/// Get one video
/// GET /videos/{user_id}/{video_id}
pub async fn get_video(
    gallery: web::Data<GalleryService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (user_id, video_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(gallery.get_video(&user_id, &video_id).await?))
}
