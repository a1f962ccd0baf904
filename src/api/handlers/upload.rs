use crate::api::error::AppError;
use crate::services::ingestion::trigger_ingestion;
use crate::utils::keys::derive_storage_key;
use axum::{Json, extract::Multipart, extract::State};
use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub key: String,
    pub location: String,
    pub bucket: String,
}

struct FilePart {
    file_name: String,
    content_type: String,
    data: Bytes,
}

/// Accepts a single multipart file transfer, persists it in the object store
/// and hands the stored document off to the ingestion pipeline.
///
/// The ingestion trigger is best-effort: once the store write succeeded, the
/// response reports success no matter what the trigger did.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = Multipart, description = "A `file` part plus an optional explicit `key` part"),
    responses(
        (status = 200, description = "Document stored", body = UploadResponse),
        (status = 400, description = "No file part in the request"),
        (status = 500, description = "Object store write failed")
    )
)]
pub async fn upload_document(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file: Option<FilePart> = None;
    let mut explicit_key: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let file_name = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field
                .content_type()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM.as_ref())
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;

            file = Some(FilePart {
                file_name,
                content_type,
                data,
            });
        } else if name == "key" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            if !text.is_empty() {
                explicit_key = Some(text);
            }
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    // Explicit key wins; otherwise derive from the file name and wall clock.
    let key = explicit_key
        .unwrap_or_else(|| derive_storage_key(&file.file_name, Utc::now().timestamp_millis()));

    let stored = state
        .store
        .put_object(&key, file.data, &file.content_type)
        .await
        .map_err(|e| AppError::Storage(format!("{:#}", e)))?;

    tracing::info!(
        "📄 Stored {} ({} bytes) as {}",
        file.file_name,
        stored.size,
        stored.key
    );

    // Fire-and-forget handoff; failure is recorded inside and never surfaces.
    trigger_ingestion(state.notifier.as_ref(), &stored, &file.file_name).await;

    Ok(Json(UploadResponse {
        success: true,
        key: stored.key,
        location: stored.location,
        bucket: stored.bucket,
    }))
}
