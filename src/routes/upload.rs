use axum::extract::Multipart;
use axum::{Json, extract::State, http::StatusCode};

use crate::analysis::analyze_uploads;
use crate::error::AppResult;
use crate::models::{AnalyzedImage, AppState, UploadedFile};

/// Multipart field names accepted as image files. `files[]` is what an HTML
/// `<input type="file" name="files[]" multiple>` sends.
const FILE_FIELDS: [&str; 3] = ["files[]", "files", "file"];

/// `POST /upload`: stage every image and describe it.
///
/// Parts with an empty filename (an empty file input) are skipped, so a form
/// submitted without a selection yields an empty list.
///
/// # Errors
///
/// 400 if no file part was sent or the multipart body is broken, 502 if the
/// description service fails for any image.
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<AnalyzedImage>>> {
    let mut files: Vec<UploadedFile> = Vec::new();
    let mut saw_file_field = false;

    while let Some(field) = multipart.next_field().await? {
        if !field.name().is_some_and(|n| FILE_FIELDS.contains(&n)) {
            continue;
        }
        saw_file_field = true;

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(ToString::to_string);
        let bytes = field.bytes().await?;

        files.push(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if !saw_file_field {
        return Err((StatusCode::BAD_REQUEST, "no files[] part in upload".to_string()).into());
    }

    tracing::info!(files = files.len(), "upload received");
    let analyzed = analyze_uploads(&state.describer, &state.staging, files).await?;
    Ok(Json(analyzed))
}
