use axum::{Json, extract::{Multipart, State}};
use tracing::info;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

/// Accepts a resume upload, extracts its text and hands back a `resume_id`
/// the client references in its `init` message.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
            file_bytes = Some(bytes.to_vec());
        }
    }

    let bytes = file_bytes
        .ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let text = state.text_extractor.extract_text(&bytes)?;
    let resume_id = state.resumes.insert(text);

    info!(user_id = %auth.user_id, %resume_id, "Resume uploaded");
    Ok(Json(serde_json::json!({ "resume_id": resume_id })))
}
