use axum::{Json, extract::{Multipart, State}};

use intervue_services::transcribe::{TranscribeError, transcript_is_valid};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

/// Accepts an audio blob and returns its transcript. The client then sends
/// the transcript over the session stream as a `voice_approach` message.
pub async fn transcribe_audio(
    State(state): State<AppState>,
    _auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let transcriber = state
        .transcriber
        .as_ref()
        .ok_or_else(|| ApiError::Internal("Transcription capability not configured".to_string()))?;

    let mut audio: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .unwrap_or("audio/wav")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
            audio = Some((bytes.to_vec(), content_type));
        }
    }

    let (bytes, content_type) =
        audio.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    let transcript = transcriber
        .transcribe(bytes, &content_type)
        .await
        .map_err(|e| match e {
            TranscribeError::InvalidAudio(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        })?;

    if !transcript_is_valid(&transcript) {
        return Err(ApiError::BadRequest(
            "Could not understand the recording. Please repeat more clearly.".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({ "transcript": transcript })))
}
