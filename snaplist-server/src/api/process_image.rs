//! POST /process-image
//!
//! Accepts a multipart upload with an `image` field and returns the songs the
//! vision backend recognized in it.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use snaplist_common::{AuthContext, SongCandidate};
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

const NO_SONGS_MESSAGE: &str = "No valid songs found in the image";

/// Recognition response
#[derive(Debug, Serialize)]
pub struct ProcessImageResponse {
    pub success: bool,
    pub songs: Vec<SongCandidate>,
}

/// Determine the image MIME type
///
/// The declared content type wins when it names an image. A missing or
/// generic declaration falls back to sniffing magic bytes. Anything that is
/// not an image yields `None`.
pub fn resolve_image_mime(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    match declared.map(str::trim).filter(|d| !d.is_empty()) {
        Some(declared) if declared.starts_with("image/") => Some(declared.to_string()),
        Some(declared) if declared != "application/octet-stream" => None,
        _ => infer::get(bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.mime_type().to_string()),
    }
}

fn multipart_error(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::BadRequest(message)
    }
}

/// Pull the `image` field out of the upload
async fn read_image_field(mut multipart: Multipart) -> ApiResult<Option<(Vec<u8>, Option<String>)>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), e.body_text()))?;

        return Ok(Some((bytes.to_vec(), content_type)));
    }

    Ok(None)
}

/// POST /process-image
pub async fn process_image(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProcessImageResponse>> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (bytes, declared) = read_image_field(multipart)
        .await?
        .filter(|(bytes, _)| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No image provided".to_string()))?;

    if bytes.len() > state.max_image_bytes {
        warn!(bytes = bytes.len(), limit = state.max_image_bytes, "Image over size limit");
        return Err(ApiError::PayloadTooLarge(format!(
            "Image exceeds {} bytes",
            state.max_image_bytes
        )));
    }

    let mime_type = resolve_image_mime(declared.as_deref(), &bytes).ok_or_else(|| {
        warn!(declared = ?declared, "Upload is not an image");
        ApiError::BadRequest("Uploaded file is not an image".to_string())
    })?;

    info!(bytes = bytes.len(), mime_type = %mime_type, "Processing image");

    let songs = match state.extractor.extract(&bytes, &mime_type).await {
        Ok(songs) => songs,
        Err(e) if e.is_content_blocked() => {
            warn!(error = %e, "Vision backend refused the image");
            return Err(ApiError::BadRequest(NO_SONGS_MESSAGE.to_string()));
        }
        Err(e) => {
            error!(error = %e, "Image recognition failed");
            return Err(ApiError::internal(
                "Failed to process image",
                &e,
                state.expose_error_details(),
            ));
        }
    };

    if songs.is_empty() {
        return Err(ApiError::BadRequest(NO_SONGS_MESSAGE.to_string()));
    }

    Ok(Json(ProcessImageResponse {
        success: true,
        songs,
    }))
}
