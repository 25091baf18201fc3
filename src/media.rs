use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::path::Path;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MEDIA_URL: &str = "/media";
const RECIPE_DIR: &str = "recipes";

#[derive(Debug, PartialEq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Parse a `data:image/<kind>;base64,<payload>` field.
pub fn decode_image(data: &str) -> AppResult<DecodedImage> {
    let invalid = || AppError::BadRequest("image must be a base64 data URI".into());

    let rest = data.trim().strip_prefix("data:image/").ok_or_else(invalid)?;
    let (kind, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let extension = match kind.to_ascii_lowercase().as_str() {
        "png" => "png",
        "jpeg" | "jpg" => "jpg",
        "gif" => "gif",
        "webp" => "webp",
        other => {
            return Err(AppError::BadRequest(format!(
                "unsupported image type: {other}"
            )));
        }
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::BadRequest("image payload is not valid base64".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("image payload is empty".into()));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Decode and write a recipe image under `media_root`, returning its public path.
pub async fn save_recipe_image(media_root: &str, data: &str) -> AppResult<String> {
    let image = decode_image(data)?;
    let dir = Path::new(media_root).join(RECIPE_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let filename = format!("{}.{}", Uuid::new_v4(), image.extension);
    tokio::fs::write(dir.join(&filename), &image.bytes)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    tracing::debug!(file = %filename, size = image.bytes.len(), "stored recipe image");
    Ok(format!("{MEDIA_URL}/{RECIPE_DIR}/{filename}"))
}

/// Remove a stored image; missing files are ignored.
pub async fn remove_recipe_image(media_root: &str, public_path: &str) {
    let Some(relative) = public_path.strip_prefix(&format!("{MEDIA_URL}/")) else {
        return;
    };
    let path = Path::new(media_root).join(relative);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %err, path = %path.display(), "failed to remove image");
        }
    }
}
