use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{error::VhsError, structs::ImageFile};

/// Encodes an image as a `data:` URL suitable for a local preview.
///
/// Encoding a 10MB radiograph is not free, so it runs on the blocking pool.
pub async fn create_preview(file: &ImageFile) -> Result<String, VhsError> {
    let mime = file.mime.clone();
    let data = file.data.clone();
    tokio::task::spawn_blocking(move || to_data_url(&mime, &data))
        .await
        .map_err(|e| VhsError::Preview(format!("Could not create the preview: {}", e)))
}

/// Reads an image from disk and encodes it, see [create_preview].
pub async fn create_preview_from_path(path: impl AsRef<Path>) -> Result<String, VhsError> {
    let path = path.as_ref();
    let file = ImageFile::open(path).await.map_err(|e| {
        VhsError::Preview(format!("Error while reading {}: {}", path.display(), e))
    })?;
    create_preview(&file).await
}

pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Splits a base64 `data:` URL into its MIME type and decoded payload.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), VhsError> {
    let invalid = || VhsError::Preview("Invalid data URL".to_string());

    let rest = url.strip_prefix("data:").ok_or_else(invalid)?;
    let (mime, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let data = STANDARD.decode(payload).map_err(|_| invalid())?;

    Ok((mime.to_string(), data))
}
