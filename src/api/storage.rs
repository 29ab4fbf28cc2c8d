//! Photo upload to object storage
//!
//! Binary objects land under `chat_photos/<filename>`. Uploading the same
//! filename twice overwrites the earlier object; there is no collision
//! handling.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::client::ChatClient;

const STORAGE_BASE: &str = "https://firebasestorage.googleapis.com/v0/b";

/// Folder for chat photo objects.
pub const CHAT_PHOTOS_PREFIX: &str = "chat_photos";

/// Upload metadata returned by the storage endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "downloadTokens")]
    download_tokens: Option<String>,
}

/// Content type from the file extension. JPEG is the expected case; other
/// image types are tolerated.
fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/jpeg"
    }
}

fn encode_object_name(object: &str) -> String {
    url::form_urlencoded::byte_serialize(object.as_bytes()).collect()
}

/// Upload a local image file and return its public download URL.
pub async fn upload_photo(client: &ChatClient, path: &Path) -> Result<String> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Photo path has no filename")?
        .to_string();

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read photo file {}", path.display()))?;

    let bucket = client.config().storage_bucket()?.to_string();
    let object = format!("{}/{}", CHAT_PHOTOS_PREFIX, filename);
    let encoded = encode_object_name(&object);

    let upload_url = format!("{}/{}/o?name={}&uploadType=media", STORAGE_BASE, bucket, encoded);
    tracing::info!("Uploading {} ({} bytes)", object, bytes.len());

    let resp = client
        .storage_post(&upload_url, content_type_for(&filename), bytes)
        .await?;
    let meta: UploadResponse = resp.json().await.context("Failed to parse upload response")?;

    let mut download_url = format!("{}/{}/o/{}?alt=media", STORAGE_BASE, bucket, encoded);
    if let Some(token) = meta.download_tokens {
        // downloadTokens may hold several comma-separated tokens; any works.
        let token = token.split(',').next().unwrap_or(&token);
        download_url.push_str("&token=");
        download_url.push_str(token);
    }

    Ok(download_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_name_is_percent_encoded() {
        assert_eq!(
            encode_object_name("chat_photos/pic.jpg"),
            "chat_photos%2Fpic.jpg"
        );
    }

    #[test]
    fn content_type_defaults_to_jpeg() {
        assert_eq!(content_type_for("photo.jpg"), "image/jpeg");
        assert_eq!(content_type_for("photo.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("photo.png"), "image/png");
        assert_eq!(content_type_for("photo"), "image/jpeg");
    }
}
