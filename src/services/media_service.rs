use base64::{Engine, engine::general_purpose::STANDARD};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const RECIPE_IMAGE_DIR: &str = "recipes";

/// A decoded `data:image/<type>;base64,<payload>` upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub mime_type: String,
    pub extension: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ImagePayloadError {
    #[error("Image must be a data URI of the form data:image/<type>;base64,<data>.")]
    NotDataUri,
    #[error("Unsupported image type: {0}.")]
    UnsupportedType(String),
    #[error("Image payload is not valid base64.")]
    InvalidBase64,
    #[error("Image payload is empty.")]
    Empty,
}

pub fn parse_image_data_uri(raw: &str) -> Result<ImageUpload, ImagePayloadError> {
    let rest = raw
        .trim()
        .strip_prefix("data:")
        .ok_or(ImagePayloadError::NotDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(ImagePayloadError::NotDataUri)?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or(ImagePayloadError::NotDataUri)?
        .to_ascii_lowercase();

    if !mime_type.starts_with("image/") {
        return Err(ImagePayloadError::UnsupportedType(mime_type));
    }
    let extension = match mime_guess::get_mime_extensions_str(&mime_type)
        .and_then(|exts| exts.first())
    {
        // mime_guess lists "jpe" first for image/jpeg.
        Some(_) if mime_type == "image/jpeg" => "jpg".to_string(),
        Some(ext) => (*ext).to_string(),
        None => return Err(ImagePayloadError::UnsupportedType(mime_type)),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| ImagePayloadError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(ImagePayloadError::Empty);
    }

    Ok(ImageUpload {
        mime_type,
        extension,
        bytes,
    })
}

/// Files under `root` are served at `base_url`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    base_url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image under a fresh name and returns its path relative to the media root.
    pub async fn save_recipe_image(&self, upload: &ImageUpload) -> std::io::Result<String> {
        let dir = self.root.join(RECIPE_IMAGE_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), upload.extension);
        tokio::fs::write(dir.join(&file_name), &upload.bytes).await?;
        let relative = format!("{RECIPE_IMAGE_DIR}/{file_name}");
        info!(path = %relative, size = upload.bytes.len(), "Stored recipe image.");
        Ok(relative)
    }

    /// Best effort; a missing file is not an error.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || relative.contains("..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %relative, error = %e, "Failed to remove media file.");
            }
        }
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!("{}{}", self.base_url, relative.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIF: &str = "data:image/gif;base64,R0lGODlhAgABAIAAAAAAAP///yH5BAAAAAAALAAAAAACAAEAAAICDAoAOw==";

    #[test]
    fn test_parse_gif_data_uri() {
        let upload = parse_image_data_uri(GIF).unwrap();
        assert_eq!(upload.mime_type, "image/gif");
        assert_eq!(upload.extension, "gif");
        assert_eq!(&upload.bytes[..6], b"GIF89a");
    }

    #[test]
    fn test_jpeg_gets_jpg_extension() {
        let upload = parse_image_data_uri("data:image/jpeg;base64,/9j/4AAQ").unwrap();
        assert_eq!(upload.extension, "jpg");
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert_eq!(
            parse_image_data_uri("R0lGODlhAgABAIAAAAAAAP"),
            Err(ImagePayloadError::NotDataUri)
        );
        assert_eq!(
            parse_image_data_uri("data:text/plain;base64,aGVsbG8="),
            Err(ImagePayloadError::UnsupportedType("text/plain".to_string()))
        );
        assert_eq!(
            parse_image_data_uri("data:image/png;base64,***"),
            Err(ImagePayloadError::InvalidBase64)
        );
        assert_eq!(
            parse_image_data_uri("data:image/png;base64,"),
            Err(ImagePayloadError::Empty)
        );
    }

    #[test]
    fn test_url_for_joins_base_url() {
        let store = MediaStore::new("/tmp/media", "/media");
        assert_eq!(store.url_for("recipes/a.gif"), "/media/recipes/a.gif");
    }

    #[tokio::test]
    async fn test_save_and_remove_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), "/media/");
        let upload = parse_image_data_uri(GIF).unwrap();

        let relative = store.save_recipe_image(&upload).await.unwrap();
        assert!(relative.starts_with("recipes/") && relative.ends_with(".gif"));
        let on_disk = dir.path().join(&relative);
        assert_eq!(std::fs::read(&on_disk).unwrap(), upload.bytes);

        store.remove(&relative).await;
        assert!(!on_disk.exists());
        // Second removal is silently ignored.
        store.remove(&relative).await;
    }
}
