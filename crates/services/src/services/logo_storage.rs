//! Association logos on the local disk, served back under `/storage`.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use utils::validation::ValidationErrors;
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "png", "jpg", "gif", "svg"];
pub const MAX_LOGO_BYTES: usize = 2048 * 1024;
const LOGO_DIR: &str = "associations/logos";

#[derive(Debug, Error)]
pub enum LogoStorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct LogoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct LogoStorage {
    root: PathBuf,
    public_prefix: String,
}

impl LogoStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            public_prefix: "/storage".to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Checks type and size, returning the extension the file will be stored with.
    pub fn validate(&self, upload: &LogoUpload) -> Result<&'static str, ValidationErrors> {
        let Some(extension) = detect_extension(upload) else {
            return Err(ValidationErrors::single(
                "logo_url",
                format!(
                    "The logo url field must be a file of type: {}.",
                    ALLOWED_EXTENSIONS.join(", ")
                ),
            ));
        };
        if upload.bytes.len() > MAX_LOGO_BYTES {
            return Err(ValidationErrors::single(
                "logo_url",
                format!(
                    "The logo url field must not be greater than {} kilobytes.",
                    MAX_LOGO_BYTES / 1024
                ),
            ));
        }
        Ok(extension)
    }

    /// Writes the upload under a fresh name and returns its public URL.
    pub async fn store(&self, upload: &LogoUpload) -> Result<String, LogoStorageError> {
        let extension = self.validate(upload)?;
        let relative = format!("{}/{}.{}", LOGO_DIR, Uuid::new_v4(), extension);
        let path = self.root.join(&relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &upload.bytes).await?;
        debug!(path = %path.display(), bytes = upload.bytes.len(), "Stored logo");
        Ok(format!("{}/{}", self.public_prefix, relative))
    }

    /// Removes the file behind `public_url`. URLs outside the logo directory
    /// and files that are already gone are ignored.
    pub async fn delete(&self, public_url: &str) -> Result<(), LogoStorageError> {
        let Some(path) = self.resolve(public_url) else {
            warn!(url = public_url, "Refusing to delete logo outside storage");
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted logo");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, public_url: &str) -> Option<PathBuf> {
        let relative = public_url
            .strip_prefix(&self.public_prefix)?
            .trim_start_matches('/');
        if !relative.starts_with(LOGO_DIR) {
            return None;
        }
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

fn detect_extension(upload: &LogoUpload) -> Option<&'static str> {
    let from_name = upload
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    if let Some(ext) = from_name {
        return ALLOWED_EXTENSIONS.iter().copied().find(|allowed| *allowed == ext);
    }

    let content_type = upload.content_type.as_deref()?;
    let extensions = mime_guess::get_mime_extensions_str(content_type)?;
    ALLOWED_EXTENSIONS
        .iter()
        .copied()
        .find(|allowed| extensions.contains(allowed))
}
