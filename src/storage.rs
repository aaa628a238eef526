//! Local storage for uploaded resource files.

use std::path::{Component, Path, PathBuf};

use rocket::fs::TempFile;
use rocket::http::{ContentType, Status};

use crate::resp::problem::Problem;
use crate::util;

/// Public URL prefix under which stored uploads are served.
pub static UPLOAD_URL_PREFIX: &str = "/uploads/";

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_size: u64,
}

/// File extension for an accepted upload content type.
pub fn allowed_extension(content_type: Option<&ContentType>) -> Result<&'static str, Problem> {
    let extension = content_type.and_then(|ct| {
        if ct.top() == "application" && ct.sub() == "pdf" {
            Some("pdf")
        } else if ct.top() == "image" && ct.sub() == "jpeg" {
            Some("jpg")
        } else if ct.top() == "image" && ct.sub() == "png" {
            Some("png")
        } else {
            None
        }
    });

    extension.ok_or_else(|| {
        Problem::new_untyped(Status::BadRequest, "Invalid file type.")
            .detail("Only PDF and images are allowed.")
            .insert_str(
                "contentType",
                content_type.map(|ct| ct.to_string()).unwrap_or_default(),
            )
            .to_owned()
    })
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_size: u64) -> UploadStore {
        UploadStore {
            dir: dir.into(),
            max_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Moves an accepted upload into the store and returns its public URL.
    pub async fn store(&self, file: &mut TempFile<'_>) -> Result<String, Problem> {
        let extension = allowed_extension(file.content_type())?;

        if file.len() > self.max_size {
            return Err(
                Problem::new_untyped(Status::PayloadTooLarge, "File too large.")
                    .detail(format!("Uploads are limited to {} bytes.", self.max_size))
                    .to_owned(),
            );
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let name = util::unique_file_name(extension);
        file.move_copy_to(self.dir.join(&name)).await?;
        tracing::info!("stored upload {} ({} bytes)", name, file.len());

        Ok(format!("{}{}", UPLOAD_URL_PREFIX, name))
    }

    /// Path of a stored upload for its public URL. `None` for external links
    /// and anything that would resolve outside the upload directory.
    pub fn local_path(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOAD_URL_PREFIX)?;
        let mut components = Path::new(name).components();

        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.dir.join(file)),
            _ => None,
        }
    }

    /// Best-effort removal; a missing file is not an error.
    pub async fn remove(&self, url: &str) -> bool {
        let path = match self.local_path(url) {
            Some(it) => it,
            None => return false,
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("removed stored upload {}", path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("stored upload {} already gone", path.display());
                false
            }
            Err(e) => {
                tracing::warn!("unable to remove stored upload {}: {}", path.display(), e);
                false
            }
        }
    }
}
