use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{forms::ValidImage, AppResult};

const UPLOAD_DIR: &str = "posts";

/// Uploaded images on the local filesystem, served under `/media/`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image and returns the reference to keep on the post.
    pub async fn store(&self, image: &ValidImage) -> AppResult<String> {
        let reference = format!("{UPLOAD_DIR}/{}.{}", Uuid::now_v7().simple(), image.extension());
        let path = self.root.join(&reference);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &image.bytes).await?;

        tracing::debug!(%reference, bytes = image.bytes.len(), "image stored");
        Ok(reference)
    }

    /// Deletes a stored file. One that is already gone is not an error.
    pub async fn remove(&self, reference: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.root.join(reference)).await {
            Ok(()) => {
                tracing::debug!(%reference, "image removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Like [`remove`](Self::remove) for cleanup paths: failures are only logged.
    pub async fn discard(&self, reference: &str) {
        if let Err(err) = self.remove(reference).await {
            tracing::warn!(%reference, error = ?err, "could not remove image");
        }
    }

    pub fn url(reference: &str) -> String {
        format!("/media/{reference}")
    }
}
