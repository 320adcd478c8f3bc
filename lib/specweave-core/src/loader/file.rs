use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::warn;

use super::{Fetched, LoadLimits, SourceLoader};
use crate::{BundleError, Cancellation, Source};

/// Loads local files.
///
/// Paths are canonicalized (symlinks included) and must stay below the allowed root when
/// one is configured. The size is checked from the metadata and again while reading.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    limits: LoadLimits,
}

impl FileLoader {
    /// Creates a file loader with the given limits.
    pub fn new(limits: LoadLimits) -> Self {
        Self { limits }
    }

    async fn read(&self, path: &Path) -> Result<Fetched, BundleError> {
        let location = path.display().to_string();

        let canonical = fs::canonicalize(path)
            .await
            .map_err(|err| io_error(err, &location))?;

        if let Some(root) = &self.limits.allowed_root {
            let root = canonical_root(root).await;
            if !canonical.starts_with(&root) {
                warn!(path = %canonical.display(), root = %root.display(), "path escapes the allowed root");
                return Err(BundleError::AccessDenied { location, root });
            }
        }

        let metadata = fs::metadata(&canonical)
            .await
            .map_err(|err| io_error(err, &location))?;
        if !metadata.is_file() {
            return Err(BundleError::InvalidSource {
                input: location,
                reason: "not a regular file".to_string(),
            });
        }
        if self.limits.exceeds(metadata.len()) {
            return Err(self.too_large(location));
        }

        let file = fs::File::open(&canonical)
            .await
            .map_err(|err| io_error(err, &location))?;
        let mut bytes = Vec::new();
        if self.limits.max_file_size > 0 {
            // the file may grow between metadata and read
            file.take(self.limits.max_file_size + 1)
                .read_to_end(&mut bytes)
                .await?;
            if self.limits.exceeds(bytes.len() as u64) {
                return Err(self.too_large(location));
            }
        } else {
            let mut file = file;
            file.read_to_end(&mut bytes).await?;
        }

        Ok(Fetched::new(bytes))
    }

    fn too_large(&self, location: String) -> BundleError {
        BundleError::TooLarge {
            location,
            limit: self.limits.max_file_size,
        }
    }
}

impl SourceLoader for FileLoader {
    async fn load(&self, source: &Source, cancellation: &Cancellation) -> Result<Fetched, BundleError> {
        cancellation.check()?;
        let Source::File(path) = source else {
            return Err(BundleError::InvalidSource {
                input: source.to_string(),
                reason: "not a local file".to_string(),
            });
        };

        tokio::select! {
            biased;
            () = cancellation.cancelled() => Err(BundleError::Cancelled),
            result = self.read(path) => result,
        }
    }
}

async fn canonical_root(root: &Path) -> PathBuf {
    fs::canonicalize(root)
        .await
        .unwrap_or_else(|_| root.to_path_buf())
}

fn io_error(error: io::Error, location: &str) -> BundleError {
    match error.kind() {
        io::ErrorKind::NotFound => BundleError::NotFound {
            location: location.to_string(),
        },
        _ => BundleError::Io(error),
    }
}
