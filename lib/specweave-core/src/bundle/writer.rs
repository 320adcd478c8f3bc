use std::fmt::Debug;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::BundleError;

/// Persists the bundled document.
pub trait Writer: Debug + Send + Sync {
    /// Writes `contents` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::Io`] if the file cannot be written.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), BundleError>;
}

/// Writes to the local filesystem, creating missing parent directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriter;

impl Writer for FsWriter {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), BundleError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        debug!(path = %path.display(), size = contents.len(), "written");
        Ok(())
    }
}
