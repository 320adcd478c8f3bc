//! Fetching raw bytes for a [`Source`].
//!
//! Loaders enforce resource bounds (size, timeout, allowed root) and honor cancellation,
//! but never cache: the resolver caches decoded documents per canonical source.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::{BundleError, Cancellation, Source};

mod file;
pub use self::file::FileLoader;

mod http;
pub use self::http::HttpLoader;

/// Default maximum size of a loaded source: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default timeout of a remote fetch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes loaded from a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    /// The raw content.
    pub bytes: Vec<u8>,
    /// The media type announced by the server, if any.
    pub media_type: Option<mime::Mime>,
}

impl Fetched {
    /// Wraps bytes without a media type.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: None,
        }
    }
}

/// Resource bounds applied while loading sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadLimits {
    /// Maximum size in bytes, `0` for unlimited.
    pub max_file_size: u64,
    /// Timeout of one remote fetch, [`Duration::ZERO`] for none.
    pub timeout: Duration,
    /// Local sources must live below this directory.
    pub allowed_root: Option<PathBuf>,
}

impl Default for LoadLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            allowed_root: None,
        }
    }
}

impl LoadLimits {
    pub(crate) fn exceeds(&self, size: u64) -> bool {
        self.max_file_size > 0 && size > self.max_file_size
    }
}

/// Fetches the raw bytes of a source.
///
/// Implementations must fail with [`BundleError::Cancelled`] when the cancellation fires
/// before or during the fetch, and must not cache results.
///
/// # Example
///
/// ```rust
/// use specweave_core::{BundleError, Cancellation, Source};
/// use specweave_core::loader::{Fetched, SourceLoader};
///
/// struct InMemory;
///
/// impl SourceLoader for InMemory {
///     async fn load(&self, source: &Source, cancellation: &Cancellation) -> Result<Fetched, BundleError> {
///         cancellation.check()?;
///         Ok(Fetched::new(format!("title: {source}")))
///     }
/// }
/// ```
pub trait SourceLoader {
    /// Loads the content of `source`.
    fn load(
        &self,
        source: &Source,
        cancellation: &Cancellation,
    ) -> impl Future<Output = Result<Fetched, BundleError>> + Send;
}

/// Loads local files with [`FileLoader`] and URLs with [`HttpLoader`].
#[derive(Debug, Clone)]
pub struct DefaultLoader {
    file: FileLoader,
    http: HttpLoader,
}

impl DefaultLoader {
    /// Creates a loader applying `limits` to both local and remote sources.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::FetchError`] if the HTTP client cannot be built.
    pub fn new(limits: LoadLimits) -> Result<Self, BundleError> {
        Ok(Self {
            http: HttpLoader::new(limits.clone())?,
            file: FileLoader::new(limits),
        })
    }
}

impl SourceLoader for DefaultLoader {
    async fn load(&self, source: &Source, cancellation: &Cancellation) -> Result<Fetched, BundleError> {
        let fetched = match source {
            Source::File(_) => self.file.load(source, cancellation).await?,
            Source::Url(_) => self.http.load(source, cancellation).await?,
        };
        debug!(%source, size = fetched.bytes.len(), "source loaded");
        Ok(fetched)
    }
}
