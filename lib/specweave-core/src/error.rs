use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while bundling a multi-file API description.
///
/// Every variant carries enough context (offending source, reference, chain of targets)
/// to render an actionable message. Use [`BundleError::kind`] to match on the error kind
/// without destructuring the payload.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum BundleError {
    /// The requested source does not exist.
    #[display("Source not found: {location}")]
    #[from(skip)]
    NotFound {
        /// The canonical source that was requested.
        location: String,
    },

    /// The requested local source escapes the allowed root directory.
    #[display("Access denied to '{location}': outside of '{}'", root.display())]
    #[from(skip)]
    AccessDenied {
        /// The canonical source that was requested.
        location: String,
        /// The allowed root directory.
        root: PathBuf,
    },

    /// The source exceeds the configured maximum size.
    #[display("Source '{location}' exceeds the maximum size of {limit} bytes")]
    #[from(skip)]
    TooLarge {
        /// The source being loaded.
        location: String,
        /// The configured limit in bytes.
        limit: u64,
    },

    /// Fetching a remote source took longer than the configured timeout.
    #[display("Fetching '{location}' timed out after {timeout:?}")]
    #[from(skip)]
    Timeout {
        /// The remote source.
        location: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// Fetching a remote source failed (transport error or non-2xx status).
    #[display("Failed to fetch '{location}': {reason}")]
    #[from(skip)]
    FetchError {
        /// The remote source.
        location: String,
        /// Description of the failure.
        reason: String,
    },

    /// The bundling run was cancelled.
    #[display("Bundling cancelled")]
    #[from(skip)]
    Cancelled,

    /// A source could not be decoded as YAML or JSON.
    #[display("Failed to parse '{location}': {reason}")]
    #[from(skip)]
    Parse {
        /// The source being decoded.
        location: String,
        /// The decoder error message.
        reason: String,
    },

    /// The bundled document could not be encoded.
    #[display("Failed to encode document as {format}: {reason}")]
    #[from(skip)]
    Marshal {
        /// The target format name.
        format: &'static str,
        /// The encoder error message.
        reason: String,
    },

    /// A reference (or its fragment) cannot be resolved within its document.
    #[display("Invalid reference '{reference}': {reason}")]
    #[from(skip)]
    InvalidReference {
        /// The reference as written, or the fragment being navigated.
        reference: String,
        /// Why the reference is invalid.
        reason: String,
    },

    /// A chain of references loops back to a document still being resolved.
    #[display("Circular reference: {}", chain.join(" -> "))]
    #[from(skip)]
    CircularReference {
        /// Targets from the root document to the repeated one.
        chain: Vec<String>,
    },

    /// The chain of external references is deeper than allowed.
    #[display("Maximum reference depth of {max_depth} exceeded while resolving '{target}'")]
    #[from(skip)]
    MaxDepthExceeded {
        /// The configured maximum depth.
        max_depth: usize,
        /// The target that would exceed it.
        target: String,
    },

    /// The bundled output was rejected by the validator.
    #[display("Validation failed:\n  - {}", errors.join("\n  - "))]
    #[from(skip)]
    ValidationFailed {
        /// Messages reported by the validator.
        errors: Vec<String>,
    },

    /// I/O error while writing the output.
    Io(std::io::Error),

    /// The input or a reference names something that is neither a path nor a URL.
    #[display("Invalid source '{input}': {reason}")]
    #[from(skip)]
    InvalidSource {
        /// The source as written.
        input: String,
        /// Why it cannot be used.
        reason: String,
    },

    /// Input and output designate the same file.
    #[display("Input and output are the same file: {}", path.display())]
    #[from(skip)]
    SameInputOutput {
        /// The shared path.
        path: PathBuf,
    },
}

/// Fieldless discriminant of a [`BundleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`BundleError::NotFound`].
    NotFound,
    /// See [`BundleError::AccessDenied`].
    AccessDenied,
    /// See [`BundleError::TooLarge`].
    TooLarge,
    /// See [`BundleError::Timeout`].
    Timeout,
    /// See [`BundleError::FetchError`].
    FetchError,
    /// See [`BundleError::Cancelled`].
    Cancelled,
    /// See [`BundleError::Parse`].
    Parse,
    /// See [`BundleError::Marshal`].
    Marshal,
    /// See [`BundleError::InvalidReference`].
    InvalidReference,
    /// See [`BundleError::CircularReference`].
    CircularReference,
    /// See [`BundleError::MaxDepthExceeded`].
    MaxDepthExceeded,
    /// See [`BundleError::ValidationFailed`].
    ValidationFailed,
    /// See [`BundleError::Io`].
    Io,
    /// See [`BundleError::InvalidSource`].
    InvalidSource,
    /// See [`BundleError::SameInputOutput`].
    SameInputOutput,
}

impl BundleError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::FetchError { .. } => ErrorKind::FetchError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Marshal { .. } => ErrorKind::Marshal,
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::CircularReference { .. } => ErrorKind::CircularReference,
            Self::MaxDepthExceeded { .. } => ErrorKind::MaxDepthExceeded,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidSource { .. } => ErrorKind::InvalidSource,
            Self::SameInputOutput { .. } => ErrorKind::SameInputOutput,
        }
    }

    pub(crate) fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}
