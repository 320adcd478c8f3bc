//! Sources, references and fully-qualified targets.
//!
//! A reference is written `[source]["#" fragment]`. Its source is resolved against the
//! source of the document that contains it: remote URLs are joined, local paths are
//! joined to the containing directory and normalized lexically (`.` and `..` removed),
//! so that two spellings of the same file compare equal.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::BundleError;
use crate::codec::Format;
use crate::fragment::Fragment;

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A local file, as an absolute normalized path.
    File(PathBuf),
    /// A remote document fetched over HTTP(S).
    Url(Url),
}

impl Source {
    /// Parses a user-supplied location: an `http(s)://` URL, a `file://` URL or a path.
    ///
    /// Relative paths are made absolute against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidSource`] if the URL is malformed or the current
    /// directory cannot be read.
    pub fn parse(input: &str) -> Result<Self, BundleError> {
        let invalid = |reason: String| BundleError::InvalidSource {
            input: input.to_string(),
            reason,
        };

        if is_remote(input) {
            let url = Url::parse(input).map_err(|err| invalid(err.to_string()))?;
            return Ok(Self::Url(url));
        }
        if input.starts_with("file://") {
            let url = Url::parse(input).map_err(|err| invalid(err.to_string()))?;
            let path = url
                .to_file_path()
                .map_err(|()| invalid("not a local file URL".to_string()))?;
            return Ok(Self::File(normalize(&path)));
        }

        Self::from_path(Path::new(input))
    }

    /// A local source for `path`, made absolute against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidSource`] if the current directory cannot be read.
    pub fn from_path(path: &Path) -> Result<Self, BundleError> {
        let absolute = std::path::absolute(path).map_err(|err| BundleError::InvalidSource {
            input: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self::File(normalize(&absolute)))
    }

    /// Resolves the source part of a reference written inside this source.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidSource`] if the result is not a valid URL or uses an
    /// unsupported scheme.
    pub fn resolve(&self, reference: &str) -> Result<Self, BundleError> {
        let invalid = |reason: String| BundleError::InvalidSource {
            input: reference.to_string(),
            reason,
        };

        if is_remote(reference) {
            let url = Url::parse(reference).map_err(|err| invalid(err.to_string()))?;
            return Ok(Self::Url(url));
        }

        match self {
            Self::File(path) => {
                if reference.starts_with("file://") {
                    return Self::parse(reference);
                }
                let decoded = percent_decode_str(reference)
                    .decode_utf8()
                    .map_err(|err| invalid(format!("invalid percent-encoded UTF-8: {err}")))?;
                let relative = Path::new(decoded.as_ref());
                let joined = if relative.is_absolute() {
                    relative.to_path_buf()
                } else {
                    path.parent().unwrap_or_else(|| Path::new("/")).join(relative)
                };
                Ok(Self::File(normalize(&joined)))
            }
            Self::Url(base) => {
                let url = base.join(reference).map_err(|err| invalid(err.to_string()))?;
                if is_remote(url.as_str()) {
                    Ok(Self::Url(url))
                } else {
                    Err(invalid(format!(
                        "scheme '{}' is not supported from remote document {base}",
                        url.scheme()
                    )))
                }
            }
        }
    }

    /// The format suggested by the file extension, if any.
    pub fn format_hint(&self) -> Option<Format> {
        match self {
            Self::File(path) => Format::from_path(path),
            Self::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|last| Path::new(last).extension())
                .and_then(|ext| ext.to_str())
                .and_then(Format::from_extension),
        }
    }

    /// The file name without extension, used to name hoisted content.
    pub fn stem(&self) -> Option<String> {
        let stem = match self {
            Self::File(path) => path.file_stem()?.to_str()?.to_string(),
            Self::Url(url) => {
                let last = url.path_segments()?.next_back()?;
                let last = percent_decode_str(last).decode_utf8_lossy();
                Path::new(last.as_ref()).file_stem()?.to_str()?.to_string()
            }
        };
        (!stem.is_empty()).then_some(stem)
    }

    /// The base location used to resolve relative references:
    /// the containing directory, or the URL without its last path segment.
    pub fn base_location(&self) -> String {
        match self {
            Self::File(path) => path
                .parent()
                .map_or_else(|| "/".to_string(), |dir| dir.display().to_string()),
            Self::Url(url) => url
                .join("./")
                .map_or_else(|_| url.to_string(), |base| base.to_string()),
        }
    }

    /// Returns `true` for remote sources.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

fn is_remote(input: &str) -> bool {
    let lower = input.get(..8).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Removes `.` and resolves `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                result.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` above the root stays at the root
                let at_root = !result.pop();
                if at_root && !path.has_root() {
                    result.push("..");
                }
            }
        }
    }
    result
}

/// A reference as written in a document: optional source and a fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    source: Option<String>,
    fragment: Fragment,
}

impl Reference {
    /// Parses `[source]["#" fragment]`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidReference`] if the fragment is malformed.
    pub fn parse(raw: &str) -> Result<Self, BundleError> {
        let (source, fragment) = match raw.split_once('#') {
            Some((source, fragment)) => (source, fragment),
            None => (raw, ""),
        };
        let fragment = Fragment::parse(fragment).map_err(|err| match err {
            BundleError::InvalidReference { reason, .. } => BundleError::invalid_reference(raw, reason),
            other => other,
        })?;
        let source = (!source.trim().is_empty()).then(|| source.trim().to_string());
        Ok(Self { source, fragment })
    }

    /// The source part, `None` for same-document references.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The fragment part.
    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// Returns `true` when the reference has no source part.
    pub fn is_local(&self) -> bool {
        self.source.is_none()
    }
}

/// A fully-qualified reference target: canonical source and fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    /// The canonical source.
    pub source: Source,
    /// The fragment within the source.
    pub fragment: Fragment,
}

impl Target {
    /// Creates a target.
    pub fn new(source: Source, fragment: Fragment) -> Self {
        Self { source, fragment }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fragment.is_root() {
            write!(f, "{}", self.source)
        } else {
            write!(f, "{}#{}", self.source, self.fragment)
        }
    }
}
