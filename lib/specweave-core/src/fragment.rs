//! Path-segment fragments (the part of a reference after `#`).
//!
//! A fragment is empty (the whole document) or a `/`-separated list of segments starting
//! with `/`. Each segment is percent-decoded, then unescaped like a JSON pointer
//! (`~1` is `/`, `~0` is `~`), and names a mapping key or a sequence index.

use std::fmt;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::BundleError;
use crate::document::Node;

/// Characters escaped when rendering a fragment inside a reference.
const FRAGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`');

/// A decoded fragment: the list of segments to follow from a document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fragment {
    segments: Vec<String>,
}

impl Fragment {
    /// The empty fragment, designating the whole document.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a fragment from already-decoded segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a raw fragment (without the leading `#`).
    ///
    /// `""` and `"/"` both designate the whole document.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidReference`] if the fragment does not start with `/`
    /// or a segment is not valid percent-encoded UTF-8.
    pub fn parse(raw: &str) -> Result<Self, BundleError> {
        if raw.is_empty() || raw == "/" {
            return Ok(Self::root());
        }
        let Some(rest) = raw.strip_prefix('/') else {
            return Err(BundleError::invalid_reference(
                format!("#{raw}"),
                "fragment must be empty or start with '/'",
            ));
        };

        let segments = rest
            .split('/')
            .map(|segment| {
                percent_decode_str(segment)
                    .decode_utf8()
                    .map(|decoded| decoded.replace("~1", "/").replace("~0", "~"))
                    .map_err(|err| {
                        BundleError::invalid_reference(format!("#{raw}"), format!("segment '{segment}': {err}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    /// Returns `true` for the fragment designating the whole document.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The decoded segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last decoded segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns a new fragment with `segment` appended.
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// Renders this fragment as a same-document pointer target (`#/a/b`).
    pub fn to_pointer(&self) -> String {
        format!("#{self}")
    }

    /// Navigates `node` along this fragment.
    ///
    /// The returned node borrows from `node`: clone it before moving it elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidReference`] when a key is missing, an index is not a
    /// non-negative integer or is out of bounds, or the path goes through a scalar.
    pub fn extract<'a>(&self, node: &'a Node) -> Result<&'a Node, BundleError> {
        let mut current = node;
        for (depth, segment) in self.segments.iter().enumerate() {
            let fail = |reason: String| {
                let at = Self::from_segments(self.segments.iter().take(depth + 1).cloned());
                BundleError::invalid_reference(self.to_pointer(), format!("{reason} at '{}'", at.to_pointer()))
            };

            current = match current {
                Node::Mapping(mapping) => mapping
                    .get(segment)
                    .ok_or_else(|| fail(format!("key '{segment}' not found")))?,
                Node::Sequence(items) => {
                    let index = parse_index(segment)
                        .ok_or_else(|| fail(format!("'{segment}' is not a sequence index")))?;
                    items.get(index).ok_or_else(|| {
                        fail(format!("index {index} out of bounds (length {})", items.len()))
                    })?
                }
                Node::Scalar(_) => return Err(fail("cannot descend into a scalar".to_string())),
            };
        }
        Ok(current)
    }
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            let escaped = segment.replace('~', "~0").replace('/', "~1");
            write!(f, "/{}", utf8_percent_encode(&escaped, FRAGMENT_ENCODE_SET))?;
        }
        Ok(())
    }
}
