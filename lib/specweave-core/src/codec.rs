//! YAML and JSON encoding of document trees.
//!
//! Decoding accepts an optional [`Format`] hint. Without a hint the content is sniffed:
//! text starting with `{` or `[` is tried as JSON first and falls back to YAML,
//! anything else is decoded as YAML (a superset of JSON).
//!
//! Encoding is deterministic: mapping keys are written in insertion order,
//! JSON is pretty-printed and YAML uses block style.

use std::fmt::Display;
use std::path::Path;

use tracing::debug;

use crate::BundleError;
use crate::document::Node;

/// A serialization format for documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Format {
    /// YAML, block style.
    #[display("YAML")]
    Yaml,
    /// JSON, pretty-printed.
    #[display("JSON")]
    Json,
}

impl Format {
    /// Infers the format from a file extension (`.yaml`, `.yml`, `.json`).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        Self::from_extension(ext)
    }

    /// Infers the format from an extension without the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Some(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    /// Infers the format from an HTTP media type.
    ///
    /// `application/json` and `+json` suffixes are JSON, any `yaml` subtype is YAML.
    pub fn from_media_type(media_type: &mime::Mime) -> Option<Self> {
        if media_type.subtype() == mime::JSON || media_type.suffix() == Some(mime::JSON) {
            Some(Self::Json)
        } else if media_type.subtype().as_str().contains("yaml")
            || media_type.suffix().is_some_and(|suffix| suffix.as_str() == "yaml")
        {
            Some(Self::Yaml)
        } else {
            None
        }
    }

    /// The conventional file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// Decodes bytes into a document.
///
/// `location` only appears in error messages.
///
/// # Errors
///
/// Returns [`BundleError::Parse`] if the bytes are not UTF-8 or not valid for the format.
pub fn decode(bytes: &[u8], hint: Option<Format>, location: impl Display) -> Result<Node, BundleError> {
    let parse_error = |reason: String| BundleError::Parse {
        location: location.to_string(),
        reason,
    };

    let text = std::str::from_utf8(bytes).map_err(|err| parse_error(err.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    match hint {
        Some(Format::Json) => decode_json(text).map_err(parse_error),
        Some(Format::Yaml) => decode_yaml(text).map_err(parse_error),
        None => {
            if looks_like_json(text) {
                match decode_json(text) {
                    Ok(node) => return Ok(node),
                    Err(reason) => debug!(%reason, "not JSON, falling back to YAML"),
                }
            }
            decode_yaml(text).map_err(parse_error)
        }
    }
}

/// Guesses the format of raw content: JSON when it opens an object or an array.
pub fn sniff(bytes: &[u8]) -> Format {
    let text = String::from_utf8_lossy(bytes);
    if looks_like_json(text.strip_prefix('\u{feff}').unwrap_or(&text)) {
        Format::Json
    } else {
        Format::Yaml
    }
}

fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

/// Encodes a document in the given format.
///
/// # Errors
///
/// Returns [`BundleError::Marshal`] if the encoder rejects the document.
pub fn encode(node: &Node, format: Format) -> Result<Vec<u8>, BundleError> {
    let marshal_error = |reason: String| BundleError::Marshal {
        format: match format {
            Format::Yaml => "YAML",
            Format::Json => "JSON",
        },
        reason,
    };

    match format {
        Format::Json => {
            let mut bytes =
                serde_json::to_vec_pretty(node).map_err(|err| marshal_error(err.to_string()))?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        Format::Yaml => serde_saphyr::to_string(node)
            .map(String::into_bytes)
            .map_err(|err| marshal_error(format!("{err:#?}"))),
    }
}

fn decode_json(text: &str) -> Result<Node, String> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let node: Node = serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();
        if path == "." {
            inner.to_string()
        } else {
            format!("{inner} (at '{path}')")
        }
    })?;
    deserializer.end().map_err(|err| err.to_string())?;
    Ok(node)
}

fn decode_yaml(text: &str) -> Result<Node, String> {
    if text.trim().is_empty() {
        return Ok(Node::default());
    }
    serde_saphyr::from_str::<Node>(text).map_err(|err| err.to_string())
}
