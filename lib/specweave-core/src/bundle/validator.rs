use std::fmt::Debug;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::codec::{self, Format};
use crate::document::Node;
use crate::source::Reference;

static OPENAPI_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^3\.\d+\.\d+(-[0-9A-Za-z.-]+)?$").expect("a valid regex"));

/// Checks a written bundle.
pub trait Validator: Debug + Send + Sync {
    /// Validates the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns every problem found, as human readable messages.
    fn validate(&self, path: &Path) -> Result<(), Vec<String>>;
}

/// Structural checks of an OpenAPI 3.x document.
///
/// Verifies the `openapi` version, the mandatory `info` fields, and that every
/// same-document reference points to existing content. No external reference may
/// remain in a bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenApiValidator;

impl Validator for OpenApiValidator {
    fn validate(&self, path: &Path) -> Result<(), Vec<String>> {
        let bytes = std::fs::read(path).map_err(|err| vec![format!("cannot read '{}': {err}", path.display())])?;
        let document = codec::decode(&bytes, Format::from_path(path), path.display())
            .map_err(|err| vec![err.to_string()])?;

        let errors = check(&document);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn check(document: &Node) -> Vec<String> {
    let mut errors = Vec::new();

    match document.get("openapi").map(|version| version.as_str()) {
        None => errors.push("missing 'openapi' field".to_string()),
        Some(Some(version)) if OPENAPI_VERSION.is_match(version) => {}
        Some(Some(version)) => errors.push(format!("unsupported OpenAPI version '{version}', expected 3.x.y")),
        Some(None) => errors.push("'openapi' must be a string".to_string()),
    }

    match document.get("info") {
        Some(info @ Node::Mapping(_)) => {
            for field in ["title", "version"] {
                if info.get(field).and_then(Node::as_str).is_none() {
                    errors.push(format!("missing 'info.{field}' field"));
                }
            }
        }
        Some(_) => errors.push("'info' must be a mapping".to_string()),
        None => errors.push("missing 'info' field".to_string()),
    }

    document.visit(&mut |node| {
        let Some(raw) = node.as_reference() else {
            return;
        };
        match Reference::parse(raw) {
            Ok(reference) if !reference.is_local() => {
                errors.push(format!("external reference '{raw}' was not bundled"));
            }
            Ok(reference) => {
                if reference.fragment().extract(document).is_err() {
                    errors.push(format!("reference '{raw}' does not resolve"));
                }
            }
            Err(err) => errors.push(err.to_string()),
        }
    });

    errors
}
