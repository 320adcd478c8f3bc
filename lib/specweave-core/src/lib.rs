//! # Specweave Core
//!
//! Bundle a multi-file API description into a single self-contained document.
//!
//! An OpenAPI description split across files links them with `$ref` pointers such as
//! `./schemas/user.yaml` or `https://example.com/common.json#/Error`. Bundling walks the
//! root document, fetches every referenced document (local file or HTTP), resolves the
//! references found inside them, and hoists the content into a consolidated collection
//! (`components/schemas` by default). Every cross-document pointer becomes an
//! intra-document pointer, and the result is written as YAML or JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use specweave_core::Bundler;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), specweave_core::BundleError> {
//! let report = Bundler::default()
//!     .execute("api/openapi.yaml", "dist/openapi.yaml")
//!     .await?;
//!
//! println!("{} sources, {} hoisted entries", report.sources_loaded, report.entries_hoisted);
//! # Ok(())
//! # }
//! ```
//!
//! Given `api/openapi.yaml`:
//!
//! ```yaml
//! openapi: 3.0.3
//! info: { title: Users, version: 1.0.0 }
//! paths:
//!   /users:
//!     get:
//!       responses:
//!         '200':
//!           description: ok
//!           content:
//!             application/json:
//!               schema:
//!                 $ref: ./user.yaml
//! ```
//!
//! the bundle points to `#/components/schemas/User` and carries the content of
//! `user.yaml` under `components.schemas.User`.
//!
//! ## Resolution rules
//!
//! - Same-document pointers of the root (`#/components/...`) are left untouched.
//! - Each `(source, fragment)` target is fetched and hoisted once, then reused.
//! - Names come from the last fragment segment or the file stem, with numeric suffixes
//!   (`User2`, `User3`) on collision. An entry of the collection that is itself an
//!   external pointer keeps its key.
//! - Following a reference back into a document still being resolved fails with
//!   [`BundleError::CircularReference`]; sibling definitions of one file may refer to
//!   each other.
//!
//! ## Resource bounds
//!
//! See [`BundlerBuilder`](bundle::BundlerBuilder): maximum file size, maximum depth of
//! nested references, HTTP timeout, and the allowed root for local files (the input's
//! directory by default). A [`Cancellation`] stops a run at the next fetch.
//!
//! ## Error handling
//!
//! Every failure aborts the run with a [`BundleError`]; [`BundleError::kind`] gives a
//! fieldless [`ErrorKind`] to match on.

mod cancel;
mod error;

pub mod bundle;
pub mod codec;
pub mod document;
pub mod fragment;
pub mod loader;
pub mod resolver;
pub mod source;

pub use self::bundle::{BundleReport, Bundler, BundlerBuilder};
pub use self::cancel::Cancellation;
pub use self::codec::Format;
pub use self::document::{Mapping, Node, Scalar};
pub use self::error::{BundleError, ErrorKind};
pub use self::fragment::Fragment;
pub use self::source::{Reference, Source, Target};
