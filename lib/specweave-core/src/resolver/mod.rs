//! Reference resolution engine.
//!
//! The [`Resolver`] walks a document depth-first, pre-order. Every external pointer
//! (`$ref` with a source part) is resolved recursively: its source is loaded once and
//! decoded once per run, the designated fragment is deep-copied, pointers inside the copy
//! are resolved relative to *its* source, then the result is hoisted into the
//! consolidated collection and the pointer is rewritten to a same-document pointer.
//!
//! # Example
//!
//! ```rust,no_run
//! use specweave_core::codec::{self, Format};
//! use specweave_core::loader::{DefaultLoader, LoadLimits};
//! use specweave_core::resolver::{ResolveOptions, Resolver};
//! use specweave_core::Source;
//!
//! # async fn example() -> Result<(), specweave_core::BundleError> {
//! let source = Source::parse("api/openapi.yaml")?;
//! let mut root = codec::decode(&std::fs::read("api/openapi.yaml")?, Some(Format::Yaml), &source)?;
//!
//! let loader = DefaultLoader::new(LoadLimits::default())?;
//! let options = ResolveOptions::default();
//! let report = Resolver::new(&loader, &options).resolve_all(&mut root, &source).await?;
//!
//! println!("{} entries hoisted", report.entries_hoisted);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::codec::{self, Format};
use crate::document::Node;
use crate::fragment::Fragment;
use crate::loader::SourceLoader;
use crate::source::{self, Reference};
use crate::{BundleError, Cancellation, Source, Target};

mod context;
use self::context::ResolutionContext;

mod naming;
use self::naming::Hoister;

/// Default maximum depth of nested external references.
pub const DEFAULT_MAX_DEPTH: usize = 32;

type WalkFuture<'w> = Pin<Box<dyn Future<Output = Result<(), BundleError>> + Send + 'w>>;

/// Options of a resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Maximum depth of nested external references, `0` for unlimited.
    pub max_depth: usize,
    /// Location of the consolidated collection in the root document.
    pub collection: Fragment,
    /// Cancellation signal checked before the run and before each fetch.
    pub cancellation: Cancellation,
    /// Local sources must live below this directory. When unset, a local root document
    /// confines them to its own directory.
    pub allowed_root: Option<PathBuf>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            collection: Fragment::from_segments(["components", "schemas"]),
            cancellation: Cancellation::new(),
            allowed_root: None,
        }
    }
}

/// Statistics of a resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveReport {
    /// Number of distinct sources loaded and decoded.
    pub sources_loaded: usize,
    /// Number of entries added to the consolidated collection.
    pub entries_hoisted: usize,
}

/// The document whose pointers are being walked.
#[derive(Debug)]
struct Frame {
    source: Source,
    is_root: bool,
}

/// The directory local sources are confined to, spelled both ways.
///
/// Existing files are compared canonically (symlinks followed); missing ones lexically,
/// so that the loader reports them as not found.
#[derive(Debug)]
struct Confinement {
    lexical: PathBuf,
    canonical: PathBuf,
}

impl Confinement {
    async fn new(root: &Path) -> Self {
        let lexical = std::path::absolute(root)
            .map_or_else(|_| root.to_path_buf(), |absolute| source::normalize(&absolute));
        let canonical = fs::canonicalize(&lexical).await.unwrap_or_else(|_| lexical.clone());
        Self { lexical, canonical }
    }

    async fn check(&self, path: &Path) -> Result<(), BundleError> {
        let inside = match fs::canonicalize(path).await {
            Ok(canonical) => canonical.starts_with(&self.canonical),
            Err(_) => path.starts_with(&self.lexical),
        };
        if inside {
            return Ok(());
        }
        warn!(path = %path.display(), root = %self.lexical.display(), "reference escapes the allowed root");
        Err(BundleError::AccessDenied {
            location: path.display().to_string(),
            root: self.lexical.clone(),
        })
    }
}

/// Resolves external references of one document. One resolver serves one run.
#[derive(Debug)]
pub struct Resolver<'a, L> {
    loader: &'a L,
    options: &'a ResolveOptions,
    context: ResolutionContext,
    hoister: Hoister,
    confinement: Option<Confinement>,
}

impl<'a, L> Resolver<'a, L>
where
    L: SourceLoader + Sync,
{
    /// Creates a resolver using `loader` to fetch sources.
    pub fn new(loader: &'a L, options: &'a ResolveOptions) -> Self {
        Self {
            loader,
            options,
            context: ResolutionContext::default(),
            hoister: Hoister::new(options.collection.clone()),
            confinement: None,
        }
    }

    /// Resolves every external reference of `root`, in place.
    ///
    /// `root_source` is where `root` was loaded from: relative references are resolved
    /// against it. On success the tree holds no external pointer anymore.
    ///
    /// Local sources are confined to [`ResolveOptions::allowed_root`], or to the directory
    /// of a local `root_source` when none is set.
    ///
    /// # Errors
    ///
    /// Fails on the first load, parse, fragment, cycle, depth or confinement error; `root`
    /// must then be considered partially rewritten.
    #[tracing::instrument(name = "resolve", skip_all, fields(%root_source))]
    pub async fn resolve_all(mut self, root: &mut Node, root_source: &Source) -> Result<ResolveReport, BundleError> {
        self.options.cancellation.check()?;
        debug!(%root_source, base = %root_source.base_location(), "resolving references");

        let allowed_root = match (&self.options.allowed_root, root_source) {
            (Some(root), _) => Some(root.clone()),
            (None, Source::File(path)) => path.parent().map(Path::to_path_buf),
            (None, Source::Url(_)) => None,
        };
        if let Some(root) = allowed_root {
            self.confinement = Some(Confinement::new(&root).await);
        }

        self.hoister.prepare(root, root_source);
        self.context.push(Target::new(root_source.clone(), Fragment::root()));
        let frame = Frame {
            source: root_source.clone(),
            is_root: true,
        };
        let result = self.walk(root, &frame).await;
        self.context.pop();
        result?;

        let sources_loaded = self.context.loads();
        let collection = self.hoister.collection().clone();
        let entries = self.hoister.into_entries();
        let entries_hoisted = entries.len();
        if !entries.is_empty() {
            let target = root
                .ensure_mapping_at(collection.segments())
                .ok_or_else(|| {
                    BundleError::invalid_reference(
                        collection.to_pointer(),
                        "the consolidated collection must be reached through plain mappings, without pointers",
                    )
                })?;
            for (name, node) in entries {
                target.insert(name, node);
            }
        }

        info!(sources_loaded, entries_hoisted, "references resolved");
        Ok(ResolveReport {
            sources_loaded,
            entries_hoisted,
        })
    }

    fn walk<'w>(&'w mut self, node: &'w mut Node, frame: &'w Frame) -> WalkFuture<'w> {
        Box::pin(async move {
            if let Some(raw) = node.as_reference().map(str::to_string) {
                if let Some(replacement) = self.resolve_pointer(&raw, frame).await? {
                    *node = replacement;
                }
                return Ok(());
            }

            match node {
                Node::Mapping(mapping) => {
                    for value in mapping.values_mut() {
                        self.walk(value, frame).await?;
                    }
                }
                Node::Sequence(items) => {
                    for item in items.iter_mut() {
                        self.walk(item, frame).await?;
                    }
                }
                Node::Scalar(_) => {}
            }
            Ok(())
        })
    }

    /// Returns the node replacing the pointer, `None` to leave it untouched.
    async fn resolve_pointer(&mut self, raw: &str, frame: &Frame) -> Result<Option<Node>, BundleError> {
        let reference = Reference::parse(raw)?;

        let target = match reference.source() {
            None if frame.is_root => return Ok(None),
            None => Target::new(frame.source.clone(), reference.fragment().clone()),
            Some(source) => Target::new(frame.source.resolve(source)?, reference.fragment().clone()),
        };

        if frame.is_root && target.source == frame.source {
            // spelled as external, but designates the root document itself
            return Ok(Some(Node::reference(target.fragment.to_pointer())));
        }

        let name = self.resolve_target(target, frame).await?;
        Ok(Some(self.hoister.pointer_to(&name)))
    }

    /// Resolves and hoists `target`, returning its name in the collection.
    async fn resolve_target(&mut self, target: Target, frame: &Frame) -> Result<String, BundleError> {
        if let Some(name) = self.hoister.name_of(&target) {
            debug!(%target, name, "already hoisted");
            return Ok(name.to_string());
        }

        self.context.check_cycle(&target, &frame.source)?;
        self.context.check_depth(self.options.max_depth, &target)?;
        debug!(%target, from = %frame.source, "resolving");

        let document = self.fetch(&target.source).await?;
        let mut node = target
            .fragment
            .extract(&document)
            .map_err(|err| match err {
                BundleError::InvalidReference { reason, .. } => {
                    BundleError::invalid_reference(target.to_string(), reason)
                }
                other => other,
            })?
            .clone();
        drop(document);

        self.context.push(target.clone());
        let inner = Frame {
            source: target.source.clone(),
            is_root: false,
        };
        let result = self.walk(&mut node, &inner).await;
        self.context.pop();
        result?;

        let name = self.hoister.hoist(target, node);
        debug!(%name, depth = self.context.depth(), "hoisted");
        Ok(name)
    }

    /// Returns the decoded document of `source`, loading it on first use.
    async fn fetch(&mut self, source: &Source) -> Result<Arc<Node>, BundleError> {
        if let Some(document) = self.context.cached(source) {
            debug!(%source, "cache hit");
            return Ok(document);
        }

        self.options.cancellation.check()?;
        if let (Some(confinement), Source::File(path)) = (&self.confinement, source) {
            confinement.check(path).await?;
        }
        let fetched = self.loader.load(source, &self.options.cancellation).await?;
        let hint = source
            .format_hint()
            .or_else(|| fetched.media_type.as_ref().and_then(Format::from_media_type));
        let document = Arc::new(codec::decode(&fetched.bytes, hint, source)?);

        self.context.store(source.clone(), Arc::clone(&document));
        Ok(document)
    }
}
