//! Bundle orchestration: load the root document, resolve its references, encode and write.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use specweave_core::Bundler;
//!
//! # async fn example() -> Result<(), specweave_core::BundleError> {
//! let bundler = Bundler::builder()
//!     .with_max_depth(16)
//!     .with_timeout(Duration::from_secs(10))
//!     .with_validation(true)
//!     .build();
//!
//! let report = bundler.execute("api/openapi.yaml", "dist/openapi.json").await?;
//! println!("{} sources bundled into {} bytes", report.sources_loaded, report.bytes_written);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::codec::{self, Format};
use crate::document::Node;
use crate::fragment::Fragment;
use crate::loader::{DefaultLoader, LoadLimits, SourceLoader};
use crate::resolver::{ResolveOptions, ResolveReport, Resolver};
use crate::{BundleError, Cancellation, Source};

mod validator;
pub use self::validator::{OpenApiValidator, Validator};

mod writer;
pub use self::writer::{FsWriter, Writer};

/// Outcome of a successful [`Bundler::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleReport {
    /// Number of external sources loaded, the root excluded.
    pub sources_loaded: usize,
    /// Number of entries added to the consolidated collection.
    pub entries_hoisted: usize,
    /// Format of the written bundle.
    pub output_format: Format,
    /// Size of the written bundle.
    pub bytes_written: usize,
}

/// A resolved root document.
#[derive(Debug)]
struct Bundled {
    root: Node,
    format: Format,
    report: ResolveReport,
}

/// Bundles a multi-file API description into a single document.
///
/// A bundler holds configuration only: every call starts a fresh run with its own
/// cache, so one bundler can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct Bundler<L = DefaultLoader> {
    limits: LoadLimits,
    options: ResolveOptions,
    validate: bool,
    validator: Arc<dyn Validator>,
    writer: Arc<dyn Writer>,
    loader: Option<L>,
}

impl Bundler {
    /// Creates a builder with the default configuration.
    pub fn builder() -> BundlerBuilder {
        BundlerBuilder::default()
    }
}

impl Default for Bundler {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<L> Bundler<L>
where
    L: SourceLoader + Sync,
{
    /// Bundles `input` into `output`.
    ///
    /// `input` is a local path or an `http(s)://` URL. The output format follows the
    /// output extension, then the input format, then defaults to YAML. With validation
    /// enabled, an invalid bundle is blanked before the error is returned.
    ///
    /// # Errors
    ///
    /// Fails with [`BundleError::SameInputOutput`] when `output` is the input file, and
    /// with the first error of loading, resolving, encoding, writing or validating.
    pub async fn execute(&self, input: &str, output: impl AsRef<Path>) -> Result<BundleReport, BundleError> {
        let output = output.as_ref();
        let source = Source::parse(input)?;
        if let Source::File(input_path) = &source {
            ensure_distinct(input_path, output).await?;
        }

        let bundled = self.resolve(&source).await?;
        let output_format = Format::from_path(output).unwrap_or(bundled.format);
        let bytes = codec::encode(&bundled.root, output_format)?;
        self.options.cancellation.check()?;
        self.writer.write(output, &bytes)?;

        if self.validate
            && let Err(errors) = self.validator.validate(output)
        {
            warn!(output = %output.display(), count = errors.len(), "bundle is invalid");
            self.writer.write(output, &[])?;
            return Err(BundleError::ValidationFailed { errors });
        }

        info!(%source, output = %output.display(), format = %output_format, size = bytes.len(), "bundle written");
        Ok(BundleReport {
            sources_loaded: bundled.report.sources_loaded,
            entries_hoisted: bundled.report.entries_hoisted,
            output_format,
            bytes_written: bytes.len(),
        })
    }

    /// Bundles `input` in memory.
    ///
    /// # Errors
    ///
    /// Fails with the first error of loading or resolving.
    pub async fn bundle(&self, input: &str) -> Result<Node, BundleError> {
        let source = Source::parse(input)?;
        let bundled = self.resolve(&source).await?;
        Ok(bundled.root)
    }

    /// Bundles `input` in memory and encodes the result.
    ///
    /// # Errors
    ///
    /// Fails with the first error of loading, resolving or encoding.
    pub async fn bundle_to_bytes(&self, input: &str, format: Format) -> Result<Vec<u8>, BundleError> {
        let root = self.bundle(input).await?;
        codec::encode(&root, format)
    }

    async fn resolve(&self, source: &Source) -> Result<Bundled, BundleError> {
        self.options.cancellation.check()?;
        match &self.loader {
            Some(loader) => self.resolve_with(loader, source).await,
            None => {
                let loader = DefaultLoader::new(self.default_limits(source))?;
                self.resolve_with(&loader, source).await
            }
        }
    }

    async fn resolve_with<M>(&self, loader: &M, source: &Source) -> Result<Bundled, BundleError>
    where
        M: SourceLoader + Sync,
    {
        let fetched = loader.load(source, &self.options.cancellation).await?;
        let hint = source
            .format_hint()
            .or_else(|| fetched.media_type.as_ref().and_then(Format::from_media_type));
        let format = hint.unwrap_or_else(|| codec::sniff(&fetched.bytes));
        let mut root = codec::decode(&fetched.bytes, hint, source)?;

        let report = Resolver::new(loader, &self.options)
            .resolve_all(&mut root, source)
            .await?;
        Ok(Bundled { root, format, report })
    }

    /// Local sources are confined to the input directory unless a root is configured.
    fn default_limits(&self, source: &Source) -> LoadLimits {
        let mut limits = self.limits.clone();
        if limits.allowed_root.is_none()
            && let Source::File(path) = source
        {
            limits.allowed_root = path.parent().map(Path::to_path_buf);
        }
        debug!(allowed_root = ?limits.allowed_root, "loader limits");
        limits
    }
}

/// Rejects an output designating the input, lexically or through links.
async fn ensure_distinct(input: &Path, output: &Path) -> Result<(), BundleError> {
    let same = Source::from_path(output)? == Source::File(input.to_path_buf())
        || matches!(
            (tokio::fs::canonicalize(input).await, tokio::fs::canonicalize(output).await),
            (Ok(input), Ok(output)) if input == output
        );
    if same {
        return Err(BundleError::SameInputOutput {
            path: input.to_path_buf(),
        });
    }
    Ok(())
}

/// Builder of [`Bundler`].
///
/// # Default Configuration
///
/// - **Max file size**: 10 MiB
/// - **Max depth**: 32 nested external references
/// - **Timeout**: 30 seconds per remote fetch
/// - **Allowed root**: the directory of the input document
/// - **Collection**: `components/schemas`
/// - **Validation**: disabled, with [`OpenApiValidator`] when enabled
#[derive(Debug, Clone)]
pub struct BundlerBuilder<L = DefaultLoader> {
    limits: LoadLimits,
    options: ResolveOptions,
    validate: bool,
    validator: Arc<dyn Validator>,
    writer: Arc<dyn Writer>,
    loader: Option<L>,
}

impl<L> BundlerBuilder<L> {
    /// Builds the bundler.
    pub fn build(self) -> Bundler<L> {
        let Self {
            limits,
            options,
            validate,
            validator,
            writer,
            loader,
        } = self;

        Bundler {
            limits,
            options,
            validate,
            validator,
            writer,
            loader,
        }
    }

    /// Sets the maximum size of a loaded source in bytes, `0` for unlimited.
    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.limits.max_file_size = max_file_size;
        self
    }

    /// Sets the maximum depth of nested external references, `0` for unlimited.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    /// Sets the timeout of each remote fetch, [`Duration::ZERO`] for none.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Confines local sources to `root` and its descendants.
    pub fn with_allowed_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.options.allowed_root = Some(root.clone());
        self.limits.allowed_root = Some(root);
        self
    }

    /// Sets where hoisted content goes, as a `/`-separated path such as
    /// `components/schemas` or `#/definitions`.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError::InvalidReference`] if the path is empty or malformed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use specweave_core::Bundler;
    ///
    /// # fn example() -> Result<(), specweave_core::BundleError> {
    /// let bundler = Bundler::builder()
    ///     .with_collection_path("#/definitions")?
    ///     .build();
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_collection_path(mut self, path: &str) -> Result<Self, BundleError> {
        let trimmed = path.trim().trim_start_matches('#');
        let fragment = if trimmed.starts_with('/') {
            Fragment::parse(trimmed)?
        } else {
            Fragment::parse(&format!("/{trimmed}"))?
        };
        if fragment.is_root() || fragment.segments().iter().any(String::is_empty) {
            return Err(BundleError::invalid_reference(path, "the collection path must name a mapping"));
        }

        self.options.collection = fragment;
        Ok(self)
    }

    /// Validates the written bundle.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Replaces the validator used when validation is enabled.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Replaces the writer of the bundle.
    pub fn with_writer(mut self, writer: impl Writer + 'static) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    /// Replaces the source loader.
    ///
    /// The size, timeout and root settings of this builder only apply to the default
    /// loader; a custom loader enforces its own bounds.
    pub fn with_loader<M>(self, loader: M) -> BundlerBuilder<M>
    where
        M: SourceLoader,
    {
        BundlerBuilder {
            limits: self.limits,
            options: self.options,
            validate: self.validate,
            validator: self.validator,
            writer: self.writer,
            loader: Some(loader),
        }
    }

    /// Shares a cancellation signal with the runs of the bundler.
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.options.cancellation = cancellation;
        self
    }
}

impl Default for BundlerBuilder {
    fn default() -> Self {
        Self {
            limits: LoadLimits::default(),
            options: ResolveOptions::default(),
            validate: false,
            validator: Arc::new(OpenApiValidator),
            writer: Arc::new(FsWriter),
            loader: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use super::*;
    use crate::ErrorKind;

    const MAIN: &str = r"
openapi: 3.0.3
info:
  title: Users
  version: 1.0.0
paths:
  /users:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                $ref: ./user.yaml
";

    const USER: &str = "type: object\nproperties:\n  id:\n    type: integer\n";

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("main.yaml"), MAIN).expect("write main");
        fs::write(dir.path().join("user.yaml"), USER).expect("write user");
        dir
    }

    fn input(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    /// Records writes instead of touching the filesystem.
    #[derive(Debug, Default, Clone)]
    struct RecordingWriter {
        writes: Arc<Mutex<Vec<(PathBuf, Vec<u8>)>>>,
    }

    impl Writer for RecordingWriter {
        fn write(&self, path: &Path, contents: &[u8]) -> Result<(), BundleError> {
            self.writes
                .lock()
                .expect("lock not poisoned")
                .push((path.to_path_buf(), contents.to_vec()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Rejecting;

    impl Validator for Rejecting {
        fn validate(&self, _path: &Path) -> Result<(), Vec<String>> {
            Err(vec!["operationId is not unique".to_string()])
        }
    }

    #[tokio::test]
    async fn should_write_bundle_in_output_format() -> anyhow::Result<()> {
        let dir = project();
        let output = dir.path().join("dist/openapi.json");

        let report = Bundler::default().execute(&input(&dir, "main.yaml"), &output).await?;

        assert_eq!(
            report,
            BundleReport {
                sources_loaded: 1,
                entries_hoisted: 1,
                output_format: Format::Json,
                bytes_written: fs::metadata(&output)?.len() as usize,
            }
        );
        let written = codec::decode(&fs::read(&output)?, Some(Format::Json), "output")?;
        assert_eq!(
            written.get("components").and_then(|components| components.get("schemas")).and_then(|schemas| schemas.get("User")),
            Some(&codec::decode(USER.as_bytes(), Some(Format::Yaml), "user")?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn should_fall_back_to_input_format() -> anyhow::Result<()> {
        let dir = project();
        let output = dir.path().join("bundle.out");

        let report = Bundler::default().execute(&input(&dir, "main.yaml"), &output).await?;

        assert_eq!(report.output_format, Format::Yaml);
        Ok(())
    }

    #[tokio::test]
    async fn should_reject_same_input_and_output() -> anyhow::Result<()> {
        let dir = project();
        let main = dir.path().join("main.yaml");
        let spelled_differently = dir.path().join("./sub/../main.yaml");

        let result = Bundler::default()
            .execute(&main.display().to_string(), &spelled_differently)
            .await;

        assert_eq!(result.map_err(|err| err.kind()).err(), Some(ErrorKind::SameInputOutput));
        assert_eq!(fs::read_to_string(&main)?, MAIN);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_reject_output_linked_to_input() -> anyhow::Result<()> {
        let dir = project();
        let main = dir.path().join("main.yaml");
        let link = dir.path().join("bundle.yaml");
        std::os::unix::fs::symlink(&main, &link)?;

        let result = Bundler::default()
            .execute(&main.display().to_string(), &link)
            .await;

        assert_eq!(result.map_err(|err| err.kind()).err(), Some(ErrorKind::SameInputOutput));
        assert_eq!(fs::read_to_string(&main)?, MAIN);
        Ok(())
    }

    #[tokio::test]
    async fn should_blank_output_when_validation_fails() -> anyhow::Result<()> {
        let dir = project();
        let writer = RecordingWriter::default();
        let bundler = Bundler::builder()
            .with_validation(true)
            .with_validator(Rejecting)
            .with_writer(writer.clone())
            .build();

        let result = bundler
            .execute(&input(&dir, "main.yaml"), dir.path().join("out.yaml"))
            .await;

        let error = result.expect_err("validation should fail");
        insta::assert_snapshot!(error, @r"
        Validation failed:
          - operationId is not unique
        ");
        let writes = writer.writes.lock().expect("lock not poisoned");
        let [(_, bundled), (_, blanked)] = writes.as_slice() else {
            panic!("expected two writes, got {}", writes.len());
        };
        assert!(!bundled.is_empty());
        assert!(blanked.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn should_pass_default_validation() -> anyhow::Result<()> {
        let dir = project();

        let report = Bundler::builder()
            .with_validation(true)
            .build()
            .execute(&input(&dir, "main.yaml"), dir.path().join("out.yaml"))
            .await?;

        assert_eq!(report.entries_hoisted, 1);
        Ok(())
    }

    #[tokio::test]
    async fn should_confine_sources_to_input_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("api"))?;
        fs::write(dir.path().join("api/main.yaml"), "pet:\n  $ref: ../shared/pet.yaml\n")?;
        fs::create_dir(dir.path().join("shared"))?;
        fs::write(dir.path().join("shared/pet.yaml"), "type: object\n")?;
        let main = input(&dir, "api/main.yaml");

        let denied = Bundler::default().bundle(&main).await;
        assert_eq!(denied.map_err(|err| err.kind()).err(), Some(ErrorKind::AccessDenied));

        let allowed = Bundler::builder()
            .with_allowed_root(dir.path())
            .build()
            .bundle(&main)
            .await?;
        assert_eq!(allowed.get("pet").and_then(Node::as_reference), Some("#/components/schemas/Pet"));
        Ok(())
    }

    #[tokio::test]
    async fn should_enforce_size_limit_on_root() -> anyhow::Result<()> {
        let dir = project();

        let result = Bundler::builder()
            .with_max_file_size(16)
            .build()
            .bundle(&input(&dir, "main.yaml"))
            .await;

        assert_eq!(result.map_err(|err| err.kind()).err(), Some(ErrorKind::TooLarge));
        Ok(())
    }

    #[tokio::test]
    async fn should_bundle_to_bytes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("main.yaml"), "schema:\n  $ref: ./user.yaml\n")?;
        fs::write(dir.path().join("user.yaml"), USER)?;

        let bytes = Bundler::builder()
            .with_collection_path("definitions")?
            .build()
            .bundle_to_bytes(&input(&dir, "main.yaml"), Format::Json)
            .await?;

        insta::assert_snapshot!(String::from_utf8(bytes)?.trim_end(), @r##"
        {
          "schema": {
            "$ref": "#/definitions/User"
          },
          "definitions": {
            "User": {
              "type": "object",
              "properties": {
                "id": {
                  "type": "integer"
                }
              }
            }
          }
        }
        "##);
        Ok(())
    }

    #[test]
    fn should_reject_empty_collection_path() {
        let result = Bundler::builder().with_collection_path("#/");

        assert_eq!(result.map(|_| ()).map_err(|err| err.kind()).err(), Some(ErrorKind::InvalidReference));
    }

    #[tokio::test]
    async fn should_not_start_when_cancelled() -> anyhow::Result<()> {
        let dir = project();
        let cancellation = Cancellation::new();
        cancellation.cancel();

        let result = Bundler::builder()
            .with_cancellation(cancellation)
            .build()
            .bundle(&input(&dir, "main.yaml"))
            .await;

        assert_eq!(result.map_err(|err| err.kind()).err(), Some(ErrorKind::Cancelled));
        Ok(())
    }
}
