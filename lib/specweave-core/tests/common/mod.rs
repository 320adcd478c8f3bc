use std::fs;
use std::path::{Path, PathBuf};

use rstest::fixture;
use tempfile::TempDir;
use tracing::info;

mod server;
pub use self::server::*;

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

/// A temporary directory of API description files.
#[derive(Debug)]
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Writes `content` at `relative`, creating parent directories.
    pub fn with(self, relative: &str, content: &str) -> anyhow::Result<Self> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// The bundler input for `relative`.
    pub fn input(&self, relative: &str) -> String {
        self.path(relative).display().to_string()
    }

    pub fn read(&self, relative: &str) -> anyhow::Result<String> {
        Ok(fs::read_to_string(self.path(relative))?)
    }
}

#[fixture]
pub fn project() -> Project {
    init_tracing();
    match Project::new() {
        Ok(project) => project,
        Err(error) => {
            panic!("fail to create project directory: {error:?}");
        }
    }
}
