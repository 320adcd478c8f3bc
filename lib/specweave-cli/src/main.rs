//! `specweave`: bundle a multi-file OpenAPI description into a single document.

use std::io::{self, Write};

use anyhow::{Context, Result};
use specweave_core::{Bundler, Cancellation};
use tracing::{Level, info, warn};

mod args;
use self::args::{BundleArgs, Command, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let command = Command::parse(std::env::args_os().skip(1).collect()).context("parsing arguments")?;

    match command {
        Command::Bundle(args) => bundle(args).await,
        Command::Version => {
            writeln!(io::stdout(), "specweave {}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        Command::Help => {
            write!(io::stdout(), "{USAGE}")?;
            Ok(())
        }
    }
}

async fn bundle(args: BundleArgs) -> Result<()> {
    let BundleArgs {
        input,
        output,
        validate,
        verbose,
        max_depth,
        max_file_size,
        timeout,
        root,
    } = args;

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(io::stderr)
        .init();

    let cancellation = Cancellation::new();
    let signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            signal.cancel();
        }
    });

    let mut builder = Bundler::builder()
        .with_validation(validate)
        .with_cancellation(cancellation);
    if let Some(max_depth) = max_depth {
        builder = builder.with_max_depth(max_depth);
    }
    if let Some(max_file_size) = max_file_size {
        builder = builder.with_max_file_size(max_file_size);
    }
    if let Some(timeout) = timeout {
        builder = builder.with_timeout(timeout);
    }
    if let Some(root) = root {
        builder = builder.with_allowed_root(root);
    }

    let report = builder
        .build()
        .execute(&input, &output)
        .await
        .with_context(|| format!("bundling '{input}' into '{}'", output.display()))?;

    info!(?report, "done");
    writeln!(
        io::stdout(),
        "Bundled {input} into {} ({} sources, {} entries, {} bytes)",
        output.display(),
        report.sources_loaded,
        report.entries_hoisted,
        report.bytes_written,
    )?;
    Ok(())
}
