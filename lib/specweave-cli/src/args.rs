use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

pub const USAGE: &str = "\
Bundle a multi-file OpenAPI description into a single document.

USAGE:
    specweave bundle -i <INPUT> -o <OUTPUT> [OPTIONS]
    specweave bundle <INPUT> <OUTPUT> [OPTIONS]
    specweave version
    specweave help

OPTIONS:
    -i, --input <INPUT>            Root document: a path or an http(s) URL
    -o, --output <OUTPUT>          Output file, .yaml/.yml or .json
        --validate                 Validate the bundle, blank it when invalid
    -v, --verbose                  Debug logging on stderr
        --max-depth <N>            Maximum depth of nested references, 0 for unlimited [default: 32]
        --max-file-size <BYTES>    Maximum size of a source, 0 for unlimited [default: 10485760]
        --timeout <SECS>           Timeout of a remote fetch, 0 for none [default: 30]
        --root <DIR>               Directory local sources must stay in [default: input directory]
";

#[derive(Debug, PartialEq)]
pub enum Command {
    Bundle(BundleArgs),
    Version,
    Help,
}

#[derive(Debug, PartialEq)]
pub struct BundleArgs {
    pub input: String,
    pub output: PathBuf,
    pub validate: bool,
    pub verbose: bool,
    pub max_depth: Option<usize>,
    pub max_file_size: Option<u64>,
    pub timeout: Option<Duration>,
    pub root: Option<PathBuf>,
}

impl Command {
    pub fn parse(args: Vec<OsString>) -> Result<Self> {
        let mut pargs = pico_args::Arguments::from_vec(args);

        if pargs.contains(["-h", "--help"]) {
            return Ok(Self::Help);
        }

        let subcommand = pargs.subcommand().context("parsing command")?;
        let command = match subcommand.as_deref() {
            Some("bundle") => Self::Bundle(BundleArgs::parse(&mut pargs)?),
            Some("version") => Self::Version,
            Some("help") | None => Self::Help,
            Some(other) => bail!("unknown command '{other}', see 'specweave help'"),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            bail!("unexpected arguments: {remaining:?}");
        }
        Ok(command)
    }
}

impl BundleArgs {
    fn parse(pargs: &mut pico_args::Arguments) -> Result<Self> {
        let validate = pargs.contains("--validate");
        let verbose = pargs.contains(["-v", "--verbose"]);

        let max_depth = pargs
            .opt_value_from_str("--max-depth")
            .context("parsing max depth argument")?;
        let max_file_size = pargs
            .opt_value_from_str("--max-file-size")
            .context("parsing max file size argument")?;
        let timeout = pargs
            .opt_value_from_str::<_, u64>("--timeout")
            .context("parsing timeout argument")?
            .map(Duration::from_secs);
        let root = pargs
            .opt_value_from_str("--root")
            .context("parsing root argument")?;

        let input: Option<String> = pargs
            .opt_value_from_str(["-i", "--input"])
            .context("parsing input argument")?;
        let output: Option<PathBuf> = pargs
            .opt_value_from_str(["-o", "--output"])
            .context("parsing output argument")?;

        // positional form: `bundle <input> <output>`
        let input = match input {
            Some(input) => input,
            None => pargs
                .opt_free_from_str()
                .context("parsing input argument")?
                .context("missing input, use -i <INPUT>")?,
        };
        let output = match output {
            Some(output) => output,
            None => pargs
                .opt_free_from_str()
                .context("parsing output argument")?
                .context("missing output, use -o <OUTPUT>")?,
        };

        Ok(Self {
            input,
            output,
            validate,
            verbose,
            max_depth,
            max_file_size,
            timeout,
            root,
        })
    }
}
