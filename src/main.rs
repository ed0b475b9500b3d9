//! shoptgen - bash option parsers from declarative option lists.

use anyhow::{Context, Result};
use clap::Parser;
use shoptgen::logging::{self, Verbosity};
use shoptgen::{
    parse_opts_file, render_script, validate_descriptors, write_script, OutputTarget, Settings,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Generate a bash option parser and usage text from option files.
#[derive(Parser, Debug)]
#[command(name = "shoptgen", version, about)]
struct Cli {
    /// Option files to parse (YAML, JSON or ';'-delimited text)
    #[arg(required = true, value_name = "OPTFILES")]
    optfiles: Vec<PathBuf>,

    /// Use getopt as a parser (reserved, currently ignored)
    #[arg(short = 'g', long)]
    getopt: bool,

    /// Where to write the generated script ('-' for standard output)
    #[arg(short, long, value_name = "PATH", default_value = "-")]
    output: OutputTarget,

    /// Store remaining arguments in an `args` array (default is discarding)
    #[arg(short = 'a', long)]
    remains_as_args: bool,

    /// Add a --debug option enabling `set -x` in the script
    #[arg(short = 'd', long)]
    add_debug: bool,

    /// Print every parsed variable at the end of the script
    #[arg(long)]
    add_test: bool,

    /// Be verbose
    #[arg(short, long, overrides_with = "quiet")]
    verbose: bool,

    /// Be quiet
    #[arg(short, long, overrides_with = "verbose")]
    quiet: bool,

    /// Disable colorful logs
    #[arg(long = "no-color", overrides_with = "color")]
    no_color: bool,

    /// Have colorful logs
    #[arg(long, overrides_with = "no_color")]
    color: bool,

    /// Render the script but write nothing
    #[arg(short = 'n', long)]
    dry_run: bool,
}

impl Cli {
    /// Settings used for files that do not override them.
    fn defaults(&self) -> Settings {
        Settings {
            use_getopt: self.getopt,
            remains_as_args: self.remains_as_args,
            add_debug: self.add_debug,
            add_test: self.add_test,
            output: self.output.clone(),
            ..Settings::default()
        }
    }

    fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbosity(), !cli.no_color);

    let defaults = cli.defaults();
    debug!(?defaults, "invocation defaults");

    for path in &cli.optfiles {
        process_file(path, &defaults, cli.dry_run)
            .with_context(|| format!("failed to process {}", path.display()))?;
    }

    Ok(())
}

/// Parse, render and write one option file.
fn process_file(path: &Path, defaults: &Settings, dry_run: bool) -> Result<()> {
    let opts = parse_opts_file(path)?;
    debug!(format = %opts.format, overrides = ?opts.overrides, "parsed option file");

    validate_descriptors(&opts.descriptors).context("invalid option descriptors")?;
    let settings = opts
        .overrides
        .apply_to(defaults)
        .context("invalid generator_opts")?;
    debug!(?settings, "effective settings");

    let script = render_script(&opts.descriptors, &settings)?;

    if dry_run {
        info!(
            lines = script.lines().len(),
            output = %settings.output,
            "dry run, script not written"
        );
        return Ok(());
    }

    write_script(&script.to_text(), &settings.output)?;
    debug!(output = %settings.output, "script written");

    Ok(())
}
