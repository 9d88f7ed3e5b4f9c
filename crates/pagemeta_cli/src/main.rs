//! Pagemeta CLI: inspect, check and produce precompiled page side-data.
//!
//! Provides `pagemeta inspect` to print what a precompiled artifact carries,
//! `pagemeta check` to ask whether a page source is newer than its artifact,
//! and `pagemeta write-html` / `pagemeta write-lines` to produce side-data
//! files the way the page compiler does.

#![warn(missing_docs)]

mod check;
mod inspect;
mod write;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use pagemeta_config::{apply_env_overrides, load_config, load_config_from_str, ConfigError, PagemetaConfig};
use tracing_subscriber::EnvFilter;

/// Pagemeta: page metadata and staleness tooling.
#[derive(Parser, Debug)]
#[command(name = "pagemeta", version, about = "Precompiled page metadata tools")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `pagemeta.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the descriptor and side-data summary of a precompiled page.
    Inspect(ArtifactArgs),
    /// Report whether a page source is newer than its precompiled artifact.
    Check(CheckArgs),
    /// Write the static HTML parts of a page.
    WriteHtml(WriteHtmlArgs),
    /// Write the line-number map of a page.
    WriteLines(WriteLinesArgs),
}

/// Locates a precompiled page.
#[derive(Parser, Debug)]
pub struct ArtifactArgs {
    /// Directory holding the artifact's descriptor and side-data files.
    pub dir: PathBuf,

    /// Qualified page identifier (e.g. `app.pages.Index`).
    pub identifier: String,
}

/// Arguments for the `pagemeta check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// The precompiled page.
    #[command(flatten)]
    pub artifact: ArtifactArgs,

    /// Page source: a file path or a `file:`/`http(s):` URL.
    pub source: String,
}

/// Arguments for the `pagemeta write-html` subcommand.
#[derive(Parser, Debug)]
pub struct WriteHtmlArgs {
    /// The target page.
    #[command(flatten)]
    pub artifact: ArtifactArgs,

    /// Static HTML parts in order.
    pub parts: Vec<String>,
}

/// Arguments for the `pagemeta write-lines` subcommand.
#[derive(Parser, Debug)]
pub struct WriteLinesArgs {
    /// The target page.
    #[command(flatten)]
    pub artifact: ArtifactArgs,

    /// Source line for each generated line, in order.
    #[arg(allow_negative_numbers = true)]
    pub lines: Vec<i32>,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Loads the configuration named by `--config`, or `pagemeta.toml` from
    /// the current directory, then applies environment overrides.
    pub fn load_config(&self) -> Result<PagemetaConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config_from_str(&std::fs::read_to_string(Path::new(path))?)?,
            None => load_config(&std::env::current_dir()?)?,
        };
        apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Inspect(ref args) => inspect::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
        Command::WriteHtml(ref args) => write::run_html(args, &global),
        Command::WriteLines(ref args) => write::run_lines(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs a stderr subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(quiet: bool, verbose: bool) {
    let fallback = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
