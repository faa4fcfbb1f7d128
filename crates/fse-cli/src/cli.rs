use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "FragSpace Explorer Developers",
    version,
    about = "fse - Layer-by-layer exploration of the molecular graphs a fragment space can build.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Maximum number of evaluation tasks running at once.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a new exploration, or resume the one stored in the database root.
    Run(RunArgs),
    /// Print the contents of a persisted layer.
    Inspect(InspectArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the exploration configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the fragment space file.
    #[arg(long, value_name = "PATH")]
    pub fragment_space: Option<PathBuf>,

    /// Override the directory holding persisted layers.
    #[arg(long, value_name = "DIR")]
    pub db_root: Option<PathBuf>,

    /// Override the maximum number of layers built after the roots.
    #[arg(long, value_name = "INT")]
    pub max_layers: Option<usize>,

    /// Override the maximum number of graphs kept per layer.
    #[arg(long, value_name = "INT")]
    pub max_graphs_per_layer: Option<usize>,

    /// Discard any persisted layers and start from the roots.
    #[arg(long)]
    pub fresh: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S limits.max-layers=5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Directory holding persisted layers.
    #[arg(long, required = true, value_name = "DIR")]
    pub db_root: PathBuf,

    /// Layer to inspect. Defaults to the latest one.
    #[arg(long, value_name = "INT")]
    pub layer: Option<usize>,
}
