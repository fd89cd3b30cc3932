use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Loom workspace build tool.
///
/// Resolves the module graph of a workspace, computes what changed since the
/// last build and produces the build output.
///
/// EXAMPLES:
///     loom graph                   Print the module graph
///     loom delta --json            Show pending changes as JSON
///     loom build --root ../shop    Build another workspace
///     loom files --category src    Source files of the last build
///
/// ENVIRONMENT VARIABLES:
///     LOOM_LOG           Log filter (default: info)
///     LOOM_JSON          Set to 'true' for JSON output by default
///     LOOM_OUTPUT_ROOT   Override the output folder
///     LOOM_MANIFEST      Override the manifest location
///     LOOM_PROFILES      Comma separated active profiles
#[derive(Parser)]
#[command(name = "loom")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the module graph of the workspace
    ///
    /// EXAMPLES:
    ///     loom graph           One line per module
    ///     loom graph --json    Full graph nodes as JSON
    #[command(visible_alias = "g")]
    Graph {
        /// JSON output
        #[arg(long, env = "LOOM_JSON")]
        json: bool,
    },

    /// Compute the delta against the last build without writing anything
    ///
    /// EXAMPLES:
    ///     loom delta           Changed files per module
    ///     loom delta --full    Scan every folder of every module
    #[command(visible_alias = "d")]
    Delta {
        /// JSON output
        #[arg(long, env = "LOOM_JSON")]
        json: bool,
        /// Scan every folder of every module
        #[arg(long)]
        full: bool,
    },

    /// Build the workspace and write the manifest
    ///
    /// Copies non-source files, removes outputs of deleted files and lists
    /// the source units left for the compiler.
    #[command(visible_alias = "b")]
    Build {
        /// JSON output
        #[arg(long, env = "LOOM_JSON")]
        json: bool,
        /// Scan every folder of every module
        #[arg(long)]
        full: bool,
    },

    /// List source files recorded by the last build
    ///
    /// Files of modules or paths bound to profiles are only listed when one
    /// of their profiles is active (`LOOM_PROFILES` or `[profiles] active`).
    ///
    /// EXAMPLES:
    ///     loom files                        Every source file
    ///     loom files --category test        Test sources only
    ///     LOOM_PROFILES=cloud loom files    Include `cloud` files
    #[command(visible_alias = "f")]
    Files {
        /// JSON output
        #[arg(long, env = "LOOM_JSON")]
        json: bool,
        /// Folder categories to include (repeatable)
        #[arg(long = "category", short = 'c')]
        categories: Vec<String>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LOOM_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Graph { json } => commands::graph::run(&root, json),
        Commands::Delta { json, full } => commands::delta::run(&root, json, full),
        Commands::Build { json, full } => commands::build::run(&root, json, full),
        Commands::Files { json, categories } => commands::files::run(&root, json, &categories),
    }
}
