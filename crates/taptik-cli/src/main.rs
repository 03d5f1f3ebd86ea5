mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;
use taptik_core::types::Platform;

#[derive(Parser)]
#[command(
    name = "taptik",
    about = "Move AI IDE configuration between Kiro, Cursor and Claude Code",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from IDE markers or .git/)
    #[arg(long, global = true, env = "TAPTIK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the IDE platforms configured in the project
    Detect,

    /// Extract a platform's configuration into a Taptik context
    Build {
        /// kiro, cursor or claude-code
        #[arg(long)]
        platform: Platform,

        /// Write the context here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Convert a context from one platform to another
    Convert {
        #[arg(long)]
        from: Platform,

        #[arg(long)]
        to: Platform,

        /// Context file to convert (default: build one from the project)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Write the converted context here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Score how much of a context survives a conversion
    Compat {
        #[arg(long)]
        from: Platform,

        #[arg(long)]
        to: Platform,

        /// Context file to assess (default: build one from the project)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
    },

    /// Convert and write the target platform's files
    Deploy {
        #[arg(long)]
        from: Platform,

        #[arg(long)]
        to: Platform,

        /// Context file to deploy (default: build one from the project)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,

        /// Directory to deploy into (default: the project root)
        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Manage .taptik/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = root::resolve_root(cli.root.as_deref()).and_then(|root| match cli.command {
        Commands::Detect => cmd::detect::run(&root, cli.json),
        Commands::Build { platform, output } => cmd::build::run(&root, platform, output.as_deref(), cli.json),
        Commands::Convert {
            from,
            to,
            input,
            output,
        } => cmd::convert::run(&root, from, to, input.as_deref(), output.as_deref(), cli.json),
        Commands::Compat { from, to, input } => cmd::compat::run(&root, from, to, input.as_deref(), cli.json),
        Commands::Deploy {
            from,
            to,
            input,
            target,
        } => cmd::deploy::run(&root, from, to, input.as_deref(), target.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
