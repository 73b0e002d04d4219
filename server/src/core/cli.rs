use clap::{Parser, Subcommand, ValueEnum};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DEBUG, ENV_HOST, ENV_KNOWLEDGE_PATH, ENV_MAX_FRAME_BYTES, ENV_PORT,
};

#[derive(Parser)]
#[command(name = "agentdeck")]
#[command(version, about = "Live dashboard for multi-agent telemetry", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug mode (verbose logging of rejected frames and 404s)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// JSON file with additional or replacement tool knowledge
    #[arg(long, global = true, env = ENV_KNOWLEDGE_PATH)]
    pub knowledge: Option<PathBuf>,

    /// Largest accepted telemetry frame in bytes
    #[arg(long, global = true, env = ENV_MAX_FRAME_BYTES)]
    pub max_frame_bytes: Option<usize>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// Fold a recorded JSONL frame file offline and print the result as JSON
    Replay {
        /// File with one telemetry frame per line
        file: PathBuf,

        /// Projection to print
        #[arg(long, value_enum, default_value_t = ReplayView::Graph)]
        view: ReplayView,

        /// Node to inspect (required for `--view step`)
        #[arg(long)]
        node: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayView {
    Graph,
    Transcript,
    Step,
    Diagnostics,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub knowledge: Option<PathBuf>,
    pub max_frame_bytes: Option<usize>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    from_cli(Cli::parse())
}

fn from_cli(cli: Cli) -> (CliConfig, Option<Commands>) {
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        knowledge: cli.knowledge,
        max_frame_bytes: cli.max_frame_bytes,
    };
    (config, cli.command)
}
