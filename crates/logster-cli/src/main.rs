mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "logster",
    version = "0.1.0-dev",
    about = "Turn web server log lines into interval metrics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate log files (or stdin) and print one interval of metrics
    Run {
        /// Config file (defaults to the user config dir, then built-ins)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Parser(s) to run, comma-separated or repeated
        #[arg(short, long = "parser", required = true, value_delimiter = ',')]
        parsers: Vec<String>,
        /// Interval length in seconds used for per-minute rates
        #[arg(short, long)]
        duration: Option<f64>,
        /// Emit decode error counters
        #[arg(long)]
        diagnostics: bool,
        /// Prepend `PREFIX.` to every metric name
        #[arg(long)]
        prefix: Option<String>,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
        /// Log files to read; stdin when none given
        files: Vec<PathBuf>,
    },
    /// List available parsers
    #[command(alias = "ls")]
    List {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile every parser and report problems
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell: bash, zsh, fish, elvish, powershell
        shell: String,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            parsers,
            duration,
            diagnostics,
            prefix,
            json,
            files,
        } => {
            commands::run::run(commands::run::RunArgs {
                config,
                parsers,
                duration,
                diagnostics,
                prefix,
                json,
                files,
            })
            .await
        }
        Commands::List { config, json } => commands::list::run(config, json),
        Commands::Check { config } => commands::check::run(config),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
