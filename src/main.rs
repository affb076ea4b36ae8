use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use escalator::cli::CommandContext;
use escalator::cli::commands::{self, curate::CurateOptions};
use escalator::constants::ranking::MAX_CANDIDATES;

/// Parse a candidate count in 1..=MAX_CANDIDATES
fn parse_candidates(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if (1..=MAX_CANDIDATES).contains(&n) => Ok(n),
        _ => Err(format!(
            "Invalid candidate count '{}'. Expected 1-{}",
            s, MAX_CANDIDATES
        )),
    }
}

#[derive(Parser)]
#[command(name = "escalator")]
#[command(
    version,
    about = "Route requests to local language models and escalate until the output validates"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Explicit config file (highest priority)")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize escalator in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Run a request through the escalation loop
    Curate {
        #[arg(long, short, help = "Request text, or @path to read it from a file")]
        input: String,
        #[arg(long, short, help = "Task family (skips classification)")]
        task: Option<String>,
        #[arg(long, short, default_value = "auto", help = "Starting model: auto or a model key")]
        model: String,
        #[arg(long, value_parser = parse_candidates, help = "Prompt variants per step (1-4)")]
        candidates: Option<usize>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
        #[arg(long = "no-log", help = "Do not write a run record")]
        no_log: bool,
    },

    /// Print the task family for a request
    Classify {
        #[arg(help = "Request text, or @path to read it from a file")]
        text: String,
    },

    /// Report on the golden task set
    Eval {
        #[arg(long, help = "Golden JSONL file (default: paths.golden_file)")]
        golden: Option<PathBuf>,
        #[arg(long, help = "Evaluate only the first N tasks")]
        limit: Option<usize>,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mescalator encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let explicit = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Curate {
            input,
            task,
            model,
            candidates,
            format,
            no_log,
        } => {
            let ctx = CommandContext::load(explicit)?;
            let rt = Runtime::new()?;
            rt.block_on(commands::curate::run(
                &ctx,
                CurateOptions {
                    input,
                    task,
                    model: Some(model),
                    candidates,
                    format,
                    no_log,
                },
            ))?;
        }
        Commands::Classify { text } => {
            let ctx = CommandContext::load(explicit)?;
            commands::classify::run(&ctx, &text)?;
        }
        Commands::Eval {
            golden,
            limit,
            format,
        } => {
            let ctx = CommandContext::load(explicit)?;
            commands::eval::run(&ctx, golden, limit, &format)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => {
                commands::config::show(explicit, global, &format)?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    commands::config::init_global(force)?;
                } else {
                    commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(())
}
