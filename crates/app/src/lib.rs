use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use graph_engine_core::config::EngineConfig;
use graph_engine_core::executor::run_graph;
use graph_engine_core::graph::load_graph;
use graph_engine_core::logging::{
    self, FileSinkPlan, LoggingInitOptions, PanicHookInstallPlan, DEFAULT_LOG_FILTER,
};
use graph_engine_core::nodes::register_all_nodes;
use graph_engine_core::registry::NodeTypeRegistry;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_LOAD_FAILURE: i32 = 1;
pub const EXIT_ENTRY_FAILURE: i32 = 2;
pub const EXIT_EXECUTION_FAILURE: i32 = 3;

#[derive(Parser)]
#[command(name = "graph-engine", about = "Dataflow graph interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a graph document and run it from its entry node.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(help = "Path to a graph document (YAML or JSON)")]
    graph: PathBuf,

    #[arg(long, help = "Override the document's declared entry node")]
    entry: Option<String>,

    #[arg(long, help = "Path to an engine config TOML file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,

    #[arg(
        long = "log-filter",
        value_name = "FILTER",
        help = "Explicit tracing filter (overrides RUST_LOG and -v)"
    )]
    log_filter: Option<String>,

    #[arg(long, help = "Directory for log files and crash artifacts")]
    data_dir: Option<PathBuf>,
}

/// Parses argv, runs the requested subcommand, and returns the process
/// exit code to use: `0` success, `1` load failure, `2` entry
/// resolution failure, `3` execution failure.
pub fn run_from_env() -> i32 {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(args),
    }
}

fn run_command(args: RunArgs) -> i32 {
    let config = match EngineConfig::resolve(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load engine config: {err:#}");
            return EXIT_LOAD_FAILURE;
        }
    };

    let log_dir = args.data_dir.clone().unwrap_or_else(|| config.logging.log_dir.clone());
    init_logging(&config, args.verbose, args.log_filter.as_deref(), Some(log_dir.as_path()));

    let source = match fs::read_to_string(&args.graph) {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(path = %args.graph.display(), error = %err, "failed to read graph document");
            return EXIT_LOAD_FAILURE;
        }
    };

    let mut registry = NodeTypeRegistry::new();
    if let Err(err) = register_all_nodes(&mut registry) {
        tracing::error!("{err:#}");
        return EXIT_LOAD_FAILURE;
    }

    // Resolved twice only when `--entry` overrides the document's declared
    // entry, so a document that fails to load is distinguished from an
    // override that names a node the document doesn't have.
    let graph = match load_graph(&source, &registry, None) {
        Ok(graph) => graph,
        Err(err) => {
            tracing::error!("{err:#}");
            return EXIT_LOAD_FAILURE;
        }
    };

    let graph = match args.entry.as_deref() {
        None => graph,
        Some(entry) => match load_graph(&source, &registry, Some(entry)) {
            Ok(graph) => graph,
            Err(err) => {
                tracing::error!(entry, "{err:#}");
                return EXIT_ENTRY_FAILURE;
            }
        },
    };

    let env: HashMap<String, String> = std::env::vars().collect();
    match run_graph(&graph, env) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            EXIT_EXECUTION_FAILURE
        }
    }
}

fn init_logging(config: &EngineConfig, verbose: u8, cli_log_filter: Option<&str>, log_dir: Option<&Path>) {
    let panic_hook_plan = logging::install_panic_hook(log_dir);
    if let PanicHookInstallPlan::Fallback {
        attempted_crash_dir,
        reason,
    } = &panic_hook_plan
    {
        let attempted_crash_dir = attempted_crash_dir
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<none>".to_string());
        eprintln!(
            "Warning: panic crash artifact hook unavailable (path: {attempted_crash_dir}; reason: {reason}). Panics will not be persisted to crash logs."
        );
    }

    let init_options = LoggingInitOptions {
        log_dir: log_dir.map(Path::to_path_buf),
        verbose,
        cli_log_filter: cli_log_filter.map(ToString::to_string),
        rust_log_env: std::env::var("RUST_LOG").ok(),
        default_log_filter: config.logging.log_level.clone(),
        ..Default::default()
    };
    let init_plan = logging::compose_logging_init_plan(&init_options);
    let console_filter = init_plan.filters.console_filter;
    let file_filter = init_plan.filters.file_filter;

    match init_plan.file_sink {
        FileSinkPlan::Ready(ready) => {
            let console_env_filter = parse_env_filter_with_fallback(&console_filter, "console");
            let file_env_filter = parse_env_filter_with_fallback(&file_filter, "file");

            let subscriber = tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(console_env_filter),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(logging::redacting_make_writer(ready.appender))
                        .with_filter(file_env_filter),
                );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
            }
        }
        FileSinkPlan::Fallback(fallback) => {
            let attempted_log_dir = fallback
                .attempted_log_dir
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<none>".to_string());
            let reason = fallback.reason;

            let console_env_filter = parse_env_filter_with_fallback(&console_filter, "console");
            let subscriber = tracing_subscriber::registry().with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_env_filter),
            );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
                return;
            }

            eprintln!(
                "Warning: persistent file logging unavailable (path: {attempted_log_dir}; reason: {reason}). Continuing with console-only logging."
            );
            warn!(
                attempted_log_dir = %attempted_log_dir,
                reason = %reason,
                "Persistent file logging unavailable; continuing with console-only logging"
            );
        }
    }

    if let PanicHookInstallPlan::Fallback {
        attempted_crash_dir,
        reason,
    } = panic_hook_plan
    {
        warn!(
            attempted_crash_dir = ?attempted_crash_dir,
            reason = %reason,
            "Panic crash artifact hook unavailable; continuing without panic artifacts"
        );
    }

    info!(pid = std::process::id(), "graph-engine starting up");
}

fn parse_env_filter_with_fallback(filter: &str, sink_name: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!(
            "Invalid {sink_name} log filter '{filter}': {error}. Falling back to '{DEFAULT_LOG_FILTER}'."
        );
        tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}
