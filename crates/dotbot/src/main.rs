mod cli;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotbot_core::kernel::constants;
use dotbot_core::Host;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// DotBot: a plugin driven chat bot host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Directory holding settings.json and per-plugin settings
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Modules directory, overriding `modules_dir` from settings
    #[arg(long, global = true)]
    modules_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Start every plugin and serve invocations read from stdin (default)
    Run,
    /// Print the resolved plugin load order
    Plugins,
    /// Write the default settings file if none exists
    InitConfig,
}

/// Route `log` records into tracing and print everything to stderr.
///
/// `RUST_LOG` takes precedence over the settings' debug flag.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let command = args.command.unwrap_or(Commands::Run);

    let host = match command {
        Commands::InitConfig => {
            init_logging(false);
            return cli::init_config(&args.config_dir);
        }
        Commands::Run | Commands::Plugins => match Host::bootstrap(&args.config_dir) {
            Ok(host) => host,
            Err(e) => {
                init_logging(false);
                error!("Failed to load settings from {}: {}", args.config_dir.display(), e);
                return ExitCode::FAILURE;
            }
        },
    };
    init_logging(host.settings().show_debug_logs);

    let modules_dir = args
        .modules_dir
        .unwrap_or_else(|| PathBuf::from(&host.settings().modules_dir));
    match command {
        Commands::Plugins => cli::list_plugins(host, &modules_dir).await,
        _ => cli::run(host, &modules_dir).await,
    }
}
