mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

/// Output format for error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Supply-chain provenance ledger.
#[derive(Parser)]
#[command(name = "provchain", version, about = "Supply-chain provenance ledger")]
struct Cli {
    /// Configuration file (default: ./provchain.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger file, overriding the configuration
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Error output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress error messages
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the id counters (idempotent)
    Init,

    /// Run an invocation (or a JSON array of them) from a file, or `-` for stdin
    Invoke {
        /// Path to the invocation JSON
        file: PathBuf,
    },

    /// Print the JSON stored under a key
    Get {
        /// Ledger key, e.g. Good1 or OrderSequence
        key: String,
    },

    /// List goods, lots or orders in id order
    List {
        /// goods, lots or orders
        kind: String,
        /// Only entities at this stage
        #[arg(long)]
        status: Option<String>,
        /// Owner slot to filter on (supplier, retailer, manufacturer, distributor)
        #[arg(long, requires = "owner_id")]
        owner_role: Option<String>,
        /// Actor id that must occupy the owner slot
        #[arg(long, requires = "owner_role")]
        owner_id: Option<String>,
    },

    /// Print every committed version of a key, oldest first
    History {
        /// Ledger key
        key: String,
    },

    /// Print the last id allocated for goods, lots or orders
    Counter {
        /// goods, lots or orders
        kind: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e, cli.output, cli.quiet);
            process::exit(1);
        }
    };
    if let Err(e) = logging::init(&config.log) {
        report_error(&e, cli.output, cli.quiet);
        process::exit(1);
    }
    let ledger = cli.ledger.unwrap_or(config.ledger.path);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                cli.output,
                cli.quiet,
            );
            process::exit(1);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Init => commands::init::run(&ledger).await,
            Commands::Invoke { file } => commands::invoke::run(&ledger, &file).await,
            Commands::Get { key } => commands::query::get(&ledger, &key).await,
            Commands::List {
                kind,
                status,
                owner_role,
                owner_id,
            } => {
                let owner = owner_role.zip(owner_id);
                commands::query::list(&ledger, &kind, status, owner).await
            }
            Commands::History { key } => commands::query::history(&ledger, &key).await,
            Commands::Counter { kind } => commands::query::counter(&ledger, &kind).await,
        }
    });

    emit(result, cli.output, cli.quiet);
}

/// Print a command's result as pretty JSON, or report its error and exit 1.
fn emit(result: Result<Value, String>, output: OutputFormat, quiet: bool) {
    match result {
        Ok(value) => {
            let pretty = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

/// Report an error to stderr in the requested format.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
