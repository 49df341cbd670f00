// kasa - daily EKJ Z-report vs OLD sales export reconciliation

mod discover;
mod exit_codes;
mod input;
mod mail;
mod report;
mod run;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exit_codes::EXIT_SUCCESS;

#[derive(Parser)]
#[command(name = "kasa")]
#[command(about = "Reconcile register Z reports (EKJ) against OLD sales exports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the latest (or given) EKJ journal against the day's OLD exports
    #[command(after_help = "\
Examples:
  kasa run kasa.toml
  kasa run kasa.toml --dry-run
  kasa run kasa.toml --all --json
  kasa run kasa.toml --ekj-file EKJ/shop1/2024-01-15.txt --old-file OLD/riv_sales_d20240115.old

Exit codes:
  0 all days OK, 1 mismatches, 2 usage/IO, 3 EKJ parse, 4 OLD export, 5 invalid settings,
  6 report mail not sent")]
    Run {
        /// Path to the kasa.toml settings file
        config: PathBuf,

        /// EKJ journal to reconcile (default: most recently modified under paths.ekj_dir)
        #[arg(long, conflicts_with = "all")]
        ekj_file: Option<PathBuf>,

        /// OLD export to use instead of discovery. Repeatable.
        #[arg(long = "old-file", value_name = "FILE", conflicts_with = "all")]
        old_files: Vec<PathBuf>,

        /// Reconcile every EKJ journal under paths.ekj_dir, in parallel
        #[arg(long)]
        all: bool,

        /// Print the report instead of writing (or mailing) it
        #[arg(long)]
        dry_run: bool,

        /// Output JSON results to stdout instead of the report text
        #[arg(long)]
        json: bool,

        /// Fail with exit 4 when no OLD record matches the Z report
        #[arg(long)]
        require_match: bool,
    },

    /// Validate a settings file without running
    #[command(after_help = "\
Examples:
  kasa validate kasa.toml")]
    Validate {
        /// Path to the kasa.toml settings file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  kasa-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            "\nengine:  kasa-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
        )
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Also installs the log -> tracing bridge for the engine's `log` records.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            ekj_file,
            old_files,
            all,
            dry_run,
            json,
            require_match,
        } => run::cmd_run(run::RunArgs {
            config,
            ekj_file,
            old_files,
            all,
            dry_run,
            json,
            require_match,
        }),
        Commands::Validate { config } => run::cmd_validate(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
