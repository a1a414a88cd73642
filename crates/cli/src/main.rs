// gstmatch - GST invoice reconciliation from the command line

mod exit_codes;
mod export;
mod load;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use gstmatch_recon::config::ToleranceMode;
use gstmatch_recon::ReconError;
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

use exit_codes::{recon_exit_code, EXIT_INPUT, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "gstmatch")]
#[command(about = "Reconcile a company purchase register against the GST portal")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the two datasets named in a config file
    #[command(after_help = "\
Examples:
  gstmatch run gst.toml
  gstmatch run gst.toml --company books.xlsx --portal gstr2b.xlsx
  gstmatch run gst.toml --tolerance 0.5 --tolerance-mode percentage
  gstmatch run gst.toml --json > result.json
  gstmatch run gst.toml --workbook recon.xlsx --csv-dir out/
  gstmatch run gst.toml --fail-on-unmatched")]
    Run {
        /// Path to the TOML config file
        config: PathBuf,

        /// Company register (CSV or spreadsheet); overrides [inputs.company]
        #[arg(long)]
        company: Option<PathBuf>,

        /// Portal download (CSV or spreadsheet); overrides [inputs.portal]
        #[arg(long)]
        portal: Option<PathBuf>,

        /// Worksheet to read from the company spreadsheet
        #[arg(long, value_name = "NAME")]
        company_sheet: Option<String>,

        /// Worksheet to read from the portal spreadsheet
        #[arg(long, value_name = "NAME")]
        portal_sheet: Option<String>,

        /// Buffer tolerance value; overrides [tolerance] value
        #[arg(long, value_name = "VALUE")]
        tolerance: Option<f64>,

        /// Buffer tolerance mode; overrides [tolerance] mode
        #[arg(long, value_name = "MODE")]
        tolerance_mode: Option<ModeArg>,

        /// Print the JSON result to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON result to a file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Write a multi-sheet XLSX report
        #[arg(long)]
        workbook: Option<PathBuf>,

        /// Write one CSV per result set into this directory
        #[arg(long, value_name = "DIR")]
        csv_dir: Option<PathBuf>,

        /// Exit 7 when anything is unmatched or only buffer-matched
        #[arg(long)]
        fail_on_unmatched: bool,
    },

    /// Check a config file without running
    #[command(after_help = "\
Examples:
  gstmatch validate gst.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Write a starter config with the default column names
    #[command(after_help = "\
Examples:
  gstmatch init
  gstmatch init --output books/gst.toml
  gstmatch init --output -")]
    Init {
        /// Destination file, `-` for stdout
        #[arg(long, short = 'o', default_value = "gstmatch.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Absolute,
    Percentage,
}

impl From<ModeArg> for ToleranceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Absolute => ToleranceMode::Absolute,
            ModeArg::Percentage => ToleranceMode::Percentage,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  gstmatch-recon ", env!("CARGO_PKG_VERSION"),
    )
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_max_level(level)
        .with_target(verbose > 1)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run {
            config,
            company,
            portal,
            company_sheet,
            portal_sheet,
            tolerance,
            tolerance_mode,
            json,
            output,
            workbook,
            csv_dir,
            fail_on_unmatched,
        } => recon::cmd_run(recon::RunArgs {
            config,
            company,
            portal,
            company_sheet,
            portal_sheet,
            tolerance,
            tolerance_mode: tolerance_mode.map(ToleranceMode::from),
            json,
            output,
            workbook,
            csv_dir,
            fail_on_unmatched,
            quiet: cli.quiet,
        }),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Init { output, force } => recon::cmd_init(output, force),
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
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, msg)
    }

    /// Engine error with its registry exit code and, where useful, a hint.
    pub fn recon(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::MissingColumn { source, .. } => Some(format!(
                "check [column_mappings.{source}] against the file's header row"
            )),
            ReconError::MissingMapping { .. } => {
                Some("run `gstmatch init --output -` to see a complete mapping".to_string())
            }
            ReconError::Aggregation(_) => Some("this is a bug; please report it".to_string()),
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
