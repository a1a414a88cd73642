//! `gstmatch run | validate | init`: config-driven GST reconciliation.

use std::io::Write;
use std::path::{Path, PathBuf};

use gstmatch_recon::config::{InputFile, InputsConfig, ToleranceMode};
use gstmatch_recon::model::{format_paise, Source};
use gstmatch_recon::{ReconConfig, ReconInput, ReconResult};

use crate::exit_codes::EXIT_UNMATCHED;
use crate::{export, load, CliError};

pub struct RunArgs {
    pub config: PathBuf,
    pub company: Option<PathBuf>,
    pub portal: Option<PathBuf>,
    pub company_sheet: Option<String>,
    pub portal_sheet: Option<String>,
    pub tolerance: Option<f64>,
    pub tolerance_mode: Option<ToleranceMode>,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub workbook: Option<PathBuf>,
    pub csv_dir: Option<PathBuf>,
    pub fail_on_unmatched: bool,
    pub quiet: bool,
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::io(format!("cannot read config {}: {e}", config_path.display()))
    })?;
    ReconConfig::from_toml(&config_str).map_err(CliError::recon)
}

/// Paths in the config are relative to the config file's directory.
fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    base_dir.join(path)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = read_config(&args.config)?;
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));

    if let Some(mode) = args.tolerance_mode {
        config.tolerance.mode = mode;
    }
    if let Some(value) = args.tolerance {
        config.tolerance.value = value;
    }

    let mut input = ReconInput::default();
    for source in Source::ALL {
        let (path_override, sheet_override) = match source {
            Source::Company => (&args.company, &args.company_sheet),
            Source::Portal => (&args.portal, &args.portal_sheet),
        };
        let configured = config.inputs.for_source(source);

        let path = match (path_override, configured) {
            (Some(path), _) => path.clone(),
            (None, Some(file)) => resolve(base_dir, &file.file),
            (None, None) => {
                return Err(CliError::args(format!("no {source} input file"))
                    .with_hint(format!("pass --{source} or set [inputs.{source}] file")));
            }
        };
        let sheet = sheet_override
            .clone()
            .or_else(|| configured.and_then(|f| f.sheet.clone()));

        let columns = config.column_mappings.resolve(source).map_err(CliError::recon)?;
        let rows = load::load_rows(&path, sheet.as_deref(), &columns)?;
        match source {
            Source::Company => input.company = rows,
            Source::Portal => input.portal = rows,
        }
    }

    let result = gstmatch_recon::run(&config, &input).map_err(CliError::recon)?;

    // Output
    let json_path = args
        .output
        .or_else(|| config.output.json.as_deref().map(|p| resolve(base_dir, p)));
    let workbook_path = args
        .workbook
        .or_else(|| config.output.workbook.as_deref().map(|p| resolve(base_dir, p)));
    let csv_dir = args
        .csv_dir
        .or_else(|| config.output.csv_dir.as_deref().map(|p| resolve(base_dir, p)));

    if let Some(ref path) = json_path {
        export::write_json(&result, path)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }
    if let Some(ref path) = workbook_path {
        export::write_workbook(&result, path)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }
    if let Some(ref dir) = csv_dir {
        export::write_csv_dir(&result, dir)?;
        if !args.quiet {
            eprintln!("wrote {}/", dir.display());
        }
    }

    if args.json {
        let json = export::to_json(&result)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{json}").map_err(|e| CliError::io(format!("cannot write stdout: {e}")))?;
    }

    if !args.quiet {
        print_summary(&result);
    }

    let s = &result.summary;
    let open_items = s.company.unmatched.count + s.portal.unmatched.count + s.buffer_matched_pairs;
    if args.fail_on_unmatched && open_items > 0 {
        return Err(CliError::new(
            EXIT_UNMATCHED,
            format!(
                "{} unmatched company, {} unmatched portal, {} buffer-matched",
                s.company.unmatched.count, s.portal.unmatched.count, s.buffer_matched_pairs,
            ),
        ));
    }

    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    let tolerance = &result.meta.tolerance;
    let tolerance_desc = match tolerance.mode {
        ToleranceMode::Absolute => format!("±{:.2}", tolerance.value),
        ToleranceMode::Percentage => format!("±{}%", tolerance.value),
    };

    eprintln!(
        "recon '{}': {} company / {} portal records (tolerance {})",
        result.meta.config_name, s.company.records, s.portal.records, tolerance_desc,
    );
    eprintln!(
        "  matched:         {:>6}  ({:.2}% of company)",
        s.matched_pairs, s.company.matched.percent,
    );
    eprintln!(
        "  buffer matched:  {:>6}  (difference {}, absolute {})",
        s.buffer_matched_pairs,
        format_paise(s.buffer_discrepancy_paise),
        format_paise(s.buffer_discrepancy_abs_paise),
    );
    eprintln!(
        "  unmatched:       {:>6} company, {} portal",
        s.company.unmatched.count, s.portal.unmatched.count,
    );
    if !result.skipped.is_empty() {
        eprintln!(
            "  skipped rows:    {:>6} company, {} portal",
            s.company.skipped, s.portal.skipped,
        );
    }
    if s.flagged_records > 0 {
        eprintln!("  flagged records: {:>6}", s.flagged_records);
    }
    eprintln!("  match rate:      {:>5.2}%", s.match_rate);
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let mapped = |source| config.column_mappings.for_source(source).len();
    eprintln!(
        "valid: recon '{}' with {} company / {} portal column(s), tolerance {} {}",
        config.name,
        mapped(Source::Company),
        mapped(Source::Portal),
        config.tolerance.mode,
        config.tolerance.value,
    );
    Ok(())
}

/// The default config, pointed at spreadsheet inputs next to it.
fn starter_config() -> ReconConfig {
    ReconConfig {
        inputs: InputsConfig {
            company: Some(InputFile {
                file: "company.xlsx".into(),
                sheet: None,
            }),
            portal: Some(InputFile {
                file: "portal.xlsx".into(),
                sheet: None,
            }),
        },
        ..Default::default()
    }
}

pub fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    let toml = starter_config().to_toml().map_err(CliError::recon)?;

    if output.as_os_str() == "-" {
        print!("{toml}");
        return Ok(());
    }

    if output.exists() && !force {
        return Err(CliError::args(format!("{} already exists", output.display()))
            .with_hint("pass --force to overwrite"));
    }
    std::fs::write(&output, toml)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", output.display())))?;
    eprintln!("wrote {}", output.display());
    Ok(())
}
