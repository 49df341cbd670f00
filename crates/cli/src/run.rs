//! `kasa run` and `kasa validate`.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};
use kasa_recon::amount::format_cents;
use kasa_recon::{render_text, Engine, Reconciliation, RunError};
use serde::Serialize;

use crate::discover;
use crate::exit_codes::{run_error_exit_code, EXIT_MAIL, EXIT_MISMATCH, EXIT_USAGE};
use crate::input::read_text;
use crate::mail;
use crate::report::{report_file_name, write_report};
use crate::settings::Settings;
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub ekj_file: Option<PathBuf>,
    pub old_files: Vec<PathBuf>,
    pub all: bool,
    pub dry_run: bool,
    pub json: bool,
    pub require_match: bool,
}

/// Outcome of one EKJ file.
#[derive(Debug, Serialize)]
pub struct DayReport {
    pub ekj_file: PathBuf,
    pub old_files: Vec<PathBuf>,
    pub z_number: u32,
    pub report_date: NaiveDate,
    pub reconciliation: Reconciliation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mailed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_error: Option<String>,
    #[serde(skip)]
    pub text: String,
}

#[derive(Debug, Serialize)]
struct DayFailure<'a> {
    ekj_file: &'a Path,
    exit_code: u8,
    error: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum DayOutput<'a> {
    Done(&'a DayReport),
    Failed(DayFailure<'a>),
}

/// Read-only inputs shared by every day of one invocation.
struct DayContext<'a> {
    engine: Engine,
    settings: &'a Settings,
    explicit_old: &'a [PathBuf],
    dry_run: bool,
    now: NaiveDateTime,
}

fn usage_err(msg: impl Into<String>) -> CliError {
    CliError { code: EXIT_USAGE, message: msg.into(), hint: None }
}

fn engine_err(err: impl Into<RunError>) -> CliError {
    let err = err.into();
    CliError { code: run_error_exit_code(&err), message: err.to_string(), hint: None }
}

// ============================================================================
// run
// ============================================================================

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let mut settings = Settings::load(&args.config)?;
    if args.require_match {
        settings.recon.old.require_match = true;
    }

    let ekj_files = select_ekj_files(&args, &settings)?;
    let ctx = DayContext {
        engine: Engine::new(&settings.recon),
        settings: &settings,
        explicit_old: &args.old_files,
        dry_run: args.dry_run,
        now: Local::now().naive_local(),
    };

    let results = reconcile_all(&ctx, &ekj_files);

    let mut first_error: Option<u8> = None;
    let mut mail_failed = 0usize;
    let mut mismatched = 0usize;
    let mut outputs = Vec::with_capacity(results.len());
    let mut printed_text = false;

    for (ekj_file, result) in ekj_files.iter().zip(&results) {
        match result {
            Ok(day) => {
                eprintln!(
                    "Z {} ({}): {}",
                    day.z_number, day.report_date, day.reconciliation.status
                );
                if let Some(ref path) = day.report_file {
                    eprintln!("  wrote {}", path.display());
                }
                if day.mailed {
                    eprintln!("  mailed");
                }
                if let Some(ref err) = day.mail_error {
                    eprintln!("  mail failed: {err}");
                    mail_failed += 1;
                }
                if !day.reconciliation.is_ok() {
                    mismatched += 1;
                }
                if args.dry_run && !args.json {
                    if printed_text {
                        println!();
                    }
                    print!("{}", day.text);
                    printed_text = true;
                }
                outputs.push(DayOutput::Done(day));
            }
            Err(err) => {
                eprintln!("error: {}: {}", ekj_file.display(), err.message);
                if let Some(ref hint) = err.hint {
                    eprintln!("hint:  {hint}");
                }
                first_error.get_or_insert(err.code);
                outputs.push(DayOutput::Failed(DayFailure {
                    ekj_file,
                    exit_code: err.code,
                    error: &err.message,
                }));
            }
        }
    }

    if args.json {
        let json_str = serde_json::to_string_pretty(&outputs)
            .map_err(|e| usage_err(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    if let Some(code) = first_error {
        // Per-file errors are already printed above.
        return Err(CliError { code, message: String::new(), hint: None });
    }
    if mail_failed > 0 {
        return Err(CliError {
            code: EXIT_MAIL,
            message: format!("{mail_failed} of {} report mail(s) could not be sent", results.len()),
            hint: Some(format!("check the [email] section of {}", args.config.display())),
        });
    }
    if mismatched > 0 {
        return Err(CliError {
            code: EXIT_MISMATCH,
            message: format!("{mismatched} of {} day(s) have mismatches", results.len()),
            hint: None,
        });
    }
    Ok(())
}

fn select_ekj_files(args: &RunArgs, settings: &Settings) -> Result<Vec<PathBuf>, CliError> {
    let ekj_dir = &settings.paths.ekj_dir;
    let no_ekj = || {
        usage_err(format!("no EKJ files found under {}", ekj_dir.display())).with_hint(format!(
            "set paths.ekj_dir in {} or pass --ekj-file",
            args.config.display()
        ))
    };

    if let Some(ref file) = args.ekj_file {
        return Ok(vec![file.clone()]);
    }
    if args.all {
        let files = discover::all_ekj(ekj_dir, &settings.discovery)?;
        if files.is_empty() {
            return Err(no_ekj());
        }
        return Ok(files);
    }
    match discover::latest_ekj(ekj_dir, &settings.discovery)? {
        Some(file) => Ok(vec![file]),
        None => Err(no_ekj()),
    }
}

/// One scoped worker per EKJ file, at most one batch of
/// `available_parallelism` at a time. Results come back in input order.
fn reconcile_all(ctx: &DayContext<'_>, ekj_files: &[PathBuf]) -> Vec<Result<DayReport, CliError>> {
    if let [single] = ekj_files {
        return vec![reconcile_day(ctx, single)];
    }

    let workers = std::thread::available_parallelism().map_or(4, |n| n.get());
    let mut results = Vec::with_capacity(ekj_files.len());
    for batch in ekj_files.chunks(workers) {
        std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|path| scope.spawn(move || reconcile_day(ctx, path)))
                .collect();
            for handle in handles {
                results.push(
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload)),
                );
            }
        });
    }
    results
}

fn reconcile_day(ctx: &DayContext<'_>, ekj_path: &Path) -> Result<DayReport, CliError> {
    let settings = ctx.settings;
    let encoding = settings.discovery.fallback_encoding();
    log::info!("reconciling {}", ekj_path.display());

    let ekj_text = read_text(ekj_path, encoding)?;
    let z_report = ctx.engine.parse_ekj(&ekj_text).map_err(engine_err)?;

    let old_files = if ctx.explicit_old.is_empty() {
        discover::old_files(&settings.paths.old_dir, z_report.report_date, &settings.discovery)?
    } else {
        ctx.explicit_old.to_vec()
    };
    if old_files.is_empty() {
        return Err(usage_err(format!(
            "no OLD files for Z {} ({}) in {}",
            z_report.z_number,
            z_report.report_date,
            settings.paths.old_dir.display()
        ))
        .with_hint(format!(
            "expected names like {} containing d{}; pass --old-file to choose explicitly",
            settings.discovery.old_pattern,
            z_report.report_date.format("%Y%m%d")
        )));
    }

    let old_texts = old_files
        .iter()
        .map(|path| read_text(path, encoding))
        .collect::<Result<Vec<_>, _>>()?;
    let old_receipts = ctx
        .engine
        .extract_old(&z_report, &old_texts)
        .map_err(engine_err)?;
    let reconciliation = ctx.engine.reconcile(&z_report, &old_receipts);

    let mut text = render_text(z_report.z_number, z_report.report_date, &reconciliation);
    text.push_str(&sources_section(ekj_path, &old_files));

    let report_file = if ctx.dry_run {
        None
    } else {
        let name = report_file_name(
            &settings.report.file_prefix,
            z_report.z_number,
            z_report.report_date,
            ctx.now,
        );
        let path = write_report(&settings.paths.output_dir, &name, &text).map_err(|e| {
            usage_err(format!(
                "cannot write report to {}: {e}",
                settings.paths.output_dir.display()
            ))
        })?;
        Some(path)
    };

    let (mailed, mail_error) = match settings.email.as_ref() {
        Some(email) if mail::should_mail(Some(email), ctx.dry_run, reconciliation.is_ok()) => {
            let subject = mail::subject(&email.subject_prefix, z_report.z_number, z_report.report_date);
            match mail::send(email, &subject, &text) {
                Ok(()) => (true, None),
                Err(err) => {
                    log::warn!("Z {}: {err}", z_report.z_number);
                    (false, Some(err))
                }
            }
        }
        _ => (false, None),
    };

    Ok(DayReport {
        ekj_file: ekj_path.to_path_buf(),
        old_files,
        z_number: z_report.z_number,
        report_date: z_report.report_date,
        reconciliation,
        report_file,
        mailed,
        mail_error,
        text,
    })
}

fn sources_section(ekj_path: &Path, old_files: &[PathBuf]) -> String {
    let mut out = format!("\nSources:\n  EKJ: {}\n", ekj_path.display());
    for path in old_files {
        out.push_str(&format!("  OLD: {}\n", path.display()));
    }
    out
}

// ============================================================================
// validate
// ============================================================================

pub fn cmd_validate(config: PathBuf) -> Result<(), CliError> {
    let settings = Settings::load(&config)?;
    eprintln!(
        "valid: EKJ {} (*.{}), OLD {} ({}), reports {}, tolerance {}",
        settings.paths.ekj_dir.display(),
        settings.discovery.ekj_extension,
        settings.paths.old_dir.display(),
        settings.discovery.old_pattern,
        settings.paths.output_dir.display(),
        format_cents(settings.recon.tolerance.amount_cents),
    );
    Ok(())
}
