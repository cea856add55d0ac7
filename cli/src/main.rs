//! BackUP - Command-line interface for the backup engine.
//!
//! Loads a rules file, shows what will be copied, asks for confirmation, then
//! copies and verifies. Progress goes to stderr; diagnostics go through `tracing`.

use anyhow::{Context, Result};
use clap::Parser;
use engine::{
    checksums::PairVerification,
    config::{load_rules, RulesFormat},
    model::{CopyPair, Rule, RunOptions},
    progress::ProgressCallback,
    report::{RunReport, RunStatus, SkippedEntry, VerificationOutcome},
    BackupRun, CopyError, EngineError,
};
use std::cell::Cell;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// BackUP - Rule-driven backup with hash verification
#[derive(Parser, Debug)]
#[command(name = "backup")]
#[command(version = "0.1.0")]
#[command(about = "Copy directory trees according to rules and verify the copies")]
struct Args {
    /// Rules file (JSON, or `source -> destination` lines)
    #[arg(long, value_name = "PATH", default_value = "rules.json")]
    rules: PathBuf,

    /// Rules file format: json or lines (default: by extension)
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// Do not ask for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Show what would be copied without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip hash verification after copying
    #[arg(long)]
    no_hash_verification: bool,

    /// Do not flush copied files to disk
    #[arg(long)]
    no_fs_sync: bool,

    /// Write a JSON run summary to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// How a CLI invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// User did not confirm
    Declined,
    /// The run reached Done
    Finished(RunStatus),
}

impl Outcome {
    fn exit_code(self) -> i32 {
        match self {
            Outcome::Declined => 0,
            Outcome::Finished(RunStatus::Success) => 0,
            Outcome::Finished(RunStatus::VerificationFailed | RunStatus::Aborted) => 1,
            Outcome::Finished(RunStatus::HashMismatch) => 2,
            Outcome::Finished(RunStatus::CompletedWithErrors) => 3,
        }
    }
}

/// CLI implementation of ProgressCallback for displaying run progress
struct CliProgress {
    verbose: bool,
    start_time: Instant,
    verified: Cell<usize>,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
            verified: Cell::new(0),
        }
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_run_started(&self, rules: &[Rule]) {
        eprintln!("Backing up {} rule(s)...", rules.len());
    }

    fn on_rule_started(&self, index: usize, rule: &Rule) {
        if self.verbose {
            eprintln!(
                "[rule {}] {} -> {}",
                index,
                rule.source.display(),
                rule.destination.display()
            );
        }
    }

    fn on_file_copied(&self, pair: &CopyPair) {
        if self.verbose {
            eprintln!("  Copied: {}", pair.original.path().display());
        }
    }

    fn on_entry_skipped(&self, entry: &SkippedEntry) {
        if self.verbose {
            eprintln!("  Excluded {}: {}", entry.kind, entry.path.display());
        }
    }

    fn on_entry_failed(&self, error: &CopyError) {
        eprintln!("  Failed: {}", error);
    }

    fn on_rule_completed(&self, _index: usize, rule: &Rule, pairs_copied: usize) {
        eprintln!(
            "Copied {} files to {}",
            pairs_copied,
            rule.destination.display()
        );
    }

    fn on_verification_started(&self, pair_count: usize) {
        eprintln!("Verifying hashes of {} files...", pair_count);
    }

    fn on_pair_verified(&self, result: &PairVerification) {
        self.verified.set(self.verified.get() + 1);
        if self.verbose {
            let status = if result.matches() { "OK" } else { "MISMATCH" };
            eprintln!("  [{}] {}", status, result.pair.copy.path().display());
        }
    }

    fn on_run_completed(&self, report: &RunReport) {
        eprintln!();
        if report.dry_run {
            eprintln!("Dry run complete, nothing was written.");
        } else {
            eprintln!("Backup complete!");
        }

        eprintln!(
            "Summary: {} copied, {} excluded, {} failed",
            report.pair_count(),
            report.skipped.len(),
            report.failed.len()
        );

        match &report.verification {
            VerificationOutcome::Skipped => eprintln!("Verification: skipped"),
            VerificationOutcome::Completed(verification) => {
                if verification.all_match() {
                    eprintln!("Verification: hashes match ({} files)", self.verified.get());
                } else {
                    eprintln!("Verification: hashes don't match!");
                    for mismatch in verification.mismatches() {
                        eprintln!(
                            "  {}: source and destination checksums differ",
                            mismatch.pair.copy.path().display()
                        );
                    }
                }
            }
            VerificationOutcome::Failed(e) => eprintln!("Verification failed: {}", e),
        }

        if !report.failed.is_empty() {
            eprintln!();
            eprintln!("Failed entries:");
            for failure in &report.failed {
                eprintln!("  {}", failure);
            }
        }

        eprintln!(
            "Elapsed: {}",
            Self::format_duration(self.start_time.elapsed())
        );
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let stdin = io::stdin();
    let exit_code = match run_cli(&args, &mut stdin.lock()) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, input: &mut dyn BufRead) -> Result<Outcome> {
    let format = match &args.format {
        Some(name) => RulesFormat::from_str(name).with_context(|| {
            format!("Invalid rules format '{}'. Must be 'json' or 'lines'", name)
        })?,
        None => RulesFormat::from_path(&args.rules),
    };

    let raw_rules = load_rules(&args.rules, format)?;
    info!(rules = raw_rules.len(), path = %args.rules.display(), "rules loaded");

    let options = RunOptions {
        dry_run: args.dry_run,
        verify: !args.no_hash_verification,
        sync_files: !args.no_fs_sync,
    };

    let mut run = BackupRun::new(options);
    run.validate(&raw_rules)?;

    eprintln!("{}", run.preview());
    if !args.yes && !args.dry_run && !confirm("Continue? (y/N): ", input)? {
        return Ok(Outcome::Declined);
    }

    let progress = CliProgress::new(args.verbose);
    let report = match run.execute(Some(&progress)) {
        Ok(report) => report,
        Err(e) => {
            if let EngineError::DestinationUnavailable { partial, .. } = &e {
                eprintln!(
                    "Aborted after {} copied, {} excluded, {} failed",
                    partial.pair_count(),
                    partial.skipped.len(),
                    partial.failed.len()
                );
                write_report(args, partial)?;
            }
            return Err(e.into());
        }
    };

    write_report(args, &report)?;
    Ok(Outcome::Finished(report.status()))
}

/// Write the JSON summary if `--report` was given.
fn write_report(args: &Args, report: &RunReport) -> Result<()> {
    let Some(path) = &args.report else {
        return Ok(());
    };

    let json = serde_json::to_string_pretty(&report.summary())
        .context("Failed to serialize run summary")?;
    fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Ask a yes/no question; only `y` (any case) counts as yes.
fn confirm(prompt: &str, input: &mut dyn BufRead) -> Result<bool> {
    eprint!("{}", prompt);
    io::stderr().flush().ok();

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::TempDir;

    fn args(rules: &Path) -> Args {
        Args {
            rules: rules.to_path_buf(),
            format: None,
            yes: true,
            dry_run: false,
            no_hash_verification: false,
            no_fs_sync: false,
            report: None,
            verbose: false,
        }
    }

    fn write_json_rules(dir: &Path, src: &Path, dst: &Path) -> PathBuf {
        let rules = serde_json::json!({
            "rules": [{
                "source": src,
                "destination": dst,
                "exclude": {"files": ["*.log"], "use_glob": true}
            }]
        });
        let path = dir.join("rules.json");
        fs::write(&path, rules.to_string()).expect("Failed to write rules");
        path
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("sub")).expect("Failed to create src dir");
        fs::write(src.join("test.txt"), "hello").expect("Failed to write file");
        fs::write(src.join("debug.log"), "noise").expect("Failed to write file");
        fs::write(src.join("sub").join("nested.txt"), "world").expect("Failed to write file");
        let dst = temp_dir.path().join("dst");
        (temp_dir, src, dst)
    }

    #[test]
    fn test_cli_copies_and_verifies() {
        let (temp_dir, src, dst) = setup();
        let rules = write_json_rules(temp_dir.path(), &src, &dst);

        let outcome = run_cli(&args(&rules), &mut Cursor::new("")).expect("CLI should succeed");

        assert_eq!(outcome, Outcome::Finished(RunStatus::Success));
        assert_eq!(outcome.exit_code(), 0);
        assert!(dst.join("test.txt").exists());
        assert!(dst.join("sub").join("nested.txt").exists());
        assert!(!dst.join("debug.log").exists());
    }

    #[test]
    fn test_cli_declined_prompt_copies_nothing() {
        let (temp_dir, src, dst) = setup();
        let rules = write_json_rules(temp_dir.path(), &src, &dst);
        let mut args = args(&rules);
        args.yes = false;

        let outcome = run_cli(&args, &mut Cursor::new("n\n")).expect("CLI should succeed");

        assert_eq!(outcome, Outcome::Declined);
        assert_eq!(outcome.exit_code(), 0);
        assert!(!dst.exists());
    }

    #[test]
    fn test_cli_confirmed_prompt_copies() {
        let (temp_dir, src, dst) = setup();
        let rules = write_json_rules(temp_dir.path(), &src, &dst);
        let mut args = args(&rules);
        args.yes = false;

        let outcome = run_cli(&args, &mut Cursor::new("Y\n")).expect("CLI should succeed");

        assert_eq!(outcome, Outcome::Finished(RunStatus::Success));
        assert!(dst.join("test.txt").exists());
    }

    #[test]
    fn test_cli_line_rules() {
        let (temp_dir, src, dst) = setup();
        let rules = temp_dir.path().join("rules.txt");
        fs::write(
            &rules,
            format!("# backups\n{} -> {}\n", src.display(), dst.display()),
        )
        .expect("Failed to write rules");

        let outcome = run_cli(&args(&rules), &mut Cursor::new("")).expect("CLI should succeed");

        assert_eq!(outcome, Outcome::Finished(RunStatus::Success));
        // No exclusions in the line format
        assert!(dst.join("debug.log").exists());
    }

    #[test]
    fn test_cli_dry_run_writes_nothing() {
        let (temp_dir, src, dst) = setup();
        let rules = write_json_rules(temp_dir.path(), &src, &dst);
        let mut args = args(&rules);
        args.dry_run = true;
        args.yes = false;

        // Dry runs do not prompt
        let outcome = run_cli(&args, &mut Cursor::new("")).expect("CLI should succeed");

        assert_eq!(outcome, Outcome::Finished(RunStatus::Success));
        assert!(!dst.exists());
    }

    #[test]
    fn test_cli_writes_report() {
        let (temp_dir, src, dst) = setup();
        let rules = write_json_rules(temp_dir.path(), &src, &dst);
        let report_path = temp_dir.path().join("report.json");
        let mut args = args(&rules);
        args.report = Some(report_path.clone());

        run_cli(&args, &mut Cursor::new("")).expect("CLI should succeed");

        let report: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(&report_path).expect("Failed to read report"),
        )
        .expect("Report should be valid JSON");
        assert_eq!(report["status"], "success");
        assert_eq!(report["pair_count"], 2);
        assert_eq!(report["verification"], "match");
        assert_eq!(report["skipped"].as_array().map(|s| s.len()), Some(1));
    }

    #[test]
    fn test_cli_copy_failure_exit_code() {
        let (temp_dir, src, dst) = setup();
        fs::create_dir_all(dst.join("test.txt")).expect("Failed to create blocker dir");
        let rules = write_json_rules(temp_dir.path(), &src, &dst);

        let outcome = run_cli(&args(&rules), &mut Cursor::new("")).expect("CLI should finish");

        assert_eq!(outcome, Outcome::Finished(RunStatus::CompletedWithErrors));
        assert_eq!(outcome.exit_code(), 3);
    }

    #[test]
    fn test_cli_writes_report_when_run_aborts() {
        let (temp_dir, src, dst) = setup();
        fs::create_dir_all(dst.join("test.txt")).expect("Failed to create blocker dir");
        let blocked = temp_dir.path().join("blocked");
        fs::write(&blocked, "a file, not a directory").expect("Failed to write file");
        let rules = serde_json::json!({
            "rules": [
                {"source": src, "destination": dst},
                {"source": src, "destination": blocked}
            ]
        });
        let rules_path = temp_dir.path().join("rules.json");
        fs::write(&rules_path, rules.to_string()).expect("Failed to write rules");
        let report_path = temp_dir.path().join("report.json");
        let mut args = args(&rules_path);
        args.report = Some(report_path.clone());

        let result = run_cli(&args, &mut Cursor::new(""));
        assert!(result.is_err(), "Aborted run should be an error");

        let report: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(&report_path).expect("Report should be written on abort"),
        )
        .expect("Report should be valid JSON");
        assert_eq!(report["status"], "aborted");
        assert_eq!(report["aborted_at_rule"], 1);
        assert_eq!(report["verification"], "skipped");
        assert_eq!(report["failed"].as_array().map(|f| f.len()), Some(1));
    }

    #[test]
    fn test_cli_rejects_missing_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let rules = write_json_rules(
            temp_dir.path(),
            Path::new("/nonexistent/path"),
            &temp_dir.path().join("dst"),
        );

        let result = run_cli(&args(&rules), &mut Cursor::new(""));
        assert!(result.is_err(), "CLI should reject missing source");
    }

    #[test]
    fn test_cli_rejects_missing_rules_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let result = run_cli(&args(&temp_dir.path().join("rules.json")), &mut Cursor::new(""));
        assert!(result.is_err(), "CLI should reject missing rules file");
    }

    #[test]
    fn test_cli_rejects_invalid_format() {
        let (temp_dir, src, dst) = setup();
        let rules = write_json_rules(temp_dir.path(), &src, &dst);
        let mut args = args(&rules);
        args.format = Some("yaml".to_string());

        let result = run_cli(&args, &mut Cursor::new(""));
        assert!(result.is_err(), "CLI should reject invalid format");
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(Outcome::Finished(RunStatus::Success).exit_code(), 0);
        assert_eq!(Outcome::Finished(RunStatus::VerificationFailed).exit_code(), 1);
        assert_eq!(Outcome::Finished(RunStatus::Aborted).exit_code(), 1);
        assert_eq!(Outcome::Finished(RunStatus::HashMismatch).exit_code(), 2);
        assert_eq!(Outcome::Finished(RunStatus::CompletedWithErrors).exit_code(), 3);
    }
}
