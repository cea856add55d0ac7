//! Backup orchestration.
//!
//! A [`BackupRun`] moves through `Idle -> Validating -> Copying -> Verifying -> Done`.
//! Invalid rules or an unusable destination root end the run in `Aborted`.
//! Per-entry copy failures never abort; they are collected into the report.
//!
//! Validation and execution are separate calls so a caller can show
//! [`BackupRun::preview`] and ask for confirmation in between.

use crate::checksums;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{Rule, RunOptions, RunState};
use crate::progress::ProgressCallback;
use crate::report::{CopyLog, RunReport, VerificationOutcome};
use crate::rules;
use chrono::Utc;
use serde_json::Value;
use std::fmt::Write;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One backup run over a validated rule set.
#[derive(Debug)]
pub struct BackupRun {
    id: Uuid,
    options: RunOptions,
    state: RunState,
    rules: Vec<Rule>,
}

impl BackupRun {
    /// Create a run in `Idle` state.
    pub fn new(options: RunOptions) -> Self {
        BackupRun {
            id: Uuid::new_v4(),
            options,
            state: RunState::Idle,
            rules: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Rules accepted by [`BackupRun::validate`].
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Validate the raw rule set.
    ///
    /// On success the run stays in `Validating`, ready for [`BackupRun::execute`].
    ///
    /// # Errors
    /// `EngineError::Validation` for the first invalid rule; the run is then
    /// `Aborted`. `EngineError::InvalidState` if the run is not `Idle`.
    pub fn validate(&mut self, raw_rules: &[Value]) -> Result<&[Rule], EngineError> {
        if self.state != RunState::Idle {
            return Err(EngineError::InvalidState {
                action: "validate",
                state: self.state,
            });
        }

        self.state = RunState::Validating;
        match rules::validate(raw_rules) {
            Ok(rules) => {
                info!(run = %self.id, rules = rules.len(), "rules validated");
                self.rules = rules;
                Ok(&self.rules)
            }
            Err(e) => {
                error!(run = %self.id, "{}", e);
                self.state = RunState::Aborted;
                Err(e.into())
            }
        }
    }

    /// Human-readable summary of what the run will do.
    pub fn preview(&self) -> String {
        describe_rules(&self.rules, &self.options)
    }

    /// Copy every rule's tree, then verify the pairs if enabled.
    ///
    /// # Errors
    /// `EngineError::DestinationUnavailable` if a rule's destination root cannot be
    /// created; the run is then `Aborted`, later rules are not copied and the error
    /// carries a partial report for the rules before it.
    /// `EngineError::InvalidState` unless the run has just been validated.
    pub fn execute(
        &mut self,
        progress_callback: Option<&dyn ProgressCallback>,
    ) -> Result<RunReport, EngineError> {
        if self.state != RunState::Validating {
            return Err(EngineError::InvalidState {
                action: "execute",
                state: self.state,
            });
        }

        self.state = RunState::Copying;
        let started_at = Utc::now();
        info!(run = %self.id, dry_run = self.options.dry_run, "copying");

        if let Some(callback) = progress_callback {
            callback.on_run_started(&self.rules);
        }

        let mut log = CopyLog::new();
        let mut pairs = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(callback) = progress_callback {
                callback.on_rule_started(index, rule);
            }

            match fs_ops::copy_tree(
                &rule.source,
                &rule.destination,
                &rule.exclusions,
                &self.options,
                &mut log,
                progress_callback,
            ) {
                Ok(rule_pairs) => {
                    info!(
                        rule = index,
                        files = rule_pairs.len(),
                        destination = %rule.destination.display(),
                        "rule copied"
                    );
                    if let Some(callback) = progress_callback {
                        callback.on_rule_completed(index, rule, rule_pairs.len());
                    }
                    pairs.extend(rule_pairs);
                }
                Err(source) => {
                    error!(rule = index, "{}", source);
                    self.state = RunState::Aborted;
                    let partial = RunReport {
                        id: self.id,
                        started_at,
                        finished_at: Utc::now(),
                        dry_run: self.options.dry_run,
                        rule_count: self.rules.len(),
                        aborted_at_rule: Some(index),
                        pairs,
                        skipped: log.skipped,
                        failed: log.failed,
                        verification: VerificationOutcome::Skipped,
                    };
                    info!(run = %self.id, "{}", partial);
                    return Err(EngineError::DestinationUnavailable {
                        rule: index,
                        source,
                        partial: Box::new(partial),
                    });
                }
            }
        }

        if !log.failed.is_empty() {
            warn!(run = %self.id, failed = log.failed.len(), "some entries were not copied");
        }

        self.state = RunState::Verifying;
        let verification = if self.options.verify && !self.options.dry_run {
            info!(run = %self.id, pairs = pairs.len(), "verifying hashes");
            if let Some(callback) = progress_callback {
                callback.on_verification_started(pairs.len());
            }
            match checksums::verify(&pairs, progress_callback) {
                Ok(report) => VerificationOutcome::Completed(report),
                Err(e) => {
                    error!(run = %self.id, "{}", e);
                    VerificationOutcome::Failed(e)
                }
            }
        } else {
            VerificationOutcome::Skipped
        };

        self.state = RunState::Done;
        let report = RunReport {
            id: self.id,
            started_at,
            finished_at: Utc::now(),
            dry_run: self.options.dry_run,
            rule_count: self.rules.len(),
            aborted_at_rule: None,
            pairs,
            skipped: log.skipped,
            failed: log.failed,
            verification,
        };
        info!(run = %self.id, "{}", report);

        if let Some(callback) = progress_callback {
            callback.on_run_completed(&report);
        }

        Ok(report)
    }
}

/// Validate and execute in one go, without a confirmation step.
pub fn run_backup(
    raw_rules: &[Value],
    options: RunOptions,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<RunReport, EngineError> {
    let mut run = BackupRun::new(options);
    run.validate(raw_rules)?;
    run.execute(progress_callback)
}

/// Describe each rule's mapping and active exclusions, one rule per paragraph.
pub fn describe_rules(rules: &[Rule], options: &RunOptions) -> String {
    let mut out = String::new();

    let header = match (options.dry_run, options.verify) {
        (true, _) => "Dry run, nothing will be written. Would copy:",
        (false, true) => "Will copy and verify hash:",
        (false, false) => "Will copy:",
    };
    out.push_str(header);
    out.push('\n');

    for rule in rules {
        let _ = write!(
            out,
            "{} -> {}",
            rule.source.display(),
            rule.destination.display()
        );
        if !rule.exclusions.files.is_empty() {
            let _ = write!(out, " (excluding files: {})", join(&rule.exclusions.files));
        }
        if !rule.exclusions.directories.is_empty() {
            let _ = write!(
                out,
                " (excluding directories: {})",
                join(&rule.exclusions.directories)
            );
        }
        out.push_str("\n\n");
    }

    out
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
