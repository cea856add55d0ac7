//! Run report models and the copy-phase accumulator.

use crate::checksums::VerificationReport;
use crate::error::{CopyError, VerificationError};
use crate::model::CopyPair;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of filesystem entry an exclusion applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
        }
    }
}

/// An entry left out by an exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Append-only accumulator for skipped and failed entries.
///
/// One instance lives for one run and is threaded through every tree copy.
#[derive(Debug, Default)]
pub struct CopyLog {
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<CopyError>,
}

impl CopyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip(&mut self, path: PathBuf, kind: EntryKind) -> &SkippedEntry {
        self.skipped.push(SkippedEntry { path, kind });
        &self.skipped[self.skipped.len() - 1]
    }

    pub fn fail(&mut self, error: CopyError) -> &CopyError {
        self.failed.push(error);
        &self.failed[self.failed.len() - 1]
    }
}

/// Result of the verification phase.
#[derive(Debug)]
pub enum VerificationOutcome {
    /// Disabled by configuration or dry run
    Skipped,
    /// Every pair was hashed; see `all_match` for the verdict
    Completed(VerificationReport),
    /// A paired file could not be read; no per-pair results are kept
    Failed(VerificationError),
}

/// How a finished run should be judged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Everything copied; hashes matched or verification was skipped
    Success,
    /// Some entries failed to copy; the rest copied and verified
    CompletedWithErrors,
    /// At least one copy differs from its original
    HashMismatch,
    /// Verification could not read a paired file
    VerificationFailed,
    /// A rule's destination root was unusable; later rules never ran
    Aborted,
}

/// Everything a run produced.
///
/// A `Done` run carries the full picture. An aborted run carries what the rules
/// before `aborted_at_rule` copied, skipped and failed, with verification skipped.
#[derive(Debug)]
pub struct RunReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub rule_count: usize,
    pub aborted_at_rule: Option<usize>,
    pub pairs: Vec<CopyPair>,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<CopyError>,
    pub verification: VerificationOutcome,
}

impl RunReport {
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// `Some(true)` when all pairs matched, `Some(false)` on any mismatch, `None`
    /// when verification was skipped or failed.
    pub fn hashes_match(&self) -> Option<bool> {
        match &self.verification {
            VerificationOutcome::Completed(report) => Some(report.all_match()),
            _ => None,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.aborted_at_rule.is_some() {
            return RunStatus::Aborted;
        }
        match &self.verification {
            VerificationOutcome::Failed(_) => RunStatus::VerificationFailed,
            VerificationOutcome::Completed(report) if !report.all_match() => {
                RunStatus::HashMismatch
            }
            _ if !self.failed.is_empty() => RunStatus::CompletedWithErrors,
            _ => RunStatus::Success,
        }
    }

    /// Serializable digest of this report.
    pub fn summary(&self) -> RunSummary {
        let (verification, mismatches) = match &self.verification {
            VerificationOutcome::Skipped => ("skipped".to_string(), Vec::new()),
            VerificationOutcome::Completed(report) => (
                (if report.all_match() { "match" } else { "mismatch" }).to_string(),
                report
                    .mismatches()
                    .map(|r| r.pair.copy.path().to_path_buf())
                    .collect(),
            ),
            VerificationOutcome::Failed(e) => (format!("error: {}", e), Vec::new()),
        };

        RunSummary {
            id: self.id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            dry_run: self.dry_run,
            status: self.status(),
            rule_count: self.rule_count,
            aborted_at_rule: self.aborted_at_rule,
            pair_count: self.pair_count(),
            skipped: self.skipped.clone(),
            failed: self
                .failed
                .iter()
                .map(|e| FailedEntry {
                    path: e.path().to_path_buf(),
                    error: e.to_string(),
                })
                .collect(),
            verification,
            mismatches,
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[BACKUP] rules={} pairs={} skipped={} failed={} status={:?}",
            self.rule_count,
            self.pair_count(),
            self.skipped.len(),
            self.failed.len(),
            self.status()
        )
    }
}

/// A failed entry flattened for export.
#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry {
    pub path: PathBuf,
    pub error: String,
}

/// Machine-readable run summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub status: RunStatus,
    pub rule_count: usize,
    pub aborted_at_rule: Option<usize>,
    pub pair_count: usize,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<FailedEntry>,
    pub verification: String,
    pub mismatches: Vec<PathBuf>,
}
