//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the engine
//! independent of how progress is shown. The CLI implements it for stderr output.

use crate::checksums::PairVerification;
use crate::error::CopyError;
use crate::model::{CopyPair, Rule};
use crate::report::{RunReport, SkippedEntry};

/// Trait for receiving progress updates from a backup run.
///
/// All methods are called synchronously, in traversal order.
pub trait ProgressCallback {
    /// Called once copying starts, after all rules validated.
    fn on_run_started(&self, rules: &[Rule]);

    /// Called before a rule's tree is copied.
    fn on_rule_started(&self, index: usize, rule: &Rule);

    /// Called after a file was copied (or would be, in a dry run).
    fn on_file_copied(&self, pair: &CopyPair);

    /// Called when an entry is left out by an exclusion.
    fn on_entry_skipped(&self, entry: &SkippedEntry);

    /// Called when an entry could not be copied.
    fn on_entry_failed(&self, error: &CopyError);

    /// Called after a rule's tree has been fully traversed.
    fn on_rule_completed(&self, index: usize, rule: &Rule, pairs_copied: usize);

    /// Called when hash verification starts.
    fn on_verification_started(&self, pair_count: usize);

    /// Called after each pair has been hashed and compared.
    fn on_pair_verified(&self, result: &PairVerification);

    /// Called when the run reaches `Done`.
    fn on_run_completed(&self, report: &RunReport);
}
