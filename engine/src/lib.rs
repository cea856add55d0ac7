//! # BackUP Engine - Rule-driven backup library
//!
//! Copies directory trees according to a set of rules and verifies every copy
//! against its original with SHA-256.
//!
//! ## Overview
//!
//! - Rules map a source directory to a destination, with optional file and
//!   directory exclusions (literal, regex or glob, matched on base names)
//! - Rule sets are validated up front; the first bad rule aborts the run
//! - Per-entry copy failures are recorded and the traversal carries on
//! - Pairs are produced in a deterministic depth-first order
//! - Progress reporting via callbacks (decoupled from UI technology)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{BackupRun, RunOptions, RunStatus};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let raw_rules = vec![json!({
//!     "source": "/home/me/documents",
//!     "destination": "/mnt/backup/documents",
//!     "exclude": {"files": ["*.tmp"], "directories": [".cache"], "use_glob": true}
//! })];
//!
//! let mut run = BackupRun::new(RunOptions::default());
//! run.validate(&raw_rules)?;
//! println!("{}", run.preview());
//!
//! let report = run.execute(None)?;
//! println!("Copied {} files", report.pair_count());
//! assert_eq!(report.status(), RunStatus::Success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (Rule, CopyPair, FileHandle, RunState)
//! - **error**: Error types per phase
//! - **rules**: Rule validation
//! - **exclude**: Exclusion matching
//! - **fs_ops**: Tree copy and low-level filesystem operations
//! - **checksums**: SHA-256 computation and pair verification
//! - **job**: Run orchestration
//! - **report**: Run report and copy log
//! - **config**: Rules file parsing
//! - **progress**: Progress callback trait

pub mod checksums;
pub mod config;
pub mod error;
pub mod exclude;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod progress;
pub mod report;
pub mod rules;

// Re-export main types and functions
pub use checksums::{compute_file_checksum, verify, ChecksumValue, PairVerification, VerificationReport};
pub use config::{load_rules, RulesFormat};
pub use error::{ConfigError, CopyError, EngineError, ValidationError, VerificationError};
pub use exclude::{is_excluded, ExclusionRule, Exclusions, PatternMode};
pub use fs_ops::copy_tree;
pub use job::{describe_rules, run_backup, BackupRun};
pub use model::{CopyPair, FileHandle, Rule, RunOptions, RunState};
pub use progress::ProgressCallback;
pub use report::{
    CopyLog, EntryKind, RunReport, RunStatus, RunSummary, SkippedEntry, VerificationOutcome,
};
pub use rules::validate;
