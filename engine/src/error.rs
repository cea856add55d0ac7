//! Error types for the backup engine.
//!
//! Errors are split by phase:
//! - `ValidationError`: a malformed rule; fatal before any copying happens
//! - `CopyError`: a single entry could not be copied; recorded and skipped
//! - `VerificationError`: a paired file could not be read back; fatal for verification
//! - `ConfigError`: the rules file could not be loaded
//!
//! `EngineError` is the job-level error that aborts a run.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A rule record was rejected by the validator.
///
/// `index` is the zero-based position of the offending record in the rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The record is not an object at all
    #[error("rule {index}: malformed rule: {reason}")]
    MalformedRule { index: usize, reason: String },

    /// Source missing, not a string, nonexistent or not a directory
    #[error("rule {index}: invalid source: {reason}")]
    InvalidSource { index: usize, reason: String },

    /// Destination missing, not a string or empty
    #[error("rule {index}: invalid destination: {reason}")]
    InvalidDestination { index: usize, reason: String },

    /// Malformed `exclude` block or an uncompilable pattern
    #[error("rule {index}: invalid exclusion: {reason}")]
    InvalidExclusion { index: usize, reason: String },
}

impl ValidationError {
    /// Index of the rule that failed validation.
    pub fn index(&self) -> usize {
        match self {
            Self::MalformedRule { index, .. }
            | Self::InvalidSource { index, .. }
            | Self::InvalidDestination { index, .. }
            | Self::InvalidExclusion { index, .. } => *index,
        }
    }
}

/// A per-entry failure during tree copy.
///
/// These never abort the traversal on their own. `CreateDirectory` and
/// `NotADirectory` abort the subtree rooted at `path`.
#[derive(Debug, Error)]
pub enum CopyError {
    /// Directory listing failed
    #[error("failed to list directory {}: {source}", .path.display())]
    ReadDirectory { path: PathBuf, source: io::Error },

    /// Entry type could not be determined (broken link, vanished entry)
    #[error("failed to inspect {}: {source}", .path.display())]
    Inspect { path: PathBuf, source: io::Error },

    /// Destination directory could not be created
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirectory { path: PathBuf, source: io::Error },

    /// Destination path exists but is a file
    #[error("destination {} exists and is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    /// Source entry is neither a file nor a directory (socket, fifo, device)
    #[error("unsupported file type: {}", .path.display())]
    UnsupportedType { path: PathBuf },

    /// Reading the source or writing the destination failed
    #[error("failed to copy {} to {}: {source}", .from.display(), .path.display())]
    CopyFile {
        from: PathBuf,
        path: PathBuf,
        source: io::Error,
    },

    /// Destination already is the source file; copying would truncate it
    #[error("refusing to copy {} onto itself ({})", .from.display(), .path.display())]
    SameFile { from: PathBuf, path: PathBuf },

    /// Flushing the written copy to disk failed
    #[error("failed to sync {}: {source}", .path.display())]
    Sync { path: PathBuf, source: io::Error },
}

impl CopyError {
    /// The path the failure is reported against.
    pub fn path(&self) -> &Path {
        match self {
            Self::ReadDirectory { path, .. }
            | Self::Inspect { path, .. }
            | Self::CreateDirectory { path, .. }
            | Self::NotADirectory { path }
            | Self::UnsupportedType { path }
            | Self::CopyFile { path, .. }
            | Self::SameFile { path, .. }
            | Self::Sync { path, .. } => path,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ReadDirectory { source, .. }
            | Self::Inspect { source, .. }
            | Self::CreateDirectory { source, .. }
            | Self::CopyFile { source, .. }
            | Self::Sync { source, .. } => source.raw_os_error(),
            Self::NotADirectory { .. }
            | Self::UnsupportedType { .. }
            | Self::SameFile { .. } => None,
        }
    }
}

/// A file in a copy pair could not be read back for hashing.
#[derive(Debug, Error)]
#[error("failed to read {} for verification: {source}", .path.display())]
pub struct VerificationError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// The rules file could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse rules JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no rules found")]
    MissingRules,

    #[error("line {line}: expected `source -> destination`, got {content:?}")]
    MalformedLine { line: usize, content: String },
}

/// Errors that abort a backup run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rule validation failed; nothing was copied
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A rule's destination root could not be prepared.
    ///
    /// `partial` reports what the earlier rules already wrote, skipped and failed.
    #[error("rule {rule}: destination unavailable: {source}")]
    DestinationUnavailable {
        rule: usize,
        #[source]
        source: CopyError,
        partial: Box<crate::report::RunReport>,
    },

    /// An operation was invoked in the wrong run state
    #[error("cannot {action} while run is {state}")]
    InvalidState {
        action: &'static str,
        state: crate::model::RunState,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
