//! Core data model for backup runs.
//!
//! This module defines the main data structures:
//! - Rule: one validated source -> destination mapping with its exclusions
//! - FileHandle, CopyPair: an original file and the copy produced from it
//! - RunOptions, RunState: how a run behaves and where it is in its lifecycle

use crate::checksums::{self, ChecksumValue};
use crate::error::VerificationError;
use crate::exclude::Exclusions;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A validated backup rule.
///
/// Created by [`crate::rules::validate`]; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Existing source directory
    pub source: PathBuf,

    /// Destination directory (created on demand)
    pub destination: PathBuf,

    /// File and directory exclusion lists
    pub exclusions: Exclusions,
}

/// Read-only view of a file on disk.
///
/// Contents and hash are read on demand; nothing is cached.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileHandle {
    path: PathBuf,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileHandle { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full contents of the file.
    pub fn bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// SHA-256 of the file contents.
    pub fn hash(&self) -> Result<ChecksumValue, VerificationError> {
        checksums::compute_file_checksum(&self.path)
    }
}

/// An original file and the copy made from it.
///
/// Both handles sit at the same relative path under their rule's source and
/// destination roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPair {
    pub original: FileHandle,
    pub copy: FileHandle,
}

impl CopyPair {
    pub fn new(original: impl Into<PathBuf>, copy: impl Into<PathBuf>) -> Self {
        CopyPair {
            original: FileHandle::new(original),
            copy: FileHandle::new(copy),
        }
    }
}

/// Options controlling a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Traverse and report without writing anything
    pub dry_run: bool,

    /// Compare SHA-256 digests of every pair after copying
    pub verify: bool,

    /// Flush each copied file to disk before pairing it
    pub sync_files: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            dry_run: false,
            verify: true,
            sync_files: true,
        }
    }
}

/// Lifecycle of a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created, nothing done yet
    Idle,
    /// Rules being (or successfully) validated
    Validating,
    /// Copying rule trees
    Copying,
    /// Comparing hashes of copied pairs
    Verifying,
    /// Finished; the report is available
    Done,
    /// Stopped by invalid rules or an unusable destination
    Aborted,
}

impl RunState {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Validating => write!(f, "validating"),
            RunState::Copying => write!(f, "copying"),
            RunState::Verifying => write!(f, "verifying"),
            RunState::Done => write!(f, "done"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}
