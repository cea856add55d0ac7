//! Checksum and verification functionality.
//!
//! This module provides:
//! - SHA-256 computation over file contents
//! - Pairwise verification of originals against their copies

use crate::error::VerificationError;
use crate::model::CopyPair;
use crate::progress::ProgressCallback;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

/// A SHA-256 digest as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    hex: String,
}

impl ChecksumValue {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        ChecksumValue {
            hex: hex.into().to_lowercase(),
        }
    }

    /// Get the hex string representation
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Format as "sha256:hex"
    pub fn to_string_with_algo(&self) -> String {
        format!("sha256:{}", self.hex)
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Hash everything readable from `reader`.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<ChecksumValue> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(ChecksumValue {
        hex: format!("{:x}", hasher.finalize()),
    })
}

/// Compute the SHA-256 checksum of a file.
pub fn compute_file_checksum(path: &Path) -> Result<ChecksumValue, VerificationError> {
    let to_error = |e| VerificationError {
        path: path.to_path_buf(),
        source: e,
    };
    let file = File::open(path).map_err(to_error)?;
    hash_reader(file).map_err(to_error)
}

/// Verification outcome for one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairVerification {
    pub pair: CopyPair,
    pub original_checksum: ChecksumValue,
    pub copy_checksum: ChecksumValue,
}

impl PairVerification {
    pub fn matches(&self) -> bool {
        self.original_checksum == self.copy_checksum
    }
}

/// Per-pair results in the order the pairs were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub results: Vec<PairVerification>,
}

impl VerificationReport {
    /// True when every pair matched. An empty report is vacuously true.
    pub fn all_match(&self) -> bool {
        self.results.iter().all(PairVerification::matches)
    }

    /// Pairs whose digests differ.
    pub fn mismatches(&self) -> impl Iterator<Item = &PairVerification> {
        self.results.iter().filter(|r| !r.matches())
    }
}

/// Hash both sides of every pair and compare.
///
/// Stops at the first unreadable file; results gathered so far are dropped and
/// no `on_pair_verified` callback fires.
pub fn verify(
    pairs: &[CopyPair],
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<VerificationReport, VerificationError> {
    let mut results = Vec::with_capacity(pairs.len());

    for pair in pairs {
        let original_checksum = pair.original.hash()?;
        let copy_checksum = pair.copy.hash()?;

        let result = PairVerification {
            pair: pair.clone(),
            original_checksum,
            copy_checksum,
        };

        if result.matches() {
            debug!(path = %pair.copy.path().display(), checksum = %result.copy_checksum, "verified");
        } else {
            warn!(
                original = %pair.original.path().display(),
                copy = %pair.copy.path().display(),
                "checksum mismatch"
            );
        }

        results.push(result);
    }

    // Reported only once every pair has been read
    if let Some(callback) = progress_callback {
        for result in &results {
            callback.on_pair_verified(result);
        }
    }

    Ok(VerificationReport { results })
}
