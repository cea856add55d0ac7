//! Filesystem operations module.
//!
//! This module provides:
//! - Rule-driven tree copy with file and directory exclusions
//! - Single file copy through a partial sibling, with optional flush to disk
//! - Idempotent destination directory creation
//!
//! Traversal is depth-first over an explicit work stack. Entries of each directory
//! are visited in lexicographic name order, so pairs come out sorted by original
//! path and two runs over the same tree produce the same sequence.

use crate::error::CopyError;
use crate::exclude::Exclusions;
use crate::model::{CopyPair, RunOptions};
use crate::progress::ProgressCallback;
use crate::report::{CopyLog, EntryKind};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One pending unit of traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Work {
    Directory { source: PathBuf, destination: PathBuf },
    File { source: PathBuf, destination: PathBuf },
}

/// Copy `source` into `destination`, honouring `exclusions`.
///
/// # Returns
/// One `CopyPair` per file copied, in depth-first lexicographic order. In a dry run
/// the pairs describe what would have been copied and nothing is written.
///
/// # Errors
/// Returns `CopyError` only if `destination` itself cannot be used as a directory.
/// Every other failure is appended to `log` and traversal moves on to the next
/// entry; a directory that cannot be created or listed loses only its own subtree.
pub fn copy_tree(
    source: &Path,
    destination: &Path,
    exclusions: &Exclusions,
    options: &RunOptions,
    log: &mut CopyLog,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<Vec<CopyPair>, CopyError> {
    ensure_directory(destination, !options.dry_run)?;

    let mut pairs = Vec::new();
    let mut stack = vec![Work::Directory {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
    }];
    let mut is_root = true;

    while let Some(work) = stack.pop() {
        match work {
            Work::File {
                source,
                destination,
            } => {
                let result = if options.dry_run {
                    Ok(0)
                } else {
                    copy_file(&source, &destination, options.sync_files)
                };

                match result {
                    Ok(bytes) => {
                        debug!(from = %source.display(), to = %destination.display(), bytes, "copied");
                        let pair = CopyPair::new(source, destination);
                        if let Some(callback) = progress_callback {
                            callback.on_file_copied(&pair);
                        }
                        pairs.push(pair);
                    }
                    Err(e) => record_failure(log, e, progress_callback),
                }
            }
            Work::Directory {
                source,
                destination,
            } => {
                if !is_root {
                    if let Err(e) = ensure_directory(&destination, !options.dry_run) {
                        record_failure(log, e, progress_callback);
                        continue;
                    }
                }
                is_root = false;

                match list_children(&source, &destination, exclusions, log, progress_callback) {
                    Ok(children) => stack.extend(children.into_iter().rev()),
                    Err(e) => record_failure(log, e, progress_callback),
                }
            }
        }
    }

    Ok(pairs)
}

/// List a directory's entries as work items, sorted by name, with exclusions applied.
///
/// Excluded entries are logged as skipped and not returned. Entries whose type
/// cannot be determined are logged as failures.
fn list_children(
    source: &Path,
    destination: &Path,
    exclusions: &Exclusions,
    log: &mut CopyLog,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<Vec<Work>, CopyError> {
    let mut names = fs::read_dir(source)
        .and_then(|entries| {
            entries
                .map(|entry| entry.map(|e| e.file_name()))
                .collect::<io::Result<Vec<OsString>>>()
        })
        .map_err(|e| CopyError::ReadDirectory {
            path: source.to_path_buf(),
            source: e,
        })?;
    names.sort();

    let mut children = Vec::with_capacity(names.len());
    for name in names {
        let entry_source = source.join(&name);
        let entry_destination = destination.join(&name);
        let display_name = name.to_string_lossy();

        // Follows symlinks: a link is handled as whatever it points to
        let metadata = match fs::metadata(&entry_source) {
            Ok(metadata) => metadata,
            Err(e) => {
                record_failure(
                    log,
                    CopyError::Inspect {
                        path: entry_source,
                        source: e,
                    },
                    progress_callback,
                );
                continue;
            }
        };

        let (kind, excluded) = if metadata.is_dir() {
            (EntryKind::Directory, exclusions.excludes_directory(&display_name))
        } else if metadata.is_file() {
            (EntryKind::File, exclusions.excludes_file(&display_name))
        } else {
            record_failure(
                log,
                CopyError::UnsupportedType { path: entry_source },
                progress_callback,
            );
            continue;
        };

        if excluded {
            debug!(path = %entry_source.display(), %kind, "excluded");
            let skipped = log.skip(entry_source, kind);
            if let Some(callback) = progress_callback {
                callback.on_entry_skipped(skipped);
            }
            continue;
        }

        children.push(match kind {
            EntryKind::Directory => Work::Directory {
                source: entry_source,
                destination: entry_destination,
            },
            EntryKind::File => Work::File {
                source: entry_source,
                destination: entry_destination,
            },
        });
    }

    Ok(children)
}

fn record_failure(
    log: &mut CopyLog,
    error: CopyError,
    progress_callback: Option<&dyn ProgressCallback>,
) {
    warn!(path = %error.path().display(), "{}", error);
    let error = log.fail(error);
    if let Some(callback) = progress_callback {
        callback.on_entry_failed(error);
    }
}

/// Copy a single file's bytes from `src` to `dst`.
///
/// Bytes go to a hidden sibling of `dst` first, which is renamed over `dst` only
/// once the copy (and flush, if requested) succeeded. A failed copy therefore
/// leaves whatever `dst` held before untouched.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns `CopyError::SameFile` if `dst` already is `src`, `CopyError::CopyFile`
/// if reading, writing or the final rename fails and `CopyError::Sync` if the
/// flush fails. The partial sibling is removed on every error.
pub fn copy_file(src: &Path, dst: &Path, sync: bool) -> Result<u64, CopyError> {
    let copy_error = |e| CopyError::CopyFile {
        from: src.to_path_buf(),
        path: dst.to_path_buf(),
        source: e,
    };

    if is_same_file(src, dst) {
        return Err(CopyError::SameFile {
            from: src.to_path_buf(),
            path: dst.to_path_buf(),
        });
    }

    let mut src_file = fs::File::open(src).map_err(copy_error)?;
    let partial = partial_path(dst);
    let mut partial_file = fs::File::create(&partial).map_err(copy_error)?;

    let result = io::copy(&mut src_file, &mut partial_file)
        .map_err(copy_error)
        .and_then(|bytes| {
            if sync {
                partial_file.sync_all().map_err(|e| CopyError::Sync {
                    path: dst.to_path_buf(),
                    source: e,
                })?;
            }
            Ok(bytes)
        });
    drop(partial_file);

    let result = result.and_then(|bytes| {
        fs::rename(&partial, dst).map_err(copy_error)?;
        Ok(bytes)
    });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

/// Hidden sibling that receives the bytes before they replace `dst`.
fn partial_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".partial");
    dst.with_file_name(name)
}

/// Whether `a` and `b` both exist and are the same file (hard links included).
#[cfg(unix)]
fn is_same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Make sure `path` is a directory.
///
/// With `create` set, a missing directory is created along with its parents; an
/// existing directory is accepted as is. Without it the check is read-only and a
/// missing path is fine.
///
/// # Errors
/// `CopyError::NotADirectory` if `path` exists as something else,
/// `CopyError::CreateDirectory` if it cannot be inspected or created.
pub fn ensure_directory(path: &Path, create: bool) -> Result<(), CopyError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(CopyError::NotADirectory {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if create {
                fs::create_dir_all(path).map_err(|e| CopyError::CreateDirectory {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            }
            Ok(())
        }
        Err(e) => Err(CopyError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
