//! Stat-and-filter evaluation of a single work item
//!
//! In find mode the evaluator performs one `lstat` per item and decides
//! whether it is a match. In delete mode it removes the entry instead and
//! counts nothing: deletion is best-effort cleanup.

use crate::walker::aggregate::LocalResult;
use crate::walker::item::{EntryTag, WorkItem};
use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use tracing::{debug, trace, warn};

/// What a find-mode item has to look like to be counted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Exact size in bytes
    pub expected_size: u64,

    /// Minimum status-change time, whole seconds since the epoch
    pub freshness_floor: i64,

    /// Non-directories must contain this in their name to be enqueued
    pub name_substring: Option<String>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            expected_size: crate::config::DEFAULT_EXPECTED_SIZE,
            freshness_floor: i64::MIN,
            name_substring: None,
        }
    }
}

impl FilterPolicy {
    /// Whether a child found by a directory listing should be enqueued.
    ///
    /// Directories always pass so the walk can reach files below them.
    pub fn admits_name(&self, name: &OsStr, tag: EntryTag) -> bool {
        if tag.is_dir() {
            return true;
        }
        match self.name_substring.as_deref() {
            None | Some("") => true,
            Some(needle) => contains(name.as_bytes(), needle.as_bytes()),
        }
    }

    /// Apply size, freshness and type checks to an lstat result
    pub fn check(&self, meta: &Metadata) -> Evaluation {
        if !meta.file_type().is_file() {
            return Evaluation::NotRegular;
        }
        if meta.size() != self.expected_size {
            return Evaluation::SizeMismatch { size: meta.size() };
        }
        if meta.ctime() < self.freshness_floor {
            return Evaluation::TooOld { ctime: meta.ctime() };
        }
        Evaluation::Matched
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Outcome of evaluating one item
#[derive(Debug)]
pub enum Evaluation {
    /// Counted in `found_files`
    Matched,

    /// Regular file of the wrong size
    SizeMismatch { size: u64 },

    /// Regular file changed before the freshness floor
    TooOld { ctime: i64 },

    /// Not a regular file
    NotRegular,

    /// lstat failed; counted in `errors`
    StatFailed(std::io::Error),

    /// Unlinked (delete mode)
    Removed,

    /// Directory queued for removal after its children (delete mode)
    Deferred,

    /// Unlink failed (delete mode); not counted
    RemoveFailed(std::io::Error),
}

impl Evaluation {
    pub fn is_match(&self) -> bool {
        matches!(self, Evaluation::Matched)
    }
}

/// Applies the filter policy to dequeued items
#[derive(Debug, Clone)]
pub struct Evaluator {
    policy: FilterPolicy,
    verbosity: u8,
}

impl Evaluator {
    pub fn new(policy: FilterPolicy, verbosity: u8) -> Self {
        Self { policy, verbosity }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Find mode: lstat the item and count it if it matches
    pub fn evaluate(&self, item: &WorkItem, local: &mut LocalResult) -> Evaluation {
        if self.verbosity >= 2 {
            debug!(path = %item.path.display(), "STAT");
        }

        let evaluation = match fs::symlink_metadata(&item.path) {
            Ok(meta) => self.policy.check(&meta),
            Err(e) => Evaluation::StatFailed(e),
        };

        match &evaluation {
            Evaluation::Matched => {
                local.found_files += 1;
                if self.verbosity >= 2 {
                    debug!(path = %item.path.display(), "Found acceptable file");
                }
            }
            Evaluation::StatFailed(e) => {
                local.errors += 1;
                if self.verbosity >= 1 {
                    warn!(path = %item.path.display(), error = %e, "Error stating file");
                }
            }
            Evaluation::SizeMismatch { size } if self.verbosity >= 2 => {
                debug!(path = %item.path.display(), size = size, "Size does not match");
            }
            Evaluation::TooOld { ctime } if self.verbosity >= 2 => {
                debug!(path = %item.path.display(), ctime = ctime, "Timestamp too small");
            }
            Evaluation::NotRegular if self.verbosity >= 2 => {
                debug!(path = %item.path.display(), tag = ?item.tag, "Not a regular file");
            }
            _ => {}
        }

        evaluation
    }

    /// Delete mode: unlink the item, or defer it if it is a directory
    pub fn remove(&self, item: &WorkItem, local: &mut LocalResult) -> Evaluation {
        if item.tag.is_dir() {
            local.deferred_dirs.push(item.path.clone());
            return Evaluation::Deferred;
        }

        match fs::remove_file(&item.path) {
            Ok(()) => Evaluation::Removed,
            Err(e) => {
                trace!(path = %item.path.display(), error = %e, "Unlink failed");
                Evaluation::RemoveFailed(e)
            }
        }
    }
}
