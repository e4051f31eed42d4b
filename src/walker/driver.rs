//! Seed and process callbacks for the work queue
//!
//! The driver turns one dequeued token into a terminal action (stat-and-filter
//! or delete) and, for directories, into one new token per child. It depends
//! only on the [`Enqueue`] capability, so it runs the same under the
//! work-stealing queue and under a plain `Vec` in tests.

use crate::config::{Mode, RunConfig};
use crate::error::Result;
use crate::walker::aggregate::LocalResult;
use crate::walker::filter::Evaluator;
use crate::walker::item::{EntryTag, PathCodec, Token};
use crate::walker::queue::Enqueue;
use crate::walker::stonewall::Stonewall;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct TraversalDriver {
    config: Arc<RunConfig>,
    codec: PathCodec,
    evaluator: Evaluator,
    stonewall: Stonewall,
}

impl TraversalDriver {
    pub fn new(config: Arc<RunConfig>, stonewall: Stonewall) -> Self {
        let codec = PathCodec::new(config.max_path_len);
        let evaluator = Evaluator::new(config.policy.clone(), config.verbosity);

        Self {
            config,
            codec,
            evaluator,
            stonewall,
        }
    }

    /// The single root item, tagged as a directory
    pub fn seed<Q: Enqueue + ?Sized>(&self, queue: &mut Q) -> Result<()> {
        let token = self.codec.encode_root(&self.config.root)?;
        debug!(root = %self.config.root.display(), "Seeding work queue");
        queue.enqueue(token);
        Ok(())
    }

    /// Act on one item and enqueue the children of a directory
    pub fn process<Q: Enqueue + ?Sized>(
        &self,
        token: &Token,
        queue: &mut Q,
        local: &mut LocalResult,
    ) -> Result<()> {
        let item = self.codec.decode(token)?;

        match self.config.mode {
            Mode::Find => {
                self.evaluator.evaluate(&item, local);
            }
            Mode::Delete => {
                // The root itself is never removed
                if item.path != self.config.root {
                    self.evaluator.remove(&item, local);
                }
            }
        }

        if item.tag.is_dir() {
            self.expand(&item.path, queue, local)?;
        }

        Ok(())
    }

    /// List `dir` and enqueue every admitted child.
    ///
    /// A directory that cannot be opened is logged and skipped; it is not
    /// counted as an error.
    fn expand<Q: Enqueue + ?Sized>(
        &self,
        dir: &Path,
        queue: &mut Q,
        local: &mut LocalResult,
    ) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot open directory");
                return Ok(());
            }
        };

        for entry in entries {
            if self.stonewall.expired() {
                local.stonewalled = true;
                trace!(path = %dir.display(), "Stonewall reached, truncating listing");
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "Failed to read directory entry");
                    continue;
                }
            };

            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            let tag = EntryTag::from_file_type(entry.file_type().ok());
            if !self.evaluator.policy().admits_name(&name, tag) {
                continue;
            }

            queue.enqueue(self.codec.encode(dir, &name, tag)?);
        }

        Ok(())
    }
}

/// Remove directories deferred during a delete run, deepest first.
///
/// Failures are ignored: a directory the stonewall left non-empty simply
/// stays. Returns the number removed.
pub fn remove_deferred_dirs(mut dirs: Vec<PathBuf>) -> usize {
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

    let mut removed = 0;
    for dir in dirs {
        match fs::remove_dir(&dir) {
            Ok(()) => removed += 1,
            Err(e) => trace!(path = %dir.display(), error = %e, "rmdir failed"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::filter::FilterPolicy;
    use std::time::{Duration, Instant};

    fn config(root: &Path, mode: Mode, policy: FilterPolicy) -> Arc<RunConfig> {
        Arc::new(RunConfig::new(root, mode).unwrap().with_policy(policy))
    }

    /// Single-threaded drain over a Vec
    fn run_sequential(driver: &TraversalDriver) -> LocalResult {
        let mut queue: Vec<Token> = Vec::new();
        let mut local = LocalResult::default();
        driver.seed(&mut queue).unwrap();
        while let Some(token) = queue.pop() {
            driver.process(&token, &mut queue, &mut local).unwrap();
        }
        local
    }

    #[test]
    fn test_seed_is_root_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), Mode::Find, FilterPolicy::default());
        let driver = TraversalDriver::new(Arc::clone(&config), Stonewall::disabled());

        let mut queue: Vec<Token> = Vec::new();
        driver.seed(&mut queue).unwrap();
        assert_eq!(queue.len(), 1);

        let item = PathCodec::default().decode(&queue[0]).unwrap();
        assert_eq!(item.tag, EntryTag::Directory);
        assert_eq!(item.path, config.root);
    }

    #[test]
    fn test_find_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top"), vec![0u8; 8]).unwrap();
        fs::write(dir.path().join("a/mid"), vec![0u8; 8]).unwrap();
        fs::write(dir.path().join("a/b/deep"), vec![0u8; 8]).unwrap();
        fs::write(dir.path().join("a/b/other"), vec![0u8; 9]).unwrap();

        let policy = FilterPolicy {
            expected_size: 8,
            ..FilterPolicy::default()
        };
        let driver = TraversalDriver::new(
            config(dir.path(), Mode::Find, policy),
            Stonewall::disabled(),
        );

        let local = run_sequential(&driver);
        assert_eq!(local.found_files, 3);
        assert_eq!(local.errors, 0);
        assert!(!local.stonewalled);
    }

    #[test]
    fn test_name_filter_skips_files_not_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/file.01"), vec![0u8; 4]).unwrap();
        fs::write(dir.path().join("sub/file.02"), vec![0u8; 4]).unwrap();

        let policy = FilterPolicy {
            expected_size: 4,
            name_substring: Some("01".into()),
            ..FilterPolicy::default()
        };
        let driver = TraversalDriver::new(
            config(dir.path(), Mode::Find, policy),
            Stonewall::disabled(),
        );

        assert_eq!(run_sequential(&driver).found_files, 1);
    }

    #[test]
    fn test_expired_stonewall_stops_expansion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), vec![0u8; 1]).unwrap();

        let policy = FilterPolicy {
            expected_size: 1,
            ..FilterPolicy::default()
        };
        let past = Instant::now() - Duration::from_secs(10);
        let driver = TraversalDriver::new(
            config(dir.path(), Mode::Find, policy),
            Stonewall::new(Duration::from_secs(1), past),
        );

        let local = run_sequential(&driver);
        assert_eq!(local.found_files, 0);
        assert!(local.stonewalled);
    }

    #[test]
    fn test_unopenable_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain");
        fs::write(&not_a_dir, vec![0u8; 3]).unwrap();

        let driver = TraversalDriver::new(
            config(dir.path(), Mode::Find, FilterPolicy::default()),
            Stonewall::disabled(),
        );

        // Tagged as a directory, but listing it fails with ENOTDIR for any user
        let codec = PathCodec::default();
        let token = codec.encode_root(&not_a_dir).unwrap();
        let mut queue: Vec<Token> = Vec::new();
        let mut local = LocalResult::default();

        driver.process(&token, &mut queue, &mut local).unwrap();
        assert!(queue.is_empty());
        assert_eq!(local.errors, 0);
        assert_eq!(local.found_files, 0);
    }

    #[test]
    fn test_vanished_directory_counts_only_the_stat() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("gone")).unwrap();
        fs::write(dir.path().join("kept"), vec![0u8; 5]).unwrap();

        let policy = FilterPolicy {
            expected_size: 5,
            ..FilterPolicy::default()
        };
        let driver = TraversalDriver::new(
            config(dir.path(), Mode::Find, policy),
            Stonewall::disabled(),
        );

        let mut queue: Vec<Token> = Vec::new();
        let mut local = LocalResult::default();
        driver.seed(&mut queue).unwrap();
        let root = queue.pop().unwrap();
        driver.process(&root, &mut queue, &mut local).unwrap();
        assert_eq!(queue.len(), 2);

        // Removed between enqueue and dequeue: lstat and open both fail
        fs::remove_dir(dir.path().join("gone")).unwrap();

        while let Some(token) = queue.pop() {
            driver.process(&token, &mut queue, &mut local).unwrap();
        }
        assert!(queue.is_empty());
        assert_eq!(local.found_files, 1);
        assert_eq!(local.errors, 1);
    }

    #[test]
    fn test_path_too_long_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x".repeat(200)), b"").unwrap();

        let root_len = fs::canonicalize(dir.path()).unwrap().as_os_str().len();
        let mut config = RunConfig::new(dir.path(), Mode::Find).unwrap();
        config.max_path_len = root_len + 10;
        let driver = TraversalDriver::new(Arc::new(config), Stonewall::disabled());

        let mut queue: Vec<Token> = Vec::new();
        let mut local = LocalResult::default();
        driver.seed(&mut queue).unwrap();
        let root = queue.pop().unwrap();
        let err = driver.process(&root, &mut queue, &mut local).unwrap_err();
        assert!(matches!(
            err,
            crate::error::FindError::Codec(crate::error::CodecError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_delete_empties_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::write(dir.path().join("a/f1"), b"1").unwrap();
        fs::write(dir.path().join("a/b/c/f2"), b"2").unwrap();
        std::os::unix::fs::symlink("a/f1", dir.path().join("link")).unwrap();

        let driver = TraversalDriver::new(
            config(dir.path(), Mode::Delete, FilterPolicy::default()),
            Stonewall::disabled(),
        );

        let local = run_sequential(&driver);
        assert_eq!(local.found_files, 0);
        assert_eq!(local.deferred_dirs.len(), 3);

        assert_eq!(remove_deferred_dirs(local.deferred_dirs), 3);
        assert!(dir.path().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
