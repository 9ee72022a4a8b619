//! Recursive directory enumeration.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Enumerates every regular file under a root, depth-first.
#[derive(Debug, Clone)]
pub struct TreeWalker {
    follow_symlinks: bool,
}

impl Default for TreeWalker {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
        }
    }
}

impl TreeWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to descend into symlinked directories.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Collect all files under `root` as absolute paths.
    ///
    /// Siblings are visited in file-name order. Unreadable entries and
    /// symlink loops are skipped.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let root = std::path::absolute(root).map_err(|e| Error::DirectoryAccess {
            path: root.to_path_buf(),
            source: e,
        })?;

        if !root.exists() {
            return Err(Error::PathNotFound(root));
        }

        if root.is_file() {
            return Ok(vec![root]);
        }

        let walker = WalkDir::new(&root)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::debug!("Skipping entry: {}", e);
                    continue;
                }
            };

            if !is_regular_file(&entry) {
                continue;
            }

            files.push(entry.into_path());
        }

        log::debug!("Found {} files under {}", files.len(), root.display());
        Ok(files)
    }
}

/// Regular files only: directories, FIFOs, sockets and device nodes are
/// dropped. An unfollowed symlink counts when it points at a regular file.
fn is_regular_file(entry: &walkdir::DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    entry.path_is_symlink()
        && std::fs::metadata(entry.path()).is_ok_and(|m| m.file_type().is_file())
}

/// Walk `root` with default settings.
pub fn walk(root: &Path) -> Result<Vec<PathBuf>> {
    TreeWalker::new().walk(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_walk_collects_nested_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("sub/b.bin"), [0u8, 1, 2]).unwrap();
        fs::write(root.join("sub/deeper/.hidden"), "").unwrap();

        let files = walk(root).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|p| p.is_absolute() && p.is_file()));

        let unique: HashSet<_> = files.iter().collect();
        assert_eq!(unique.len(), files.len());
    }

    #[test]
    fn test_walk_order_is_depth_first_by_name() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("b")).unwrap();
        fs::write(root.join("c.txt"), "").unwrap();
        fs::write(root.join("a.txt"), "").unwrap();
        fs::write(root.join("b/inner.txt"), "").unwrap();

        let names: Vec<PathBuf> = walk(root)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b/inner.txt"),
                PathBuf::from("c.txt"),
            ]
        );
    }

    #[test]
    fn test_walk_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(walk(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_walk_single_file_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("only.txt");
        fs::write(&file, "x").unwrap();

        assert_eq!(walk(&file).unwrap(), vec![file]);
    }

    #[test]
    fn test_walk_missing_root() {
        let dir = tempdir().unwrap();
        let err = walk(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[cfg(unix)]
    fn mkfifo(path: &Path) {
        let status = std::process::Command::new("mkfifo")
            .arg(path)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_is_not_a_scan_target() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        mkfifo(&dir.path().join("pipe"));
        mkfifo(&dir.path().join("sub/pipe"));

        let files = walk(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.txt"));

        // a FIFO given as the root yields nothing
        assert!(walk(&dir.path().join("pipe")).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_fifo_does_not_block_scan() {
        use crate::detection::{BasicEngine, SignatureStore};
        use crate::scanner::orchestrator::{CancelToken, ScanOrchestrator};
        use std::sync::{mpsc, Arc};
        use std::time::Duration;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        mkfifo(&dir.path().join("pipe"));

        let files = walk(dir.path()).unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let orch = ScanOrchestrator::new(Arc::new(BasicEngine::new(Arc::new(
                SignatureStore::load(),
            ))));
            let run = orch.run(&files, &CancelToken::new(), |_| {});
            let _ = tx.send(run.scanned_count);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unfollowed_link_to_file_is_kept() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("alias.txt"))
            .unwrap();

        let files = TreeWalker::new()
            .follow_symlinks(false)
            .walk(dir.path())
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory() {
        let dir = tempdir().unwrap();
        let target = tempdir().unwrap();
        fs::write(target.path().join("linked.txt"), "x").unwrap();
        fs::write(dir.path().join("own.txt"), "x").unwrap();
        std::os::unix::fs::symlink(target.path(), dir.path().join("link")).unwrap();

        let followed = TreeWalker::new().walk(dir.path()).unwrap();
        assert_eq!(followed.len(), 2);

        let not_followed = TreeWalker::new()
            .follow_symlinks(false)
            .walk(dir.path())
            .unwrap();
        assert_eq!(not_followed.len(), 1);
        assert!(not_followed[0].ends_with("own.txt"));
    }
}
