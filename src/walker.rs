// walker.rs

//! Lazy, depth-first discovery of result files under a root directory.
//!
//! Each call to [`walk`] starts from scratch, so a walk can be restarted any
//! number of times. Directory entries are visited in name order; files of a
//! directory come before the contents of its subdirectories.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metadata::contains_token;

/// Naming convention a candidate file must satisfy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFilter {
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// `<marker>_<value>` tokens that must each appear in some directory segment
    pub dir_tokens: Vec<String>,
}

impl FileFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string()).filter(|p| !p.is_empty());
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn with_dir_token(mut self, marker: &str, value: &str) -> Self {
        self.dir_tokens.push(format!("{}_{}", marker, value));
        self
    }

    pub fn matches(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };
        if let Some(prefix) = &self.prefix {
            if !name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(suffix) = &self.suffix {
            if !name.ends_with(suffix.as_str()) {
                return false;
            }
        }
        if self.dir_tokens.is_empty() {
            return true;
        }
        let dirs: Vec<String> = path
            .parent()
            .map(|parent| parent.iter().map(|p| p.to_string_lossy().into_owned()).collect())
            .unwrap_or_default();
        self.dir_tokens
            .iter()
            .all(|token| dirs.iter().any(|segment| contains_token(segment, token)))
    }
}

/// Iterator over matching files. Unreadable subdirectories are logged and skipped.
#[derive(Debug)]
pub struct Walk {
    filter: FileFilter,
    pending_dirs: Vec<PathBuf>,
    ready: VecDeque<PathBuf>,
}

/// Start a walk. Fails only when `root` itself cannot be read.
pub fn walk(root: &Path, filter: FileFilter) -> Result<Walk> {
    let entries = read_sorted(root).map_err(|source| Error::RootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;

    let mut walk = Walk {
        filter,
        pending_dirs: Vec::new(),
        ready: VecDeque::new(),
    };
    walk.expand(entries);
    Ok(walk)
}

impl Walk {
    fn expand(&mut self, entries: Vec<(PathBuf, bool)>) {
        let mut subdirs = Vec::new();
        for (path, is_dir) in entries {
            if is_dir {
                subdirs.push(path);
            } else if self.filter.matches(&path) {
                self.ready.push_back(path);
            }
        }
        // reversed so the stack pops them in name order
        self.pending_dirs.extend(subdirs.into_iter().rev());
    }
}

impl Iterator for Walk {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            if let Some(path) = self.ready.pop_front() {
                return Some(path);
            }
            let dir = self.pending_dirs.pop()?;
            match read_sorted(&dir) {
                Ok(entries) => self.expand(entries),
                Err(e) => warn!("skipping unreadable directory {}: {}", dir.display(), e),
            }
        }
    }
}

// (path, is_dir) pairs sorted by file name; symlinked directories are not followed
fn read_sorted(dir: &Path) -> std::io::Result<Vec<(PathBuf, bool)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("skipping entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        entries.push((entry.path(), is_dir));
    }
    entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn wide_filter() -> FileFilter {
        FileFilter::new().with_prefix("prune_layers_").with_suffix("_output.txt")
    }

    #[test]
    fn test_walk_finds_nested_matches_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "b/Conv-MNIST_1/prune_layers_ALL_output.txt");
        touch(root, "a/deep/er/prune_layers_FHL_output.txt");
        touch(root, "a/prune_layers_CONV_output.txt");
        touch(root, "a/notes_output.txt");
        touch(root, "a/prune_layers_CONV_output.csv");

        let found: Vec<PathBuf> = walk(root, wide_filter())
            .unwrap()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a/prune_layers_CONV_output.txt"),
                PathBuf::from("a/deep/er/prune_layers_FHL_output.txt"),
                PathBuf::from("b/Conv-MNIST_1/prune_layers_ALL_output.txt"),
            ]
        );
    }

    #[test]
    fn test_walk_with_no_matches_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "x/y/readme.md");
        assert_eq!(walk(temp_dir.path(), wide_filter()).unwrap().count(), 0);
    }

    #[test]
    fn test_walk_is_restartable() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "c/prune_layers_SHL_output.txt");
        let first: Vec<_> = walk(temp_dir.path(), wide_filter()).unwrap().collect();
        let second: Vec<_> = walk(temp_dir.path(), wide_filter()).unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        let err = walk(&missing, wide_filter()).unwrap_err();
        assert!(matches!(err, Error::RootInaccessible { .. }));
    }

    #[test]
    fn test_dir_tokens_must_all_match() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "MNIST/prune_layers_FHL/batch_size_1024/p-percentage_0.1/a_run_0.txt");
        touch(root, "MNIST/prune_layers_FHL+SHL/batch_size_1024/p-percentage_0.1/b_run_0.txt");
        touch(root, "MNIST/prune_layers_FHL/batch_size_64/p-percentage_0.1/c_run_0.txt");

        let filter = FileFilter::new()
            .with_suffix("run_0.txt")
            .with_dir_token("p-percentage", "0.1")
            .with_dir_token("batch_size", "1024")
            .with_dir_token("prune_layers", "FHL");
        let found: Vec<PathBuf> = walk(root, filter).unwrap().collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("a_run_0.txt"));
    }

    #[test]
    fn test_filter_ignores_empty_prefix() {
        let filter = FileFilter::new().with_prefix("").with_suffix("run_0.txt");
        assert_eq!(filter.prefix, None);
        assert!(filter.matches(Path::new("x/train_run_0.txt")));
        assert!(!filter.matches(Path::new("x/train_run_1.txt")));
    }
}
