//! Directory walking and per-file hashing.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use trust_core::{HashAlgorithm, Result, TrustError, WatchdogConfig};

/// Directory names never descended into.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".next",
    "dist",
    "build",
    ".turbo",
    "target",
];

/// What to walk and what to skip.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Root of the watched tree.
    pub root: PathBuf,

    /// Directory names to skip at any depth.
    pub ignored_dirs: HashSet<String>,

    /// Include entries whose name starts with a dot.
    pub include_hidden: bool,
}

impl WalkOptions {
    /// Options for `root` with the default ignore set.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()).collect(),
            include_hidden: false,
        }
    }

    pub fn from_config(config: &WatchdogConfig) -> Self {
        let mut options = Self::new(config.root.clone());
        options
            .ignored_dirs
            .extend(config.extra_ignored_dirs.iter().cloned());
        options.include_hidden = config.include_hidden;
        options
    }

    fn skips(&self, entry: &DirEntry) -> bool {
        // The root itself is always walked, whatever its name.
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if !self.include_hidden && name.starts_with('.') {
            return true;
        }
        entry.file_type().is_dir() && self.ignored_dirs.contains(name.as_ref())
    }
}

/// One hashed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Root-relative path with `/` separators.
    pub path: String,
    pub hash: String,
    pub size_bytes: u64,
}

/// Walk the tree and hash every regular file, sorted by path.
///
/// Any walk or read failure aborts the scan.
pub fn scan_tree(options: &WalkOptions, algo: HashAlgorithm) -> Result<Vec<ScannedFile>> {
    let root = options.root.as_path();
    let walk_error = |reason: String| TrustError::Walk {
        root: root.display().to_string(),
        reason,
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !options.skips(e))
    {
        let entry = entry.map_err(|e| walk_error(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let (hash, size_bytes) = File::open(entry.path())
            .and_then(|file| algo.hex_digest_reader(file))
            .map_err(|e| walk_error(format!("read {}: {}", entry.path().display(), e)))?;

        files.push(ScannedFile {
            path: relative_path(root, entry.path()),
            hash,
            size_bytes,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Scanned {} files under {:?}", files.len(), root);
    Ok(files)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
