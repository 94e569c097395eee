//! File system helpers
//!
//! Existence checks that never follow a trailing symlink.

use std::fs;
use std::path::{Path, PathBuf};

/// Check if anything (file, directory or dangling symlink) exists at `path`
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Check if directory exists
pub fn directory_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
}

/// Closest ancestor of `path` (or `path` itself) that exists as a directory
pub fn nearest_existing_dir(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|candidate| directory_exists(candidate))
        .map(Path::to_path_buf)
}
