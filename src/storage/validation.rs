//! Path validation
//!
//! Every caller-supplied path goes through [`PathResolver::resolve`] before it
//! reaches the file system. Resolution is purely lexical: `.` and `..` are
//! folded without touching the disk, and the result must stay inside the
//! allowed root.

use std::path::{Component, Path, PathBuf};

use crate::error::GatewayError;

/// A path that passed validation and lies inside the allowed root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    real: PathBuf,
    requested: String,
    is_root: bool,
}

impl ResolvedPath {
    /// Normalized absolute host path
    pub fn as_path(&self) -> &Path {
        &self.real
    }

    /// The path exactly as the caller supplied it, used in messages
    pub fn requested(&self) -> &str {
        &self.requested
    }

    /// Whether this path is the allowed root itself
    pub fn is_root(&self) -> bool {
        self.is_root
    }
}

/// Validates caller paths against the allowed root
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// `root` must already be absolute; it is normalized lexically here.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
        }
    }

    /// Resolves a raw path argument.
    ///
    /// Relative arguments are taken relative to the allowed root, absolute
    /// ones as host paths. Either way the normalized result must stay under
    /// the root.
    pub fn resolve(&self, raw: Option<&str>) -> Result<ResolvedPath, GatewayError> {
        let raw = match raw {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return Err(GatewayError::InvalidInput("path is required".into())),
        };

        if raw.contains('\0') {
            return Err(GatewayError::InvalidInput(format!(
                "path contains a NUL byte: {}",
                raw.escape_default()
            )));
        }

        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let real = normalize(&joined);

        if !real.starts_with(&self.root) {
            return Err(GatewayError::PathRejected(raw.to_string()));
        }

        Ok(ResolvedPath {
            is_root: real == self.root,
            real,
            requested: raw.to_string(),
        })
    }
}

/// Lexically folds `.` and `..`. A `..` at the file-system root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(name) => normalized.push(name),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn resolver() -> PathResolver {
        PathResolver::new("/srv/files")
    }

    #[test]
    fn test_missing_or_empty_path_is_invalid() {
        for raw in [None, Some(""), Some("   ")] {
            let err = resolver().resolve(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
    }

    #[test]
    fn test_nul_byte_is_invalid() {
        let err = resolver().resolve(Some("a\0b")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_relative_path_resolves_under_root() {
        let resolved = resolver().resolve(Some("docs/./notes/../a.txt")).unwrap();
        assert_eq!(resolved.as_path(), Path::new("/srv/files/docs/a.txt"));
        assert_eq!(resolved.requested(), "docs/./notes/../a.txt");
        assert!(!resolved.is_root());
    }

    #[test]
    fn test_absolute_path_inside_root_is_accepted() {
        let resolved = resolver().resolve(Some("/srv/files/x/y")).unwrap();
        assert_eq!(resolved.as_path(), Path::new("/srv/files/x/y"));
    }

    #[test]
    fn test_dot_resolves_to_root() {
        let resolved = resolver().resolve(Some(".")).unwrap();
        assert!(resolved.is_root());
    }

    #[test]
    fn test_traversal_is_rejected() {
        for raw in ["../etc/passwd", "a/../../b", "/etc/passwd", "/srv/files/../other"] {
            let err = resolver().resolve(Some(raw)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathRejected, "{raw}");
        }
    }

    #[test]
    fn test_sibling_with_common_prefix_is_rejected() {
        let err = resolver().resolve(Some("/srv/files-other/a")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathRejected);
    }

    #[test]
    fn test_rejection_message_names_only_caller_path() {
        let err = resolver().resolve(Some("../../x")).unwrap_err();
        assert_eq!(err.to_string(), "Path rejected: ../../x");
    }

    #[test]
    fn test_normalize_parent_at_fs_root() {
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
    }
}
