//! File system storage management
//!
//! Handles path validation, file operations and permissions.

pub mod filesystem;
pub mod operations;
pub mod permissions;
pub mod results;
pub mod validation;

pub use results::{ContentEncoding, FileContent, FileKind, FileMetadata};
pub use validation::{PathResolver, ResolvedPath};
