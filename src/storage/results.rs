//! Storage result types
//!
//! Defines result structures returned by storage operations.

use serde::{Deserialize, Serialize};

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

/// One record of a directory listing
#[derive(Debug, Clone, Serialize)]
pub struct FileMetadata {
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub name: String,
    pub size: u64,
    /// Seconds since the Unix epoch, 0 when unavailable
    pub modified: u64,
}

/// How file bytes are carried in a text payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "base64")]
    Base64,
}

/// Result of reading a file
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub content: String,
    pub encoding: ContentEncoding,
}
