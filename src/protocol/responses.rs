//! Success envelopes

use serde::Serialize;

use crate::storage::{ContentEncoding, FileMetadata};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub content: String,
    pub encoding: ContentEncoding,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileMetadata>,
}

#[derive(Debug, Serialize)]
pub struct CompressResponse {
    pub message: String,
    pub entries: usize,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct DecompressResponse {
    pub message: String,
    pub entries: usize,
}
