//! Archive result types

use serde::Serialize;

/// Result of a compression
#[derive(Debug, Clone, Serialize)]
pub struct CompressSummary {
    pub entries: usize,
    /// Size of the finished archive in bytes
    pub size: u64,
}

/// Result of an extraction
#[derive(Debug, Clone, Serialize)]
pub struct DecompressSummary {
    pub entries: usize,
}
