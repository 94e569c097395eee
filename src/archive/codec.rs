//! Archive container formats
//!
//! An [`ArchiveCodec`] turns a stream of entries into archive bytes and back.
//! It knows nothing about allowed roots, conflicts or staging; the engine
//! enforces those around it.

use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use log::warn;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tar::EntryType;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symbolic or hard link
    Link,
    /// Devices, fifos and anything else without plain byte content
    Other,
}

/// A file-system object to add to an archive
#[derive(Debug, Clone)]
pub struct PackEntry {
    pub source: PathBuf,
    pub archive_path: PathBuf,
    pub kind: EntryKind,
}

/// Header of an entry read back from an archive. `path` is untrusted.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub mode: Option<u32>,
}

/// Receives each archive entry together with a reader over its content
pub type EntryVisitor<'a> = dyn FnMut(&EntryHeader, &mut dyn Read) -> Result<(), GatewayError> + 'a;

pub type PackEntries<'a> = dyn Iterator<Item = Result<PackEntry, GatewayError>> + 'a;

pub trait ArchiveCodec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Streams `entries` into `output` one at a time. Returns the number of entries written.
    fn pack(&self, output: &mut dyn Write, entries: &mut PackEntries<'_>) -> Result<usize, GatewayError>;

    /// Streams entries out of `input`, handing each to `visit` in archive order.
    fn unpack(&self, input: &mut dyn Read, visit: &mut EntryVisitor<'_>) -> Result<usize, GatewayError>;
}

/// tar container with gzip compression
#[derive(Debug, Clone, Copy)]
pub struct TarGzCodec {
    level: Compression,
}

impl Default for TarGzCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl TarGzCodec {
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    fn unreadable(&self, err: io::Error) -> GatewayError {
        warn!("Failed to read {} archive: {}", self.name(), err);
        GatewayError::InvalidInput(format!("not a readable {} archive", self.name()))
    }
}

impl ArchiveCodec for TarGzCodec {
    fn name(&self) -> &'static str {
        "tar.gz"
    }

    fn pack(&self, output: &mut dyn Write, entries: &mut PackEntries<'_>) -> Result<usize, GatewayError> {
        let mut builder = tar::Builder::new(GzEncoder::new(output, self.level));
        builder.follow_symlinks(false);

        let mut written = 0;
        for entry in entries {
            let entry = entry?;
            let appended = match entry.kind {
                EntryKind::Directory => builder.append_dir(&entry.archive_path, &entry.source),
                EntryKind::File => builder.append_path_with_name(&entry.source, &entry.archive_path),
                EntryKind::Link | EntryKind::Other => continue,
            };
            appended.map_err(|e| GatewayError::from_io(e, &entry.archive_path.to_string_lossy()))?;
            written += 1;
        }

        let encoder = builder
            .into_inner()
            .map_err(|e| GatewayError::from_io(e, "archive"))?;
        encoder
            .finish()
            .map_err(|e| GatewayError::from_io(e, "archive"))?;
        Ok(written)
    }

    fn unpack(&self, input: &mut dyn Read, visit: &mut EntryVisitor<'_>) -> Result<usize, GatewayError> {
        let mut archive = tar::Archive::new(GzDecoder::new(input));
        let entries = archive.entries().map_err(|e| self.unreadable(e))?;

        let mut visited = 0;
        for entry in entries {
            let mut entry = entry.map_err(|e| self.unreadable(e))?;

            let header = entry.header();
            let kind = match header.entry_type() {
                EntryType::Regular | EntryType::Continuous => EntryKind::File,
                EntryType::Directory => EntryKind::Directory,
                EntryType::Symlink | EntryType::Link => EntryKind::Link,
                EntryType::XGlobalHeader => continue,
                _ => EntryKind::Other,
            };
            let mode = header.mode().ok();
            let path = entry.path().map_err(|e| self.unreadable(e))?.into_owned();

            let info = EntryHeader {
                path,
                kind,
                mode,
            };
            visit(&info, &mut entry)?;
            visited += 1;
        }
        Ok(visited)
    }
}
