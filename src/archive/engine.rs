//! Archive engine
//!
//! Compresses resolved paths into a single archive and extracts archives into
//! a directory. The engine owns every safety rule around the codec:
//!
//! - the archive is written to a temporary file and renamed into place, so a
//!   failed compression never leaves a truncated archive behind;
//! - extraction goes to a staging directory first, and only when every entry
//!   has been extracted and checked are the staged entries moved into place;
//! - an entry whose path would land outside the destination, or that is a
//!   link, aborts the whole extraction before anything reaches the destination.

use log::{error, info, warn};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::archive::cancel::Cancellation;
use crate::archive::codec::{ArchiveCodec, EntryHeader, EntryKind, PackEntry, TarGzCodec};
use crate::archive::results::{CompressSummary, DecompressSummary};
use crate::error::GatewayError;
use crate::storage::filesystem::nearest_existing_dir;
use crate::storage::validation::ResolvedPath;

#[cfg(unix)]
use crate::storage::permissions::apply_mode;

const STAGING_PREFIX: &str = ".rax-staging-";
const ARCHIVE_TEMP_PREFIX: &str = ".rax-archive-";

/// Permission bits restored from archive entries; setuid/setgid/sticky are dropped
#[cfg(unix)]
const RESTORED_MODE_MASK: u32 = 0o777;

pub struct ArchiveEngine {
    codec: Box<dyn ArchiveCodec>,
}

impl Default for ArchiveEngine {
    fn default() -> Self {
        Self::new(Box::new(TarGzCodec::default()))
    }
}

/// A staged entry and where it ends up
struct PlannedMove {
    staged: PathBuf,
    target: PathBuf,
    relative: PathBuf,
    is_dir: bool,
}

impl ArchiveEngine {
    pub fn new(codec: Box<dyn ArchiveCodec>) -> Self {
        Self { codec }
    }

    pub fn format(&self) -> &'static str {
        self.codec.name()
    }

    /// Packs `sources` into a new archive at `destination`.
    ///
    /// Each source becomes a top-level archive entry named after its last path
    /// component; directories keep their structure below that name.
    /// Symbolic links inside sources are skipped.
    pub fn compress(
        &self,
        sources: &[ResolvedPath],
        destination: &ResolvedPath,
        overwrite: bool,
        cancel: &Cancellation,
    ) -> Result<CompressSummary, GatewayError> {
        if sources.is_empty() {
            return Err(GatewayError::InvalidInput(
                "at least one source path is required".into(),
            ));
        }

        if let Ok(existing) = fs::symlink_metadata(destination.as_path()) {
            if existing.is_dir() {
                return Err(GatewayError::InvalidInput(format!(
                    "{} is a directory",
                    destination.requested()
                )));
            }
            if !overwrite {
                return Err(GatewayError::Conflict(destination.requested().to_string()));
            }
        }

        let mut roots = Vec::with_capacity(sources.len());
        let mut names = HashSet::new();
        for source in sources {
            let metadata = fs::symlink_metadata(source.as_path())
                .map_err(|e| GatewayError::from_io(e, source.requested()))?;
            if metadata.file_type().is_symlink() {
                warn!("Skipping source {} (symbolic link)", source.requested());
                continue;
            }

            if metadata.is_dir() && destination.as_path().starts_with(source.as_path()) {
                return Err(GatewayError::InvalidInput(format!(
                    "archive {} would be inside source {}",
                    destination.requested(),
                    source.requested()
                )));
            }

            let name = source.as_path().file_name().ok_or_else(|| {
                GatewayError::InvalidInput(format!("{} has no name to archive under", source.requested()))
            })?;
            if !names.insert(name.to_os_string()) {
                return Err(GatewayError::InvalidInput(format!(
                    "more than one source is named {}",
                    name.to_string_lossy()
                )));
            }
            roots.push((source.as_path().to_path_buf(), PathBuf::from(name)));
        }

        let parent = destination.as_path().parent().ok_or_else(|| {
            GatewayError::InvalidInput(format!("{} has no parent", destination.requested()))
        })?;
        let mut temp = tempfile::Builder::new()
            .prefix(ARCHIVE_TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| GatewayError::from_io(e, destination.requested()))?;

        let entries = {
            let mut writer = BufWriter::new(&mut temp);
            let mut walk = walk_sources(&roots, cancel);
            let entries = self.codec.pack(&mut writer, &mut walk)?;
            writer
                .flush()
                .map_err(|e| GatewayError::from_io(e, destination.requested()))?;
            entries
        };
        temp.as_file()
            .sync_all()
            .map_err(|e| GatewayError::from_io(e, destination.requested()))?;

        let persisted = if overwrite {
            temp.persist(destination.as_path())
        } else {
            temp.persist_noclobber(destination.as_path())
        };
        let archive = persisted.map_err(|e| GatewayError::from_io(e.error, destination.requested()))?;

        let size = archive.metadata().map(|m| m.len()).unwrap_or(0);
        info!(
            "Compressed {} source(s) into {} ({} entries, {} bytes, {})",
            sources.len(),
            destination.requested(),
            entries,
            size,
            self.format()
        );

        Ok(CompressSummary { entries, size })
    }

    /// Extracts the archive at `source` into the directory `destination`.
    ///
    /// Nothing reaches `destination` unless every entry extracted cleanly into
    /// staging and none of them conflicts with an existing file (when
    /// `overwrite` is false). A failure while moving staged entries into
    /// place can leave the entries moved so far.
    pub fn decompress(
        &self,
        source: &ResolvedPath,
        destination: &ResolvedPath,
        overwrite: bool,
        cancel: &Cancellation,
    ) -> Result<DecompressSummary, GatewayError> {
        let metadata = fs::metadata(source.as_path())
            .map_err(|e| GatewayError::from_io(e, source.requested()))?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(GatewayError::InvalidInput(format!(
                "{} is not a readable archive",
                source.requested()
            )));
        }

        if let Ok(existing) = fs::symlink_metadata(destination.as_path()) {
            if !existing.is_dir() {
                return Err(GatewayError::InvalidInput(format!(
                    "{} is not a directory",
                    destination.requested()
                )));
            }
        }

        let staging_base = nearest_existing_dir(destination.as_path()).ok_or_else(|| {
            GatewayError::IoError(format!("no existing parent for {}", destination.requested()))
        })?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&staging_base)
            .map_err(|e| GatewayError::from_io(e, destination.requested()))?;

        let archive = File::open(source.as_path())
            .map_err(|e| GatewayError::from_io(e, source.requested()))?;
        let mut input = BufReader::new(archive);

        let mut dir_modes: Vec<(PathBuf, u32)> = Vec::new();
        let mut extracted = 0usize;
        {
            let mut visit = |header: &EntryHeader, content: &mut dyn Read| -> Result<(), GatewayError> {
                cancel.check()?;

                let relative = sanitize_entry_path(&header.path)?;
                if relative.as_os_str().is_empty() {
                    return Ok(());
                }

                let staged = staging.path().join(&relative);
                match header.kind {
                    EntryKind::Link | EntryKind::Other => {
                        return Err(GatewayError::PathRejected(format!(
                            "archive entry {} is a link or special file",
                            header.path.display()
                        )));
                    }
                    EntryKind::Directory => {
                        fs::create_dir_all(&staged).map_err(|e| entry_failure(e, &relative))?;
                        if let Some(mode) = header.mode {
                            dir_modes.push((relative, mode));
                        }
                    }
                    EntryKind::File => {
                        extract_file(&staged, content, header.mode)
                            .map_err(|e| entry_failure(e, &relative))?;
                    }
                }
                extracted += 1;
                Ok(())
            };
            self.codec.unpack(&mut input, &mut visit)?;
        }

        let plan = plan_commit(staging.path(), destination, overwrite)?;
        commit(&plan, destination, &dir_modes)?;

        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory for {}: {}", destination.requested(), e);
        }

        info!(
            "Decompressed {} into {} ({} entries)",
            source.requested(),
            destination.requested(),
            extracted
        );
        Ok(DecompressSummary { entries: extracted })
    }
}

/// Lazily walks every source root, yielding one entry at a time
fn walk_sources<'a>(
    roots: &'a [(PathBuf, PathBuf)],
    cancel: &'a Cancellation,
) -> impl Iterator<Item = Result<PackEntry, GatewayError>> + 'a {
    roots.iter().flat_map(move |(source, name)| {
        WalkDir::new(source)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |item| {
                if let Err(e) = cancel.check() {
                    return Some(Err(e));
                }
                let item = match item {
                    Ok(item) => item,
                    Err(e) => return Some(Err(GatewayError::from_io(e.into(), &name.to_string_lossy()))),
                };

                let archive_path = match item.path().strip_prefix(source) {
                    Ok(relative) if relative.as_os_str().is_empty() => name.clone(),
                    Ok(relative) => name.join(relative),
                    Err(_) => return None,
                };

                let file_type = item.file_type();
                let kind = if file_type.is_dir() {
                    EntryKind::Directory
                } else if file_type.is_file() {
                    EntryKind::File
                } else {
                    warn!("Skipping {} (symlink or special file)", archive_path.display());
                    return None;
                };

                Some(Ok(PackEntry {
                    source: item.into_path(),
                    archive_path,
                    kind,
                }))
            })
    })
}

/// Folds an untrusted entry path into a relative path that cannot leave the
/// extraction directory. Absolute paths and `..` that climb above the top are rejected.
pub fn sanitize_entry_path(path: &Path) -> Result<PathBuf, GatewayError> {
    let escapes = || {
        GatewayError::PathRejected(format!(
            "archive entry {} escapes the destination",
            path.display()
        ))
    };

    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => clean.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return Err(escapes());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escapes()),
        }
    }
    Ok(clean)
}

fn extract_file(staged: &Path, content: &mut dyn Read, mode: Option<u32>) -> io::Result<()> {
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(staged)?;
    io::copy(content, &mut file)?;
    file.flush()?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        apply_mode(staged, mode & RESTORED_MODE_MASK)?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

fn entry_failure(err: io::Error, relative: &Path) -> GatewayError {
    error!("Failed to extract entry {}: {}", relative.display(), err);
    GatewayError::IoError(format!("failed to extract entry {}", relative.display()))
}

/// Checks every staged entry against the destination before anything moves
fn plan_commit(
    staging_root: &Path,
    destination: &ResolvedPath,
    overwrite: bool,
) -> Result<Vec<PlannedMove>, GatewayError> {
    let mut plan = Vec::new();

    for item in WalkDir::new(staging_root).min_depth(1).sort_by_file_name() {
        let item = item.map_err(|e| GatewayError::from_io(e.into(), destination.requested()))?;
        let relative = match item.path().strip_prefix(staging_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };
        let target = destination.as_path().join(&relative);
        let is_dir = item.file_type().is_dir();

        if let Ok(existing) = fs::symlink_metadata(&target) {
            if existing.file_type().is_symlink() {
                return Err(GatewayError::PathRejected(format!(
                    "extraction target {} is a symbolic link",
                    relative.display()
                )));
            }
            let conflicts = if is_dir {
                !existing.is_dir()
            } else {
                existing.is_dir() || !overwrite
            };
            if conflicts {
                return Err(GatewayError::Conflict(relative.display().to_string()));
            }
        }

        plan.push(PlannedMove {
            staged: item.into_path(),
            target,
            relative,
            is_dir,
        });
    }

    Ok(plan)
}

/// Moves staged entries into place, parents before children, then restores directory modes
fn commit(
    plan: &[PlannedMove],
    destination: &ResolvedPath,
    dir_modes: &[(PathBuf, u32)],
) -> Result<(), GatewayError> {
    fs::create_dir_all(destination.as_path())
        .map_err(|e| GatewayError::from_io(e, destination.requested()))?;

    for planned in plan {
        let moved = if planned.is_dir {
            fs::create_dir_all(&planned.target)
        } else {
            replace_file(&planned.staged, &planned.target)
        };
        moved.map_err(|e| entry_failure(e, &planned.relative))?;
    }

    // Deepest first, so a read-only parent does not block its children
    #[cfg(unix)]
    for (relative, mode) in dir_modes.iter().rev() {
        apply_mode(&destination.as_path().join(relative), mode & RESTORED_MODE_MASK)
            .map_err(|e| entry_failure(e, relative))?;
    }
    #[cfg(not(unix))]
    let _ = dir_modes;

    Ok(())
}

fn replace_file(staged: &Path, target: &Path) -> io::Result<()> {
    #[cfg(not(unix))]
    if target.exists() {
        fs::remove_file(target)?;
    }
    fs::rename(staged, target)
}
