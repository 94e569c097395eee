//! Storage operations
//!
//! One function per file operation. Each takes paths already validated by the
//! resolver, performs a single file-system action and maps failures onto
//! gateway error kinds. All of them block; callers run them off the async
//! runtime.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use log::{error, info, warn};
use std::fs;
use std::io::Write;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::NamedTempFile;

use crate::error::GatewayError;
use crate::storage::filesystem::entry_exists;
use crate::storage::permissions::{apply_mode, parse_mode};
use crate::storage::results::{ContentEncoding, FileContent, FileKind, FileMetadata};
use crate::storage::validation::ResolvedPath;

const DELETE_RETRIES: u32 = 3;

#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Reads a whole file. Valid UTF-8 is returned as text, anything else base64 encoded.
pub fn read_contents(path: &ResolvedPath) -> Result<FileContent, GatewayError> {
    let metadata =
        fs::metadata(path.as_path()).map_err(|e| GatewayError::from_io(e, path.requested()))?;
    if metadata.is_dir() {
        return Err(GatewayError::InvalidInput(format!(
            "{} is a directory",
            path.requested()
        )));
    }

    let bytes = fs::read(path.as_path()).map_err(|e| GatewayError::from_io(e, path.requested()))?;
    let size = bytes.len();

    let content = match String::from_utf8(bytes) {
        Ok(text) => FileContent {
            content: text,
            encoding: ContentEncoding::Utf8,
        },
        Err(e) => FileContent {
            content: STANDARD.encode(e.into_bytes()),
            encoding: ContentEncoding::Base64,
        },
    };

    info!("Read {} ({} bytes, {:?})", path.requested(), size, content.encoding);
    Ok(content)
}

/// Lists a directory in file-system enumeration order
pub fn list_directory(path: &ResolvedPath) -> Result<Vec<FileMetadata>, GatewayError> {
    let metadata =
        fs::metadata(path.as_path()).map_err(|e| GatewayError::from_io(e, path.requested()))?;
    if !metadata.is_dir() {
        return Err(GatewayError::InvalidInput(format!(
            "{} is not a directory",
            path.requested()
        )));
    }

    let entries =
        fs::read_dir(path.as_path()).map_err(|e| GatewayError::from_io(e, path.requested()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GatewayError::from_io(e, path.requested()))?;
        let name = entry.file_name().to_string_lossy().to_string();

        let record = match entry.metadata() {
            Ok(metadata) => FileMetadata {
                kind: if metadata.is_dir() {
                    FileKind::Directory
                } else {
                    FileKind::File
                },
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                modified: metadata
                    .modified()
                    .ok()
                    .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
                    .map(|dur| dur.as_secs())
                    .unwrap_or(0),
                name,
            },
            Err(e) => {
                // Entry vanished or is unreadable between enumeration and stat
                warn!("Could not stat {} in {}: {}", name, path.requested(), e);
                let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
                FileMetadata {
                    kind: if is_dir { FileKind::Directory } else { FileKind::File },
                    name,
                    size: 0,
                    modified: 0,
                }
            }
        };
        files.push(record);
    }

    info!("Listed directory {} - {} entries", path.requested(), files.len());
    Ok(files)
}

/// Moves `from` to `to`. An existing destination is a conflict unless `overwrite` is set.
pub fn rename_entry(
    from: &ResolvedPath,
    to: &ResolvedPath,
    overwrite: bool,
) -> Result<(), GatewayError> {
    if from.is_root() || to.is_root() {
        return Err(GatewayError::PathRejected(
            "the root directory cannot be renamed".into(),
        ));
    }

    let metadata = fs::symlink_metadata(from.as_path())
        .map_err(|e| GatewayError::from_io(e, from.requested()))?;

    if metadata.is_dir() && to.as_path() != from.as_path() && to.as_path().starts_with(from.as_path()) {
        return Err(GatewayError::InvalidInput(format!(
            "{} cannot be moved into itself",
            from.requested()
        )));
    }

    if entry_exists(to.as_path()) && !overwrite {
        return Err(GatewayError::Conflict(to.requested().to_string()));
    }

    fs::rename(from.as_path(), to.as_path())
        .map_err(|e| GatewayError::from_io(e, to.requested()))?;

    info!("Renamed {} -> {}", from.requested(), to.requested());
    Ok(())
}

/// Copies the bytes of file `src` to `dest`
pub fn copy_file(src: &ResolvedPath, dest: &ResolvedPath, overwrite: bool) -> Result<u64, GatewayError> {
    let metadata =
        fs::metadata(src.as_path()).map_err(|e| GatewayError::from_io(e, src.requested()))?;
    if metadata.is_dir() {
        return Err(GatewayError::InvalidInput(format!(
            "{} is a directory",
            src.requested()
        )));
    }

    if src.as_path() == dest.as_path() {
        return Err(GatewayError::InvalidInput(format!(
            "{} and {} are the same file",
            src.requested(),
            dest.requested()
        )));
    }

    if let Ok(existing) = fs::symlink_metadata(dest.as_path()) {
        if existing.file_type().is_symlink() {
            return Err(GatewayError::PathRejected(format!(
                "{} is a symbolic link",
                dest.requested()
            )));
        }
        if existing.is_dir() {
            return Err(GatewayError::InvalidInput(format!(
                "{} is a directory",
                dest.requested()
            )));
        }
        if !overwrite {
            return Err(GatewayError::Conflict(dest.requested().to_string()));
        }
    }

    let copied = fs::copy(src.as_path(), dest.as_path())
        .map_err(|e| GatewayError::from_io(e, dest.requested()))?;

    info!("Copied {} -> {} ({} bytes)", src.requested(), dest.requested(), copied);
    Ok(copied)
}

/// Decodes a write payload according to its declared encoding
pub fn decode_content(content: &str, encoding: ContentEncoding) -> Result<Vec<u8>, GatewayError> {
    match encoding {
        ContentEncoding::Utf8 => Ok(content.as_bytes().to_vec()),
        ContentEncoding::Base64 => STANDARD
            .decode(content)
            .map_err(|e| GatewayError::InvalidInput(format!("content is not valid base64: {}", e))),
    }
}

/// Creates or replaces a file with `content`.
///
/// The bytes go to a temporary sibling first, which is then renamed over the
/// target, so readers never observe a half-written file.
pub fn write_file(path: &ResolvedPath, content: &[u8]) -> Result<(), GatewayError> {
    let existing = fs::symlink_metadata(path.as_path()).ok();
    if existing.as_ref().is_some_and(|m| m.is_dir()) {
        return Err(GatewayError::InvalidInput(format!(
            "{} is a directory",
            path.requested()
        )));
    }

    let parent = path
        .as_path()
        .parent()
        .ok_or_else(|| GatewayError::InvalidInput(format!("{} has no parent", path.requested())))?;

    let mut temp =
        NamedTempFile::new_in(parent).map_err(|e| GatewayError::from_io(e, path.requested()))?;
    temp.write_all(content)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| GatewayError::from_io(e, path.requested()))?;

    // Keep the mode of a replaced file, otherwise use the conventional default
    match existing.filter(|m| m.is_file()) {
        Some(metadata) => fs::set_permissions(temp.path(), metadata.permissions())
            .map_err(|e| GatewayError::from_io(e, path.requested()))?,
        None => {
            #[cfg(unix)]
            apply_mode(temp.path(), NEW_FILE_MODE)
                .map_err(|e| GatewayError::from_io(e, path.requested()))?;
        }
    }

    temp.persist(path.as_path())
        .map_err(|e| GatewayError::from_io(e.error, path.requested()))?;

    info!("Wrote {} ({} bytes)", path.requested(), content.len());
    Ok(())
}

/// Deletes a file, retrying briefly on permission errors
pub fn delete_file(path: &ResolvedPath) -> Result<(), GatewayError> {
    if path.is_root() {
        return Err(GatewayError::PathRejected(
            "the root directory cannot be deleted".into(),
        ));
    }

    let metadata =
        fs::symlink_metadata(path.as_path()).map_err(|e| GatewayError::from_io(e, path.requested()))?;
    if metadata.is_dir() {
        return Err(GatewayError::InvalidInput(format!(
            "{} is a directory",
            path.requested()
        )));
    }

    for attempt in 1..=DELETE_RETRIES {
        match fs::remove_file(path.as_path()) {
            Ok(()) => {
                info!("Deleted file {}", path.requested());
                return Ok(());
            }
            Err(e)
                if attempt < DELETE_RETRIES && e.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                thread::sleep(Duration::from_millis(100 * attempt as u64));
            }
            Err(e) => {
                error!("Failed to delete file {} after {} attempts", path.requested(), attempt);
                return Err(GatewayError::from_io(e, path.requested()));
            }
        }
    }

    Err(GatewayError::IoError(format!(
        "failed to delete {} after retries",
        path.requested()
    )))
}

/// Sets permission bits from an octal string. The mode is parsed before any I/O.
pub fn change_mode(path: &ResolvedPath, mode: &str) -> Result<u32, GatewayError> {
    let mode = parse_mode(mode)?;

    if path.is_root() {
        return Err(GatewayError::PathRejected(
            "permissions of the root directory cannot be changed".into(),
        ));
    }

    let metadata = fs::symlink_metadata(path.as_path())
        .map_err(|e| GatewayError::from_io(e, path.requested()))?;
    if metadata.file_type().is_symlink() {
        return Err(GatewayError::PathRejected(format!(
            "{} is a symbolic link",
            path.requested()
        )));
    }
    apply_mode(path.as_path(), mode).map_err(|e| GatewayError::from_io(e, path.requested()))?;

    info!("Changed mode of {} to {:o}", path.requested(), mode);
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::validation::PathResolver;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(dir.path());
        (dir, resolver)
    }

    fn resolve(resolver: &PathResolver, raw: &str) -> ResolvedPath {
        resolver.resolve(Some(raw)).unwrap()
    }

    #[test]
    fn test_write_then_read_text() {
        let (_dir, resolver) = setup();
        let path = resolve(&resolver, "a.txt");

        write_file(&path, b"hello").unwrap();
        let content = read_contents(&path).unwrap();

        assert_eq!(content.content, "hello");
        assert_eq!(content.encoding, ContentEncoding::Utf8);
    }

    #[test]
    fn test_binary_content_reads_as_base64() {
        let (_dir, resolver) = setup();
        let path = resolve(&resolver, "blob.bin");
        let bytes = [0xff, 0x00, 0xfe, 0x10];

        write_file(&path, &bytes).unwrap();
        let content = read_contents(&path).unwrap();

        assert_eq!(content.encoding, ContentEncoding::Base64);
        assert_eq!(decode_content(&content.content, content.encoding).unwrap(), bytes);
    }

    #[test]
    fn test_write_overwrites_existing_file() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("a.txt"), b"old contents").unwrap();
        let path = resolve(&resolver, "a.txt");

        write_file(&path, b"new").unwrap();

        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_write_into_missing_parent_is_not_found() {
        let (_dir, resolver) = setup();
        let err = write_file(&resolve(&resolver, "missing/a.txt"), b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let (_dir, resolver) = setup();
        let err = read_contents(&resolve(&resolver, "nope.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: nope.txt");
    }

    #[test]
    fn test_read_directory_is_invalid() {
        let (_dir, resolver) = setup();
        let err = read_contents(&resolve(&resolver, ".")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_list_directory_reports_kinds() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("one.txt"), b"12345").unwrap();
        fs::write(dir.path().join("two.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let mut files = list_directory(&resolve(&resolver, ".")).unwrap();
        assert_eq!(files.len(), 3);

        files.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(files[0].name, "one.txt");
        assert_eq!(files[0].kind, FileKind::File);
        assert_eq!(files[0].size, 5);
        assert!(files[0].modified > 0);
        assert_eq!(files[1].name, "sub");
        assert_eq!(files[1].kind, FileKind::Directory);
        assert_eq!(files[2].kind, FileKind::File);
    }

    #[test]
    fn test_list_file_is_invalid() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("f"), b"").unwrap();
        let err = list_directory(&resolve(&resolver, "f")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_rename_missing_source_is_not_found() {
        let (_dir, resolver) = setup();
        let err = rename_entry(&resolve(&resolver, "a"), &resolve(&resolver, "b"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_rename_onto_existing_is_conflict_unless_overwrite() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("a"), b"A").unwrap();
        fs::write(dir.path().join("b"), b"B").unwrap();
        let (a, b) = (resolve(&resolver, "a"), resolve(&resolver, "b"));

        let err = rename_entry(&a, &b, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fs::read(dir.path().join("b")).unwrap(), b"B");

        rename_entry(&a, &b, true).unwrap();
        assert_eq!(fs::read(dir.path().join("b")).unwrap(), b"A");
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn test_rename_root_is_rejected() {
        let (_dir, resolver) = setup();
        let err = rename_entry(&resolve(&resolver, "."), &resolve(&resolver, "x"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathRejected);
    }

    #[test]
    fn test_copy_file() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("src.txt"), b"payload").unwrap();

        let copied = copy_file(&resolve(&resolver, "src.txt"), &resolve(&resolver, "dst.txt"), false).unwrap();

        assert_eq!(copied, 7);
        assert_eq!(fs::read(dir.path().join("dst.txt")).unwrap(), b"payload");
        assert_eq!(fs::read(dir.path().join("src.txt")).unwrap(), b"payload");
    }

    #[test]
    fn test_copy_onto_existing_is_conflict() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("src.txt"), b"new").unwrap();
        fs::write(dir.path().join("dst.txt"), b"old").unwrap();
        let (src, dst) = (resolve(&resolver, "src.txt"), resolve(&resolver, "dst.txt"));

        let err = copy_file(&src, &dst, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        copy_file(&src, &dst, true).unwrap();
        assert_eq!(fs::read(dir.path().join("dst.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_copy_onto_itself_keeps_contents() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("a.txt"), b"precious data").unwrap();

        let err = copy_file(&resolve(&resolver, "a.txt"), &resolve(&resolver, "./a.txt"), true).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"precious data");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_onto_symlink_is_rejected() {
        let (dir, resolver) = setup();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("victim.txt");
        fs::write(&target, b"untouched").unwrap();
        fs::write(dir.path().join("src.txt"), b"payload").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let err = copy_file(&resolve(&resolver, "src.txt"), &resolve(&resolver, "link.txt"), true).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathRejected);
        assert_eq!(fs::read(&target).unwrap(), b"untouched");
    }

    #[test]
    fn test_rename_directory_into_itself_is_invalid() {
        let (dir, resolver) = setup();
        fs::create_dir(dir.path().join("d")).unwrap();

        let err = rename_entry(&resolve(&resolver, "d"), &resolve(&resolver, "d/x"), false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(dir.path().join("d").is_dir());
    }

    #[test]
    fn test_copy_directory_is_invalid() {
        let (dir, resolver) = setup();
        fs::create_dir(dir.path().join("d")).unwrap();
        let err = copy_file(&resolve(&resolver, "d"), &resolve(&resolver, "e"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_delete_file() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("gone.txt"), b"x").unwrap();

        delete_file(&resolve(&resolver, "gone.txt")).unwrap();

        assert!(!dir.path().join("gone.txt").exists());
        let err = delete_file(&resolve(&resolver, "gone.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_directory_is_invalid() {
        let (dir, resolver) = setup();
        fs::create_dir(dir.path().join("d")).unwrap();
        let err = delete_file(&resolve(&resolver, "d")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(dir.path().join("d").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_change_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, resolver) = setup();
        let file = dir.path().join("script.sh");
        fs::write(&file, b"#!/bin/sh").unwrap();

        let mode = change_mode(&resolve(&resolver, "script.sh"), "755").unwrap();

        assert_eq!(mode, 0o755);
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o7777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_change_mode_with_bad_mode_leaves_file_untouched() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, resolver) = setup();
        let file = dir.path().join("f");
        fs::write(&file, b"").unwrap();
        apply_mode(&file, 0o640).unwrap();

        let err = change_mode(&resolve(&resolver, "f"), "abc").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o7777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_change_mode_through_symlink_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, resolver) = setup();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("victim.txt");
        fs::write(&target, b"").unwrap();
        apply_mode(&target, 0o600).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let err = change_mode(&resolve(&resolver, "link"), "777").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathRejected);
        assert_eq!(fs::metadata(&target).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_change_mode_missing_file_is_not_found() {
        let (_dir, resolver) = setup();
        let err = change_mode(&resolve(&resolver, "missing"), "644").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_gets_default_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, resolver) = setup();
        write_file(&resolve(&resolver, "fresh.txt"), b"x").unwrap();
        let mode = fs::metadata(dir.path().join("fresh.txt")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
