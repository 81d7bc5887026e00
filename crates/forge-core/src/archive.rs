//! Gzipped tar packing and single-entry reading.
//!
//! `pack_into` walks a directory and streams a `.tar.gz` into any writer,
//! rooting every entry under a chosen top-level directory and appending
//! synthetic entries (such as a generated `metadata.json`) after the real
//! tree. `read_entry` makes one linear pass over an archive and returns the
//! first entry whose path matches a pattern.
//!
//! Both are blocking; async callers go through the `*_blocking` helpers,
//! which run on tokio's blocking pool.

use crate::error::{ForgeError, Result};
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Matches the embedded manifest, `<root>/metadata.json`, with or without
/// a leading `./`.
pub static METADATA_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\./)?[^/]+/metadata\.json$").expect("metadata entry regex is valid")
});

/// Matches an embedded readme, `<root>/README.md` or `<root>/README.markdown`,
/// with or without a leading `./`.
pub static README_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\./)?[^/]+/README\.(md|markdown)$").expect("readme entry regex is valid")
});

/// Directory names never included in packed archives.
const SKIPPED_DIRS: &[&str] = &[".git"];

/// A file added to an archive that does not exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticEntry {
    /// Path relative to the archive root.
    pub path: String,
    pub contents: Vec<u8>,
    pub mode: u32,
}

impl SyntheticEntry {
    pub fn new(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            mode: 0o644,
        }
    }
}

/// Packs `source` into a gzipped tar written to `writer`.
///
/// Every entry is rooted under `root_name/`. File mode bits are preserved.
/// Entries are written in sorted path order, followed by `extra` entries.
/// Any failure aborts the archive.
///
/// # Examples
///
/// ```no_run
/// use forge_core::archive::{SyntheticEntry, pack_into};
///
/// let out = std::fs::File::create("/tmp/a-b-1.0.0.tar.gz")?;
/// pack_into(
///     "/src/b".as_ref(),
///     "a-b-1.0.0",
///     &[SyntheticEntry::new("metadata.json", b"{}".to_vec())],
///     out,
/// )?;
/// # Ok::<(), forge_core::ForgeError>(())
/// ```
pub fn pack_into<W: Write>(
    source: &Path,
    root_name: &str,
    extra: &[SyntheticEntry],
    writer: W,
) -> Result<W> {
    if !source.is_dir() {
        return Err(ForgeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", source.display()),
        )));
    }

    let encoder = GzEncoder::new(writer, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    builder.append_dir(root_name, source)?;
    append_tree(&mut builder, source, Path::new(root_name))?;

    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    for entry in extra {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.contents.len() as u64);
        header.set_mode(entry.mode);
        header.set_mtime(mtime);
        header.set_entry_type(tar::EntryType::Regular);
        let path = Path::new(root_name).join(&entry.path);
        builder.append_data(&mut header, path, entry.contents.as_slice())?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

fn append_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    dir: &Path,
    archive_dir: &Path,
) -> Result<()> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    children.sort();

    for child in children {
        let Some(file_name) = child.file_name() else {
            continue;
        };
        let archive_path = archive_dir.join(file_name);
        let file_type = std::fs::symlink_metadata(&child)?.file_type();

        if file_type.is_dir() {
            if SKIPPED_DIRS.iter().any(|skip| file_name == *skip) {
                continue;
            }
            builder.append_dir(&archive_path, &child)?;
            append_tree(builder, &child, &archive_path)?;
        } else {
            builder.append_path_with_name(&child, &archive_path)?;
        }
    }

    Ok(())
}

/// Packs a directory into an in-memory `.tar.gz`.
pub fn pack(source: &Path, root_name: &str, extra: &[SyntheticEntry]) -> Result<Bytes> {
    let buffer = pack_into(source, root_name, extra, Vec::new())?;
    Ok(Bytes::from(buffer))
}

/// [`pack`] on tokio's blocking pool.
pub async fn pack_blocking(
    source: PathBuf,
    root_name: String,
    extra: Vec<SyntheticEntry>,
) -> Result<Bytes> {
    tokio::task::spawn_blocking(move || pack(&source, &root_name, &extra))
        .await
        .map_err(|e| ForgeError::Io(std::io::Error::other(e)))?
}

/// Returns the contents of the first entry whose path matches `pattern`.
///
/// Reads the archive once, in order, without seeking.
///
/// # Errors
///
/// Returns `ForgeError::MalformedArtifact` if no entry matches or the
/// stream is not a valid gzipped tar. `origin` names the archive in errors.
pub fn read_entry<R: Read>(reader: R, pattern: &Regex, origin: &Path) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| ForgeError::malformed(origin, format!("unreadable archive: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| ForgeError::malformed(origin, format!("unreadable entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| ForgeError::malformed(origin, format!("bad entry path: {e}")))?
            .to_string_lossy()
            .into_owned();

        if pattern.is_match(&path) {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(|e| {
                ForgeError::malformed(origin, format!("truncated entry {path}: {e}"))
            })?;
            return Ok(contents);
        }
    }

    Err(ForgeError::malformed(
        origin,
        format!("entry not found: {}", pattern.as_str()),
    ))
}

/// Opens an archive file and reads one entry from it.
pub fn read_entry_from_path(path: &Path, pattern: &Regex) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    read_entry(BufReader::new(file), pattern, path)
}

/// Lists entry paths in archive order.
pub fn list_entries<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        names.push(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Unpacks a plain (uncompressed) tar stream into `destination`.
pub fn unpack_tar<R: Read>(reader: R, destination: &Path) -> Result<()> {
    tar::Archive::new(reader).unpack(destination)?;
    Ok(())
}
