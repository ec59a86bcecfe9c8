//! Scoped file access shared by the format backends
//!
//! Every identify, scan, read and write opens its own handle and drops it before
//! returning, on success and on error alike. No handle outlives a call.

use crate::error::Result;
use log::debug;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Open `path` for buffered reading and run `f` against it
pub fn with_reader<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut BufReader<File>) -> Result<T>,
{
    let mut reader = BufReader::new(File::open(path)?);
    f(&mut reader)
}

/// Create (or truncate) `path` for buffered writing and run `f` against it
///
/// Parent directories are created as needed. The writer is flushed before
/// returning.
pub fn with_writer<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<T>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let out = f(&mut writer)?;
    writer.into_inner().map_err(|e| e.into_error())?;
    Ok(out)
}

/// Read the first `len` bytes of a regular file
///
/// Returns `None` for directories, missing or unreadable files and files
/// shorter than `len`. Probes build on this so they never fail.
pub fn read_magic(path: &Path, len: usize) -> Option<Vec<u8>> {
    if !path.is_file() {
        return None;
    }
    let mut buf = vec![0u8; len];
    let outcome = File::open(path).and_then(|mut file| file.read_exact(&mut buf));
    match outcome {
        Ok(()) => Some(buf),
        Err(e) => {
            debug!("cannot read {} header bytes of {}: {}", len, path.display(), e);
            None
        }
    }
}

/// Size of the file behind an open handle, keeping the current position
pub fn stream_len<R: Seek>(reader: &mut R) -> Result<u64> {
    let position = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(position))?;
    Ok(len)
}

/// Read `len` bytes starting at absolute `offset`
pub fn read_exact_at<R: Read + Seek>(reader: &mut R, offset: u64, len: usize) -> Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// True when the file extension matches one of `extensions` (case-insensitive)
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// All regular files below `dir`, recursively, in sorted order
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
