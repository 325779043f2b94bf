//! Filesystem helpers shared by every stage
//!
//! Directory walking, root filtering, path display, freshness checks and
//! atomic output files. Removal helpers are best-effort: they log and never
//! fail the caller.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use tempfile::{Builder, TempPath};
use walkdir::{DirEntry, WalkDir};

use super::naming::TEMP_PREFIX;
use crate::error::Result;

/// Recursively list every non-directory entry under `root`, depth-first.
///
/// Directories named `node_modules` or starting with `.` are not entered.
/// Symlinks are not followed. Entries are visited in file-name order so
/// repeated walks over an unchanged tree yield the same sequence.
pub fn walk<P: AsRef<Path>>(root: P) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|e| !e.file_type().is_dir())
        .map(DirEntry::into_path)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "node_modules" || name.starts_with('.')
}

/// Resolve `dirs` against `base` and keep the ones that currently exist.
pub fn find_existing_roots<S: AsRef<str>>(base: &Path, dirs: &[S]) -> Vec<PathBuf> {
    dirs.iter()
        .map(|dir| base.join(dir.as_ref()))
        .filter(|dir| dir.is_dir())
        .collect()
}

/// Render `path` relative to `root` with forward slashes.
///
/// Paths outside `root` are rendered in full.
pub fn rel(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    slash_path(relative)
}

/// Render a path with forward slashes regardless of platform.
pub fn slash_path(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        let part = match component {
            Component::RootDir => {
                out.push('/');
                continue;
            }
            Component::Prefix(prefix) => prefix.as_os_str().to_string_lossy(),
            Component::CurDir => continue,
            Component::ParentDir => "..".into(),
            Component::Normal(name) => name.to_string_lossy(),
        };
        if !out.is_empty() && !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(&part);
    }
    out
}

/// Lowercased extension of `path`, if any.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

pub(crate) fn modified_time(path: &Path) -> Option<SystemTime> {
    path.metadata().ok().and_then(|metadata| metadata.modified().ok())
}

/// Size of the file at `path` in bytes, `None` if it does not exist.
pub fn file_size(path: &Path) -> Option<u64> {
    path.metadata().ok().filter(fs::Metadata::is_file).map(|m| m.len())
}

/// Whether `derived` exists and was modified no earlier than `source`.
pub fn is_fresh(derived: &Path, source: &Path) -> bool {
    match (modified_time(derived), modified_time(source)) {
        (Some(derived), Some(source)) => derived >= source,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Delete a file, treating "already gone" as success. Returns whether a file was removed.
pub fn remove_file_quiet(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {e}", path.display());
            false
        }
    }
}

/// Delete a directory tree, treating "already gone" as success.
pub fn remove_dir_all_quiet(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!("Failed to remove directory {}: {e}", path.display());
            false
        }
    }
}

/// Reserve a hidden temp file next to `dest` carrying the same extension.
///
/// External encoders write into the returned path; the caller promotes it
/// with [`TempPath::persist`]. Dropping it deletes the partial file.
pub fn temp_output_for(dest: &Path) -> Result<TempPath> {
    let dir = parent_dir(dest);
    let suffix = dest
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(&suffix)
        .tempfile_in(dir)?;
    Ok(temp.into_temp_path())
}

/// Write `dest` through a temp sibling so it only appears once complete.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = parent_dir(dest);
    let mut temp = Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(dest)?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
