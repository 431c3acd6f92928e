//! File helpers shared by the export and import pipelines.
//!
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Pretty JSON files for definitions, groups and sidecars
//! - Sorted directory listings filtered by extension
//! - Moves that survive crossing filesystems

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::sync::types::SyncResult;

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> SyncResult<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> SyncResult<()> {
    let content = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &content)
}

/// Regular files directly under `dir` whose extension equals `ext`
/// (case-insensitive), sorted by path. `None` lists every regular file.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_files(dir: &Path, ext: Option<&str>) -> SyncResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let keep = match ext {
            None => true,
            Some(ext) => path
                .extension()
                .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext)),
        };
        if keep {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Subdirectories directly under `dir`, sorted. A missing directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn list_dirs(dir: &Path) -> SyncResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Move a file, replacing any existing target.
///
/// Falls back to copy + remove when `rename` fails (different filesystems).
///
/// # Errors
///
/// Returns an error if neither rename nor copy succeeds.
pub fn move_file(from: &Path, to: &Path) -> SyncResult<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

/// File stem as an owned string (`views/Foo.xml` gives `Foo`).
#[must_use]
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
