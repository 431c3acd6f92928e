//! Staging workspaces.
//!
//! Every export and import runs inside a fresh staging directory that is
//! removed when its [`StagingDir`] guard drops, on success and on every
//! error path. Names carry a random UUID plus a millisecond timestamp so
//! concurrent runs never collide without any locking.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::sync::types::{SyncError, SyncResult};

/// A temporary directory removed on drop.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create `<parent>/<prefix>-<uuid>-<millis>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(parent: &Path, prefix: &str) -> SyncResult<Self> {
        let path = parent.join(unique_name(prefix));
        fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "Created staging directory");
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the staging directory.
    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staging directory"),
            Err(e) => warn!(
                path = %self.path.display(),
                "Unable to delete staging directory: {e}"
            ),
        }
    }
}

/// `<prefix>-<uuid>-<millis>`.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{}",
        uuid::Uuid::new_v4(),
        chrono::Utc::now().timestamp_millis()
    )
}

/// Workspace root used when none is configured.
#[must_use]
pub fn default_temp_root() -> PathBuf {
    std::env::temp_dir()
}

/// Expand a package into `dest`.
///
/// A directory package is copied; a file package is read as a zip archive.
///
/// # Errors
///
/// Returns [`SyncError::PackageNotFound`] if `package` does not exist, or an
/// I/O or archive error if extraction fails.
pub fn unpack_package(package: &Path, dest: &Path) -> SyncResult<()> {
    if package.is_dir() {
        debug!(src = %package.display(), dest = %dest.display(), "Copying package directory");
        return copy_tree(package, dest);
    }
    if !package.is_file() {
        return Err(SyncError::PackageNotFound(package.to_path_buf()));
    }

    debug!(src = %package.display(), dest = %dest.display(), "Extracting package archive");
    extract_zip(package, dest)
}

/// Extract a zip archive into `dest`, creating it if needed.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or an entry cannot be written.
pub fn extract_zip(archive: &Path, dest: &Path) -> SyncResult<()> {
    fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(dest)?;
    Ok(())
}

/// Copy every file under `src` into `dest`, overwriting existing files and
/// leaving unrelated files in `dest` alone.
///
/// # Errors
///
/// Returns an error if walking `src` or copying any file fails.
pub fn copy_tree(src: &Path, dest: &Path) -> SyncResult<()> {
    fs::create_dir_all(dest)?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| SyncError::Io(std::io::Error::other(e.to_string())))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_staging_dir_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = {
            let staging = StagingDir::create(temp_dir.path(), "iac-view").unwrap();
            fs::write(staging.join("Foo.zip"), "data").unwrap();
            assert!(staging.path().is_dir());
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_staging_dir_removed_on_error_path() {
        fn failing(root: &Path) -> SyncResult<PathBuf> {
            let staging = StagingDir::create(root, "import-vrops-0").unwrap();
            let path = staging.path().to_path_buf();
            fs::read(staging.join("missing")).map(|_| path).map_err(SyncError::from)
        }

        let temp_dir = TempDir::new().unwrap();
        assert!(failing(temp_dir.path()).is_err());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unique_names_differ() {
        let a = unique_name("iac-view");
        let b = unique_name("iac-view");
        assert!(a.starts_with("iac-view-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_copy_tree_overwrites_and_keeps_unrelated() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dest = temp_dir.path().join("dest");
        fs::create_dir_all(src.join("views/resources")).unwrap();
        fs::write(src.join("views/Foo.xml"), "new").unwrap();
        fs::write(src.join("views/resources/content.properties"), "a=1\n").unwrap();
        fs::create_dir_all(dest.join("views")).unwrap();
        fs::write(dest.join("views/Foo.xml"), "old").unwrap();
        fs::write(dest.join("content.yaml"), "view: [Foo]").unwrap();

        copy_tree(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("views/Foo.xml")).unwrap(), "new");
        assert!(dest.join("views/resources/content.properties").is_file());
        assert!(dest.join("content.yaml").is_file());
    }

    #[test]
    fn test_unpack_zip_package() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("pkg.zip");
        {
            let mut zip = zip::ZipWriter::new(File::create(&archive).unwrap());
            let options = zip::write::FileOptions::default();
            zip.start_file("policies/policiesMetadata.vrops.json", options).unwrap();
            zip.write_all(b"{\"42\":\"P1\"}").unwrap();
            zip.finish().unwrap();
        }

        let dest = temp_dir.path().join("staging");
        unpack_package(&archive, &dest).unwrap();

        let content = fs::read_to_string(dest.join("policies/policiesMetadata.vrops.json")).unwrap();
        assert_eq!(content, "{\"42\":\"P1\"}");
    }

    #[test]
    fn test_unpack_missing_package() {
        let temp_dir = TempDir::new().unwrap();
        let result = unpack_package(&temp_dir.path().join("nope.zip"), temp_dir.path());
        assert!(matches!(result, Err(SyncError::PackageNotFound(_))));
    }
}
