//! Temporary run directory.

use std::io;
use std::path::{Path, PathBuf};

use crate::run::run_file_name;

/// Temporary directory name prefix.
pub const TMP_DIR_PREFIX: &str = "large-sort";

/// Unique temporary directory holding the runs of a single sort invocation.
///
/// The directory is removed together with its content when released or dropped, whichever comes
/// first. Removal failures are never reported.
pub struct RunDirectory {
    inner: tempfile::TempDir,
}

impl RunDirectory {
    /// Creates a new directory.
    ///
    /// # Arguments
    /// * `base` - Directory the run directory is created in. If the parameter is [`None`] default OS
    ///   temporary directory will be used.
    pub fn create(base: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TMP_DIR_PREFIX);

        let inner = match base {
            Some(base) => builder.tempdir_in(base),
            None => builder.tempdir(),
        }?;
        log::info!("using {} as a temporary directory", inner.path().display());

        return Ok(RunDirectory { inner });
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Returns the path of the run flushed after `lines_read` input lines.
    pub fn run_path(&self, lines_read: u64) -> PathBuf {
        self.inner.path().join(run_file_name(lines_read))
    }

    /// Removes the directory and everything left in it.
    pub fn release(self) {
        let path = self.inner.path().to_path_buf();
        match self.inner.close() {
            Ok(()) => log::debug!("temporary directory {} removed", path.display()),
            Err(err) => log::debug!("temporary directory {} not removed: {}", path.display(), err),
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::RunDirectory;

    #[test]
    fn test_run_directory() {
        let base = tempfile::tempdir().unwrap();

        let dir = RunDirectory::create(Some(base.path())).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.starts_with(base.path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("large-sort"));

        let run_path = dir.run_path(42);
        assert_eq!(run_path, path.join("large-sort_0000000042.txt"));
        fs::write(&run_path, "1\n").unwrap();

        dir.release();
        assert_eq!(path.exists(), false);
    }

    #[test]
    fn test_run_directory_drop() {
        let base = tempfile::tempdir().unwrap();

        let path = {
            let dir = RunDirectory::create(Some(base.path())).unwrap();
            fs::write(dir.run_path(1), "1\n").unwrap();
            dir.path().to_path_buf()
        };

        assert_eq!(path.exists(), false);
    }

    #[test]
    fn test_run_directories_unique() {
        let base = tempfile::tempdir().unwrap();

        let first = RunDirectory::create(Some(base.path())).unwrap();
        let second = RunDirectory::create(Some(base.path())).unwrap();
        assert_ne!(first.path(), second.path());
    }
}
