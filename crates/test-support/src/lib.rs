use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory holding a test database file and an upload directory.
/// Everything is removed when the value is dropped.
pub struct TempRoot {
    dir: TempDir,
}

impl TempRoot {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("plantpods-test-")
            .tempdir()
            .unwrap_or_else(|err| panic!("failed to create temp dir: {err}"));
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_url(&self) -> String {
        format!(
            "sqlite://{}?mode=rwc",
            self.path().join("db.sqlite").to_string_lossy()
        )
    }

    pub fn upload_dir(&self) -> PathBuf {
        let dir = self.path().join("uploads");
        std::fs::create_dir_all(&dir)
            .unwrap_or_else(|err| panic!("failed to create {}: {err}", dir.display()));
        dir
    }

    /// Names of the regular files currently in the upload directory, sorted.
    pub fn uploaded_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.upload_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| entry.path().is_file())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for TempRoot {
    fn default() -> Self {
        Self::new()
    }
}
