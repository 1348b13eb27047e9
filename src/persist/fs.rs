use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use super::{PersistError, PersistResult, StorageDriver};

const WRITE_CHECK_FILE: &str = ".barsync-write-check";

/// One file per key under a single directory.
///
/// Writes go to `<key>.tmp` and are renamed over the target, so a crash mid-write leaves
/// the previous document intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates `dir` if needed and checks that it accepts writes.
    ///
    /// The check writes and removes a marker file; mode bits alone miss directories owned
    /// by another user.
    pub fn open(dir: impl AsRef<Path>) -> PersistResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let marker = dir.join(WRITE_CHECK_FILE);
        fs::write(&marker, b"").map_err(|_| PersistError::StorageUnavailable)?;
        let _ = fs::remove_file(&marker);
        Ok(Self { dir })
    }

    /// Storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a key is stored at.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl StorageDriver for FileStorage {
    fn read(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> PersistResult<()> {
        let path = self.path_for(key);
        let tmp_path = self.dir.join(format!("{key}.tmp"));
        fs::write(&tmp_path, bytes)?;
        if let Err(err) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> PersistResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
