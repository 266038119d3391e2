//! Marker of the last successfully recorded measurement.
//!
//! The file holds a single unix timestamp. It is replaced atomically on
//! every write. The collector never reads it back.

use crate::error::StoreError;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Overwrite the checkpoint with `timestamp`.
    pub fn write(&self, timestamp: i64) -> Result<(), StoreError> {
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(timestamp.to_string().as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read the stored timestamp, `None` when the file is missing or empty.
    pub fn read(&self) -> Result<Option<i64>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::InvalidCheckpoint(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_checkpoint_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("last_time.txt"));
        assert_eq!(checkpoint.read().unwrap(), None);
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = Checkpoint::new(dir.path().join("last_time.txt"));
        checkpoint.write(1714546800).unwrap();
        checkpoint.write(1714550400).unwrap();
        assert_eq!(checkpoint.read().unwrap(), Some(1714550400));
        assert_eq!(
            fs::read_to_string(checkpoint.path()).unwrap(),
            "1714550400"
        );
        assert!(!checkpoint.temp_path().exists());
    }

    #[test]
    fn test_garbage_checkpoint_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_time.txt");
        fs::write(&path, "yesterday").unwrap();
        let err = Checkpoint::new(&path).read().unwrap_err();
        assert!(matches!(err, StoreError::InvalidCheckpoint(_)));
    }
}
