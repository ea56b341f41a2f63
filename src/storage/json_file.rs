use super::Storage;
use crate::error::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One `<key>.json` file per blob inside a data directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-save leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for JsonFileStorage {
    fn read_blob(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_blob(&mut self, key: &str, json: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::default_roster;
    use crate::storage::PARTNERS_KEY;

    #[test]
    fn test_missing_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path()).unwrap();

        assert!(storage.load_partners().unwrap().is_none());
        assert!(storage.load_periods().unwrap().is_none());
    }

    #[test]
    fn test_save_writes_keyed_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = JsonFileStorage::open(dir.path().join("nested")).unwrap();

        storage.save_partners(&default_roster()).unwrap();

        let path = dir.path().join("nested").join(format!("{}.json", PARTNERS_KEY));
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = JsonFileStorage::open(dir.path().join("nested")).unwrap();
        assert_eq!(reopened.load_partners().unwrap(), Some(default_roster()));
    }
}
