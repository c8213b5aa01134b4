use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

/// Where agencies' stop files come from. Paths are the ones written in the agency table.
pub trait StopSource {
    /// The whole file, or None if it doesn't exist
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Stop files on disk, relative to some root directory.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl StopSource for DirSource {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(path);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs_err::read(path)?))
    }
}

/// Stop files held in memory
#[derive(Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: Into<String>, C: Into<String>>(&mut self, path: P, contents: C) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }
}

impl StopSource for MemorySource {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.files.get(path).map(|x| x.as_bytes().to_vec()))
    }
}
