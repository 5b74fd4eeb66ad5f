//! Keyed image storage used by the file transforms.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::error::{PipelineError, Result};

/// Flat key → bytes storage.
pub trait ImageStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool>;

    /// Read the whole object. Missing keys are `NotFound`.
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Replace or create the object in one write.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Object size in bytes.
    fn size(&self, key: &str) -> Result<u64>;
}

/// Keys are flat file names: no separators, no parent components.
fn check_key(key: &str) -> Result<()> {
    let bad = key.is_empty()
        || key == "."
        || key.contains("..")
        || key.contains(['/', '\\'])
        || key.contains('\0');
    if bad {
        return Err(PipelineError::invalid("key", format!("'{key}' is not a valid image key")));
    }
    Ok(())
}

/// Images stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a directory-rooted store, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

fn not_found(key: &str, err: io::Error) -> PipelineError {
    if err.kind() == io::ErrorKind::NotFound {
        PipelineError::NotFound(key.to_string())
    } else {
        PipelineError::Storage(err)
    }
}

impl ImageStore for FsStore {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path(key)?.is_file())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(self.path(key)?).map_err(|e| not_found(key, e))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        // Write beside the target then rename so readers never see a
        // partial file. Concurrent writers each get their own temp name.
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(".{key}.{}.{n}.tmp", std::process::id()));
        let written = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    fn size(&self, key: &str) -> Result<u64> {
        let meta = fs::metadata(self.path(key)?).map_err(|e| not_found(key, e))?;
        Ok(meta.len())
    }
}

/// In-process store, mostly for tests and one-shot CLI requests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> PipelineError {
    PipelineError::Storage(io::Error::other("memory store lock poisoned"))
}

impl ImageStore for MemoryStore {
    fn exists(&self, key: &str) -> Result<bool> {
        check_key(key)?;
        Ok(self.objects.read().map_err(|_| poisoned())?.contains_key(key))
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        check_key(key)?;
        self.objects
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn size(&self, key: &str) -> Result<u64> {
        check_key(key)?;
        self.objects
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .map(|b| b.len() as u64)
            .ok_or_else(|| PipelineError::NotFound(key.to_string()))
    }
}
