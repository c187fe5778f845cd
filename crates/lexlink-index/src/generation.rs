//! Index generations with atomic swap.
//!
//! A reindex job never mutates the live index. It builds the new index
//! files in a fresh side directory (`gen-000042/`), then commits by
//! atomically replacing the `CURRENT` pointer file. Readers resolve
//! `CURRENT` once per load and keep serving the snapshot they resolved;
//! an in-process [`GenerationPointer`] gives the same swap semantics to
//! already-loaded indexes.

use crate::IndexError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const CURRENT_FILE: &str = "CURRENT";

/// In-process atomically swappable handle to an immutable index snapshot.
#[derive(Debug)]
pub struct GenerationPointer<T> {
    current: RwLock<Arc<T>>,
}

impl<T> GenerationPointer<T> {
    /// Creates a pointer at the given snapshot.
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// Returns the current snapshot. Queries hold the returned `Arc` for
    /// their whole lifetime, so a concurrent swap never changes what they
    /// read.
    pub fn load(&self) -> Arc<T> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swaps in a new snapshot, returning the previous one.
    pub fn swap(&self, value: T) -> Arc<T> {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *guard, Arc::new(value))
    }
}

/// On-disk generation directories under a root, with a `CURRENT` pointer.
#[derive(Debug, Clone)]
pub struct GenerationStore {
    root: PathBuf,
}

impl GenerationStore {
    /// Opens (creating if needed) a generation store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The committed generation id, if any.
    pub fn current(&self) -> Result<Option<u64>, IndexError> {
        let pointer = self.root.join(CURRENT_FILE);
        if !pointer.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&pointer)?;
        let id = raw
            .trim()
            .parse::<u64>()
            .map_err(|_| IndexError::Corrupt(format!("bad CURRENT pointer: {raw:?}")))?;
        Ok(Some(id))
    }

    /// Directory of the committed generation, if any.
    pub fn current_dir(&self) -> Result<Option<PathBuf>, IndexError> {
        Ok(self.current()?.map(|id| self.dir_of(id)))
    }

    /// Directory of a specific generation.
    pub fn dir_of(&self, id: u64) -> PathBuf {
        self.root.join(format!("gen-{id:06}"))
    }

    /// Creates the directory for the next generation and returns its id.
    pub fn begin(&self) -> Result<(u64, PathBuf), IndexError> {
        let next = self.current()?.map(|id| id + 1).unwrap_or(1);
        let dir = self.dir_of(next);
        std::fs::create_dir_all(&dir)?;
        Ok((next, dir))
    }

    /// Commits a generation by atomically replacing the pointer file.
    pub fn commit(&self, id: u64) -> Result<(), IndexError> {
        let dir = self.dir_of(id);
        if !dir.is_dir() {
            return Err(IndexError::Unavailable(format!(
                "generation {id} was never built"
            )));
        }
        let tmp = self.root.join(format!("{CURRENT_FILE}.tmp"));
        std::fs::write(&tmp, id.to_string())?;
        std::fs::rename(&tmp, self.root.join(CURRENT_FILE))?;
        tracing::info!(generation = id, root = %self.root.display(), "committed index generation");
        Ok(())
    }

    /// Removes generation directories older than the committed one.
    pub fn prune(&self) -> Result<usize, IndexError> {
        let Some(current) = self.current()? else {
            return Ok(0);
        };
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(suffix) = name.strip_prefix("gen-") else {
                continue;
            };
            if let Ok(id) = suffix.parse::<u64>() {
                if id < current {
                    std::fs::remove_dir_all(entry.path())?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_swap_preserves_held_snapshot() {
        let pointer = GenerationPointer::new(vec![1, 2, 3]);
        let held = pointer.load();
        let old = pointer.swap(vec![4, 5]);
        assert_eq!(*old, vec![1, 2, 3]);
        assert_eq!(*held, vec![1, 2, 3]);
        assert_eq!(*pointer.load(), vec![4, 5]);
    }

    #[test]
    fn test_begin_commit_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::open(dir.path()).unwrap();

        assert_eq!(store.current().unwrap(), None);

        let (id, gen_dir) = store.begin().unwrap();
        assert_eq!(id, 1);
        std::fs::write(gen_dir.join("lexical.json"), "{}").unwrap();
        store.commit(id).unwrap();
        assert_eq!(store.current().unwrap(), Some(1));

        let (id2, _) = store.begin().unwrap();
        assert_eq!(id2, 2);
        store.commit(id2).unwrap();
        assert_eq!(store.current().unwrap(), Some(2));
        assert_eq!(store.current_dir().unwrap().unwrap(), store.dir_of(2));
    }

    #[test]
    fn test_commit_unbuilt_generation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::open(dir.path()).unwrap();
        assert!(store.commit(7).is_err());
    }

    #[test]
    fn test_prune_removes_old_generations() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::open(dir.path()).unwrap();

        let (id1, _) = store.begin().unwrap();
        store.commit(id1).unwrap();
        let (id2, _) = store.begin().unwrap();
        store.commit(id2).unwrap();

        let removed = store.prune().unwrap();
        assert_eq!(removed, 1);
        assert!(!store.dir_of(id1).exists());
        assert!(store.dir_of(id2).exists());
    }
}
