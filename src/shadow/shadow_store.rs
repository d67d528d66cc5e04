use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::base::atomic_write;
use crate::base::generation_dir;
use crate::base::generation_name_path;
use crate::base::generations_dir;
use crate::base::parse_wal_segment_name;
use crate::base::shadow_wal_dir;
use crate::base::shadow_wal_path;
use crate::base::Generation;
use crate::error::Result;

/// On-disk home for shadow WAL segments: `<meta>/generation` and
/// `<meta>/generations/<id>/wal/<index>.wal` (spec §4.2, §4.3).
///
/// A `ShadowStore` never validates frame contents - that is the Sync
/// Engine's job. It only manages directories, filenames, and raw bytes.
pub struct ShadowStore {
    meta_path: PathBuf,
}

impl ShadowStore {
    pub fn new(meta_path: impl Into<PathBuf>) -> Self {
        ShadowStore {
            meta_path: meta_path.into(),
        }
    }

    /// The generation currently named by `<meta>/generation`, or `None` if
    /// the meta directory hasn't been initialized yet.
    pub fn current_generation(&self) -> Result<Option<Generation>> {
        let path = generation_name_path(&self.meta_path);
        match fs::read_to_string(&path) {
            Ok(name) => Ok(Some(Generation::try_from_name(name.trim())?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Start a brand-new generation: create its directory tree, then
    /// atomically point `<meta>/generation` at it. Returns the new
    /// generation's identity.
    pub fn create_generation(&self) -> Result<Generation> {
        let id = Generation::new();
        fs::create_dir_all(&self.meta_path)?;
        fs::create_dir_all(generations_dir(&self.meta_path))?;
        fs::create_dir_all(shadow_wal_dir(&self.meta_path, &id))?;

        atomic_write(
            &generation_name_path(&self.meta_path),
            id.as_str().as_bytes(),
        )?;

        Ok(id)
    }

    /// Remove every generation directory except `keep`, freeing shadow WAL
    /// storage once a newer generation is established (spec §4.3: old
    /// generations are not needed once replicas have caught up past them).
    pub fn prune_generations_except(&self, keep: &Generation) -> Result<()> {
        let dir = generations_dir(&self.meta_path);
        if !dir.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_name() != keep.as_str() {
                let path = entry.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                }
            }
        }
        Ok(())
    }

    /// Segment indexes present under a generation, sorted ascending.
    pub fn list_segments(&self, id: &Generation) -> Result<Vec<u64>> {
        let dir = shadow_wal_dir(&self.meta_path, id);
        if !dir.is_dir() {
            return Ok(vec![]);
        }
        let mut indexes = vec![];
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(index) = parse_wal_segment_name(name) {
                    indexes.push(index);
                }
            }
        }
        indexes.sort_unstable();
        Ok(indexes)
    }

    pub fn segment_path(&self, id: &Generation, index: u64) -> PathBuf {
        shadow_wal_path(&self.meta_path, id, index)
    }

    pub fn segment_size(&self, id: &Generation, index: u64) -> Result<u64> {
        Ok(fs::metadata(self.segment_path(id, index))?.len())
    }

    /// Open (creating if necessary) a segment file for appending new WAL
    /// bytes copied verbatim from the real WAL.
    pub fn open_segment_for_append(&self, id: &Generation, index: u64) -> Result<File> {
        let path = self.segment_path(id, index);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?)
    }

    /// Append raw bytes (a WAL header, or one or more whole WAL frames) to
    /// a segment and fsync them. `data` is written byte-for-byte - the
    /// caller is responsible for byte fidelity (spec I3).
    pub fn append_to_segment(&self, id: &Generation, index: u64, data: &[u8]) -> Result<()> {
        let mut file = self.open_segment_for_append(id, index)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Truncate a segment down to `size` bytes, discarding a torn tail left
    /// by a crash mid-append (spec's Open Question: truncate eagerly on
    /// recovery to the last checksum-valid frame boundary).
    pub fn truncate_segment(&self, id: &Generation, index: u64, size: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(self.segment_path(id, index))?;
        file.set_len(size)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_resolves_current_generation() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let store = ShadowStore::new(dir.path().join(".db-litestream"));

        assert!(store.current_generation()?.is_none());

        let id = store.create_generation()?;
        assert_eq!(store.current_generation()?, Some(id.clone()));
        assert!(store.segment_path(&id, 0).parent().unwrap().is_dir());
        Ok(())
    }

    #[test]
    fn appends_and_lists_segments() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let store = ShadowStore::new(dir.path().join(".db-litestream"));
        let id = store.create_generation()?;

        store.append_to_segment(&id, 0, b"hello")?;
        store.append_to_segment(&id, 0, b" world")?;
        store.append_to_segment(&id, 1, b"second segment")?;

        assert_eq!(store.list_segments(&id)?, vec![0, 1]);
        assert_eq!(store.segment_size(&id, 0)?, 11);

        let bytes = fs::read(store.segment_path(&id, 0))?;
        assert_eq!(bytes, b"hello world");
        Ok(())
    }

    #[test]
    fn truncates_a_torn_tail() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let store = ShadowStore::new(dir.path().join(".db-litestream"));
        let id = store.create_generation()?;

        store.append_to_segment(&id, 0, b"0123456789")?;
        store.truncate_segment(&id, 0, 5)?;

        assert_eq!(store.segment_size(&id, 0)?, 5);
        Ok(())
    }

    #[test]
    fn prunes_all_but_the_kept_generation() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let store = ShadowStore::new(dir.path().join(".db-litestream"));
        let old = store.create_generation()?;
        let new = store.create_generation()?;

        store.prune_generations_except(&new)?;

        assert!(!generation_dir(store.meta_path(), &old).exists());
        assert!(generation_dir(store.meta_path(), &new).exists());
        Ok(())
    }
}
