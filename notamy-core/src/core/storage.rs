//! Plain-text note file: concatenated records followed by the shape block.

use crate::core::note::INITIAL_TAG;
use crate::core::record;
use crate::core::shape::{parse_shape, serialize_shape, split_file};
use crate::core::tree::{Locator, NodeId, NodeInfo, TreeIndex};
use crate::{NoteRecord, NotamyError, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix of the previous generation kept while a rewrite is in progress.
const OLD_SUFFIX: &str = "_old";

/// Handle on the uncompressed working file.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn old_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(OLD_SUFFIX);
        PathBuf::from(name)
    }

    /// Index of a store that has never been written: a lone root with no record.
    #[must_use]
    pub fn empty_index() -> TreeIndex {
        let mut tree = TreeIndex::new();
        tree.insert(
            None,
            NodeInfo {
                tag: INITIAL_TAG.to_string(),
                hash: ".".to_string(),
                date: ".".to_string(),
                locator: Locator::Empty,
            },
        );
        tree
    }

    /// Loads the tree index from the shape block.
    ///
    /// A missing or empty file yields [`Storage::empty_index`].
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::CorruptShape`] if the shape block is missing,
    /// malformed, or points past the record region.
    pub fn load(&self) -> Result<TreeIndex> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            log::debug!("{} is empty, starting a new tree", self.path.display());
            return Ok(Self::empty_index());
        }

        let (records, shape) = split_file(&bytes)?;
        let tree = parse_shape(shape)?;
        let limit = records.len() as u64;
        for id in tree.preorder() {
            if let Locator::Persisted { end, .. } = tree.info(id).locator {
                if end > limit {
                    return Err(NotamyError::CorruptShape(format!(
                        "note {} ends at {end}, past the record region ({limit} bytes)",
                        tree.info(id).hash
                    )));
                }
            }
        }
        log::debug!("loaded {} nodes from {}", tree.len(), self.path.display());
        Ok(tree)
    }

    /// Returns the record behind `info`, from memory or from the file.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::NoteNotFound`] for the synthetic root, or any
    /// error from reading and decoding the byte range.
    pub fn read_note(&self, info: &NodeInfo) -> Result<NoteRecord> {
        match &info.locator {
            Locator::Staged(record) => Ok((**record).clone()),
            Locator::Persisted { start, end } => {
                let mut reader = BufReader::new(File::open(&self.path)?);
                record::read_at(&mut reader, *start, *end)
            }
            Locator::Empty => Err(NotamyError::NoteNotFound(format!(
                "note {} has no content",
                info.hash
            ))),
        }
    }

    /// Writes every reachable record in display order plus the shape block,
    /// then points every locator at its new byte range.
    ///
    /// The previous file is renamed to `<path>_old` for the duration and put
    /// back if writing fails; the tree is only updated on success.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::CorruptShape`] if a persisted node has no file to
    /// copy from, or any I/O error.
    pub fn rewrite(&self, tree: &mut TreeIndex) -> Result<()> {
        let old_path = self.old_path();
        let had_file = self.path.exists();
        if had_file {
            fs::rename(&self.path, &old_path)?;
        }

        match self.write_generation(tree, had_file.then_some(old_path.as_path())) {
            Ok(locators) => {
                for (id, locator) in locators {
                    tree.info_mut(id).locator = locator;
                }
                if had_file {
                    fs::remove_file(&old_path)?;
                }
                log::debug!("rewrote {} with {} nodes", self.path.display(), tree.len());
                Ok(())
            }
            Err(e) => {
                log::warn!("rewrite of {} failed: {e}", self.path.display());
                match fs::remove_file(&self.path) {
                    Ok(()) => {}
                    Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                    Err(cleanup) => log::warn!(
                        "cannot remove partial {}: {cleanup}",
                        self.path.display()
                    ),
                }
                if had_file {
                    fs::rename(&old_path, &self.path)?;
                }
                Err(e)
            }
        }
    }

    fn write_generation(
        &self,
        tree: &TreeIndex,
        old_path: Option<&Path>,
    ) -> Result<Vec<(NodeId, Locator)>> {
        let mut old = old_path
            .map(File::open)
            .transpose()?
            .map(BufReader::new);
        let mut out = BufWriter::new(File::create(&self.path)?);
        let mut offset = 0u64;
        let mut locators = Vec::new();

        for id in tree.preorder() {
            let info = tree.info(id);
            let bytes = match &info.locator {
                Locator::Empty => continue,
                Locator::Staged(record) => record::encode(record),
                Locator::Persisted { start, end } => {
                    let reader = old.as_mut().ok_or_else(|| {
                        NotamyError::CorruptShape(format!(
                            "note {} is persisted but no previous file exists",
                            info.hash
                        ))
                    })?;
                    record::read_range(reader, *start, *end)?
                }
            };
            out.write_all(&bytes)?;
            let end = offset + bytes.len() as u64;
            locators.push((id, Locator::Persisted { start: offset, end }));
            offset = end;
        }

        let mut shaped = tree.clone();
        for (id, locator) in &locators {
            shaped.info_mut(*id).locator = locator.clone();
        }
        out.write_all(serialize_shape(&shaped)?.as_bytes())?;
        out.flush()?;
        Ok(locators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::MatchField;
    use tempfile::TempDir;

    fn staged(tag: &str, hash: &str, body: &str) -> NodeInfo {
        NodeInfo {
            tag: tag.to_string(),
            hash: hash.to_string(),
            date: "2025-07-30 10:00:00".to_string(),
            locator: Locator::Staged(Box::new(NoteRecord {
                tag: tag.to_string(),
                comment: format!("{tag} comment"),
                date: "2025-07-30 10:00:00".to_string(),
                body: Some(body.to_string()),
                ..NoteRecord::default()
            })),
        }
    }

    #[test]
    fn test_missing_file_loads_empty_root() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("notes"));
        let tree = storage.load().unwrap();
        assert_eq!(tree.len(), 1);
        let root = tree.root().unwrap();
        assert_eq!(tree.info(root).tag, INITIAL_TAG);
        assert_eq!(tree.info(root).locator, Locator::Empty);
    }

    #[test]
    fn test_rewrite_then_load() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("notes"));
        let mut tree = storage.load().unwrap();
        let root = tree.root().unwrap();
        let a = tree.insert(Some(root), staged("work", "aa11", "first body"));
        tree.insert(Some(a), staged("cron", "cc33", "nested body"));

        storage.rewrite(&mut tree).unwrap();
        assert!(matches!(tree.info(a).locator, Locator::Persisted { start: 0, .. }));
        assert!(!storage.old_path().exists());

        let loaded = storage.load().unwrap();
        let cron = loaded.find("cc33", MatchField::Hash).unwrap();
        let record = storage.read_note(loaded.info(cron)).unwrap();
        assert_eq!(record.body.as_deref(), Some("nested body"));
        assert_eq!(record.comment, "cron comment");
    }

    #[test]
    fn test_second_rewrite_copies_persisted_bytes() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("notes"));
        let mut tree = storage.load().unwrap();
        let root = tree.root().unwrap();
        tree.insert(Some(root), staged("one", "aa11", "body one"));
        tree.insert(Some(root), staged("two", "bb22", "body two"));
        storage.rewrite(&mut tree).unwrap();

        tree.remove("aa11");
        tree.insert(Some(root), staged("three", "cc33", "body three"));
        storage.rewrite(&mut tree).unwrap();

        let loaded = storage.load().unwrap();
        let tags: Vec<String> = loaded
            .preorder()
            .into_iter()
            .map(|id| loaded.info(id).tag.clone())
            .collect();
        assert_eq!(tags, ["/", "two", "three"]);
        let two = loaded.find("bb22", MatchField::Hash).unwrap();
        assert!(matches!(loaded.info(two).locator, Locator::Persisted { start: 0, .. }));
        assert_eq!(
            storage.read_note(loaded.info(two)).unwrap().body.as_deref(),
            Some("body two")
        );
    }

    #[test]
    fn test_rewrite_without_previous_file_rejects_persisted() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("notes"));
        let mut tree = TreeIndex::new();
        tree.insert(
            None,
            NodeInfo {
                tag: "x".into(),
                hash: "h".into(),
                date: "d".into(),
                locator: Locator::Persisted { start: 0, end: 10 },
            },
        );
        let err = storage.rewrite(&mut tree).unwrap_err();
        assert!(matches!(err, NotamyError::CorruptShape(_)));
    }

    #[test]
    fn test_failed_rewrite_restores_previous_file() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("notes"));
        let mut tree = storage.load().unwrap();
        let root = tree.root().unwrap();
        let one = tree.insert(Some(root), staged("one", "aa11", "body one"));
        storage.rewrite(&mut tree).unwrap();
        let before = fs::read(dir.path().join("notes")).unwrap();

        tree.info_mut(one).locator = Locator::Persisted {
            start: 0,
            end: 100_000,
        };
        tree.insert(Some(root), staged("two", "bb22", "body two"));
        assert!(storage.rewrite(&mut tree).is_err());

        assert_eq!(fs::read(dir.path().join("notes")).unwrap(), before);
        assert!(!storage.old_path().exists());
        let two = tree.find("bb22", MatchField::Hash).unwrap();
        assert!(matches!(tree.info(two).locator, Locator::Staged(_)));
    }

    #[test]
    fn test_load_rejects_out_of_range_locator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes");
        fs::write(&path, "abc\n *====* \n*NODE*\n0\t500\th\tt\td\n*NULL*\n*NULL*\n").unwrap();
        let err = Storage::new(&path).load().unwrap_err();
        assert!(matches!(err, NotamyError::CorruptShape(_)));
    }

    #[test]
    fn test_read_root_has_no_content() {
        let tree = Storage::empty_index();
        let storage = Storage::new("unused");
        let root = tree.root().unwrap();
        assert!(storage.read_note(tree.info(root)).is_err());
    }
}
