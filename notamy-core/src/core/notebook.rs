//! High-level note operations over one uncompressed note file.
//!
//! A [`Notebook`] owns the [`Storage`] handle and the [`TreeIndex`] loaded
//! from it. Every mutating method changes the index in memory, stages any new
//! record content, and finishes with a full [`Storage::rewrite`].

use crate::core::display::{outline_rows, NoteView, OutlineEntry};
use crate::core::note::{fingerprint, timestamp_now, DEFAULT_TAG};
use crate::core::protect;
use crate::{
    DateRange, DeleteResult, DeleteStrategy, Locator, MatchField, NodeId, NodeInfo, NoteChanges,
    NoteRecord, NotamyError, Result, Storage, TreeIndex,
};
use serde::Serialize;
use std::path::Path;

/// How a command names a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKey {
    /// Case-insensitive tag prefix; several notes may share a tag.
    Tag(String),
    /// Case-insensitive hash prefix.
    Hash(String),
}

impl NodeKey {
    fn field(&self) -> MatchField {
        match self {
            Self::Tag(_) => MatchField::Tag,
            Self::Hash(_) => MatchField::Hash,
        }
    }

    fn value(&self) -> &str {
        match self {
            Self::Tag(v) | Self::Hash(v) => v,
        }
    }
}

/// One of several notes matching an ambiguous key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub tag: String,
    pub hash: String,
    pub has_link: bool,
}

/// How much of the tree around each match `find_by_key` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Node,
    Children,
    Subtree,
}

/// An open note file and its tree index.
pub struct Notebook {
    storage: Storage,
    tree: TreeIndex,
}

impl Notebook {
    /// Loads the tree index of the working file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::CorruptShape`] if the file exists but its shape
    /// block cannot be parsed, or any I/O error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let storage = Storage::new(path);
        let tree = storage.load()?;
        Ok(Self { storage, tree })
    }

    pub fn tree(&self) -> &TreeIndex {
        &self.tree
    }

    fn top_root(&self) -> Result<NodeId> {
        self.tree
            .root()
            .ok_or_else(|| NotamyError::CorruptShape("tree has no root".to_string()))
    }

    /// Resolves `key` to exactly one node.
    ///
    /// # Errors
    ///
    /// - [`NotamyError::NoteNotFound`] when nothing matches.
    /// - [`NotamyError::Ambiguous`] when several notes share a tag prefix; the
    ///   caller should ask for a hash and retry.
    /// - [`NotamyError::DuplicateHash`] when a hash prefix is not unique.
    pub fn resolve(&self, key: &NodeKey) -> Result<NodeId> {
        let matches = self.tree.find_all(key.value(), key.field());
        match (matches.as_slice(), key) {
            ([], NodeKey::Tag(tag)) => Err(NotamyError::NoteNotFound(format!("tag '{tag}'"))),
            ([], NodeKey::Hash(hash)) => Err(NotamyError::NoteNotFound(format!("hash '{hash}'"))),
            ([id], _) => Ok(*id),
            (many, NodeKey::Tag(tag)) => Err(NotamyError::Ambiguous {
                key: tag.clone(),
                candidates: self.candidates(many)?,
            }),
            (_, NodeKey::Hash(hash)) => Err(NotamyError::DuplicateHash(hash.clone())),
        }
    }

    fn candidates(&self, ids: &[NodeId]) -> Result<Vec<Candidate>> {
        ids.iter()
            .map(|&id| {
                let info = self.tree.info(id);
                let has_link = match info.locator {
                    Locator::Empty => false,
                    _ => self.read_note(id)?.has_link(),
                };
                Ok(Candidate {
                    tag: info.tag.clone(),
                    hash: info.hash.clone(),
                    has_link,
                })
            })
            .collect()
    }

    /// Returns the stored record of `id`, still sealed if it is protected.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::NoteNotFound`] for the synthetic root, or any
    /// error reading the record.
    pub fn read_note(&self, id: NodeId) -> Result<NoteRecord> {
        self.storage.read_note(self.tree.info(id))
    }

    /// Prepares `id` for display: protected content is decrypted with
    /// `password`, or masked without one.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::WrongPassword`] if `password` does not open a
    /// protected note.
    pub fn note_view(&self, id: NodeId, password: Option<&str>) -> Result<NoteView> {
        let info = self.tree.info(id);
        let record = match info.locator {
            Locator::Empty => NoteRecord {
                tag: info.tag.clone(),
                date: info.date.clone(),
                ..NoteRecord::default()
            },
            _ => {
                let mut record = self.read_note(id)?;
                if record.protected {
                    match password {
                        Some(password) => protect::decrypt_fields(&mut record, password)?,
                        None => protect::mask_fields(&mut record),
                    }
                }
                record
            }
        };
        Ok(NoteView {
            hash: info.hash.clone(),
            record,
        })
    }

    fn entries(
        &self,
        rows: Vec<(NodeId, Vec<bool>)>,
        password: Option<&str>,
    ) -> Result<Vec<OutlineEntry>> {
        rows.into_iter()
            .map(|(id, flags)| {
                Ok(OutlineEntry {
                    flags,
                    view: self.note_view(id, password)?,
                })
            })
            .collect()
    }

    /// Adds `draft` as the last child of `parent`, or of the top root.
    ///
    /// Missing tag and date are filled in; with a password the sensitive
    /// fields are sealed before staging. Returns the new note's hash.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::ValidationFailed`] for out-of-bounds fields, any
    /// error from resolving `parent`, or an I/O error from the rewrite.
    pub fn add_note(
        &mut self,
        mut draft: NoteRecord,
        parent: Option<&NodeKey>,
        password: Option<&str>,
    ) -> Result<String> {
        if draft.tag.is_empty() {
            draft.tag = DEFAULT_TAG.to_string();
        }
        if draft.date.is_empty() {
            draft.date = timestamp_now();
        }
        draft.protected = false;
        draft.iv.clear();
        draft.validate()?;

        let parent = match parent {
            Some(key) => self.resolve(key)?,
            None => self.top_root()?,
        };

        let hash = fingerprint(&draft);
        if self.tree.count_matches(&hash, MatchField::Hash) > 0 {
            return Err(NotamyError::DuplicateHash(hash));
        }
        if let Some(password) = password {
            protect::encrypt_fields(&mut draft, password)?;
        }

        let info = NodeInfo {
            tag: draft.tag.clone(),
            hash: hash.clone(),
            date: draft.date.clone(),
            locator: Locator::Staged(Box::new(draft)),
        };
        self.tree.insert(Some(parent), info);
        self.storage.rewrite(&mut self.tree)?;
        log::info!("added note {hash}");
        Ok(hash)
    }

    /// Every note in display order.
    ///
    /// # Errors
    ///
    /// Returns any error reading or decrypting a record.
    pub fn view_all(&self, password: Option<&str>) -> Result<Vec<OutlineEntry>> {
        let rows = outline_rows(&self.tree, self.tree.root(), true)
            .into_iter()
            .map(|row| (row.id, row.flags))
            .collect();
        self.entries(rows, password)
    }

    /// Every note whose `field` starts with `key`.
    ///
    /// A trailing `+` on the key also returns each match's whole subtree; a
    /// trailing `-` returns each match with its direct children only.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::NoteNotFound`] when nothing matches.
    pub fn find_by_key(
        &self,
        key: &str,
        field: MatchField,
        password: Option<&str>,
    ) -> Result<Vec<OutlineEntry>> {
        let (key, scope) = if let Some(stripped) = key.strip_suffix('+') {
            (stripped, Scope::Subtree)
        } else if let Some(stripped) = key.strip_suffix('-') {
            (stripped, Scope::Children)
        } else {
            (key, Scope::Node)
        };

        let matches = self.tree.find_all(key, field);
        if matches.is_empty() {
            return Err(NotamyError::NoteNotFound(format!("'{key}'")));
        }

        let mut rows = Vec::new();
        for id in matches {
            let subtree = outline_rows(&self.tree, Some(id), false);
            rows.extend(
                subtree
                    .into_iter()
                    .filter(|row| match scope {
                        Scope::Node => row.depth() == 0,
                        Scope::Children => row.depth() <= 1,
                        Scope::Subtree => true,
                    })
                    .map(|row| (row.id, row.flags)),
            );
        }
        self.entries(rows, password)
    }

    /// Every note dated inside `range`.
    ///
    /// # Errors
    ///
    /// Returns any error reading or decrypting a record.
    pub fn find_by_date(
        &self,
        range: &DateRange,
        password: Option<&str>,
    ) -> Result<Vec<OutlineEntry>> {
        let rows = self
            .tree
            .find_in_range(range)
            .into_iter()
            .map(|id| (id, Vec::new()))
            .collect();
        self.entries(rows, password)
    }

    /// Notes whose keywords cover every word of `query`: each query word must
    /// be a case-insensitive prefix of at least one keyword.
    ///
    /// # Errors
    ///
    /// Returns any error reading or decrypting a record.
    pub fn find_by_keywords(
        &self,
        query: &str,
        password: Option<&str>,
    ) -> Result<Vec<OutlineEntry>> {
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let mut rows = Vec::new();
        for id in self.tree.preorder() {
            if self.tree.info(id).locator == Locator::Empty {
                continue;
            }
            let keywords: Vec<String> = self
                .read_note(id)?
                .keywords
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|k| !k.is_empty())
                .map(str::to_lowercase)
                .collect();
            let covered = words
                .iter()
                .all(|word| keywords.iter().any(|k| k.starts_with(word.as_str())));
            if covered {
                rows.push((id, Vec::new()));
            }
        }
        self.entries(rows, password)
    }

    /// Applies `changes` to the note with hash prefix `hash`.
    ///
    /// A protected note needs `password` to be opened. When a password is
    /// given the note is sealed again with a fresh IV, so modifying an open
    /// note with a password also protects it.
    ///
    /// # Errors
    ///
    /// - [`NotamyError::Protected`] for a protected note without a password.
    /// - [`NotamyError::WrongPassword`] if the password does not open it.
    /// - any error from [`Notebook::resolve`] or the rewrite.
    pub fn modify(
        &mut self,
        hash: &str,
        changes: &NoteChanges,
        password: Option<&str>,
    ) -> Result<()> {
        let id = self.resolve(&NodeKey::Hash(hash.to_string()))?;
        if self.tree.info(id).locator == Locator::Empty {
            return Err(NotamyError::ValidationFailed(
                "the root note cannot be modified".to_string(),
            ));
        }
        let full_hash = self.tree.info(id).hash.clone();

        let mut record = self.read_note(id)?;
        if record.protected {
            let password = password.ok_or_else(|| NotamyError::Protected(full_hash.clone()))?;
            protect::decrypt_fields(&mut record, password)?;
        }
        record.protected = false;
        record.iv.clear();

        changes.apply_to(&mut record);
        record.validate()?;
        if let Some(password) = password {
            protect::encrypt_fields(&mut record, password)?;
        }

        let info = self.tree.info_mut(id);
        info.tag = record.tag.clone();
        info.locator = Locator::Staged(Box::new(record));
        self.storage.rewrite(&mut self.tree)?;
        log::info!("modified note {full_hash}");
        Ok(())
    }

    /// Moves the note with hash prefix `source_hash`.
    ///
    /// `destination` is `up`, `down`, or the hash prefix of the new parent.
    ///
    /// # Errors
    ///
    /// - [`NotamyError::InvalidMove`] for the root, a cycle, or a missing neighbour.
    /// - any error from [`Notebook::resolve`] or the rewrite.
    pub fn organize(&mut self, source_hash: &str, destination: &str) -> Result<()> {
        let source = self.resolve(&NodeKey::Hash(source_hash.to_string()))?;
        if Some(source) == self.tree.root() {
            return Err(NotamyError::InvalidMove(
                "the root cannot be moved".to_string(),
            ));
        }
        let source_full = self.tree.info(source).hash.clone();

        let destination_full = if destination.eq_ignore_ascii_case("up")
            || destination.eq_ignore_ascii_case("down")
        {
            destination.to_string()
        } else {
            let id = self.resolve(&NodeKey::Hash(destination.to_string()))?;
            self.tree.info(id).hash.clone()
        };

        self.tree
            .move_node(&destination_full, &source_full, MatchField::Hash)?;
        self.storage.rewrite(&mut self.tree)?;
        log::info!("moved note {source_full} ({destination})");
        Ok(())
    }

    /// Removes the note named by `key` using `strategy`.
    ///
    /// # Errors
    ///
    /// - [`NotamyError::Ambiguous`] when a tag matches several notes.
    /// - [`NotamyError::ValidationFailed`] for the root.
    /// - any error from the rewrite.
    pub fn remove(&mut self, key: &NodeKey, strategy: DeleteStrategy) -> Result<DeleteResult> {
        let id = self.resolve(key)?;
        if Some(id) == self.tree.root() {
            return Err(NotamyError::ValidationFailed(
                "the root note cannot be removed".to_string(),
            ));
        }
        let hash = self.tree.info(id).hash.clone();
        let result = self.tree.remove_with(&hash, strategy);
        self.storage.rewrite(&mut self.tree)?;
        log::info!("removed {} note(s) starting at {hash}", result.deleted_count);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Notebook {
        Notebook::open(dir.path().join("notes")).unwrap()
    }

    fn draft(tag: &str, comment: &str) -> NoteRecord {
        NoteRecord {
            tag: tag.into(),
            comment: comment.into(),
            ..NoteRecord::default()
        }
    }

    fn tags(book: &Notebook) -> Vec<String> {
        book.tree()
            .preorder()
            .into_iter()
            .map(|id| book.tree().info(id).tag.clone())
            .collect()
    }

    #[test]
    fn test_add_into_empty_store_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let hash = book.add_note(draft("a", "first"), None, None).unwrap();
        assert_eq!(hash.len(), 40);

        let book = open(&dir);
        assert_eq!(tags(&book), ["/", "a"]);
        let id = book.resolve(&NodeKey::Hash(hash[..8].to_string())).unwrap();
        let record = book.read_note(id).unwrap();
        assert_eq!(record.comment, "first");
        assert_eq!(record.date.len(), 19);
    }

    #[test]
    fn test_add_under_parent_tag() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        book.add_note(draft("log", ""), None, None).unwrap();
        book.add_note(draft("cron", ""), Some(&NodeKey::Tag("log".into())), None)
            .unwrap();
        book.add_note(draft("home", ""), None, None).unwrap();
        assert_eq!(tags(&open(&dir)), ["/", "log", "cron", "home"]);
    }

    #[test]
    fn test_ambiguous_tag_lists_candidates() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let mut linked = draft("work", "");
        linked.link_file = "/tmp/plan.txt".into();
        book.add_note(linked, None, None).unwrap();
        book.add_note(draft("workshop", ""), None, None).unwrap();

        match book.resolve(&NodeKey::Tag("work".into())) {
            Err(NotamyError::Ambiguous { key, candidates }) => {
                assert_eq!(key, "work");
                assert_eq!(candidates.len(), 2);
                assert!(candidates[0].has_link);
                assert!(!candidates[1].has_link);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(book.resolve(&NodeKey::Tag("works".into())).is_ok());
    }

    #[test]
    fn test_missing_key() {
        let dir = TempDir::new().unwrap();
        let book = open(&dir);
        let err = book.resolve(&NodeKey::Hash("ffff".into())).unwrap_err();
        assert!(matches!(err, NotamyError::NoteNotFound(_)));
    }

    #[test]
    fn test_modify_keeps_other_fields() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let mut note = draft("todo", "old comment");
        note.keywords = "home".into();
        let hash = book.add_note(note, None, None).unwrap();

        let changes = NoteChanges {
            comment: Some("new comment".into()),
            body: Some("details".into()),
            ..NoteChanges::default()
        };
        book.modify(&hash, &changes, None).unwrap();

        let book = open(&dir);
        let id = book.resolve(&NodeKey::Hash(hash)).unwrap();
        let record = book.read_note(id).unwrap();
        assert_eq!(record.comment, "new comment");
        assert_eq!(record.keywords, "home");
        assert_eq!(record.body.as_deref(), Some("details"));
    }

    #[test]
    fn test_protected_note_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let mut note = draft("bank", "pin");
        note.body = Some("1234".into());
        let hash = book.add_note(note, None, Some("pw")).unwrap();
        let id = book.resolve(&NodeKey::Hash(hash.clone())).unwrap();

        assert_eq!(book.note_view(id, None).unwrap().record.comment, protect::MASK);
        assert_eq!(book.note_view(id, Some("pw")).unwrap().record.comment, "pin");
        assert!(matches!(
            book.note_view(id, Some("nope")),
            Err(NotamyError::WrongPassword)
        ));

        let changes = NoteChanges {
            tag: Some("bank2".into()),
            ..NoteChanges::default()
        };
        assert!(matches!(
            book.modify(&hash, &changes, None),
            Err(NotamyError::Protected(_))
        ));
        book.modify(&hash, &changes, Some("pw")).unwrap();
        let view = book.note_view(id, Some("pw")).unwrap();
        assert_eq!(view.record.tag, "bank2");
        assert_eq!(view.record.body.as_deref(), Some("1234"));
    }

    #[test]
    fn test_organize_reparents_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let a = book.add_note(draft("a", ""), None, None).unwrap();
        let b = book.add_note(draft("b", ""), None, None).unwrap();
        let c = book
            .add_note(draft("c", ""), Some(&NodeKey::Hash(a.clone())), None)
            .unwrap();
        book.add_note(draft("e", ""), Some(&NodeKey::Hash(c.clone())), None)
            .unwrap();

        book.organize(&c, &b).unwrap();
        assert_eq!(tags(&open(&dir)), ["/", "a", "b", "c", "e"]);

        let book = open(&dir);
        let b_id = book.resolve(&NodeKey::Hash(b)).unwrap();
        assert_eq!(book.tree().children(b_id).len(), 1);
        let a_id = book.resolve(&NodeKey::Hash(a)).unwrap();
        assert!(book.tree().children(a_id).is_empty());
    }

    #[test]
    fn test_organize_cycle_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let a = book.add_note(draft("a", ""), None, None).unwrap();
        let c = book
            .add_note(draft("c", ""), Some(&NodeKey::Hash(a.clone())), None)
            .unwrap();
        let before = std::fs::read(dir.path().join("notes")).unwrap();

        let err = book.organize(&a, &c).unwrap_err();
        assert!(matches!(err, NotamyError::InvalidMove(_)));
        assert_eq!(std::fs::read(dir.path().join("notes")).unwrap(), before);
    }

    #[test]
    fn test_organize_up_and_root_rejected() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        book.add_note(draft("a", ""), None, None).unwrap();
        let b = book.add_note(draft("b", ""), None, None).unwrap();
        book.organize(&b, "up").unwrap();
        assert_eq!(tags(&open(&dir)), ["/", "b", "a"]);

        assert!(matches!(
            book.organize(".", "down"),
            Err(NotamyError::InvalidMove(_))
        ));
    }

    #[test]
    fn test_remove_discards_subtree_from_file() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let a = book.add_note(draft("a", ""), None, None).unwrap();
        book.add_note(draft("child", ""), Some(&NodeKey::Hash(a)), None)
            .unwrap();
        book.add_note(draft("b", ""), None, None).unwrap();

        let result = book
            .remove(&NodeKey::Tag("a".into()), DeleteStrategy::DeleteAll)
            .unwrap();
        assert_eq!(result.deleted_count, 2);
        assert_eq!(tags(&open(&dir)), ["/", "b"]);
    }

    #[test]
    fn test_remove_promote_children() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let a = book.add_note(draft("a", ""), None, None).unwrap();
        book.add_note(draft("child", ""), Some(&NodeKey::Hash(a)), None)
            .unwrap();
        book.remove(&NodeKey::Tag("a".into()), DeleteStrategy::PromoteChildren)
            .unwrap();
        assert_eq!(tags(&open(&dir)), ["/", "child"]);
    }

    #[test]
    fn test_find_by_key_scopes() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let a = book.add_note(draft("proj", ""), None, None).unwrap();
        let c = book
            .add_note(draft("api", ""), Some(&NodeKey::Hash(a.clone())), None)
            .unwrap();
        book.add_note(draft("auth", ""), Some(&NodeKey::Hash(c)), None)
            .unwrap();

        let only = book.find_by_key("proj", MatchField::Tag, None).unwrap();
        assert_eq!(only.len(), 1);
        let children = book.find_by_key("proj-", MatchField::Tag, None).unwrap();
        assert_eq!(children.len(), 2);
        let subtree = book.find_by_key("PROJ+", MatchField::Tag, None).unwrap();
        assert_eq!(subtree.len(), 3);
        assert_eq!(subtree[2].flags, vec![true, true]);
        assert!(book.find_by_key("zzz", MatchField::Tag, None).is_err());
    }

    #[test]
    fn test_find_by_keywords_and_date() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        let mut one = draft("one", "");
        one.keywords = "Rust, storage engine".into();
        one.date = "2025-07-30 10:00:00".into();
        book.add_note(one, None, None).unwrap();
        let mut two = draft("two", "");
        two.keywords = "rust cli".into();
        two.date = "2024-01-01 00:00:00".into();
        book.add_note(two, None, None).unwrap();

        let found = book.find_by_keywords("rust stor", None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].view.record.tag, "one");
        assert_eq!(book.find_by_keywords("RUST", None).unwrap().len(), 2);

        let range = DateRange::parse("2024").unwrap();
        let dated = book.find_by_date(&range, None).unwrap();
        assert_eq!(dated.len(), 1);
        assert_eq!(dated[0].view.record.tag, "two");
    }

    #[test]
    fn test_view_all_includes_root() {
        let dir = TempDir::new().unwrap();
        let mut book = open(&dir);
        book.add_note(draft("a", "x"), None, None).unwrap();
        let entries = book.view_all(None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].view.record.tag, "/");
        assert_eq!(entries[1].flags, vec![true]);
    }
}
