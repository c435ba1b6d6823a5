//! In-memory first-child/next-sibling forest indexing the notes of a store.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. There are no parent
//! or previous-sibling links: [`TreeIndex::find_anchor`] recovers them with a
//! full walk, which is O(size of tree). Every traversal uses an explicit stack
//! so depth and width of the forest never touch the call stack.
//!
//! The index performs no I/O. Byte ranges stored in [`Locator::Persisted`] are
//! only meaningful between a rewrite and the next mutation.

use crate::core::date_range::{parse_note_date, DateRange};
use crate::core::delete::{DeleteResult, DeleteStrategy};
use crate::{NoteRecord, NotamyError, Result};

/// Stable index of a node in the arena.
pub type NodeId = usize;

/// Where a node's record content currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Synthetic root of a brand-new store; never has a record.
    Empty,
    /// Content held in memory, written fresh by the next rewrite.
    Staged(Box<NoteRecord>),
    /// Byte range `[start, end)` of the record in the backing file.
    Persisted { start: u64, end: u64 },
}

/// Index entry for one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub tag: String,
    pub hash: String,
    pub date: String,
    pub locator: Locator,
}

/// Which node field a prefix key is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Tag,
    Hash,
    Date,
}

impl MatchField {
    /// True when `key` is a case-insensitive prefix of the selected field.
    ///
    /// A shorter key matching a longer stored value is intended: it allows
    /// abbreviated hashes and tags. An empty key matches every node.
    #[must_use]
    pub fn matches(self, info: &NodeInfo, key: &str) -> bool {
        let value = match self {
            Self::Tag => &info.tag,
            Self::Hash => &info.hash,
            Self::Date => &info.date,
        };
        value
            .get(..key.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(key))
    }
}

/// A slot holding a link to a node: the forest root, or one of a node's two links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Root,
    FirstChild(NodeId),
    NextSibling(NodeId),
}

#[derive(Debug, Clone)]
struct Slot {
    info: NodeInfo,
    first_child: Option<NodeId>,
    next_sibling: Option<NodeId>,
    freed: bool,
}

/// Arena-backed forest of note index entries.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    nodes: Vec<Slot>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
}

impl TreeIndex {
    /// Creates an index with no nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Returns the index entry of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never allocated.
    #[must_use]
    pub fn info(&self, id: NodeId) -> &NodeInfo {
        &self.slot(id).info
    }

    pub fn info_mut(&mut self, id: NodeId) -> &mut NodeInfo {
        &mut self.slot_mut(id).info
    }

    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).first_child
    }

    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).next_sibling
    }

    /// Direct children of `id`, in sibling order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.chain(self.first_child(id))
    }

    /// `start` and every node reachable from it through `next_sibling`.
    #[must_use]
    pub fn chain(&self, start: Option<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = start;
        while let Some(id) = cursor {
            out.push(id);
            cursor = self.next_sibling(id);
        }
        out
    }

    /// Creates a node and appends it as the last child of `parent`.
    ///
    /// With no parent, the node becomes the forest root if the index is empty,
    /// otherwise it is appended to the root's sibling chain.
    pub fn insert(&mut self, parent: Option<NodeId>, info: NodeInfo) -> NodeId {
        let id = self.alloc(info);
        match parent {
            Some(parent) => {
                let last = self.chain(self.first_child(parent)).last().copied();
                match last {
                    Some(last) => self.slot_mut(last).next_sibling = Some(id),
                    None => self.slot_mut(parent).first_child = Some(id),
                }
            }
            None => match self.chain(self.root).last().copied() {
                Some(last) => self.slot_mut(last).next_sibling = Some(id),
                None => self.root = Some(id),
            },
        }
        id
    }

    /// Attaches `first_child` / `next_sibling` links directly; used when a
    /// forest is rebuilt from its persisted shape.
    pub(crate) fn link(
        &mut self,
        id: NodeId,
        first_child: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) {
        let slot = self.slot_mut(id);
        slot.first_child = first_child;
        slot.next_sibling = next_sibling;
    }

    /// Allocates an unlinked node.
    pub(crate) fn alloc(&mut self, info: NodeInfo) -> NodeId {
        let slot = Slot {
            info,
            first_child: None,
            next_sibling: None,
            freed: false,
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = slot;
                id
            }
            None => {
                self.nodes.push(slot);
                self.nodes.len() - 1
            }
        }
    }

    pub(crate) fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    /// Every node reachable from the root, in display order: a node, then its
    /// child chain depth-first, then its sibling chain.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        self.preorder_from(self.root)
    }

    /// Display-order walk starting at `start` and following its sibling chain.
    #[must_use]
    pub fn preorder_from(&self, start: Option<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = start.into_iter().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(next) = self.next_sibling(id) {
                stack.push(next);
            }
            if let Some(child) = self.first_child(id) {
                stack.push(child);
            }
        }
        out
    }

    /// First node in display order whose `field` starts with `key`.
    ///
    /// A match inside a node's children is returned before any later sibling
    /// is tested.
    #[must_use]
    pub fn find(&self, key: &str, field: MatchField) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|&id| field.matches(self.info(id), key))
    }

    /// Every node whose `field` starts with `key`, in display order.
    #[must_use]
    pub fn find_all(&self, key: &str, field: MatchField) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| field.matches(self.info(id), key))
            .collect()
    }

    /// Number of nodes whose `field` starts with `key`.
    ///
    /// Callers treat a count above one as a request for disambiguation.
    #[must_use]
    pub fn count_matches(&self, key: &str, field: MatchField) -> usize {
        self.find_all(key, field).len()
    }

    /// Nodes dated inside `range`, skipping the forest root.
    #[must_use]
    pub fn find_in_range(&self, range: &DateRange) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| Some(id) != self.root)
            .filter(|&id| {
                parse_note_date(&self.info(id).date).is_some_and(|secs| range.contains(secs))
            })
            .collect()
    }

    /// The node whose `first_child` or `next_sibling` currently equals `node`.
    #[must_use]
    pub fn find_anchor(&self, node: NodeId) -> Option<NodeId> {
        self.preorder().into_iter().find(|&id| {
            self.first_child(id) == Some(node) || self.next_sibling(id) == Some(node)
        })
    }

    /// True iff `candidate` is `ancestor` or lies below it.
    ///
    /// Only `first_child` links of `ancestor` are followed at the top level:
    /// the siblings of `ancestor` are never part of its ancestry.
    #[must_use]
    pub fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        candidate == ancestor
            || self
                .preorder_from(self.first_child(ancestor))
                .contains(&candidate)
    }

    /// Deep copy of `node`, its child chain, and its sibling chain.
    ///
    /// Returns the id of the copy of `node`; the copy is not linked anywhere.
    pub fn copy_subtree(&mut self, node: NodeId) -> NodeId {
        let copy = self.alloc(self.info(node).clone());
        let mut stack = vec![(node, copy)];
        while let Some((source, target)) = stack.pop() {
            let first_child = self.first_child(source).map(|child| {
                let new = self.alloc(self.info(child).clone());
                stack.push((child, new));
                new
            });
            let next_sibling = self.next_sibling(source).map(|sibling| {
                let new = self.alloc(self.info(sibling).clone());
                stack.push((sibling, new));
                new
            });
            self.link(target, first_child, next_sibling);
        }
        copy
    }

    /// Removes every node whose hash starts with `hash`, discarding each removed
    /// node's descendants.
    pub fn remove(&mut self, hash: &str) -> DeleteResult {
        self.remove_with(hash, DeleteStrategy::DeleteAll)
    }

    /// Removes every node whose hash starts with `hash` using `strategy`.
    ///
    /// A matched node is replaced in its slot by its own `next_sibling`. With
    /// [`DeleteStrategy::DeleteAll`] its child chain is freed along with it;
    /// with [`DeleteStrategy::PromoteChildren`] the child chain is spliced into
    /// the node's former position instead.
    pub fn remove_with(&mut self, hash: &str, strategy: DeleteStrategy) -> DeleteResult {
        let mut result = DeleteResult::default();
        let mut links = vec![Link::Root];

        while let Some(link) = links.pop() {
            // Re-test the same slot after a removal: the node moved into it may match too.
            while let Some(id) = self.get_link(link) {
                if !MatchField::Hash.matches(self.info(id), hash) {
                    links.push(Link::NextSibling(id));
                    links.push(Link::FirstChild(id));
                    break;
                }
                let next = self.next_sibling(id);
                let children = self.first_child(id);
                result.affected_hashes.push(self.info(id).hash.clone());

                let replacement = match (strategy, children) {
                    (DeleteStrategy::PromoteChildren, Some(first)) => {
                        if let Some(&last) = self.chain(Some(first)).last() {
                            self.slot_mut(last).next_sibling = next;
                        }
                        Some(first)
                    }
                    (_, children) => {
                        for freed in self.preorder_from(children) {
                            result.affected_hashes.push(self.info(freed).hash.clone());
                            self.release(freed);
                        }
                        next
                    }
                };
                self.release(id);
                self.set_link(link, replacement);
            }
        }

        result.deleted_count = result.affected_hashes.len();
        result
    }

    /// Moves the node matching `source_key` according to `destination_key`.
    ///
    /// - `"up"` swaps it with its previous sibling.
    /// - `"down"` swaps it with its next sibling.
    /// - anything else is looked up with `field`; the source subtree is copied
    ///   as the last child of that destination and the original removed.
    ///
    /// On error the tree is left unmodified.
    ///
    /// # Errors
    ///
    /// [`NotamyError::NoteNotFound`] for a missing source or destination, and
    /// [`NotamyError::InvalidMove`] for cyclic moves or a missing neighbour.
    pub fn move_node(
        &mut self,
        destination_key: &str,
        source_key: &str,
        field: MatchField,
    ) -> Result<NodeId> {
        let source = self
            .find(source_key, field)
            .ok_or_else(|| NotamyError::NoteNotFound(format!("source {source_key}")))?;

        if destination_key.eq_ignore_ascii_case("up") {
            self.move_up(source)?;
            return Ok(source);
        }
        if destination_key.eq_ignore_ascii_case("down") {
            self.move_down(source)?;
            return Ok(source);
        }

        if Some(source) == self.root {
            return Err(NotamyError::InvalidMove(
                "the root cannot be moved".to_string(),
            ));
        }
        let destination = self.find(destination_key, field).ok_or_else(|| {
            NotamyError::NoteNotFound(format!("destination {destination_key}"))
        })?;
        if self.is_descendant(destination, source) {
            return Err(NotamyError::InvalidMove(
                "move would create a cycle".to_string(),
            ));
        }

        let copy = self.alloc(self.info(source).clone());
        let children = self.first_child(source).map(|child| self.copy_subtree(child));
        self.link(copy, children, None);

        let source_hash = self.info(source).hash.clone();
        self.remove(&source_hash);

        let last = self.chain(self.first_child(destination)).last().copied();
        match last {
            Some(last) => self.slot_mut(last).next_sibling = Some(copy),
            None => self.slot_mut(destination).first_child = Some(copy),
        }
        log::debug!("moved {source_hash} under {}", self.info(destination).hash);
        Ok(copy)
    }

    /// Places `node` before its previous sibling.
    fn move_up(&mut self, node: NodeId) -> Result<()> {
        let previous = self
            .find_anchor(node)
            .filter(|&anchor| self.next_sibling(anchor) == Some(node))
            .ok_or_else(|| NotamyError::InvalidMove("no previous sibling".to_string()))?;
        let previous_link = self.link_to(previous);
        self.swap_with_next(previous_link, previous, node);
        Ok(())
    }

    /// Places `node` after its next sibling.
    fn move_down(&mut self, node: NodeId) -> Result<()> {
        let next = self
            .next_sibling(node)
            .ok_or_else(|| NotamyError::InvalidMove("no next sibling".to_string()))?;
        let link = self.link_to(node);
        self.swap_with_next(link, node, next);
        Ok(())
    }

    /// Rewires `link -> current -> next -> rest` into `link -> next -> current -> rest`.
    fn swap_with_next(&mut self, link: Link, current: NodeId, next: NodeId) {
        let rest = self.next_sibling(next);
        self.slot_mut(current).next_sibling = rest;
        self.slot_mut(next).next_sibling = Some(current);
        self.set_link(link, Some(next));
    }

    /// The slot currently pointing at `node`.
    fn link_to(&self, node: NodeId) -> Link {
        match self.find_anchor(node) {
            Some(anchor) if self.first_child(anchor) == Some(node) => Link::FirstChild(anchor),
            Some(anchor) => Link::NextSibling(anchor),
            None => Link::Root,
        }
    }

    fn get_link(&self, link: Link) -> Option<NodeId> {
        match link {
            Link::Root => self.root,
            Link::FirstChild(id) => self.first_child(id),
            Link::NextSibling(id) => self.next_sibling(id),
        }
    }

    fn set_link(&mut self, link: Link, value: Option<NodeId>) {
        match link {
            Link::Root => self.root = value,
            Link::FirstChild(id) => self.slot_mut(id).first_child = value,
            Link::NextSibling(id) => self.slot_mut(id).next_sibling = value,
        }
    }

    fn release(&mut self, id: NodeId) {
        let slot = &mut self.nodes[id];
        if !slot.freed {
            slot.freed = true;
            slot.first_child = None;
            slot.next_sibling = None;
            self.free.push(id);
        }
    }

    fn slot(&self, id: NodeId) -> &Slot {
        &self.nodes[id]
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        &mut self.nodes[id]
    }
}
