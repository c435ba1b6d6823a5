//! Text rendering of the tree and of individual notes.
//!
//! Indentation is driven by a list of "is last at depth" flags carried with
//! each row: entry `i` is true when the ancestor at depth `i + 1` (or the row
//! itself, for the final entry) has no next sibling.

use crate::core::tree::{NodeId, TreeIndex};
use crate::NoteRecord;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE: &str = "│   ";
const BLANK: &str = "    ";

/// A node together with the indentation flags leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    pub id: NodeId,
    pub flags: Vec<bool>,
}

impl OutlineRow {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.flags.len()
    }
}

/// Note content prepared for display, already decrypted or masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteView {
    pub hash: String,
    pub record: NoteRecord,
}

/// A rendered search or listing result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub flags: Vec<bool>,
    pub view: NoteView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    /// One line: tag, comment and content markers.
    #[default]
    Summary,
    /// One line plus link path, hash and date.
    Extended,
    /// Every field on its own line, then the body.
    Full,
}

/// Rows for `start` and everything below it, in display order.
///
/// With `follow_siblings` the sibling chain of `start` is listed as well, at
/// the same depth; otherwise only the subtree rooted at `start` is shown.
#[must_use]
pub fn outline_rows(
    tree: &TreeIndex,
    start: Option<NodeId>,
    follow_siblings: bool,
) -> Vec<OutlineRow> {
    let mut rows = Vec::new();
    let mut stack: Vec<(NodeId, Vec<bool>)> =
        start.into_iter().map(|id| (id, Vec::new())).collect();

    while let Some((id, flags)) = stack.pop() {
        if !flags.is_empty() || follow_siblings {
            if let Some(next) = tree.next_sibling(id) {
                let mut sibling_flags = flags.clone();
                if let Some(last) = sibling_flags.last_mut() {
                    *last = tree.next_sibling(next).is_none();
                }
                stack.push((next, sibling_flags));
            }
        }
        if let Some(child) = tree.first_child(id) {
            let mut child_flags = flags.clone();
            child_flags.push(tree.next_sibling(child).is_none());
            stack.push((child, child_flags));
        }
        rows.push(OutlineRow { id, flags });
    }
    rows
}

/// Connector drawn before a row's first line.
#[must_use]
pub fn branch_prefix(flags: &[bool]) -> String {
    let Some((&is_last, ancestors)) = flags.split_last() else {
        return String::new();
    };
    let mut out = continuation(ancestors);
    out.push_str(if is_last { LAST_BRANCH } else { BRANCH });
    out
}

/// Connector drawn before a row's following lines.
#[must_use]
pub fn continuation_prefix(flags: &[bool]) -> String {
    let mut out = continuation(flags);
    out.push_str(PIPE);
    out
}

fn continuation(flags: &[bool]) -> String {
    flags
        .iter()
        .map(|&last| if last { BLANK } else { PIPE })
        .collect()
}

/// Draws the whole forest, one tag per line; `extended` appends hashes.
#[must_use]
pub fn render_outline(tree: &TreeIndex, extended: bool) -> String {
    let mut out = String::new();
    for row in outline_rows(tree, tree.root(), true) {
        let info = tree.info(row.id);
        out.push_str(&branch_prefix(&row.flags));
        out.push_str(&info.tag);
        if extended {
            out.push_str(&format!("  [{}]", info.hash));
        }
        out.push('\n');
    }
    out
}

fn markers(record: &NoteRecord) -> String {
    let mut out = String::new();
    if record.has_link() {
        out.push_str(" #link");
    }
    if record.has_body() {
        out.push_str(" #body");
    }
    if !record.keywords.is_empty() {
        out.push_str(" #keys");
    }
    out
}

/// Renders one note at the indentation described by `flags`.
#[must_use]
pub fn render_note(view: &NoteView, flags: &[bool], style: RenderStyle) -> String {
    let record = &view.record;
    let head = branch_prefix(flags);
    let more = continuation_prefix(flags);

    match style {
        RenderStyle::Summary => {
            format!("{head}{}  {}{}\n", record.tag, record.comment, markers(record))
        }
        RenderStyle::Extended => {
            let mut line = format!("{head}{}  {}{}", record.tag, record.comment, markers(record));
            if record.has_link() {
                line.push_str(&format!("  -> {}", record.link_file));
            }
            line.push_str(&format!("  [{}] {}\n", view.hash, record.date));
            line
        }
        RenderStyle::Full => {
            let mut out = format!("{head}{}  [{}]\n", record.tag, view.hash);
            let mut field = |label: &str, value: &str| {
                if !value.is_empty() {
                    out.push_str(&format!("{more}{label}: {value}\n"));
                }
            };
            field("date", &record.date);
            field("comment", &record.comment);
            field("keywords", &record.keywords);
            field("file", &record.link_file);
            if let Some(body) = record.body.as_deref().filter(|b| !b.is_empty()) {
                for line in body.lines() {
                    out.push_str(&format!("{more}{line}\n"));
                }
            }
            out
        }
    }
}
