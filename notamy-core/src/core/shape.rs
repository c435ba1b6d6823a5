//! Trailing block that persists the structure of the tree index.
//!
//! The note file is the concatenated records followed by [`SHAPE_SEPARATOR`]
//! and one token per link slot, emitted in display order: the root slot, then
//! for every node its `first_child` slot followed by its `next_sibling` slot.
//! A node token is `*NODE*` plus one tab-separated line
//! `start end hash tag date`; an empty slot is `*NULL*`.

use crate::core::tree::{Locator, NodeId, NodeInfo, TreeIndex};
use crate::{NotamyError, Result};

pub const SHAPE_DELIM: &str = "*====*";
pub const SHAPE_SEPARATOR: &str = "\n *====* \n";

const NODE_TOKEN: &str = "*NODE*";
const NULL_TOKEN: &str = "*NULL*";

/// `end` value written for a node with no record.
const EMPTY_END: i64 = -1;

/// Serializes the structure of `tree`, starting with the separator.
///
/// # Errors
///
/// Returns [`NotamyError::CorruptShape`] if a node still holds staged content;
/// the caller must rewrite the records first.
pub fn serialize_shape(tree: &TreeIndex) -> Result<String> {
    let mut out = String::from(SHAPE_SEPARATOR);
    let mut stack = vec![tree.root()];

    while let Some(slot) = stack.pop() {
        let Some(id) = slot else {
            out.push_str(NULL_TOKEN);
            out.push('\n');
            continue;
        };
        let info = tree.info(id);
        let (start, end) = match &info.locator {
            Locator::Empty => (0, EMPTY_END),
            Locator::Persisted { start, end } => (*start as i64, *end as i64),
            Locator::Staged(_) => {
                return Err(NotamyError::CorruptShape(format!(
                    "note {} has not been written",
                    info.hash
                )))
            }
        };
        out.push_str(NODE_TOKEN);
        out.push('\n');
        out.push_str(&format!(
            "{start}\t{end}\t{}\t{}\t{}\n",
            info.hash, info.tag, info.date
        ));
        stack.push(tree.next_sibling(id));
        stack.push(tree.first_child(id));
    }
    Ok(out)
}

/// Rebuilds a tree index from the token stream following the separator.
///
/// # Errors
///
/// Returns [`NotamyError::CorruptShape`] on unknown tokens, a truncated stream,
/// trailing tokens, or malformed node lines.
pub fn parse_shape(text: &str) -> Result<TreeIndex> {
    let mut tree = TreeIndex::new();
    let mut links: Vec<(Option<NodeId>, Option<NodeId>)> = Vec::new();
    let mut root = None;

    enum Pending {
        Root,
        FirstChild(NodeId),
        NextSibling(NodeId),
    }

    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let mut pending = vec![Pending::Root];

    while let Some(target) = pending.pop() {
        let token = lines
            .next()
            .ok_or_else(|| NotamyError::CorruptShape("unexpected end of shape".to_string()))?;
        let value = match token.trim() {
            NULL_TOKEN => None,
            NODE_TOKEN => {
                let line = lines.next().ok_or_else(|| {
                    NotamyError::CorruptShape("node token without data".to_string())
                })?;
                let id = tree.alloc(parse_node_line(line)?);
                links.push((None, None));
                pending.push(Pending::NextSibling(id));
                pending.push(Pending::FirstChild(id));
                Some(id)
            }
            other => {
                return Err(NotamyError::CorruptShape(format!(
                    "unknown token '{other}'"
                )))
            }
        };
        match target {
            Pending::Root => root = value,
            Pending::FirstChild(id) => links[id].0 = value,
            Pending::NextSibling(id) => links[id].1 = value,
        }
    }

    if let Some(extra) = lines.next() {
        return Err(NotamyError::CorruptShape(format!(
            "trailing data after shape: '{extra}'"
        )));
    }

    for (id, (first_child, next_sibling)) in links.into_iter().enumerate() {
        tree.link(id, first_child, next_sibling);
    }
    tree.set_root(root);
    Ok(tree)
}

/// Splits a note file into its record region and the text after the last separator.
///
/// # Errors
///
/// Returns [`NotamyError::CorruptShape`] if no separator is present or the
/// shape block is not UTF-8.
pub fn split_file(bytes: &[u8]) -> Result<(&[u8], &str)> {
    let separator = SHAPE_SEPARATOR.as_bytes();
    let position = bytes
        .windows(separator.len())
        .rposition(|window| window == separator)
        .ok_or_else(|| NotamyError::CorruptShape("shape separator missing".to_string()))?;
    let shape = std::str::from_utf8(&bytes[position + separator.len()..])
        .map_err(|e| NotamyError::CorruptShape(format!("shape is not text: {e}")))?;
    Ok((&bytes[..position], shape))
}

fn parse_node_line(line: &str) -> Result<NodeInfo> {
    let corrupt = || NotamyError::CorruptShape(format!("malformed node line '{line}'"));
    let mut fields = line.splitn(5, '\t');
    let mut next = || fields.next().ok_or_else(corrupt);

    let start: i64 = next()?.trim().parse().map_err(|_| corrupt())?;
    let end: i64 = next()?.trim().parse().map_err(|_| corrupt())?;
    let hash = next()?.to_string();
    let tag = next()?.to_string();
    let date = next()?.trim_end_matches('\r').to_string();

    let locator = match (start, end) {
        (_, EMPTY_END) => Locator::Empty,
        (_, 0) => {
            return Err(NotamyError::CorruptShape(format!(
                "note {hash} was never written"
            )))
        }
        (start, end) if start >= 0 && end > start => Locator::Persisted {
            start: start as u64,
            end: end as u64,
        },
        _ => return Err(corrupt()),
    };
    Ok(NodeInfo {
        tag,
        hash,
        date,
        locator,
    })
}
