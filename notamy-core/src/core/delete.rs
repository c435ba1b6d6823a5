//! Delete strategy and result types for node removal.
//!
//! Two strategies are supported:
//!
//! - [`DeleteStrategy::DeleteAll`] removes every matching node together with
//!   its whole child subtree. This is what `remove` does by default.
//! - [`DeleteStrategy::PromoteChildren`] removes only the matching node and
//!   splices its child chain into the position it occupied, preserving order.
//!
//! ```rust
//! use notamy_core::{DeleteResult, DeleteStrategy};
//!
//! let json = serde_json::to_string(&DeleteStrategy::PromoteChildren).unwrap();
//! assert_eq!(json, r#""PromoteChildren""#);
//!
//! let result = DeleteResult {
//!     deleted_count: 2,
//!     affected_hashes: vec!["a1".to_string(), "b2".to_string()],
//! };
//! assert!(serde_json::to_string(&result).unwrap().contains("affectedHashes"));
//! ```

use serde::{Deserialize, Serialize};

/// Determines what happens to the children of a removed node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DeleteStrategy {
    /// Remove the node and all of its descendants.
    #[default]
    DeleteAll,

    /// Remove only the node; its children take its place among its siblings.
    PromoteChildren,
}

/// The outcome of a remove on the tree index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Number of nodes dropped from the index.
    pub deleted_count: usize,

    /// Hashes of every dropped node, matches first, then their discarded descendants.
    pub affected_hashes: Vec<String>,
}
