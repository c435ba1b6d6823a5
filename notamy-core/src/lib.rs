//! Core library for NotaMy, a single-file hierarchical store of tagged notes.
//!
//! The note file is a run of delimited records followed by a shape block that
//! persists the tree. [`Session`] inflates the compressed file into a working
//! copy, [`Notebook`] loads the [`TreeIndex`] from it and performs every
//! command, rewriting the whole file after each mutation.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    codec::{compress, decompress, CodecError},
    date_range::{parse_note_date, DateRange},
    delete::{DeleteResult, DeleteStrategy},
    display::{
        branch_prefix, continuation_prefix, outline_rows, render_note, render_outline, NoteView,
        OutlineEntry, OutlineRow, RenderStyle,
    },
    error::{NotamyError, Result},
    note::{fingerprint, timestamp_now, NoteChanges, NoteRecord, TagSpec, DATE_FORMAT},
    notebook::{Candidate, NodeKey, Notebook},
    protect::{hash_password, verify_password},
    session::{backup, Session},
    storage::Storage,
    tree::{Locator, MatchField, NodeId, NodeInfo, TreeIndex},
};
